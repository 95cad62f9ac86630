use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::chain::{Address, Balance, ChainValue};
use crate::governance::session::Cached;
use crate::governance::submitter::ProposalStatus;

/// Consumer of session state changes (a page, the CLI console, a test recorder).
///
/// Called synchronously, after the session has released its state lock, so
/// implementations may read the session back.
pub trait SessionObserver: Send + Sync {
    fn on_status_changed(&self, status: &ProposalStatus);

    fn on_value_refreshed(&self, _value: &Cached<ChainValue>) {}

    fn on_balance_refreshed(&self, _balance: &Cached<Balance>) {}

    fn on_members_refreshed(&self, _members: &Cached<BTreeSet<Address>>) {}

    /// Registry key; registering a second observer under the same name replaces the first.
    fn name(&self) -> &str;
}

#[derive(Default)]
pub struct ObserverRegistry {
    observers: RwLock<BTreeMap<String, Arc<dyn SessionObserver>>>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, observer: Arc<dyn SessionObserver>) {
        self.observers.write().insert(observer.name().to_string(), observer);
    }

    pub fn unregister(&self, name: &str) -> bool {
        self.observers.write().remove(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.observers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Snapshot first so an observer may (un)register without deadlocking.
    fn each(&self, mut f: impl FnMut(&dyn SessionObserver)) {
        let observers: Vec<_> = self.observers.read().values().cloned().collect();
        for observer in observers {
            f(observer.as_ref());
        }
    }

    pub fn notify_status(&self, status: &ProposalStatus) {
        self.each(|o| o.on_status_changed(status));
    }

    pub fn notify_value(&self, value: &Cached<ChainValue>) {
        self.each(|o| o.on_value_refreshed(value));
    }

    pub fn notify_balance(&self, balance: &Cached<Balance>) {
        self.each(|o| o.on_balance_refreshed(balance));
    }

    pub fn notify_members(&self, members: &Cached<BTreeSet<Address>>) {
        self.each(|o| o.on_members_refreshed(members));
    }
}
