use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use parking_lot::RwLock;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::chain::{
    Address, Balance, ChainClient, ChainReader, ChainValue, ConfirmationWatcher, Connection,
    FundsError, FundsRequester, ReadUnavailable, Receipt, TxHandle, Wallet,
};
use crate::governance::builder::{InvalidReason, ProposalBuilder, ProposalError};
use crate::governance::observer::{ObserverRegistry, SessionObserver};
use crate::governance::proposal::{CanonicalPayload, ProposalDraft, ProposalKind, ProposalVariant};
use crate::governance::submitter::{
    Confirmation, ProposalStatus, ProposalSubmitter, StatusSink, SubmissionError,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("wallet not connected: {0}")]
    NotConnected(String),

    #[error("invalid proposal: {field} is {reason}")]
    InvalidProposal { field: &'static str, reason: InvalidReason },

    #[error("a proposal is already awaiting signature or confirmation")]
    AlreadyInFlight,

    #[error("no drafted proposal to submit")]
    NoDraft,

    /// `stale` tells whether an older value is still cached.
    #[error("read unavailable: {reason}")]
    ReadUnavailable { reason: String, stale: bool },

    #[error("fund request rejected in the wallet")]
    RequestRejected,

    #[error("fund request failed: {0}")]
    RequestFailed(String),

    #[error(transparent)]
    Submission(#[from] SubmissionError),
}

impl From<ProposalError> for SessionError {
    fn from(err: ProposalError) -> Self {
        match err {
            ProposalError::InvalidProposal { field, reason } => {
                SessionError::InvalidProposal { field, reason }
            }
            ProposalError::UnrecognizedPayload(_) => SessionError::InvalidProposal {
                field: "payload",
                reason: InvalidReason::Malformed,
            },
        }
    }
}

impl From<FundsError> for SessionError {
    fn from(err: FundsError) -> Self {
        match err {
            FundsError::RequestRejected => SessionError::RequestRejected,
            FundsError::RequestFailed(reason) => SessionError::RequestFailed(reason),
        }
    }
}

/// Last-known-good copy of a chain read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cached<T> {
    value: Option<T>,
    refreshed_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

impl<T> Default for Cached<T> {
    fn default() -> Self {
        Self {
            value: None,
            refreshed_at: None,
            last_error: None,
        }
    }
}

impl<T> Cached<T> {
    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.refreshed_at
    }

    /// Reason the most recent refresh failed, cleared by the next success.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn is_loaded(&self) -> bool {
        self.value.is_some()
    }

    /// The last refresh failed but an older value is still usable.
    pub fn is_stale(&self) -> bool {
        self.value.is_some() && self.last_error.is_some()
    }

    fn store(&mut self, value: T) {
        self.value = Some(value);
        self.refreshed_at = Some(Utc::now());
        self.last_error = None;
    }
}

/// Runtime knobs of a session, usually derived from the dashboard config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    pub poll_interval: Duration,
    /// `None` waits for a confirmation indefinitely.
    pub confirmation_timeout: Option<Duration>,
    pub value_unit: String,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            confirmation_timeout: Some(Duration::from_secs(300)),
            value_unit: "units".to_string(),
        }
    }
}

/// Everything a page may render, copied out of the session in one read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub account: Address,
    pub chain_id: u64,
    pub status: ProposalStatus,
    pub draft: Option<CanonicalPayload>,
    pub value: Cached<ChainValue>,
    pub balance: Cached<Balance>,
    pub members: Cached<BTreeSet<Address>>,
}

/// A claimed draft on its way to the wallet.
struct Submission {
    id: u64,
    payload: CanonicalPayload,
}

struct InFlight {
    id: u64,
    payload: CanonicalPayload,
    tx: Option<TxHandle>,
}

#[derive(Default)]
struct SessionState {
    status: ProposalStatus,
    draft: Option<CanonicalPayload>,
    in_flight: Option<InFlight>,
    value: Cached<ChainValue>,
    balance: Cached<Balance>,
    members: Cached<BTreeSet<Address>>,
}

struct SubmissionSink<'a> {
    session: &'a GovernanceSession,
    id: u64,
}

impl StatusSink for SubmissionSink<'_> {
    fn transition(&self, next: ProposalStatus) {
        self.session.apply_transition(self.id, next);
    }
}

// Dropped with the submission future. A submission abandoned before the
// wallet answered must not keep the session in AwaitingSignature.
impl Drop for SubmissionSink<'_> {
    fn drop(&mut self) {
        self.session.abandon_unsigned(self.id);
    }
}

// Covers a spawned task aborted before its first poll.
struct SpawnedSubmission {
    session: Arc<GovernanceSession>,
    id: u64,
}

impl Drop for SpawnedSubmission {
    fn drop(&mut self) {
        self.session.abandon_unsigned(self.id);
    }
}

/// Stateful façade over one wallet connection.
///
/// Owns the live [`ProposalStatus`] and the value, balance and member caches.
/// Pages get read access through accessors and [`SessionSnapshot`], and
/// change state only through the action methods. At most one proposal is
/// awaiting signature or pending at a time.
pub struct GovernanceSession {
    connection: Connection,
    reader: ChainReader,
    funds: FundsRequester,
    submitter: ProposalSubmitter,
    state: RwLock<SessionState>,
    observers: ObserverRegistry,
    next_submission: AtomicU64,
}

impl GovernanceSession {
    /// Connect `wallet` and open a session for the account it exposes.
    pub async fn connect(
        wallet: Arc<dyn Wallet>,
        chain: Arc<dyn ChainClient>,
        settings: SessionSettings,
    ) -> Result<Self, SessionError> {
        let connection = wallet.connect().await.map_err(|err| {
            warn!("Wallet connection failed: {}", err);
            SessionError::NotConnected(err.to_string())
        })?;

        info!("Wallet connected as {} on chain {}", connection.account, connection.chain_id);
        Ok(Self::with_connection(connection, wallet, chain, settings))
    }

    pub fn with_connection(
        connection: Connection,
        wallet: Arc<dyn Wallet>,
        chain: Arc<dyn ChainClient>,
        settings: SessionSettings,
    ) -> Self {
        let watcher = ConfirmationWatcher::new(
            chain.clone(),
            settings.poll_interval,
            settings.confirmation_timeout,
        );

        Self {
            connection,
            reader: ChainReader::new(chain, settings.value_unit),
            funds: FundsRequester::new(wallet.clone(), watcher.clone()),
            submitter: ProposalSubmitter::new(wallet, watcher),
            state: RwLock::new(SessionState::default()),
            observers: ObserverRegistry::new(),
            next_submission: AtomicU64::new(1),
        }
    }

    pub fn account(&self) -> Address {
        self.connection.account
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn status(&self) -> ProposalStatus {
        self.state.read().status.clone()
    }

    pub fn draft(&self) -> Option<CanonicalPayload> {
        self.state.read().draft.clone()
    }

    pub fn value(&self) -> Cached<ChainValue> {
        self.state.read().value.clone()
    }

    pub fn balance(&self) -> Cached<Balance> {
        self.state.read().balance.clone()
    }

    pub fn members(&self) -> Cached<BTreeSet<Address>> {
        self.state.read().members.clone()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.read();
        SessionSnapshot {
            account: self.connection.account,
            chain_id: self.connection.chain_id,
            status: state.status.clone(),
            draft: state.draft.clone(),
            value: state.value.clone(),
            balance: state.balance.clone(),
            members: state.members.clone(),
        }
    }

    pub fn subscribe(&self, observer: Arc<dyn SessionObserver>) {
        debug!("Observer `{}` subscribed", observer.name());
        self.observers.register(observer);
    }

    pub fn unsubscribe(&self, name: &str) -> bool {
        self.observers.unregister(name)
    }

    /// Validate and store a proposal draft, moving the status to `Building`.
    ///
    /// A rejected draft leaves status and any earlier draft untouched.
    pub fn draft_proposal(
        &self,
        variant: ProposalVariant,
        description: &str,
    ) -> Result<CanonicalPayload, SessionError> {
        let draft = ProposalDraft::new(variant, description);

        let payload = {
            let mut state = self.state.write();
            if state.status.is_in_flight() {
                return Err(SessionError::AlreadyInFlight);
            }

            let builder = match state.members.value() {
                Some(members) => ProposalBuilder::new().with_members(members),
                None => ProposalBuilder::new(),
            };
            let payload = builder.build(&draft).map_err(|err| {
                debug!("Draft rejected: {}", err);
                SessionError::from(err)
            })?;

            state.draft = Some(payload.clone());
            state.status = ProposalStatus::Building;
            payload
        };

        info!("Drafted {} proposal `{}`", payload.kind, payload.description);
        self.observers.notify_status(&ProposalStatus::Building);
        Ok(payload)
    }

    /// Submit the current draft and follow it to a terminal status.
    ///
    /// Dropping the future before the wallet answers ends the attempt as
    /// `Failed(Timeout)`. Dropping it while `Pending` leaves the proposal
    /// pending for [`reconcile_pending`](Self::reconcile_pending).
    pub async fn submit_draft(&self) -> Result<Confirmation, SessionError> {
        let submission = self.claim_draft()?;
        self.drive(submission).await
    }

    /// Like [`submit_draft`](Self::submit_draft), but the lifecycle runs as its
    /// own task so it completes and updates the session even if the caller
    /// stops waiting. The in-flight guard is checked before this returns.
    pub fn spawn_submission(
        self: &Arc<Self>,
    ) -> Result<JoinHandle<Result<Confirmation, SessionError>>, SessionError> {
        let submission = self.claim_draft()?;
        let owner = SpawnedSubmission {
            session: Arc::clone(self),
            id: submission.id,
        };
        Ok(tokio::spawn(async move { owner.session.drive(submission).await }))
    }

    /// Take the draft and move to `AwaitingSignature` in one step.
    fn claim_draft(&self) -> Result<Submission, SessionError> {
        let submission = {
            let mut state = self.state.write();
            if state.status.is_in_flight() {
                warn!("Submission refused: another proposal is {}", state.status);
                return Err(SessionError::AlreadyInFlight);
            }
            if state.status != ProposalStatus::Building {
                return Err(SessionError::NoDraft);
            }
            let payload = state.draft.take().ok_or(SessionError::NoDraft)?;

            let id = self.next_submission.fetch_add(1, Ordering::Relaxed);
            state.in_flight = Some(InFlight {
                id,
                payload: payload.clone(),
                tx: None,
            });
            state.status = ProposalStatus::AwaitingSignature;
            Submission { id, payload }
        };

        info!("Submitting {} proposal #{}", submission.payload.kind, submission.id);
        self.observers.notify_status(&ProposalStatus::AwaitingSignature);
        Ok(submission)
    }

    async fn drive(&self, submission: Submission) -> Result<Confirmation, SessionError> {
        let sink = SubmissionSink {
            session: self,
            id: submission.id,
        };
        self.submitter
            .submit(self.connection.account, &submission.payload, &sink)
            .await
            .map_err(SessionError::from)
    }

    /// Fail submission `id` as `Timeout` if it never got a transaction handle.
    /// Once `Pending`, an abandoned submission stays reconcilable instead.
    fn abandon_unsigned(&self, id: u64) {
        let unsigned = self
            .state
            .read()
            .in_flight
            .as_ref()
            .is_some_and(|f| f.id == id && f.tx.is_none());

        if unsigned {
            warn!("Submission #{} dropped before the wallet answered", id);
            self.apply_transition(id, ProposalStatus::Failed(SubmissionError::Timeout));
        }
    }

    fn apply_transition(&self, id: u64, next: ProposalStatus) {
        let members_changed = {
            let mut state = self.state.write();
            let live = state.in_flight.as_ref().map(|f| f.id) == Some(id);
            if !live || !state.status.can_transition_to(&next) {
                warn!(
                    "Ignoring transition {} -> {} from submission #{}",
                    state.status, next, id
                );
                return;
            }

            let mut members_changed = false;
            match &next {
                ProposalStatus::Pending(tx) => {
                    if let Some(in_flight) = state.in_flight.as_mut() {
                        in_flight.tx = Some(*tx);
                    }
                }
                ProposalStatus::Confirmed(confirmation) => {
                    state.in_flight = None;
                    members_changed =
                        apply_membership_change(&mut state.members, &confirmation.payload);
                }
                ProposalStatus::Failed(_) => state.in_flight = None,
                _ => {}
            }
            state.status = next.clone();
            members_changed.then(|| state.members.clone())
        };

        debug!("Submission #{} is now {}", id, next);
        self.observers.notify_status(&next);
        if let Some(members) = members_changed {
            self.observers.notify_members(&members);
        }
    }

    /// One-shot receipt check for a `Pending` proposal whose watcher gave up
    /// or whose task is gone. Returns the status after the check.
    pub async fn reconcile_pending(&self) -> Result<ProposalStatus, SessionError> {
        let pending = {
            let state = self.state.read();
            state
                .in_flight
                .as_ref()
                .and_then(|f| f.tx.map(|tx| (f.id, tx, f.payload.clone())))
        };

        let Some((id, tx, payload)) = pending else {
            return Ok(self.status());
        };

        match self.submitter.watcher().check(&tx).await {
            Ok(Some(Ok(receipt))) => {
                info!("Reconciled {}: confirmed in block {}", tx, receipt.block_number);
                let confirmation = Confirmation { receipt, payload };
                self.apply_transition(id, ProposalStatus::Confirmed(confirmation));
            }
            Ok(Some(Err(err))) => {
                info!("Reconciled {}: {}", tx, err);
                self.apply_transition(id, ProposalStatus::Failed(err.into()));
            }
            Ok(None) => debug!("{} is still pending", tx),
            Err(err) => {
                warn!("Could not reconcile {}: {}", tx, err);
                return Err(SessionError::ReadUnavailable {
                    reason: err.to_string(),
                    stale: true,
                });
            }
        }

        Ok(self.status())
    }

    /// Clear a draft or a finished proposal, returning to `Idle`.
    pub fn dismiss(&self) -> Result<(), SessionError> {
        {
            let mut state = self.state.write();
            if state.status.is_in_flight() {
                return Err(SessionError::AlreadyInFlight);
            }
            if state.status == ProposalStatus::Idle {
                return Ok(());
            }
            state.draft = None;
            state.status = ProposalStatus::Idle;
        }

        self.observers.notify_status(&ProposalStatus::Idle);
        Ok(())
    }

    pub async fn refresh_value(&self) -> Result<ChainValue, SessionError> {
        let result = self.reader.get_value().await;
        let (cached, outcome) = self.update_cache(result, |state| &mut state.value);
        self.observers.notify_value(&cached);
        outcome
    }

    pub async fn refresh_balance(&self) -> Result<Balance, SessionError> {
        let result = self.reader.get_balance(Some(&self.connection.account)).await;
        let (cached, outcome) = self.update_cache(result, |state| &mut state.balance);
        self.observers.notify_balance(&cached);
        outcome
    }

    pub async fn refresh_members(&self) -> Result<BTreeSet<Address>, SessionError> {
        let result = self
            .reader
            .get_members()
            .await
            .map(|members| members.into_iter().collect::<BTreeSet<_>>());
        let (cached, outcome) = self.update_cache(result, |state| &mut state.members);
        self.observers.notify_members(&cached);
        outcome
    }

    // Success replaces the cache; failure only records the error.
    fn update_cache<T: Clone>(
        &self,
        result: Result<T, ReadUnavailable>,
        select: impl FnOnce(&mut SessionState) -> &mut Cached<T>,
    ) -> (Cached<T>, Result<T, SessionError>) {
        let mut state = self.state.write();
        let cache = select(&mut *state);

        let outcome = match result {
            Ok(value) => {
                cache.store(value.clone());
                Ok(value)
            }
            Err(err) => {
                cache.last_error = Some(err.reason.clone());
                Err(SessionError::ReadUnavailable {
                    reason: err.reason,
                    stale: cache.is_loaded(),
                })
            }
        };

        (cache.clone(), outcome)
    }

    /// Ask the treasury to fund `account`. Independent of the proposal status.
    pub async fn request_funds(&self, account: &Address) -> Result<Receipt, SessionError> {
        info!("Requesting funds for {}", account);
        Ok(self.funds.request_funds(&self.connection.account, account).await?)
    }
}

fn apply_membership_change(
    members: &mut Cached<BTreeSet<Address>>,
    payload: &CanonicalPayload,
) -> bool {
    let (Some(set), Some(target)) = (members.value.as_mut(), payload.target()) else {
        return false;
    };

    match payload.kind {
        ProposalKind::AddMember => set.insert(target),
        ProposalKind::RemoveMember => set.remove(&target),
        _ => false,
    }
}
