use std::sync::Arc;

use log::{debug, warn};
use thiserror::Error;

use crate::chain::{Address, Balance, ChainClient, ChainValue};

/// A read could not be served; the caller keeps whatever it had before.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("read unavailable: {reason}")]
pub struct ReadUnavailable {
    pub reason: String,
}

impl ReadUnavailable {
    fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

/// Read-only queries against DAO contract state.
#[derive(Clone)]
pub struct ChainReader {
    chain: Arc<dyn ChainClient>,
    value_unit: String,
}

impl ChainReader {
    pub fn new(chain: Arc<dyn ChainClient>, value_unit: impl Into<String>) -> Self {
        Self {
            chain,
            value_unit: value_unit.into(),
        }
    }

    pub async fn get_value(&self) -> Result<ChainValue, ReadUnavailable> {
        let raw = self.chain.stored_value().await.map_err(|err| {
            warn!("Stored value read failed: {}", err);
            ReadUnavailable::new(err.to_string())
        })?;

        debug!("Stored value is {}", raw);
        Ok(ChainValue {
            raw,
            display_unit: self.value_unit.clone(),
        })
    }

    /// Balance of `owner`. An unset owner fails the same way an unreachable
    /// endpoint does, without touching the network.
    pub async fn get_balance(&self, owner: Option<&Address>) -> Result<Balance, ReadUnavailable> {
        let owner = owner.ok_or_else(|| ReadUnavailable::new("no account connected"))?;

        let amount = self.chain.balance_of(owner).await.map_err(|err| {
            warn!("Balance read for {} failed: {}", owner, err);
            ReadUnavailable::new(err.to_string())
        })?;

        Ok(Balance {
            owner: *owner,
            amount,
        })
    }

    pub async fn get_members(&self) -> Result<Vec<Address>, ReadUnavailable> {
        self.chain.members().await.map_err(|err| {
            warn!("Member list read failed: {}", err);
            ReadUnavailable::new(err.to_string())
        })
    }
}
