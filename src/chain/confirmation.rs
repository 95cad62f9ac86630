use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use thiserror::Error;

use crate::chain::{ChainClient, ChainError, Receipt, TxHandle};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfirmationError {
    #[error("transaction reverted: {reason}")]
    Reverted { reason: String },

    #[error("no receipt before the confirmation deadline")]
    Timeout,
}

/// Waits for broadcast transactions to be mined by polling for their receipt.
#[derive(Clone)]
pub struct ConfirmationWatcher {
    chain: Arc<dyn ChainClient>,
    poll_interval: Duration,
    /// `None` waits until a receipt shows up.
    timeout: Option<Duration>,
}

impl ConfirmationWatcher {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        poll_interval: Duration,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            chain,
            poll_interval,
            timeout,
        }
    }

    /// Poll until `tx` has a receipt. Lookup errors are treated as transient and
    /// polling continues; only the deadline ends the wait early.
    pub async fn wait(&self, tx: &TxHandle) -> Result<Receipt, ConfirmationError> {
        let poll = async {
            loop {
                match self.chain.receipt(tx).await {
                    Ok(Some(receipt)) => return receipt,
                    Ok(None) => debug!("No receipt yet for {}", tx),
                    Err(err) => warn!("Receipt lookup for {} failed: {}", tx, err),
                }
                tokio::time::sleep(self.poll_interval).await;
            }
        };

        let receipt = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, poll)
                .await
                .map_err(|_| ConfirmationError::Timeout)?,
            None => poll.await,
        };

        Self::settle(receipt)
    }

    /// Single receipt lookup, for manual reconciliation.
    pub async fn check(
        &self,
        tx: &TxHandle,
    ) -> Result<Option<Result<Receipt, ConfirmationError>>, ChainError> {
        Ok(self.chain.receipt(tx).await?.map(Self::settle))
    }

    fn settle(receipt: Receipt) -> Result<Receipt, ConfirmationError> {
        if receipt.succeeded() {
            Ok(receipt)
        } else {
            Err(ConfirmationError::Reverted {
                reason: receipt
                    .revert_reason
                    .unwrap_or_else(|| "no reason given".to_string()),
            })
        }
    }
}
