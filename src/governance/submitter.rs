use std::fmt;
use std::sync::Arc;

use log::{info, warn};
use thiserror::Error;

use crate::chain::{
    Address, ConfirmationError, ConfirmationWatcher, Receipt, TxHandle, Wallet, WalletError,
};
use crate::governance::proposal::CanonicalPayload;

/// Classified reason a submission ended in `Failed`. None are retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmissionError {
    #[error("signature rejected by the user")]
    UserRejected,

    #[error("chain reverted the proposal: {reason}")]
    ChainReverted { reason: String },

    #[error("timed out waiting for the chain")]
    Timeout,
}

impl From<WalletError> for SubmissionError {
    fn from(err: WalletError) -> Self {
        match err {
            WalletError::Rejected => SubmissionError::UserRejected,
            // Losing the wallet mid-flight leaves the outcome unknown.
            WalletError::Disconnected | WalletError::Transport(_) => SubmissionError::Timeout,
            WalletError::Reverted(reason) | WalletError::Refused(reason) => {
                SubmissionError::ChainReverted { reason }
            }
        }
    }
}

impl From<ConfirmationError> for SubmissionError {
    fn from(err: ConfirmationError) -> Self {
        match err {
            ConfirmationError::Reverted { reason } => SubmissionError::ChainReverted { reason },
            ConfirmationError::Timeout => SubmissionError::Timeout,
        }
    }
}

/// A mined proposal together with what was proposed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub receipt: Receipt,
    pub payload: CanonicalPayload,
}

/// Lifecycle of the one live proposal of a session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ProposalStatus {
    #[default]
    Idle,
    Building,
    AwaitingSignature,
    Pending(TxHandle),
    Confirmed(Confirmation),
    Failed(SubmissionError),
}

impl ProposalStatus {
    /// Signature requested or transaction broadcast; nothing new may start.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, ProposalStatus::AwaitingSignature | ProposalStatus::Pending(_))
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ProposalStatus::Confirmed(_) | ProposalStatus::Failed(_))
    }

    pub fn tx_handle(&self) -> Option<&TxHandle> {
        match self {
            ProposalStatus::Pending(tx) => Some(tx),
            ProposalStatus::Confirmed(confirmation) => Some(&confirmation.receipt.tx),
            _ => None,
        }
    }

    /// Whether `next` may directly follow `self`.
    ///
    /// Transitions only move forward: Building, AwaitingSignature, Pending,
    /// then a terminal state. The exceptions are a wallet rejection ending the
    /// attempt straight from AwaitingSignature, and drafting or dismissing from
    /// any state that is not in flight.
    pub fn can_transition_to(&self, next: &ProposalStatus) -> bool {
        use ProposalStatus::*;

        match (self, next) {
            (AwaitingSignature | Pending(_), Idle | Building) => false,
            (_, Idle | Building) => true,
            (Building, AwaitingSignature) => true,
            (AwaitingSignature, Pending(_)) => true,
            (AwaitingSignature, Failed(_)) => true,
            (Pending(_), Confirmed(_) | Failed(_)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProposalStatus::Idle => write!(f, "idle"),
            ProposalStatus::Building => write!(f, "draft ready"),
            ProposalStatus::AwaitingSignature => write!(f, "awaiting wallet signature"),
            ProposalStatus::Pending(tx) => write!(f, "pending ({})", tx),
            ProposalStatus::Confirmed(c) => {
                write!(f, "confirmed in block {}", c.receipt.block_number)
            }
            ProposalStatus::Failed(err) => write!(f, "failed: {}", err),
        }
    }
}

/// Receives the transitions a submission goes through.
pub trait StatusSink: Send + Sync {
    fn transition(&self, next: ProposalStatus);
}

/// Sends canonical payloads through the wallet and follows them to a receipt.
///
/// The caller has already moved the status to `AwaitingSignature`; from there
/// the submitter reports `Pending` once the wallet has broadcast, then exactly
/// one terminal status.
#[derive(Clone)]
pub struct ProposalSubmitter {
    wallet: Arc<dyn Wallet>,
    watcher: ConfirmationWatcher,
}

impl ProposalSubmitter {
    pub fn new(wallet: Arc<dyn Wallet>, watcher: ConfirmationWatcher) -> Self {
        Self { wallet, watcher }
    }

    pub fn watcher(&self) -> &ConfirmationWatcher {
        &self.watcher
    }

    pub async fn submit(
        &self,
        from: Address,
        payload: &CanonicalPayload,
        sink: &dyn StatusSink,
    ) -> Result<Confirmation, SubmissionError> {
        let tx = match self.wallet.sign_and_send(payload.to_tx_request(from)).await {
            Ok(tx) => tx,
            Err(err) => {
                let err = SubmissionError::from(err);
                warn!("{} proposal not broadcast: {}", payload.kind, err);
                sink.transition(ProposalStatus::Failed(err.clone()));
                return Err(err);
            }
        };

        info!("{} proposal broadcast as {}", payload.kind, tx);
        sink.transition(ProposalStatus::Pending(tx));

        match self.watcher.wait(&tx).await {
            Ok(receipt) => {
                info!(
                    "{} proposal {} confirmed in block {}",
                    payload.kind, tx, receipt.block_number
                );
                let confirmation = Confirmation {
                    receipt,
                    payload: payload.clone(),
                };
                sink.transition(ProposalStatus::Confirmed(confirmation.clone()));
                Ok(confirmation)
            }
            Err(err) => {
                let err = SubmissionError::from(err);
                warn!("{} proposal {} failed: {}", payload.kind, tx, err);
                sink.transition(ProposalStatus::Failed(err.clone()));
                Err(err)
            }
        }
    }
}
