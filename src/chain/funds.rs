use std::sync::Arc;

use log::{info, warn};
use thiserror::Error;

use crate::chain::{Address, CallArg, ConfirmationWatcher, Receipt, TxRequest, Wallet, WalletError};

const REQUEST_FUNDS_METHOD: &str = "requestFunds";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FundsError {
    #[error("fund request rejected in the wallet")]
    RequestRejected,

    #[error("fund request failed: {0}")]
    RequestFailed(String),
}

/// Asks the treasury to release funds to an account.
///
/// Never retries: a rejection is the user's decision and a failure is
/// reported as-is.
#[derive(Clone)]
pub struct FundsRequester {
    wallet: Arc<dyn Wallet>,
    watcher: ConfirmationWatcher,
}

impl FundsRequester {
    pub fn new(wallet: Arc<dyn Wallet>, watcher: ConfirmationWatcher) -> Self {
        Self { wallet, watcher }
    }

    pub async fn request_funds(
        &self,
        from: &Address,
        account: &Address,
    ) -> Result<Receipt, FundsError> {
        let request = TxRequest {
            from: *from,
            method: REQUEST_FUNDS_METHOD.to_string(),
            args: vec![CallArg::Address(*account)],
            value: 0,
        };

        let tx = self.wallet.sign_and_send(request).await.map_err(|err| match err {
            WalletError::Rejected => {
                info!("Fund request for {} rejected in the wallet", account);
                FundsError::RequestRejected
            }
            other => {
                warn!("Fund request for {} could not be sent: {}", account, other);
                FundsError::RequestFailed(other.to_string())
            }
        })?;

        info!("Fund request for {} broadcast as {}", account, tx);

        let receipt = self.watcher.wait(&tx).await.map_err(|err| {
            warn!("Fund request {} failed: {}", tx, err);
            FundsError::RequestFailed(err.to_string())
        })?;

        info!("Fund request {} confirmed in block {}", tx, receipt.block_number);
        Ok(receipt)
    }
}
