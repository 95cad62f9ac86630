//! Chain and wallet collaborators.
//!
//! Everything that talks to the outside world sits behind the two traits in
//! this module: [`ChainClient`] for contract reads and receipt lookups, and
//! [`Wallet`] for connecting an account and signing state-changing calls.
//! The rest of the crate only ever holds them as `Arc<dyn ...>`.

pub mod confirmation;
pub mod funds;
pub mod reader;
pub mod rpc;
pub mod types;

use async_trait::async_trait;
use thiserror::Error;

pub use confirmation::{ConfirmationError, ConfirmationWatcher};
pub use funds::{FundsError, FundsRequester};
pub use reader::{ChainReader, ReadUnavailable};
pub use rpc::{JsonRpcChain, JsonRpcTransport, RpcWallet};
pub use types::{
    Address, Balance, CallArg, ChainValue, Connection, HexIdError, Receipt, ReceiptStatus,
    TxHandle, TxRequest,
};

/// Failures talking to the chain endpoint
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("chain endpoint unreachable: {0}")]
    Unreachable(String),

    #[error("chain RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("malformed chain response: {0}")]
    Decode(String),
}

/// Failures reported by the wallet
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalletError {
    #[error("request rejected by the user")]
    Rejected,

    #[error("wallet disconnected")]
    Disconnected,

    #[error("execution reverted: {0}")]
    Reverted(String),

    #[error("transaction refused: {0}")]
    Refused(String),

    #[error("wallet unreachable: {0}")]
    Transport(String),
}

/// Read side of the chain, plus receipt lookups for broadcast transactions.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Current value held by the governed box contract.
    async fn stored_value(&self) -> Result<u128, ChainError>;

    /// Governance token balance of `owner`.
    async fn balance_of(&self, owner: &Address) -> Result<u128, ChainError>;

    /// Current DAO member set.
    async fn members(&self) -> Result<Vec<Address>, ChainError>;

    /// Receipt of `tx`, or `None` while it is not yet mined.
    async fn receipt(&self, tx: &TxHandle) -> Result<Option<Receipt>, ChainError>;
}

/// External signer bound to one account.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Wallet: Send + Sync {
    async fn connect(&self) -> Result<Connection, WalletError>;

    /// Sign `request` and broadcast it. Returns as soon as the node accepted it.
    async fn sign_and_send(&self, request: TxRequest) -> Result<TxHandle, WalletError>;
}
