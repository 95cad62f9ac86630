pub mod chain;
pub mod config;
pub mod dashboard;
pub mod errors;
pub mod governance;
pub mod utils;

// Re-export commonly used items
pub use chain::{Address, Balance, ChainClient, ChainValue, Receipt, TxHandle, Wallet};
pub use config::DashboardConfig;
pub use dashboard::{Dashboard, PageContext, Route};
pub use errors::DaoError;
pub use governance::{
    GovernanceSession, ProposalDraft, ProposalStatus, ProposalVariant, SessionError,
    SessionObserver,
};
