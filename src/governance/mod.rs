// Governance proposal orchestration
// Drafting, validation, submission and the per-connection session state

pub mod builder;
pub mod observer;
pub mod proposal;
pub mod session;
pub mod submitter;

pub use builder::{InvalidReason, ProposalBuilder, ProposalError};
pub use observer::{ObserverRegistry, SessionObserver};
pub use proposal::{CanonicalPayload, ContractCall, ProposalDraft, ProposalKind, ProposalVariant};
pub use session::{Cached, GovernanceSession, SessionError, SessionSettings, SessionSnapshot};
pub use submitter::{Confirmation, ProposalStatus, ProposalSubmitter, StatusSink, SubmissionError};
