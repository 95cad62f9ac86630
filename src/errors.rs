use thiserror::Error;

use crate::chain::HexIdError;
use crate::config::ConfigError;
use crate::dashboard::RouteError;
use crate::governance::SessionError;

/// Top-level error for the dashboard front-end
#[derive(Debug, Error)]
pub enum DaoError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Session(#[from] SessionError),

    #[error("Routing error: {0}")]
    Route(#[from] RouteError),

    #[error("Invalid address `{input}`: {source}")]
    Address { input: String, source: HexIdError },

    #[error("Transport setup failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DaoError {
    pub fn address(input: &str, source: HexIdError) -> Self {
        DaoError::Address {
            input: input.to_string(),
            source,
        }
    }
}
