// Configuration module for the dashboard
// Layers built-in defaults, an optional TOML file and DAOHUB__* environment variables

pub mod validation;

use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File};
use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::governance::SessionSettings;

pub use validation::{ConfigValidationError, ConfigValidator, ValidationResult};

/// File looked up in the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "daohub.toml";

/// Prefix of overriding environment variables, e.g. `DAOHUB__CHAIN__RPC_URL`
pub const ENV_PREFIX: &str = "DAOHUB";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration:\n{0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainSettings {
    pub rpc_url: String,
    pub request_timeout_secs: u64,
    /// Base URL used to link pending transactions
    pub explorer_url: String,
}

impl Default for ChainSettings {
    fn default() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:8545".to_string(),
            request_timeout_secs: 15,
            explorer_url: "https://etherscan.io".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletSettings {
    pub rpc_url: String,
    /// Deadline for a signature request, which includes the user deciding.
    /// 0 waits for the wallet indefinitely.
    pub sign_timeout_secs: u64,
}

impl Default for WalletSettings {
    fn default() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:8546".to_string(),
            sign_timeout_secs: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfirmationSettings {
    pub poll_interval_ms: u64,
    /// 0 disables the client-side deadline
    pub timeout_secs: u64,
}

impl Default for ConfirmationSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            timeout_secs: 300,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    pub value_unit: String,
    pub balance_unit: String,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            value_unit: "units".to_string(),
            balance_unit: "DAO".to_string(),
        }
    }
}

/// Complete dashboard configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub chain: ChainSettings,
    pub wallet: WalletSettings,
    pub confirmation: ConfirmationSettings,
    pub display: DisplaySettings,
    pub log_level: String,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            chain: ChainSettings::default(),
            wallet: WalletSettings::default(),
            confirmation: ConfirmationSettings::default(),
            display: DisplaySettings::default(),
            log_level: "info".to_string(),
        }
    }
}

impl DashboardConfig {
    /// Load defaults, then `path` (required) or `daohub.toml` (optional), then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let config = Config::builder()
            .add_source(Config::try_from(&DashboardConfig::default())?)
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        let loaded: DashboardConfig = config.try_deserialize()?;
        debug!("Loaded configuration: {:?}", loaded);
        Ok(loaded)
    }

    /// Load and reject configurations with validation errors.
    pub fn load_validated(path: Option<&Path>) -> Result<(Self, ValidationResult), ConfigError> {
        let config = Self::load(path)?;
        let result = ConfigValidator::new().validate(&config);
        if !result.is_valid {
            return Err(ConfigError::Invalid(result.get_summary()));
        }
        Ok((config, result))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.chain.request_timeout_secs)
    }

    /// Round-trip limit for wallet calls, `None` when disabled.
    pub fn sign_timeout(&self) -> Option<Duration> {
        match self.wallet.sign_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            poll_interval: Duration::from_millis(self.confirmation.poll_interval_ms),
            confirmation_timeout: match self.confirmation.timeout_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
            value_unit: self.display.value_unit.clone(),
        }
    }
}
