use std::collections::BTreeMap;
use std::net::IpAddr;

use log::{debug, error};
use thiserror::Error;

use crate::config::DashboardConfig;

/// Error type for configuration validation issues
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigValidationError {
    #[error("Missing required setting: {0}")]
    MissingRequiredSetting(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    #[error("Incompatible settings: {0}")]
    IncompatibleSettings(String),
}

/// Result of configuration validation
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Whether the validation passed
    pub is_valid: bool,

    /// List of errors found during validation
    pub errors: Vec<ConfigValidationError>,

    /// List of warnings (valid but not recommended)
    pub warnings: Vec<String>,

    /// Suggested fixes keyed by setting path
    pub suggested_fixes: BTreeMap<String, String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            is_valid: true,
            ..Default::default()
        }
    }

    pub fn add_error(&mut self, error: ConfigValidationError) {
        self.is_valid = false;
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }

    pub fn add_suggested_fix(&mut self, setting: &str, suggestion: String) {
        self.suggested_fixes.insert(setting.to_string(), suggestion);
    }

    /// Return a summary of validation issues
    pub fn get_summary(&self) -> String {
        if self.is_valid && self.warnings.is_empty() {
            return "Configuration is valid with no warnings.".to_string();
        }

        let mut result = String::new();

        if !self.is_valid {
            result.push_str(&format!("Configuration has {} errors:\n", self.errors.len()));
            for (i, error) in self.errors.iter().enumerate() {
                result.push_str(&format!("  {}. {}\n", i + 1, error));
            }
        } else {
            result.push_str("Configuration is valid but has warnings.\n");
        }

        if !self.warnings.is_empty() {
            result.push_str(&format!("\nWarnings ({}):\n", self.warnings.len()));
            for (i, warning) in self.warnings.iter().enumerate() {
                result.push_str(&format!("  {}. {}\n", i + 1, warning));
            }
        }

        if !self.suggested_fixes.is_empty() {
            result.push_str("\nSuggested fixes:\n");
            for (setting, suggestion) in &self.suggested_fixes {
                result.push_str(&format!("  - {}: {}\n", setting, suggestion));
            }
        }

        result
    }
}

/// Configuration validation rule
pub trait ValidationRule {
    fn name(&self) -> &str;

    fn validate(&self, config: &DashboardConfig) -> Result<(), ConfigValidationError>;

    /// Setting path and suggestion to show when the rule fails
    fn suggest_fix(&self, config: &DashboardConfig) -> Option<(String, String)>;
}

/// Applies the dashboard's validation rules
pub struct ConfigValidator {
    rules: Vec<Box<dyn ValidationRule>>,
}

impl Default for ConfigValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigValidator {
    /// Create a validator with the default rules
    pub fn new() -> Self {
        let mut validator = Self { rules: Vec::new() };

        validator.add_rule(Box::new(EndpointRule {
            setting: "chain.rpc_url",
            pick: |c| &c.chain.rpc_url,
        }));
        validator.add_rule(Box::new(EndpointRule {
            setting: "wallet.rpc_url",
            pick: |c| &c.wallet.rpc_url,
        }));
        validator.add_rule(Box::new(PollIntervalRule));
        validator.add_rule(Box::new(ConfirmationDeadlineRule));

        validator
    }

    pub fn add_rule(&mut self, rule: Box<dyn ValidationRule>) {
        self.rules.push(rule);
    }

    pub fn rules(&self) -> &[Box<dyn ValidationRule>] {
        &self.rules
    }

    pub fn validate(&self, config: &DashboardConfig) -> ValidationResult {
        let mut result = ValidationResult::new();

        for rule in &self.rules {
            match rule.validate(config) {
                Ok(()) => debug!("Validation rule '{}' passed", rule.name()),
                Err(err) => {
                    error!("Validation rule '{}' failed: {}", rule.name(), err);
                    result.add_error(err);

                    if let Some((setting, suggestion)) = rule.suggest_fix(config) {
                        result.add_suggested_fix(&setting, suggestion);
                    }
                }
            }
        }

        let endpoints = [
            ("chain.rpc_url", &config.chain.rpc_url),
            ("wallet.rpc_url", &config.wallet.rpc_url),
        ];
        for (setting, url) in endpoints {
            if url.starts_with("http://") && !is_loopback(url) {
                result.add_warning(format!("{} uses plain HTTP to a remote host", setting));
            }
        }

        if config.confirmation.timeout_secs == 0 {
            result.add_warning(
                "confirmation.timeout_secs is 0: proposals wait for a receipt indefinitely"
                    .to_string(),
            );
        }

        result
    }
}

fn is_loopback(url: &str) -> bool {
    let Ok(parsed) = reqwest::Url::parse(url) else {
        return false;
    };

    match parsed.host_str() {
        Some("localhost") => true,
        Some(host) => host
            .trim_start_matches('[')
            .trim_end_matches(']')
            .parse::<IpAddr>()
            .is_ok_and(|ip| ip.is_loopback()),
        None => false,
    }
}

/// Endpoint URLs must be present and HTTP(S)
struct EndpointRule {
    setting: &'static str,
    pick: fn(&DashboardConfig) -> &String,
}

impl ValidationRule for EndpointRule {
    fn name(&self) -> &str {
        "Endpoint"
    }

    fn validate(&self, config: &DashboardConfig) -> Result<(), ConfigValidationError> {
        let url = (self.pick)(config).trim();
        if url.is_empty() {
            return Err(ConfigValidationError::MissingRequiredSetting(self.setting.to_string()));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigValidationError::InvalidValue(format!(
                "{} must be an http(s) URL, got `{}`",
                self.setting, url
            )));
        }
        Ok(())
    }

    fn suggest_fix(&self, _config: &DashboardConfig) -> Option<(String, String)> {
        Some((
            self.setting.to_string(),
            "Point this at a JSON-RPC endpoint, e.g. http://127.0.0.1:8545".to_string(),
        ))
    }
}

struct PollIntervalRule;

impl ValidationRule for PollIntervalRule {
    fn name(&self) -> &str {
        "PollInterval"
    }

    fn validate(&self, config: &DashboardConfig) -> Result<(), ConfigValidationError> {
        if config.confirmation.poll_interval_ms == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "confirmation.poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    fn suggest_fix(&self, _config: &DashboardConfig) -> Option<(String, String)> {
        Some(("confirmation.poll_interval_ms".to_string(), "Use 1000 or more".to_string()))
    }
}

/// A deadline shorter than one poll would time out before the first check
struct ConfirmationDeadlineRule;

impl ValidationRule for ConfirmationDeadlineRule {
    fn name(&self) -> &str {
        "ConfirmationDeadline"
    }

    fn validate(&self, config: &DashboardConfig) -> Result<(), ConfigValidationError> {
        let timeout_ms = config.confirmation.timeout_secs.saturating_mul(1000);
        if timeout_ms != 0 && timeout_ms < config.confirmation.poll_interval_ms {
            return Err(ConfigValidationError::IncompatibleSettings(format!(
                "confirmation.timeout_secs ({}s) is shorter than one poll interval ({}ms)",
                config.confirmation.timeout_secs, config.confirmation.poll_interval_ms
            )));
        }
        Ok(())
    }

    fn suggest_fix(&self, config: &DashboardConfig) -> Option<(String, String)> {
        Some((
            "confirmation.timeout_secs".to_string(),
            format!(
                "Raise to at least {}",
                config.confirmation.poll_interval_ms.div_ceil(1000)
            ),
        ))
    }
}
