//! Advisory checks on a configuration that already passed `validate()`

use crate::{
    error::Result,
    models::HarnessConfig,
    types::ProvisionMode,
};
use std::net::IpAddr;

/// Configuration validator producing non-fatal warnings
pub struct ConfigValidator;

impl ConfigValidator {
    /// Run the hard checks, then collect advisory warnings
    pub fn validate_comprehensive(config: &HarnessConfig) -> Result<Vec<ValidationWarning>> {
        let mut warnings = Vec::new();

        config.validate()?;

        warnings.extend(Self::check_credentials(config));
        warnings.extend(Self::check_vault_transport(config));
        warnings.extend(Self::check_probe_settings(config));

        Ok(warnings)
    }

    fn check_credentials(config: &HarnessConfig) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();

        if !is_local_host(&config.redis_host) && config.redis_password == crate::defaults::DEFAULT_REDIS_PASSWORD {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                format!("Redis host '{}' is not local but the fixture password is in use", config.redis_host),
            ));
        }

        let vault_host = url::Url::parse(&config.vault_addr)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string));
        if let Some(host) = vault_host {
            if !is_local_host(&host) && config.vault_token == crate::defaults::DEFAULT_VAULT_TOKEN {
                warnings.push(ValidationWarning::new(
                    ValidationLevel::Warning,
                    format!("Vault host '{}' is not local but the dev root token is in use", host),
                ));
            }
        }

        warnings
    }

    fn check_vault_transport(config: &HarnessConfig) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();

        if let Ok(parsed) = url::Url::parse(&config.vault_addr) {
            let local = parsed.host_str().map(is_local_host).unwrap_or(false);
            if parsed.scheme() == "http" && !local {
                warnings.push(ValidationWarning::new(
                    ValidationLevel::Warning,
                    format!("Vault address '{}' uses plain HTTP to a remote host", config.vault_addr),
                ));
            }
        }

        warnings
    }

    fn check_probe_settings(config: &HarnessConfig) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();

        if config.iteration_scale < 1.0 {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                format!(
                    "Iteration scale {} reduces sample counts; thresholds are unchanged",
                    config.iteration_scale
                ),
            ));
        }

        if !config.manifest_dir.is_dir() {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                format!("Manifest directory '{}' does not exist", config.manifest_dir.display()),
            ));
        }

        if config.provision_mode == ProvisionMode::Containers && !is_local_host(&config.redis_host) {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                "Container provisioning ignores the configured Redis host and Vault address".to_string(),
            ));
        }

        warnings
    }
}

fn is_local_host(host: &str) -> bool {
    if host.eq_ignore_ascii_case("localhost") {
        return true;
    }

    host.trim_matches(|c| c == '[' || c == ']')
        .parse::<IpAddr>()
        .map(|ip| ip.is_loopback())
        .unwrap_or(false)
}

/// Severity of a validation message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationLevel {
    Info,
    Warning,
}

impl ValidationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationLevel::Info => "INFO",
            ValidationLevel::Warning => "WARN",
        }
    }
}

/// A non-fatal configuration finding
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub level: ValidationLevel,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(level: ValidationLevel, message: String) -> Self {
        Self { level, message }
    }

    /// Format warning for display
    pub fn format(&self, use_color: bool) -> String {
        if use_color {
            use colored::Colorize;
            let tag = match self.level {
                ValidationLevel::Info => self.level.as_str().cyan(),
                ValidationLevel::Warning => self.level.as_str().yellow(),
            };
            format!("[{}] {}", tag, self.message)
        } else {
            format!("[{}] {}", self.level.as_str(), self.message)
        }
    }
}

/// Convenience wrapper around [`ConfigValidator::validate_comprehensive`]
pub fn validate_config(config: &HarnessConfig) -> Result<Vec<ValidationWarning>> {
    ConfigValidator::validate_comprehensive(config)
}
