//! Error handling for the probe harness

use crate::types::ServiceKind;
use std::time::Duration;
use thiserror::Error;

/// Error types raised by the harness.
///
/// Readiness timeouts (and provisioning or configuration failures, which
/// happen before any probe runs) abort a run. `NotFound` is tolerated during
/// teardown. Everything else fails the probe that raised it and lets the
/// remaining probes run.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A service did not become reachable within the wait window
    #[error("Readiness timeout: {service} not ready after {:.1}s ({last_error})", .waited.as_secs_f64())]
    ReadinessTimeout {
        service: ServiceKind,
        waited: Duration,
        last_error: String,
    },

    /// Cache client errors
    #[error("Cache error: {0}")]
    Cache(String),

    /// Secrets client errors
    #[error("Secrets error: {0}")]
    Secrets(String),

    /// A secret or key that was expected to exist does not
    #[error("Not found: {0}")]
    NotFound(String),

    /// A manifest is missing a key the check needs
    #[error("Manifest error: {path} has no '{key}'")]
    Manifest { path: String, key: String },

    /// A probe observed a value other than the expected one
    #[error("Assertion failed: {0}")]
    Assertion(String),

    /// Container start/stop errors
    #[error("Provisioning error: {0}")]
    Provision(String),

    /// I/O errors (file operations, etc.)
    #[error("I/O error: {0}")]
    Io(String),

    /// Parsing errors (URLs, YAML, JSON, etc.)
    #[error("Parsing error: {0}")]
    Parse(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    /// Create a new readiness timeout error
    pub fn readiness_timeout<S: Into<String>>(service: ServiceKind, waited: Duration, last_error: S) -> Self {
        Self::ReadinessTimeout {
            service,
            waited,
            last_error: last_error.into(),
        }
    }

    /// Create a new cache error
    pub fn cache<S: Into<String>>(message: S) -> Self {
        Self::Cache(message.into())
    }

    /// Create a new secrets error
    pub fn secrets<S: Into<String>>(message: S) -> Self {
        Self::Secrets(message.into())
    }

    /// Create a new not-found error
    pub fn not_found<S: Into<String>>(message: S) -> Self {
        Self::NotFound(message.into())
    }

    /// Create a new manifest structure error
    pub fn manifest<P: Into<String>, K: Into<String>>(path: P, key: K) -> Self {
        Self::Manifest {
            path: path.into(),
            key: key.into(),
        }
    }

    /// Create a new assertion failure
    pub fn assertion<S: Into<String>>(message: S) -> Self {
        Self::Assertion(message.into())
    }

    /// Create a new provisioning error
    pub fn provision<S: Into<String>>(message: S) -> Self {
        Self::Provision(message.into())
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io(message.into())
    }

    /// Create a new parsing error
    pub fn parse<S: Into<String>>(message: S) -> Self {
        Self::Parse(message.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal(message.into())
    }

    /// Get error category for logging and reporting
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG",
            Self::ReadinessTimeout { .. } => "READINESS",
            Self::Cache(_) => "CACHE",
            Self::Secrets(_) => "SECRETS",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Manifest { .. } => "MANIFEST",
            Self::Assertion(_) => "ASSERTION",
            Self::Provision(_) => "PROVISION",
            Self::Io(_) => "IO",
            Self::Parse(_) => "PARSE",
            Self::Internal(_) => "INTERNAL",
        }
    }

    /// Whether this error aborts the whole run rather than a single probe
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ReadinessTimeout { .. } | Self::Provision(_) | Self::Config(_))
    }

    /// Whether teardown may ignore this error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Get exit code for this error type
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Parse(_) => 1,
            Self::ReadinessTimeout { .. } | Self::Provision(_) => 2,
            Self::Cache(_) | Self::Secrets(_) | Self::NotFound(_) => 3,
            Self::Manifest { .. } | Self::Io(_) => 5,
            Self::Assertion(_) => 6,
            Self::Internal(_) => 99,
        }
    }

    /// Prefix the error message with context, keeping the category
    pub fn context<S: AsRef<str>>(self, context: S) -> Self {
        let ctx = context.as_ref();
        match self {
            Self::Config(m) => Self::Config(format!("{}: {}", ctx, m)),
            Self::Cache(m) => Self::Cache(format!("{}: {}", ctx, m)),
            Self::Secrets(m) => Self::Secrets(format!("{}: {}", ctx, m)),
            Self::NotFound(m) => Self::NotFound(format!("{}: {}", ctx, m)),
            Self::Assertion(m) => Self::Assertion(format!("{}: {}", ctx, m)),
            Self::Provision(m) => Self::Provision(format!("{}: {}", ctx, m)),
            Self::Io(m) => Self::Io(format!("{}: {}", ctx, m)),
            Self::Parse(m) => Self::Parse(format!("{}: {}", ctx, m)),
            Self::Internal(m) => Self::Internal(format!("{}: {}", ctx, m)),
            structured @ (Self::ReadinessTimeout { .. } | Self::Manifest { .. }) => structured,
        }
    }

    /// Format error for console display with color coding
    pub fn format_for_console(&self, use_color: bool) -> String {
        let category = self.category();
        let message = self.to_string();

        if use_color {
            use colored::Colorize;
            match self {
                Self::Config(_) | Self::Parse(_) | Self::Manifest { .. } => {
                    format!("[{}] {}", category.red().bold(), message.red())
                }
                Self::Cache(_) | Self::Secrets(_) | Self::NotFound(_) => {
                    format!("[{}] {}", category.yellow().bold(), message.yellow())
                }
                Self::ReadinessTimeout { .. } | Self::Provision(_) => {
                    format!("[{}] {}", category.blue().bold(), message.blue())
                }
                Self::Assertion(_) => {
                    format!("[{}] {}", category.magenta().bold(), message.magenta())
                }
                Self::Io(_) => {
                    format!("[{}] {}", category.cyan().bold(), message.cyan())
                }
                Self::Internal(_) => {
                    format!("[{}] {}", category.bright_red().bold(), message.bright_red())
                }
            }
        } else {
            format!("[{}] {}", category, message)
        }
    }
}

// Standard library error conversions
impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::io(error.to_string())
    }
}

impl From<url::ParseError> for AppError {
    fn from(error: url::ParseError) -> Self {
        Self::parse(format!("URL parse error: {}", error))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        Self::parse(format!("JSON parse error: {}", error))
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(error: serde_yaml::Error) -> Self {
        Self::parse(format!("YAML parse error: {}", error))
    }
}

impl From<redis::RedisError> for AppError {
    fn from(error: redis::RedisError) -> Self {
        Self::cache(error.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::secrets(format!("request timed out: {}", error))
        } else {
            Self::secrets(error.to_string())
        }
    }
}

impl From<testcontainers::TestcontainersError> for AppError {
    fn from(error: testcontainers::TestcontainersError) -> Self {
        Self::provision(error.to_string())
    }
}

impl From<dotenv::Error> for AppError {
    fn from(error: dotenv::Error) -> Self {
        Self::config(format!("Environment file error: {}", error))
    }
}

impl From<std::num::ParseIntError> for AppError {
    fn from(error: std::num::ParseIntError) -> Self {
        Self::parse(format!("Integer parse error: {}", error))
    }
}

impl From<std::num::ParseFloatError> for AppError {
    fn from(error: std::num::ParseFloatError) -> Self {
        Self::parse(format!("Float parse error: {}", error))
    }
}

impl From<std::str::ParseBoolError> for AppError {
    fn from(error: std::str::ParseBoolError) -> Self {
        Self::parse(format!("Boolean parse error: {}", error))
    }
}

// Anyhow integration
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::internal(error.to_string())
    }
}

/// Custom Result type for the harness
pub type Result<T> = std::result::Result<T, AppError>;

/// Error reporter for user feedback at the CLI edge
pub struct ErrorReporter {
    pub use_color: bool,
    pub verbose: bool,
}

impl ErrorReporter {
    /// Create a new error reporter
    pub fn new(use_color: bool, verbose: bool) -> Self {
        Self { use_color, verbose }
    }

    /// Report an error to the user
    pub fn report_error(&self, error: &AppError) {
        eprintln!("{}", error.format_for_console(self.use_color));

        if self.verbose {
            if let Some(hint) = self.hint(error) {
                eprintln!();
                eprintln!("{}", hint);
            }
        }
    }

    fn hint(&self, error: &AppError) -> Option<&'static str> {
        match error {
            AppError::ReadinessTimeout { .. } => Some(
                "Check that Redis and Vault are running, or pass --provision containers to start them.",
            ),
            AppError::Config(_) => Some("Check your .env file and REDIS_*/VAULT_* environment variables."),
            AppError::Provision(_) => Some("Container provisioning needs a reachable Docker daemon."),
            _ => None,
        }
    }
}

impl Default for ErrorReporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let config_error = AppError::config("Invalid configuration");
        assert_eq!(config_error.category(), "CONFIG");
        assert!(config_error.is_fatal());
        assert_eq!(config_error.exit_code(), 1);

        let cache_error = AppError::cache("Connection refused");
        assert_eq!(cache_error.category(), "CACHE");
        assert!(!cache_error.is_fatal());
        assert_eq!(cache_error.exit_code(), 3);
    }

    #[test]
    fn test_readiness_timeout_is_fatal() {
        let error = AppError::readiness_timeout(ServiceKind::Secrets, Duration::from_secs(30), "connection refused");
        assert!(error.is_fatal());
        assert_eq!(error.exit_code(), 2);
        let display = error.to_string();
        assert!(display.contains("vault"));
        assert!(display.contains("30.0s"));
        assert!(display.contains("connection refused"));
    }

    #[test]
    fn test_assertion_and_manifest_are_not_fatal() {
        assert!(!AppError::assertion("value mismatch").is_fatal());
        let manifest = AppError::manifest("redis-master.yaml", "spec.template.spec.volumes");
        assert!(!manifest.is_fatal());
        assert!(manifest.to_string().contains("spec.template.spec.volumes"));
    }

    #[test]
    fn test_not_found_detection() {
        assert!(AppError::not_found("secret/test_1").is_not_found());
        assert!(!AppError::secrets("permission denied").is_not_found());
    }

    #[test]
    fn test_context_keeps_category() {
        let error = AppError::cache("NOAUTH").context("connecting to 127.0.0.1:6379");
        assert_eq!(error.category(), "CACHE");
        assert!(error.to_string().contains("connecting to 127.0.0.1:6379: NOAUTH"));
    }

    #[test]
    fn test_error_conversions() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let app_error: AppError = io_error.into();
        assert_eq!(app_error.category(), "IO");

        let parse_error = "not_a_number".parse::<u16>().unwrap_err();
        let app_error: AppError = parse_error.into();
        assert_eq!(app_error.category(), "PARSE");

        let yaml_error = serde_yaml::from_str::<serde_yaml::Value>("a: [b").unwrap_err();
        let app_error: AppError = yaml_error.into();
        assert!(app_error.to_string().contains("YAML parse error"));
    }

    #[test]
    fn test_dotenv_error_conversion() {
        let dotenv_error = dotenv::Error::LineParse(".env".to_string(), 1);
        let app_error: AppError = dotenv_error.into();
        assert_eq!(app_error.category(), "CONFIG");
        assert!(app_error.to_string().contains("Environment file error"));
    }

    #[test]
    fn test_console_formatting() {
        let error = AppError::assertion("expected test_value");
        let plain = error.format_for_console(false);
        let colored = error.format_for_console(true);

        assert!(plain.starts_with("[ASSERTION]"));
        assert!(colored.contains("ASSERTION"));
        assert!(colored.contains("expected test_value"));
    }

    #[test]
    fn test_error_reporter_default() {
        let reporter = ErrorReporter::default();
        assert!(reporter.use_color);
        assert!(!reporter.verbose);
        reporter.report_error(&AppError::internal("should not panic"));
    }
}
