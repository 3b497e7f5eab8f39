//! Type definitions and aliases

use std::time::Duration;
use serde::{Deserialize, Serialize};

// Re-export commonly used types
pub use crate::error::{AppError, Result};

/// The two external services the harness exercises
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceKind {
    /// Redis key-value cache
    Cache,
    /// HashiCorp Vault secrets manager
    Secrets,
}

impl ServiceKind {
    /// Get a human-readable name for this service
    pub fn name(&self) -> &'static str {
        match self {
            ServiceKind::Cache => "redis",
            ServiceKind::Secrets => "vault",
        }
    }
}

impl std::fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Probe suites, in the order `all` runs them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SuiteKind {
    /// Manifest field checks (no live services)
    Config,
    /// Minimal round trips against each service
    Functional,
    /// Latency measurements with thresholds
    Performance,
    /// Cross-service credential handoff
    Integration,
}

impl SuiteKind {
    /// Every suite in execution order
    pub const ALL: [SuiteKind; 4] = [
        SuiteKind::Config,
        SuiteKind::Functional,
        SuiteKind::Performance,
        SuiteKind::Integration,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SuiteKind::Config => "config",
            SuiteKind::Functional => "functional",
            SuiteKind::Performance => "performance",
            SuiteKind::Integration => "integration",
        }
    }

    /// Whether this suite talks to the live services
    pub fn needs_services(&self) -> bool {
        !matches!(self, SuiteKind::Config)
    }
}

impl std::fmt::Display for SuiteKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// How the provisioner obtains the services
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProvisionMode {
    /// Use endpoints that are already running
    #[default]
    External,
    /// Start disposable containers and remove them on teardown
    Containers,
}

impl std::str::FromStr for ProvisionMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "external" => Ok(ProvisionMode::External),
            "containers" | "container" | "docker" => Ok(ProvisionMode::Containers),
            other => Err(AppError::parse(format!("Invalid provision mode: {}", other))),
        }
    }
}

/// Latency classification relative to a probe's threshold
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PerformanceLevel {
    /// Mean below half the threshold
    Good,
    /// Mean below the threshold
    Moderate,
    /// Mean at or above the threshold
    Poor,
}

impl PerformanceLevel {
    /// Classify a mean latency against its threshold
    pub fn classify(mean: Duration, threshold: Duration) -> Self {
        if mean * 2 < threshold {
            Self::Good
        } else if mean < threshold {
            Self::Moderate
        } else {
            Self::Poor
        }
    }
}

/// Probe execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProbeStatus {
    /// All assertions held
    Passed,
    /// An assertion, threshold or client call failed
    Failed,
    /// Not run (e.g. its suite was not selected)
    Skipped,
}

impl ProbeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeStatus::Passed => "PASS",
            ProbeStatus::Failed => "FAIL",
            ProbeStatus::Skipped => "SKIP",
        }
    }
}
