//! kv-vault-probe
//!
//! Integration harness for a Redis cache and a HashiCorp Vault secrets
//! manager deployed from Kubernetes manifests. The harness provisions (or
//! locates) both services, validates the deployment manifests, and runs
//! functional, latency and cross-service probes against live instances.

pub mod app;
pub mod cli;
pub mod clients;
pub mod config;
pub mod error;
pub mod logging;
pub mod manifest;
pub mod models;
pub mod output;
pub mod probes;
pub mod provision;
pub mod stats;
pub mod types;

// Re-export commonly used types
pub use error::{AppError, Result};
pub use models::{HarnessConfig, LatencyReport, LatencyStats, MemoryReport, Sample};
pub use provision::{HarnessContext, Provisioner};
pub use probes::{ProbeOutcome, SuiteReport, SuiteRunner};

/// Application version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");

/// Default configuration values.
///
/// Credentials here are fixtures matching the development deployments, not
/// guidance for handling real secrets.
pub mod defaults {
    use std::time::Duration;

    pub const DEFAULT_REDIS_HOST: &str = "127.0.0.1";
    pub const DEFAULT_REDIS_PORT: u16 = 6379;
    pub const DEFAULT_REDIS_PASSWORD: &str = "YourStrongPassword";
    pub const DEFAULT_VAULT_ADDR: &str = "http://127.0.0.1:8200";
    pub const DEFAULT_VAULT_TOKEN: &str = "root";
    pub const DEFAULT_VAULT_KV_MOUNT: &str = "secret";
    pub const DEFAULT_READINESS_TIMEOUT: Duration = Duration::from_secs(30);
    pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
    pub const DEFAULT_MANIFEST_DIR: &str = "deploy/kubernetes";
    pub const DEFAULT_ITERATION_SCALE: f64 = 1.0;
    pub const DEFAULT_ENABLE_COLOR: bool = true;

    pub const REDIS_IMAGE: &str = "redis";
    pub const REDIS_IMAGE_TAG: &str = "7.2.4";
    pub const VAULT_IMAGE: &str = "hashicorp/vault";
    pub const VAULT_IMAGE_TAG: &str = "1.15.2";

    pub const REDIS_MANIFEST: &str = "redis/redis-master.yaml";
    pub const VAULT_MANIFEST: &str = "vault/vault-config.yaml";
}

/// Iteration counts and mean-latency thresholds for the performance probes.
pub mod thresholds {
    use std::time::Duration;

    pub const CACHE_ITERATIONS: usize = 1000;
    pub const CACHE_OP_MEAN: Duration = Duration::from_millis(1);

    pub const CACHE_CONCURRENT_WORKERS: usize = 10;
    pub const CACHE_CONCURRENT_ITERATIONS: usize = 1000;
    pub const CACHE_CONCURRENT_MEAN: Duration = Duration::from_millis(2);

    pub const MEMORY_KEY_COUNT: usize = 10_000;
    pub const MEMORY_VALUE_BYTES: usize = 1000;
    pub const MEMORY_INCREASE_LIMIT_BYTES: u64 = 100 * 1024 * 1024;

    pub const SECRET_ITERATIONS: usize = 100;
    pub const SECRET_OP_MEAN: Duration = Duration::from_millis(100);

    pub const SECRET_CONCURRENT_WORKERS: usize = 5;
    pub const SECRET_CONCURRENT_ITERATIONS: usize = 50;
    pub const SECRET_CONCURRENT_MEAN: Duration = Duration::from_millis(200);

    pub const TOKEN_ITERATIONS: usize = 50;
    pub const TOKEN_CREATE_MEAN: Duration = Duration::from_millis(100);

    pub const HEALTH_ITERATIONS: usize = 100;
    pub const HEALTH_CHECK_MEAN: Duration = Duration::from_millis(50);
}
