//! Clients for the two services under test
//!
//! The probes only see the [`CacheClient`] and [`SecretsClient`] traits. Live
//! runs use [`RedisCache`] and [`VaultClient`]; unit tests use in-memory
//! fakes.

pub mod cache;
#[cfg(test)]
pub mod mem;
pub mod vault;

pub use self::cache::{RedisCache, RedisConnector};
#[cfg(test)]
pub use self::mem::{InMemoryCache, InMemoryConnector, InMemorySecrets};
pub use self::vault::{HealthStatus, VaultClient};

use crate::error::{AppError, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Key/value payload stored at one secret path
pub type SecretData = BTreeMap<String, String>;

/// Operations the harness needs from the cache service
#[async_trait]
pub trait CacheClient: Send + Sync {
    async fn ping(&self) -> Result<()>;

    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Value at `key`, `None` when absent
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Remove every key in every database
    async fn flush_all(&self) -> Result<()>;

    /// Server statistics as reported by `INFO`
    async fn info(&self) -> Result<HashMap<String, String>>;

    /// `host:port` for reporting
    fn endpoint(&self) -> String;
}

/// Operations the harness needs from the secrets service
#[async_trait]
pub trait SecretsClient: Send + Sync {
    /// Whether the configured token is accepted
    async fn is_authenticated(&self) -> Result<bool>;

    /// Mount a secrets engine; an existing mount at `path` is accepted
    async fn enable_secrets_engine(&self, engine_type: &str, path: &str) -> Result<()>;

    /// Create or update the secret at `path`
    async fn write_secret(&self, path: &str, data: &SecretData) -> Result<()>;

    /// Latest version of the secret at `path`; `NotFound` when absent
    async fn read_secret(&self, path: &str) -> Result<SecretData>;

    /// Delete the secret and all its versions; `NotFound` when absent
    async fn delete_secret(&self, path: &str) -> Result<()>;

    /// Create a child token and return its id
    async fn create_token(&self, policies: &[&str], ttl: &str) -> Result<String>;

    async fn health(&self) -> Result<HealthStatus>;

    fn endpoint(&self) -> String;
}

/// Opens new cache connections against the resolved cache endpoint
#[async_trait]
pub trait CacheConnector: Send + Sync {
    /// Connect with `password` instead of the configured one
    async fn connect(&self, password: &str) -> Result<Arc<dyn CacheClient>>;
}

/// `used_memory` in bytes from an `INFO` map
pub fn used_memory(info: &HashMap<String, String>) -> Result<u64> {
    let raw = info
        .get("used_memory")
        .ok_or_else(|| AppError::cache("INFO response has no used_memory field"))?;

    raw.trim()
        .parse()
        .map_err(|e| AppError::cache(format!("Invalid used_memory value '{}': {}", raw, e)))
}

/// Parse the text body of an `INFO` reply into a flat map
pub fn parse_info(raw: &str) -> HashMap<String, String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Build a single-entry secret payload
pub fn secret_data<K: Into<String>, V: Into<String>>(key: K, value: V) -> SecretData {
    let mut data = SecretData::new();
    data.insert(key.into(), value.into());
    data
}
