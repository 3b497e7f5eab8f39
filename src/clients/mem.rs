//! In-memory service fakes for offline tests

use super::{CacheClient, CacheConnector, HealthStatus, SecretData, SecretsClient};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Baseline `used_memory` reported by an empty fake cache
const BASE_MEMORY: u64 = 1_000_000;

/// Per-key bookkeeping overhead added to `used_memory`
const KEY_OVERHEAD: u64 = 64;

/// Cache fake with optional per-call latency
#[derive(Clone, Default)]
pub struct InMemoryCache {
    entries: Arc<RwLock<HashMap<String, String>>>,
    latency: Duration,
    unavailable: bool,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long inside every call
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Every call fails as if the server were down
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    async fn enter(&self) -> Result<()> {
        if self.unavailable {
            return Err(AppError::cache("Connection refused"));
        }
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        Ok(())
    }
}

#[async_trait]
impl CacheClient for InMemoryCache {
    async fn ping(&self) -> Result<()> {
        self.enter().await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.enter().await?;
        self.entries.write().await.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.enter().await?;
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn flush_all(&self) -> Result<()> {
        self.enter().await?;
        self.entries.write().await.clear();
        Ok(())
    }

    async fn info(&self) -> Result<HashMap<String, String>> {
        self.enter().await?;
        let entries = self.entries.read().await;
        let payload: u64 = entries
            .iter()
            .map(|(k, v)| (k.len() + v.len()) as u64 + KEY_OVERHEAD)
            .sum();

        let mut info = HashMap::new();
        info.insert("redis_version".to_string(), "in-memory".to_string());
        info.insert("used_memory".to_string(), (BASE_MEMORY + payload).to_string());
        info.insert("db0".to_string(), format!("keys={}", entries.len()));
        Ok(info)
    }

    fn endpoint(&self) -> String {
        "in-memory".to_string()
    }
}

/// Hands out the shared fake cache when the password matches
#[derive(Clone)]
pub struct InMemoryConnector {
    cache: InMemoryCache,
    password: String,
}

impl InMemoryConnector {
    pub fn new(cache: InMemoryCache, password: &str) -> Self {
        Self {
            cache,
            password: password.to_string(),
        }
    }
}

#[async_trait]
impl CacheConnector for InMemoryConnector {
    async fn connect(&self, password: &str) -> Result<Arc<dyn CacheClient>> {
        if password != self.password {
            return Err(AppError::cache("WRONGPASS invalid username-password pair or user is disabled."));
        }
        self.cache.enter().await?;
        Ok(Arc::new(self.cache.clone()))
    }
}

#[derive(Default)]
struct SecretsState {
    secrets: BTreeMap<String, SecretData>,
    mounts: HashSet<String>,
    tokens: HashSet<String>,
}

/// Secrets fake keyed by path, with one valid root token.
///
/// Like Vault, secret operations fail until a KV engine is mounted at
/// `kv_mount`.
#[derive(Clone)]
pub struct InMemorySecrets {
    state: Arc<RwLock<SecretsState>>,
    kv_mount: String,
    root_token: String,
    token: String,
    latency: Duration,
    failing_deletes: Arc<HashSet<String>>,
    token_counter: Arc<AtomicU64>,
}

impl InMemorySecrets {
    /// Fake whose root token is `root_token`, already mounted at `secret`
    pub fn new(root_token: &str) -> Self {
        let mut state = SecretsState::default();
        state.mounts.insert("secret".to_string());
        Self::with_state(root_token, state)
    }

    /// Fake with no secrets engine mounted
    pub fn unmounted(root_token: &str) -> Self {
        Self::with_state(root_token, SecretsState::default())
    }

    fn with_state(root_token: &str, state: SecretsState) -> Self {
        Self {
            state: Arc::new(RwLock::new(state)),
            kv_mount: "secret".to_string(),
            root_token: root_token.to_string(),
            token: root_token.to_string(),
            latency: Duration::ZERO,
            failing_deletes: Arc::new(HashSet::new()),
            token_counter: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Same store, different presented token
    pub fn with_token(&self, token: &str) -> Self {
        Self {
            token: token.to_string(),
            ..self.clone()
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Deleting any of `paths` fails with a server error
    pub fn with_failing_deletes<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.failing_deletes = Arc::new(paths.into_iter().map(Into::into).collect());
        self
    }

    /// Paths currently holding a secret
    pub async fn paths(&self) -> Vec<String> {
        self.state.read().await.secrets.keys().cloned().collect()
    }

    pub async fn is_mounted(&self, path: &str) -> bool {
        self.state.read().await.mounts.contains(path.trim_matches('/'))
    }

    async fn authorize(&self) -> Result<()> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if self.token == self.root_token || self.state.read().await.tokens.contains(&self.token) {
            Ok(())
        } else {
            Err(AppError::secrets("permission denied"))
        }
    }

    async fn require_mount(&self) -> Result<()> {
        if self.is_mounted(&self.kv_mount).await {
            Ok(())
        } else {
            Err(AppError::not_found(format!("no handler for route \"{}/data\"", self.kv_mount)))
        }
    }
}

#[async_trait]
impl SecretsClient for InMemorySecrets {
    async fn is_authenticated(&self) -> Result<bool> {
        Ok(self.authorize().await.is_ok())
    }

    async fn enable_secrets_engine(&self, _engine_type: &str, path: &str) -> Result<()> {
        self.authorize().await?;
        self.state.write().await.mounts.insert(path.trim_matches('/').to_string());
        Ok(())
    }

    async fn write_secret(&self, path: &str, data: &SecretData) -> Result<()> {
        self.authorize().await?;
        self.require_mount().await?;
        self.state.write().await.secrets.insert(path.to_string(), data.clone());
        Ok(())
    }

    async fn read_secret(&self, path: &str) -> Result<SecretData> {
        self.authorize().await?;
        self.require_mount().await?;
        self.state
            .read()
            .await
            .secrets
            .get(path)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("No secret at path {}", path)))
    }

    async fn delete_secret(&self, path: &str) -> Result<()> {
        self.authorize().await?;
        self.require_mount().await?;
        if self.failing_deletes.contains(path) {
            return Err(AppError::secrets(format!("Failed to delete secret at path {}: internal error", path)));
        }

        match self.state.write().await.secrets.remove(path) {
            Some(_) => Ok(()),
            None => Err(AppError::not_found(format!("No secret at path {}", path))),
        }
    }

    async fn create_token(&self, _policies: &[&str], _ttl: &str) -> Result<String> {
        self.authorize().await?;
        let n = self.token_counter.fetch_add(1, Ordering::Relaxed);
        let token = format!("mem.token.{}", n);
        self.state.write().await.tokens.insert(token.clone());
        Ok(token)
    }

    async fn health(&self) -> Result<HealthStatus> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        Ok(HealthStatus {
            initialized: true,
            sealed: false,
            standby: false,
            version: Some("in-memory".to_string()),
        })
    }

    fn endpoint(&self) -> String {
        "in-memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::{secret_data, used_memory};

    #[tokio::test]
    async fn test_cache_round_trip_and_flush() {
        let cache = InMemoryCache::new();
        cache.set("k", "v").await.unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v"));
        assert_eq!(cache.get("missing").await.unwrap(), None);

        cache.flush_all().await.unwrap();
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_cache_memory_grows_with_payload() {
        let cache = InMemoryCache::new();
        let before = used_memory(&cache.info().await.unwrap()).unwrap();
        cache.set("key", &"x".repeat(1000)).await.unwrap();
        let after = used_memory(&cache.info().await.unwrap()).unwrap();

        assert_eq!(after - before, 3 + 1000 + KEY_OVERHEAD);
    }

    #[tokio::test]
    async fn test_unavailable_cache() {
        let cache = InMemoryCache::unavailable();
        assert!(cache.ping().await.is_err());
    }

    #[tokio::test]
    async fn test_secrets_round_trip_and_delete() {
        let secrets = InMemorySecrets::new("root");
        secrets.write_secret("test", &secret_data("a", "b")).await.unwrap();
        assert_eq!(secrets.read_secret("test").await.unwrap()["a"], "b");

        secrets.delete_secret("test").await.unwrap();
        assert!(secrets.read_secret("test").await.unwrap_err().is_not_found());
        assert!(secrets.delete_secret("test").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_secrets_token_checks() {
        let secrets = InMemorySecrets::new("root");
        assert!(secrets.is_authenticated().await.unwrap());
        assert!(!secrets.with_token("nope").is_authenticated().await.unwrap());

        let child = secrets.create_token(&["default"], "1h").await.unwrap();
        assert!(secrets.with_token(&child).is_authenticated().await.unwrap());
    }

    #[tokio::test]
    async fn test_failing_deletes() {
        let secrets = InMemorySecrets::new("root").with_failing_deletes(["stuck"]);
        secrets.write_secret("stuck", &secret_data("a", "b")).await.unwrap();

        let err = secrets.delete_secret("stuck").await.unwrap_err();
        assert!(!err.is_not_found());
    }

    #[tokio::test]
    async fn test_connector_checks_password() {
        let cache = InMemoryCache::new();
        let connector = InMemoryConnector::new(cache.clone(), "pw");

        assert!(connector.connect("wrong").await.is_err());
        let fresh = connector.connect("pw").await.unwrap();
        fresh.set("k", "v").await.unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn test_mounts() {
        let secrets = InMemorySecrets::new("root");
        assert!(secrets.is_mounted("secret").await);
        secrets.enable_secrets_engine("kv", "/kv2/").await.unwrap();
        assert!(secrets.is_mounted("kv2").await);
    }

    #[tokio::test]
    async fn test_unmounted_store_rejects_secret_operations() {
        let secrets = InMemorySecrets::unmounted("root");
        let err = secrets.write_secret("a", &secret_data("x", "1")).await.unwrap_err();
        assert!(err.is_not_found());

        secrets.enable_secrets_engine("kv", "secret").await.unwrap();
        secrets.write_secret("a", &secret_data("x", "1")).await.unwrap();
        assert_eq!(secrets.read_secret("a").await.unwrap()["x"], "1");
    }
}
