//! Service provisioning and the per-suite harness context
//!
//! [`Provisioner`] resolves (or starts) both services, waits until they
//! answer, and hands back a [`HarnessContext`] holding authenticated clients.
//! The context owns any containers it started, so they are stopped and
//! removed when it is dropped, whichever way the suite ends.

use crate::clients::{CacheClient, CacheConnector, RedisCache, RedisConnector, SecretsClient, VaultClient};
use crate::defaults::{REDIS_IMAGE, REDIS_IMAGE_TAG, VAULT_IMAGE, VAULT_IMAGE_TAG};
use crate::error::{AppError, Result};
use crate::logging::{CleanupLogger, ServiceLogger};
use crate::models::HarnessConfig;
use crate::types::{ProvisionMode, ServiceKind};
use crate::{log_debug, log_warn};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use testcontainers::core::{ContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage, ImageExt};
use tokio::sync::Mutex;

/// Delay between readiness attempts
pub const READINESS_POLL_INTERVAL: Duration = Duration::from_millis(250);

const REDIS_CONTAINER_PORT: u16 = 6379;
const VAULT_CONTAINER_PORT: u16 = 8200;

/// Source of a fresh [`HarnessContext`] for each suite
#[async_trait]
pub trait ContextSource: Send + Sync {
    async fn acquire(&self) -> Result<HarnessContext>;
}

/// Where the two services can be reached
#[derive(Debug, Clone, PartialEq)]
pub struct Endpoints {
    pub redis_host: String,
    pub redis_port: u16,
    pub vault_addr: String,
}

impl Endpoints {
    pub fn from_config(config: &HarnessConfig) -> Self {
        Self {
            redis_host: config.redis_host.clone(),
            redis_port: config.redis_port,
            vault_addr: config.vault_addr.clone(),
        }
    }
}

/// Clients and cleanup state shared by the probes of one suite
pub struct HarnessContext {
    config: HarnessConfig,
    cache: Arc<dyn CacheClient>,
    secrets: Arc<dyn SecretsClient>,
    connector: Arc<dyn CacheConnector>,
    cleanup_paths: Mutex<BTreeSet<String>>,
    containers: Vec<ContainerAsync<GenericImage>>,
    cleanup_logger: CleanupLogger,
}

impl HarnessContext {
    /// Context over already-connected clients
    pub fn new(
        config: HarnessConfig,
        cache: Arc<dyn CacheClient>,
        secrets: Arc<dyn SecretsClient>,
        connector: Arc<dyn CacheConnector>,
    ) -> Self {
        let cleanup_logger = CleanupLogger::new(&config);
        Self {
            config,
            cache,
            secrets,
            connector,
            cleanup_paths: Mutex::new(BTreeSet::new()),
            containers: Vec::new(),
            cleanup_logger,
        }
    }

    fn with_containers(mut self, containers: Vec<ContainerAsync<GenericImage>>) -> Self {
        self.containers = containers;
        self
    }

    /// Log teardown through `logger`, typically one sharing the run's session id
    pub fn with_cleanup_logger(mut self, logger: CleanupLogger) -> Self {
        self.cleanup_logger = logger;
        self
    }

    pub fn cleanup_logger(&self) -> &CleanupLogger {
        &self.cleanup_logger
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<dyn CacheClient> {
        &self.cache
    }

    pub fn secrets(&self) -> &Arc<dyn SecretsClient> {
        &self.secrets
    }

    /// Open a new cache client using `password`
    pub async fn connect_cache(&self, password: &str) -> Result<Arc<dyn CacheClient>> {
        self.connector.connect(password).await
    }

    /// Delete the secret at `path` during teardown
    pub async fn register_secret_path(&self, path: impl Into<String>) {
        self.cleanup_paths.lock().await.insert(path.into());
    }

    pub async fn register_secret_paths<I, S>(&self, paths: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut registry = self.cleanup_paths.lock().await;
        registry.extend(paths.into_iter().map(Into::into));
    }

    pub async fn registered_paths(&self) -> Vec<String> {
        self.cleanup_paths.lock().await.iter().cloned().collect()
    }

    pub fn owns_containers(&self) -> bool {
        !self.containers.is_empty()
    }

    /// Delete registered secrets, flush the cache, then release containers.
    ///
    /// Already-absent secrets are logged and skipped. Any other failure is
    /// logged, the remaining cleanup still runs, and the first failure is
    /// returned.
    pub async fn teardown(self) -> Result<()> {
        let paths: Vec<String> = std::mem::take(&mut *self.cleanup_paths.lock().await)
            .into_iter()
            .collect();

        let mut deleted = 0;
        let mut skipped = 0;
        let mut failures: Vec<AppError> = Vec::new();

        for path in &paths {
            match self.secrets.delete_secret(path).await {
                Ok(()) => {
                    deleted += 1;
                    self.cleanup_logger.deleted(path).await;
                }
                Err(e) if e.is_not_found() => {
                    skipped += 1;
                    self.cleanup_logger.not_found_skipped(path).await;
                }
                Err(e) => {
                    self.cleanup_logger.cleanup_failed(&format!("secret '{}'", path), &e).await;
                    failures.push(e);
                }
            }
        }

        if let Err(e) = self.cache.flush_all().await {
            self.cleanup_logger.cleanup_failed("cache flush", &e).await;
            failures.push(e);
        }

        self.cleanup_logger.finished(deleted, skipped, failures.len()).await;

        // Dropping the handles stops and removes the containers
        drop(self.containers);

        let total = failures.len();
        match failures.into_iter().next() {
            None => Ok(()),
            Some(first) if total == 1 => Err(first.context("Teardown")),
            Some(first) => Err(first.context(format!("Teardown ({} cleanup operations failed)", total))),
        }
    }
}

/// Poll `attempt` until it succeeds or `timeout` elapses.
///
/// Each attempt is cut off at the end of the window, so a hung connection
/// cannot stretch the wait past `timeout`.
pub async fn wait_until_ready<T, F, Fut>(
    service: ServiceKind,
    timeout: Duration,
    logger: &ServiceLogger,
    mut attempt: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let started = Instant::now();
    let mut attempts: u32 = 0;
    let mut last_error: Option<AppError> = None;

    loop {
        attempts += 1;
        let remaining = timeout.saturating_sub(started.elapsed());

        match tokio::time::timeout(remaining, attempt()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => {
                logger.readiness_attempt(service, attempts, &e).await;
                last_error = Some(e);
            }
            Err(_) => {
                let reason = match last_error {
                    Some(e) => e.to_string(),
                    None => format!("no response within {:.1}s", timeout.as_secs_f64()),
                };
                return Err(readiness_failed(service, started.elapsed(), attempts, reason, logger).await);
            }
        }

        let waited = started.elapsed();
        if waited + READINESS_POLL_INTERVAL > timeout {
            let reason = last_error.map(|e| e.to_string()).unwrap_or_default();
            return Err(readiness_failed(service, waited, attempts, reason, logger).await);
        }

        tokio::time::sleep(READINESS_POLL_INTERVAL).await;
    }
}

async fn readiness_failed(
    service: ServiceKind,
    waited: Duration,
    attempts: u32,
    reason: String,
    logger: &ServiceLogger,
) -> AppError {
    log_warn!(
        logger.logger(),
        "{} still unavailable after {} attempts",
        service,
        attempts
    );
    AppError::readiness_timeout(service, waited, reason)
}

/// Builds [`HarnessContext`]s against external or container-backed services
pub struct Provisioner {
    config: HarnessConfig,
    logger: ServiceLogger,
    cleanup_logger: CleanupLogger,
}

impl Provisioner {
    pub fn new(config: HarnessConfig, logger: ServiceLogger) -> Self {
        let cleanup_logger = CleanupLogger::new(&config);
        Self {
            config,
            logger,
            cleanup_logger,
        }
    }

    /// Logger handed to every context this provisioner builds
    pub fn with_cleanup_logger(mut self, logger: CleanupLogger) -> Self {
        self.cleanup_logger = logger;
        self
    }

    pub fn mode(&self) -> ProvisionMode {
        self.config.provision_mode
    }

    /// Resolve endpoints, wait for both services and return a live context
    pub async fn provision(&self) -> Result<HarnessContext> {
        let (endpoints, containers) = match self.config.provision_mode {
            ProvisionMode::External => (Endpoints::from_config(&self.config), Vec::new()),
            ProvisionMode::Containers => self.start_containers().await?,
        };

        log_debug!(
            self.logger.logger(),
            "Connecting to redis at {}:{} and vault at {}",
            endpoints.redis_host,
            endpoints.redis_port,
            endpoints.vault_addr
        );

        let cache = self.connect_cache(&endpoints).await?;
        let secrets = self.connect_secrets(&endpoints).await?;

        let connector = RedisConnector::new(
            &endpoints.redis_host,
            endpoints.redis_port,
            self.config.request_timeout(),
        );

        let mut config = self.config.clone();
        config.redis_host = endpoints.redis_host;
        config.redis_port = endpoints.redis_port;
        config.vault_addr = endpoints.vault_addr;

        Ok(HarnessContext::new(config, Arc::new(cache), Arc::new(secrets), Arc::new(connector))
            .with_containers(containers)
            .with_cleanup_logger(self.cleanup_logger.clone()))
    }

    async fn connect_cache(&self, endpoints: &Endpoints) -> Result<RedisCache> {
        let started = Instant::now();
        let timeout = self.config.readiness_timeout();
        let password = self.config.redis_password.as_str();

        let cache = wait_until_ready(ServiceKind::Cache, timeout, &self.logger, || async move {
            let cache = RedisCache::connect(&endpoints.redis_host, endpoints.redis_port, password, timeout).await?;
            cache.ping().await?;
            Ok(cache)
        })
        .await?;

        self.logger
            .service_ready(ServiceKind::Cache, &cache.endpoint(), started.elapsed())
            .await;
        Ok(cache)
    }

    async fn connect_secrets(&self, endpoints: &Endpoints) -> Result<VaultClient> {
        let started = Instant::now();
        let client = VaultClient::new(
            &endpoints.vault_addr,
            &self.config.vault_token,
            &self.config.vault_kv_mount,
            self.config.request_timeout(),
        )?;

        wait_until_ready(ServiceKind::Secrets, self.config.readiness_timeout(), &self.logger, || {
            let client = client.clone();
            async move {
                let health = client.health().await?;
                if health.is_ready() {
                    Ok(())
                } else {
                    Err(AppError::secrets(format!(
                        "not ready (initialized: {}, sealed: {})",
                        health.initialized, health.sealed
                    )))
                }
            }
        })
        .await?;

        if !client.is_authenticated().await? {
            return Err(AppError::provision(format!(
                "Vault at {} rejected the configured token",
                endpoints.vault_addr
            )));
        }

        self.logger
            .service_ready(ServiceKind::Secrets, &client.endpoint(), started.elapsed())
            .await;
        Ok(client)
    }

    async fn start_containers(&self) -> Result<(Endpoints, Vec<ContainerAsync<GenericImage>>)> {
        let redis = GenericImage::new(REDIS_IMAGE, REDIS_IMAGE_TAG)
            .with_exposed_port(ContainerPort::Tcp(REDIS_CONTAINER_PORT))
            .with_wait_for(WaitFor::message_on_stdout("Ready to accept connections"))
            .with_cmd(["redis-server", "--requirepass", self.config.redis_password.as_str()])
            .start()
            .await
            .map_err(|e| AppError::provision(format!("Failed to start redis container: {}", e)))?;
        let redis_port = redis.get_host_port_ipv4(REDIS_CONTAINER_PORT).await?;
        self.logger
            .container_started(ServiceKind::Cache, &format!("{}:{}", REDIS_IMAGE, REDIS_IMAGE_TAG), redis_port)
            .await;

        let vault = GenericImage::new(VAULT_IMAGE, VAULT_IMAGE_TAG)
            .with_exposed_port(ContainerPort::Tcp(VAULT_CONTAINER_PORT))
            .with_wait_for(WaitFor::message_on_stdout("Vault server started!"))
            .with_env_var("VAULT_DEV_ROOT_TOKEN_ID", self.config.vault_token.as_str())
            .with_env_var("VAULT_DEV_LISTEN_ADDRESS", format!("0.0.0.0:{}", VAULT_CONTAINER_PORT))
            .with_env_var("SKIP_SETCAP", "true")
            .start()
            .await
            .map_err(|e| AppError::provision(format!("Failed to start vault container: {}", e)))?;
        let vault_port = vault.get_host_port_ipv4(VAULT_CONTAINER_PORT).await?;
        self.logger
            .container_started(ServiceKind::Secrets, &format!("{}:{}", VAULT_IMAGE, VAULT_IMAGE_TAG), vault_port)
            .await;

        let endpoints = Endpoints {
            redis_host: "127.0.0.1".to_string(),
            redis_port,
            vault_addr: format!("http://127.0.0.1:{}", vault_port),
        };
        Ok((endpoints, vec![redis, vault]))
    }
}

#[async_trait]
impl ContextSource for Provisioner {
    async fn acquire(&self) -> Result<HarnessContext> {
        self.provision().await
    }
}
