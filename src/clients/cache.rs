//! Redis cache client over a multiplexed async connection

use super::{parse_info, CacheClient, CacheConnector};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Authenticated Redis client.
///
/// The multiplexed connection is cheap to clone, so one `RedisCache` can be
/// shared by concurrent workers.
#[derive(Clone)]
pub struct RedisCache {
    host: String,
    port: u16,
    conn: MultiplexedConnection,
}

impl RedisCache {
    /// Connect and authenticate, giving up after `timeout`
    pub async fn connect(host: &str, port: u16, password: &str, timeout: Duration) -> Result<Self> {
        let url = connection_url(host, port, password)?;
        let client = redis::Client::open(url.as_str())?;

        let conn = tokio::time::timeout(timeout, client.get_multiplexed_async_connection())
            .await
            .map_err(|_| AppError::cache(format!("Connecting to {}:{} timed out after {:?}", host, port, timeout)))??;

        Ok(Self {
            host: host.to_string(),
            port,
            conn,
        })
    }
}

/// Connects fresh [`RedisCache`] clients to one endpoint
#[derive(Debug, Clone)]
pub struct RedisConnector {
    host: String,
    port: u16,
    timeout: Duration,
}

impl RedisConnector {
    pub fn new(host: &str, port: u16, timeout: Duration) -> Self {
        Self {
            host: host.to_string(),
            port,
            timeout,
        }
    }
}

#[async_trait]
impl CacheConnector for RedisConnector {
    async fn connect(&self, password: &str) -> Result<Arc<dyn CacheClient>> {
        let cache = RedisCache::connect(&self.host, self.port, password, self.timeout).await?;
        Ok(Arc::new(cache))
    }
}

/// `redis://:<password>@host:port/` with the password percent-encoded
fn connection_url(host: &str, port: u16, password: &str) -> Result<url::Url> {
    let mut url = url::Url::parse(&format!("redis://{}:{}/", host, port))?;
    if !password.is_empty() {
        url.set_password(Some(password))
            .map_err(|_| AppError::config(format!("Cannot set password on Redis URL for host '{}'", host)))?;
    }
    Ok(url)
}

#[async_trait]
impl CacheClient for RedisCache {
    async fn ping(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let reply: String = redis::cmd("PING").query_async(&mut conn).await?;
        if reply == "PONG" {
            Ok(())
        } else {
            Err(AppError::cache(format!("Unexpected PING reply: {}", reply)))
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.set(key, value).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn flush_all(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("FLUSHALL").query_async(&mut conn).await?;
        Ok(())
    }

    async fn info(&self) -> Result<HashMap<String, String>> {
        let mut conn = self.conn.clone();
        let raw: String = redis::cmd("INFO").query_async(&mut conn).await?;
        Ok(parse_info(&raw))
    }

    fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
