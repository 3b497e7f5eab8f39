//! Configuration data model and validation

use crate::types::{AppError, ProvisionMode, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main harness configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Cache host name or address
    #[serde(default = "default_redis_host")]
    pub redis_host: String,

    /// Cache port
    #[serde(default = "default_redis_port")]
    pub redis_port: u16,

    /// Cache password (fixture default)
    #[serde(default = "default_redis_password")]
    pub redis_password: String,

    /// Vault address including scheme
    #[serde(default = "default_vault_addr")]
    pub vault_addr: String,

    /// Vault token (fixture default is the dev root token)
    #[serde(default = "default_vault_token")]
    pub vault_token: String,

    /// Mount path of the KV v2 secrets engine
    #[serde(default = "default_vault_kv_mount")]
    pub vault_kv_mount: String,

    /// Bounded wait for both services to become reachable
    #[serde(default = "default_readiness_timeout_secs")]
    pub readiness_timeout_seconds: u64,

    /// Per-request timeout for Vault HTTP calls
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_seconds: u64,

    /// Directory holding `redis/` and `vault/` manifests
    #[serde(default = "default_manifest_dir")]
    pub manifest_dir: PathBuf,

    /// Whether to use running services or start containers
    #[serde(default)]
    pub provision_mode: ProvisionMode,

    /// Multiplier applied to performance iteration counts, in (0, 1]
    #[serde(default = "default_iteration_scale")]
    pub iteration_scale: f64,

    /// Enable colored terminal output
    #[serde(default = "default_enable_color")]
    pub enable_color: bool,

    /// Enable verbose output
    #[serde(default)]
    pub verbose: bool,

    /// Enable debug output
    #[serde(default)]
    pub debug: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            redis_host: default_redis_host(),
            redis_port: default_redis_port(),
            redis_password: default_redis_password(),
            vault_addr: default_vault_addr(),
            vault_token: default_vault_token(),
            vault_kv_mount: default_vault_kv_mount(),
            readiness_timeout_seconds: default_readiness_timeout_secs(),
            request_timeout_seconds: default_request_timeout_secs(),
            manifest_dir: default_manifest_dir(),
            provision_mode: ProvisionMode::default(),
            iteration_scale: default_iteration_scale(),
            enable_color: default_enable_color(),
            verbose: false,
            debug: false,
        }
    }
}

impl HarnessConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Readiness wait as Duration
    pub fn readiness_timeout(&self) -> Duration {
        Duration::from_secs(self.readiness_timeout_seconds)
    }

    /// Vault request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// Path of a manifest relative to the manifest directory
    pub fn manifest_path<P: AsRef<Path>>(&self, relative: P) -> PathBuf {
        self.manifest_dir.join(relative)
    }

    /// Scale an iteration count, never below one
    pub fn scaled(&self, iterations: usize) -> usize {
        ((iterations as f64 * self.iteration_scale).round() as usize).max(1)
    }

    /// Validate the configuration and return any errors
    pub fn validate(&self) -> Result<()> {
        if self.redis_host.trim().is_empty() {
            return Err(AppError::config("Redis host cannot be empty"));
        }

        if self.redis_port == 0 {
            return Err(AppError::config("Redis port must be greater than 0"));
        }

        match url::Url::parse(&self.vault_addr) {
            Ok(parsed) => {
                if parsed.scheme() != "http" && parsed.scheme() != "https" {
                    return Err(AppError::config(format!("Vault address must use http or https: {}", self.vault_addr)));
                }
            }
            Err(e) => {
                return Err(AppError::config(format!("Invalid Vault address '{}': {}", self.vault_addr, e)));
            }
        }

        if self.vault_token.is_empty() {
            return Err(AppError::config("Vault token cannot be empty"));
        }

        if self.vault_kv_mount.trim_matches('/').is_empty() {
            return Err(AppError::config("Vault KV mount cannot be empty"));
        }

        if self.readiness_timeout_seconds == 0 {
            return Err(AppError::config("Readiness timeout must be greater than 0"));
        }

        if self.request_timeout_seconds == 0 {
            return Err(AppError::config("Request timeout must be greater than 0"));
        }

        if !(self.iteration_scale > 0.0 && self.iteration_scale <= 1.0) {
            return Err(AppError::config(format!(
                "Iteration scale must be in (0, 1], got: {}",
                self.iteration_scale
            )));
        }

        Ok(())
    }

    /// Merge environment variables into this configuration
    pub fn merge_from_env(&mut self) -> Result<()> {
        if let Ok(host) = std::env::var("REDIS_HOST") {
            self.redis_host = host.trim().to_string();
        }

        if let Ok(port) = std::env::var("REDIS_PORT") {
            self.redis_port = port.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid REDIS_PORT value '{}': {}", port, e)))?;
        }

        if let Ok(password) = std::env::var("REDIS_PASSWORD") {
            self.redis_password = password;
        }

        if let Ok(addr) = std::env::var("VAULT_ADDR") {
            self.vault_addr = addr.trim().trim_end_matches('/').to_string();
        }

        if let Ok(token) = std::env::var("VAULT_DEV_ROOT_TOKEN_ID") {
            self.vault_token = token;
        }

        if let Ok(mount) = std::env::var("VAULT_KV_MOUNT") {
            self.vault_kv_mount = mount.trim().trim_matches('/').to_string();
        }

        if let Ok(timeout) = std::env::var("READINESS_TIMEOUT_SECONDS") {
            self.readiness_timeout_seconds = timeout.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid READINESS_TIMEOUT_SECONDS value '{}': {}", timeout, e)))?;
        }

        if let Ok(dir) = std::env::var("MANIFEST_DIR") {
            self.manifest_dir = PathBuf::from(dir.trim());
        }

        if let Ok(mode) = std::env::var("PROVISION_MODE") {
            self.provision_mode = mode.parse()
                .map_err(|e| AppError::config(format!("Invalid PROVISION_MODE value '{}': {}", mode, e)))?;
        }

        if let Ok(scale) = std::env::var("PROBE_ITERATION_SCALE") {
            self.iteration_scale = scale.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid PROBE_ITERATION_SCALE value '{}': {}", scale, e)))?;
        }

        if let Ok(enable_color) = std::env::var("ENABLE_COLOR") {
            self.enable_color = enable_color.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid ENABLE_COLOR value '{}': {}", enable_color, e)))?;
        }

        Ok(())
    }
}

// Default value functions for serde
fn default_redis_host() -> String {
    crate::defaults::DEFAULT_REDIS_HOST.to_string()
}

fn default_redis_port() -> u16 {
    crate::defaults::DEFAULT_REDIS_PORT
}

fn default_redis_password() -> String {
    crate::defaults::DEFAULT_REDIS_PASSWORD.to_string()
}

fn default_vault_addr() -> String {
    crate::defaults::DEFAULT_VAULT_ADDR.to_string()
}

fn default_vault_token() -> String {
    crate::defaults::DEFAULT_VAULT_TOKEN.to_string()
}

fn default_vault_kv_mount() -> String {
    crate::defaults::DEFAULT_VAULT_KV_MOUNT.to_string()
}

fn default_readiness_timeout_secs() -> u64 {
    crate::defaults::DEFAULT_READINESS_TIMEOUT.as_secs()
}

fn default_request_timeout_secs() -> u64 {
    crate::defaults::DEFAULT_REQUEST_TIMEOUT.as_secs()
}

fn default_manifest_dir() -> PathBuf {
    PathBuf::from(crate::defaults::DEFAULT_MANIFEST_DIR)
}

fn default_iteration_scale() -> f64 {
    crate::defaults::DEFAULT_ITERATION_SCALE
}

fn default_enable_color() -> bool {
    crate::defaults::DEFAULT_ENABLE_COLOR
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = HarnessConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.redis_password, "YourStrongPassword");
        assert_eq!(config.vault_token, "root");
        assert_eq!(config.vault_addr, "http://127.0.0.1:8200");
    }

    #[test]
    fn test_empty_host_invalid() {
        let config = HarnessConfig {
            redis_host: "  ".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_vault_addr_scheme_checked() {
        let mut config = HarnessConfig::default();
        config.vault_addr = "ftp://127.0.0.1:8200".to_string();
        assert!(config.validate().is_err());

        config.vault_addr = "not a url".to_string();
        assert!(config.validate().is_err());

        config.vault_addr = "https://vault.internal:8200".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_iteration_scale_bounds() {
        let mut config = HarnessConfig::default();
        config.iteration_scale = 0.0;
        assert!(config.validate().is_err());
        config.iteration_scale = 1.5;
        assert!(config.validate().is_err());
        config.iteration_scale = 0.1;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_scaled_iterations() {
        let mut config = HarnessConfig::default();
        assert_eq!(config.scaled(1000), 1000);

        config.iteration_scale = 0.1;
        assert_eq!(config.scaled(1000), 100);
        assert_eq!(config.scaled(5), 1);
        assert_eq!(config.scaled(1), 1);
    }

    #[test]
    fn test_manifest_path() {
        let config = HarnessConfig {
            manifest_dir: PathBuf::from("/tmp/manifests"),
            ..Default::default()
        };
        assert_eq!(
            config.manifest_path(crate::defaults::REDIS_MANIFEST),
            PathBuf::from("/tmp/manifests/redis/redis-master.yaml")
        );
    }

    #[test]
    fn test_zero_readiness_timeout_invalid() {
        let config = HarnessConfig {
            readiness_timeout_seconds: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
