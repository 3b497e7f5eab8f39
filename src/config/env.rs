//! Environment variable handling and .env file management

use crate::error::{AppError, Result};
use crate::types::ProvisionMode;
use std::path::Path;

/// Environment variable configuration manager
pub struct EnvManager;

impl EnvManager {
    /// Load .env from the current directory if it exists
    pub fn load_env_file(debug: bool) -> Result<()> {
        Self::load_env_file_from(Path::new(".env"), debug)
    }

    /// Load a specific .env file if it exists; existing variables win
    pub fn load_env_file_from(path: &Path, debug: bool) -> Result<()> {
        if path.exists() {
            dotenv::from_path(path)
                .map_err(|e| AppError::config(format!("Failed to load {}: {}", path.display(), e)))?;

            if debug {
                println!("Loaded configuration from {}", path.display());
            }
        } else if debug {
            println!("No {} file found, using defaults and CLI arguments", path.display());
        }

        Ok(())
    }

    /// Create example .env file content
    pub fn create_example_env_content() -> String {
        r#"# kvprobe configuration
#
# Values here are used as defaults and can be overridden by command-line
# arguments. The credentials below are development fixtures matching the
# manifests under deploy/kubernetes, not values to reuse elsewhere.

# Redis connection
# REDIS_HOST=127.0.0.1
# REDIS_PORT=6379
# REDIS_PASSWORD=YourStrongPassword

# Vault connection
# VAULT_ADDR=http://127.0.0.1:8200
# VAULT_DEV_ROOT_TOKEN_ID=root
# VAULT_KV_MOUNT=secret

# Seconds to wait for both services before giving up
# READINESS_TIMEOUT_SECONDS=30

# Where redis/redis-master.yaml and vault/vault-config.yaml live
# MANIFEST_DIR=deploy/kubernetes

# external (use running services) or containers (start disposable ones)
# PROVISION_MODE=external

# Scale performance iteration counts for smoke runs, in (0, 1]
# PROBE_ITERATION_SCALE=1.0

# Enable colored output (true/false)
# ENABLE_COLOR=true
"#
        .to_string()
    }

    /// Save example .env file to disk
    pub fn save_example_env_file(path: &Path) -> Result<()> {
        let content = Self::create_example_env_content();
        std::fs::write(path, content)
            .map_err(|e| AppError::config(format!("Failed to write example .env file: {}", e)))?;

        Ok(())
    }

    /// Validate environment variable format before parsing
    pub fn validate_env_var(key: &str, value: &str) -> Result<()> {
        match key {
            "REDIS_HOST" => {
                if value.trim().is_empty() {
                    return Err(AppError::config("REDIS_HOST cannot be empty"));
                }
            }
            "REDIS_PORT" => {
                let port: u16 = value.trim().parse()
                    .map_err(|e| AppError::config(format!("Invalid REDIS_PORT value '{}': {}", value, e)))?;
                if port == 0 {
                    return Err(AppError::config("REDIS_PORT must be greater than 0"));
                }
            }
            "VAULT_ADDR" => {
                let parsed = url::Url::parse(value.trim())
                    .map_err(|e| AppError::config(format!("Invalid VAULT_ADDR value '{}': {}", value, e)))?;
                if parsed.scheme() != "http" && parsed.scheme() != "https" {
                    return Err(AppError::config(format!("VAULT_ADDR must use http or https: {}", value)));
                }
            }
            "VAULT_DEV_ROOT_TOKEN_ID" => {
                if value.is_empty() {
                    return Err(AppError::config("VAULT_DEV_ROOT_TOKEN_ID cannot be empty"));
                }
            }
            "READINESS_TIMEOUT_SECONDS" => {
                let secs: u64 = value.trim().parse()
                    .map_err(|e| AppError::config(format!("Invalid READINESS_TIMEOUT_SECONDS value '{}': {}", value, e)))?;
                if secs == 0 || secs > 600 {
                    return Err(AppError::config(format!(
                        "READINESS_TIMEOUT_SECONDS must be between 1 and 600, got: {}",
                        secs
                    )));
                }
            }
            "PROVISION_MODE" => {
                value.parse::<ProvisionMode>()?;
            }
            "PROBE_ITERATION_SCALE" => {
                let scale: f64 = value.trim().parse()
                    .map_err(|e| AppError::config(format!("Invalid PROBE_ITERATION_SCALE value '{}': {}", value, e)))?;
                if !(scale > 0.0 && scale <= 1.0) {
                    return Err(AppError::config(format!("PROBE_ITERATION_SCALE must be in (0, 1], got: {}", scale)));
                }
            }
            "ENABLE_COLOR" => {
                value.trim().parse::<bool>()
                    .map_err(|e| AppError::config(format!("Invalid ENABLE_COLOR value '{}': {}", value, e)))?;
            }
            _ => {}
        }

        Ok(())
    }

    /// All supported environment variables with descriptions and examples
    pub fn get_supported_env_vars() -> Vec<(&'static str, &'static str, &'static str)> {
        vec![
            ("REDIS_HOST", "Redis host name or address", "127.0.0.1"),
            ("REDIS_PORT", "Redis port", "6379"),
            ("REDIS_PASSWORD", "Redis password", "YourStrongPassword"),
            ("VAULT_ADDR", "Vault address (http or https)", "http://127.0.0.1:8200"),
            ("VAULT_DEV_ROOT_TOKEN_ID", "Vault token", "root"),
            ("VAULT_KV_MOUNT", "Mount path of the KV v2 engine", "secret"),
            ("READINESS_TIMEOUT_SECONDS", "Readiness wait in seconds (1-600)", "30"),
            ("MANIFEST_DIR", "Directory holding the Kubernetes manifests", "deploy/kubernetes"),
            ("PROVISION_MODE", "external or containers", "external"),
            ("PROBE_ITERATION_SCALE", "Performance iteration scale (0-1]", "1.0"),
            ("ENABLE_COLOR", "Enable colored output", "true"),
        ]
    }

    /// Render environment variable help
    pub fn display_env_help() -> String {
        let mut help = String::new();
        help.push_str("Supported Environment Variables:\n\n");

        for (var, description, example) in Self::get_supported_env_vars() {
            help.push_str(&format!("  {:<26} {}\n", var, description));
            help.push_str(&format!("  {:<26} Example: {}\n\n", "", example));
        }

        help.push_str("Configuration Priority (highest to lowest):\n");
        help.push_str("  1. Command-line arguments\n");
        help.push_str("  2. Environment variables\n");
        help.push_str("  3. .env file values\n");
        help.push_str("  4. Default values\n");

        help
    }

    /// Validate all currently set environment variables
    pub fn validate_current_env() -> Vec<String> {
        let mut warnings = Vec::new();

        for (var_name, _, _) in Self::get_supported_env_vars() {
            if let Ok(value) = std::env::var(var_name) {
                if let Err(e) = Self::validate_env_var(var_name, &value) {
                    warnings.push(format!("Warning: {}", e));
                }
            }
        }

        warnings
    }

    /// Validate the contents of a .env file without loading it
    pub fn check_env_file(path: &Path) -> Result<Option<Vec<String>>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::config(format!("Failed to read {}: {}", path.display(), e)))?;

        let mut warnings = Vec::new();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                let key = key.trim();
                let value = value.trim().trim_matches('"');

                if let Err(e) = Self::validate_env_var(key, value) {
                    warnings.push(format!("Line '{}': {}", line, e));
                }
            }
        }

        Ok(Some(warnings))
    }
}
