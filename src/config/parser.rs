//! Configuration parsing from CLI arguments and environment variables

use crate::{
    cli::Cli,
    config::env::EnvManager,
    error::Result,
    models::HarnessConfig,
};

/// Builds a `HarnessConfig` from defaults, .env, the environment and CLI flags
pub struct ConfigParser {
    cli: Cli,
}

impl ConfigParser {
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Parse and build the complete configuration
    pub fn parse(&self) -> Result<HarnessConfig> {
        let mut config = HarnessConfig::default();

        EnvManager::load_env_file(self.cli.debug)?;
        config.merge_from_env()?;
        self.apply_cli_overrides(&mut config);

        config.validate()?;

        Ok(config)
    }

    /// Apply CLI argument overrides to configuration
    fn apply_cli_overrides(&self, config: &mut HarnessConfig) {
        if let Some(mode) = self.cli.provision {
            config.provision_mode = mode;
        }

        if let Some(ref dir) = self.cli.manifest_dir {
            config.manifest_dir = dir.clone();
        }

        if let Some(secs) = self.cli.readiness_timeout {
            config.readiness_timeout_seconds = secs;
        }

        if let Some(scale) = self.cli.iteration_scale {
            config.iteration_scale = scale;
        }

        if self.cli.color {
            config.enable_color = true;
        } else if self.cli.no_color {
            config.enable_color = false;
        }

        // CLI-only
        config.verbose = self.cli.verbose;
        config.debug = self.cli.debug;

        if config.debug {
            println!("Applied CLI overrides to configuration");
        }
    }
}

/// Load complete configuration from CLI arguments
pub fn load_config(cli: Cli) -> Result<HarnessConfig> {
    ConfigParser::new(cli).parse()
}

/// Configuration summary with secrets masked
pub fn display_config_summary(config: &HarnessConfig) -> String {
    let mut summary = Vec::new();

    summary.push(format!("Redis: {}:{}", config.redis_host, config.redis_port));
    summary.push(format!("Redis password: {}", mask(&config.redis_password)));
    summary.push(format!("Vault: {}", config.vault_addr));
    summary.push(format!("Vault token: {}", mask(&config.vault_token)));
    summary.push(format!("KV mount: {}", config.vault_kv_mount));
    summary.push(format!("Provision mode: {:?}", config.provision_mode));
    summary.push(format!("Readiness timeout: {}s", config.readiness_timeout_seconds));
    summary.push(format!("Manifest dir: {}", config.manifest_dir.display()));
    summary.push(format!("Iteration scale: {}", config.iteration_scale));
    summary.push(format!("Color Output: {}", config.enable_color));
    summary.push(format!("Verbose: {}", config.verbose));
    summary.push(format!("Debug: {}", config.debug));

    summary.join("\n")
}

fn mask(secret: &str) -> String {
    let len = secret.chars().count();
    match secret.chars().next() {
        Some(first) if len > 2 => format!("{}{}", first, "*".repeat(len - 1)),
        _ => "*".repeat(len),
    }
}
