//! Main application orchestration and execution

use crate::{
    cli::Cli,
    config::{display_config_summary, load_config, validate_config},
    error::{AppError, Result},
    logging::LoggerFactory,
    output::{OutputCoordinator, OutputFormatterFactory},
    probes::{SuiteReport, SuiteRunner},
    provision::Provisioner,
    types::{ProvisionMode, SuiteKind},
};
use std::sync::Arc;

/// Main application struct that coordinates all components
pub struct App {
    cli: Cli,
}

impl App {
    /// Create a new application instance with CLI configuration
    pub fn new(cli: Cli) -> Result<Self> {
        cli.validate().map_err(AppError::config)?;
        Ok(Self { cli })
    }

    /// Run the selected suites and print the report.
    ///
    /// Probe failures are part of the returned report; `Err` means the run
    /// was aborted.
    pub async fn run(self) -> Result<SuiteReport> {
        let config = load_config(self.cli.clone())?;
        let use_color = config.enable_color && self.cli.use_colors();
        let suites = self.cli.suite.suites();

        println!("{} v{}", crate::PKG_NAME, crate::VERSION);

        let warnings = validate_config(&config)?;
        if !warnings.is_empty() {
            println!("\nConfiguration Warnings:");
            for warning in &warnings {
                println!("  {}", warning.format(use_color));
            }
        }

        if config.debug {
            println!("\nConfiguration Summary:");
            println!("{}", display_config_summary(&config));
        }

        let names: Vec<&str> = suites.iter().map(SuiteKind::name).collect();
        println!("\nSuites: {}", names.join(", "));
        if suites.iter().any(SuiteKind::needs_services) {
            match config.provision_mode {
                ProvisionMode::External => println!(
                    "Services: redis at {}:{}, vault at {}",
                    config.redis_host, config.redis_port, config.vault_addr
                ),
                ProvisionMode::Containers => println!("Services: disposable containers"),
            }
        }

        let loggers = LoggerFactory::new(config.clone());
        let provisioner = Provisioner::new(config.clone(), loggers.create_service_logger().await)
            .with_cleanup_logger(loggers.create_cleanup_logger().await);
        let runner = SuiteRunner::new(config.clone(), Arc::new(provisioner), loggers.create_probe_logger().await)
            .with_output(OutputFormatterFactory::create_formatter(use_color, config.verbose));

        let report = match runner.run(&suites).await {
            Ok(report) => report,
            Err(e) => {
                loggers.create_cleanup_logger().await.fatal(&e).await;
                return Err(e);
            }
        };

        let coordinator = OutputCoordinator::new(OutputFormatterFactory::create_formatter(use_color, config.verbose));
        println!("{}", coordinator.display_report(&report)?);

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_conflicting_color_flags_rejected() {
        let cli = Cli::parse_from(["kvprobe", "--color", "--no-color"]);
        match App::new(cli) {
            Err(e) => assert_eq!(e.category(), "CONFIG"),
            Ok(_) => panic!("conflicting flags should be rejected"),
        }
    }

    #[test]
    fn test_app_accepts_defaults() {
        assert!(App::new(Cli::parse_from(["kvprobe"])).is_ok());
    }
}
