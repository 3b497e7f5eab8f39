//! Command-line interface

use crate::types::{ProvisionMode, SuiteKind};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// kvprobe - integration probes for a Redis cache and a Vault secrets manager
#[derive(Parser, Debug, Clone)]
#[command(name = "kvprobe")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Suite to run
    #[arg(short, long, value_enum, default_value_t = SuiteSelection::All)]
    pub suite: SuiteSelection,

    /// Use running services or start disposable containers
    #[arg(short, long, value_enum)]
    pub provision: Option<ProvisionMode>,

    /// Directory holding redis/ and vault/ manifests
    #[arg(long, value_name = "DIR")]
    pub manifest_dir: Option<PathBuf>,

    /// Seconds to wait for both services to become ready
    #[arg(long, value_name = "SECONDS", value_parser = parse_timeout)]
    pub readiness_timeout: Option<u64>,

    /// Scale performance iteration counts, in (0, 1]
    #[arg(long, value_name = "SCALE", value_parser = parse_scale)]
    pub iteration_scale: Option<f64>,

    /// Force colored output
    #[arg(long)]
    pub color: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Enable verbose output
    #[arg(long)]
    pub verbose: bool,

    /// Enable debug output
    #[arg(long)]
    pub debug: bool,

    /// Print the resolved configuration and exit
    #[arg(long)]
    pub show_config: bool,

    /// List supported environment variables and exit
    #[arg(long)]
    pub env_help: bool,

    /// Write an example .env file to PATH and exit
    #[arg(long, value_name = "PATH")]
    pub write_env_example: Option<PathBuf>,
}

/// Value of `--suite`
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SuiteSelection {
    All,
    Config,
    Functional,
    Performance,
    Integration,
}

impl SuiteSelection {
    /// Suites to run, in execution order
    pub fn suites(&self) -> Vec<SuiteKind> {
        match self {
            SuiteSelection::All => SuiteKind::ALL.to_vec(),
            SuiteSelection::Config => vec![SuiteKind::Config],
            SuiteSelection::Functional => vec![SuiteKind::Functional],
            SuiteSelection::Performance => vec![SuiteKind::Performance],
            SuiteSelection::Integration => vec![SuiteKind::Integration],
        }
    }
}

impl Cli {
    /// Validate CLI arguments for conflicts
    pub fn validate(&self) -> Result<(), String> {
        if self.color && self.no_color {
            return Err("Cannot specify both --color and --no-color".to_string());
        }

        Ok(())
    }

    /// Whether to emit colors, honoring flags before terminal detection
    pub fn use_colors(&self) -> bool {
        if self.color {
            true
        } else if self.no_color {
            false
        } else {
            supports_color()
        }
    }

    /// Whether the invocation only prints information and exits
    pub fn is_info_only(&self) -> bool {
        self.show_config || self.env_help || self.write_env_example.is_some()
    }
}

/// Parse readiness timeout seconds
fn parse_timeout(s: &str) -> Result<u64, String> {
    if s.starts_with('+') || s.starts_with("0x") || s.starts_with("0X") {
        return Err(format!("Invalid timeout: {}", s));
    }

    s.parse::<u64>()
        .map_err(|_| format!("Invalid timeout: {}", s))
        .and_then(|secs| {
            if secs == 0 {
                Err("Timeout must be greater than 0".to_string())
            } else if secs > 600 {
                Err("Timeout cannot exceed 600 seconds".to_string())
            } else {
                Ok(secs)
            }
        })
}

/// Parse an iteration scale in (0, 1]
fn parse_scale(s: &str) -> Result<f64, String> {
    let scale: f64 = s.parse().map_err(|_| format!("Invalid scale: {}", s))?;
    if scale > 0.0 && scale <= 1.0 {
        Ok(scale)
    } else {
        Err(format!("Scale must be in (0, 1], got: {}", s))
    }
}

/// Check if the terminal supports color output
fn supports_color() -> bool {
    if let Ok(term) = std::env::var("TERM") {
        if term == "dumb" {
            return false;
        }
    }

    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }

    if std::env::var("FORCE_COLOR").is_ok() {
        return true;
    }

    #[cfg(unix)]
    {
        true
    }
    #[cfg(not(unix))]
    {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["kvprobe"]);
        assert_eq!(cli.suite, SuiteSelection::All);
        assert!(cli.provision.is_none());
        assert!(cli.manifest_dir.is_none());
        assert!(!cli.verbose);
        assert!(!cli.is_info_only());
    }

    #[test]
    fn test_cli_parsing_all_options() {
        let cli = Cli::parse_from([
            "kvprobe",
            "--suite", "performance",
            "--provision", "containers",
            "--manifest-dir", "/tmp/k8s",
            "--readiness-timeout", "45",
            "--iteration-scale", "0.1",
            "--no-color",
            "--verbose",
            "--debug",
        ]);

        assert_eq!(cli.suite, SuiteSelection::Performance);
        assert_eq!(cli.provision, Some(ProvisionMode::Containers));
        assert_eq!(cli.manifest_dir, Some(PathBuf::from("/tmp/k8s")));
        assert_eq!(cli.readiness_timeout, Some(45));
        assert_eq!(cli.iteration_scale, Some(0.1));
        assert!(cli.no_color);
        assert!(!cli.use_colors());
        assert!(cli.verbose);
        assert!(cli.debug);
    }

    #[test]
    fn test_suite_selection_order() {
        assert_eq!(
            SuiteSelection::All.suites(),
            vec![SuiteKind::Config, SuiteKind::Functional, SuiteKind::Performance, SuiteKind::Integration]
        );
        assert_eq!(SuiteSelection::Integration.suites(), vec![SuiteKind::Integration]);
    }

    #[test]
    fn test_conflicting_color_flags() {
        let cli = Cli::parse_from(["kvprobe", "--color", "--no-color"]);
        assert!(cli.validate().is_err());
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(Cli::try_parse_from(["kvprobe", "--suite", "chaos"]).is_err());
        assert!(Cli::try_parse_from(["kvprobe", "--iteration-scale", "0"]).is_err());
        assert!(Cli::try_parse_from(["kvprobe", "--iteration-scale", "2.5"]).is_err());
        assert!(Cli::try_parse_from(["kvprobe", "--readiness-timeout", "0"]).is_err());
    }

    #[test]
    fn test_timeout_parsing() {
        assert_eq!(parse_timeout("30").unwrap(), 30);
        assert_eq!(parse_timeout("600").unwrap(), 600);
        assert!(parse_timeout("601").is_err());
        assert!(parse_timeout("+5").is_err());
        assert!(parse_timeout("abc").is_err());
    }

    #[test]
    fn test_info_only_flags() {
        assert!(Cli::parse_from(["kvprobe", "--env-help"]).is_info_only());
        assert!(Cli::parse_from(["kvprobe", "--write-env-example", ".env.example"]).is_info_only());
    }
}
