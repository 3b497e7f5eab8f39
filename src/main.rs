//! kvprobe - Redis/Vault integration probe CLI
//!
//! Runs manifest checks and functional, latency and cross-service probes
//! against a Redis cache and a HashiCorp Vault instance.

use clap::Parser;
use kv_vault_probe::{
    app::App,
    cli::Cli,
    config::{display_config_summary, load_config, EnvManager},
    error::{AppError, ErrorReporter, Result},
};
use std::process;

/// Exit code when the run completed but at least one probe failed
const EXIT_PROBES_FAILED: i32 = 6;

#[tokio::main]
async fn main() {
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panic: {}", panic_info);
        process::exit(1);
    }));

    let cli = Cli::parse();
    let reporter = ErrorReporter::new(cli.use_colors(), cli.verbose || cli.debug);

    if cli.is_info_only() {
        if let Err(e) = run_info(&cli) {
            reporter.report_error(&e);
            process::exit(e.exit_code());
        }
        return;
    }

    let result = match App::new(cli) {
        Ok(app) => app.run().await,
        Err(e) => Err(e),
    };

    match result {
        Ok(report) if report.all_passed() => process::exit(0),
        Ok(_) => process::exit(EXIT_PROBES_FAILED),
        Err(e) => {
            reporter.report_error(&e);
            process::exit(e.exit_code());
        }
    }
}

/// Handle flags that print information and exit
fn run_info(cli: &Cli) -> Result<()> {
    if cli.env_help {
        println!("{}", EnvManager::display_env_help());
    }

    if let Some(path) = &cli.write_env_example {
        EnvManager::save_example_env_file(path)?;
        println!("Wrote example environment file to {}", path.display());
    }

    if cli.show_config {
        cli.validate().map_err(AppError::config)?;
        let config = load_config(cli.clone())?;
        println!("{}", display_config_summary(&config));
    }

    Ok(())
}
