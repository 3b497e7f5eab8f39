//! Output formatting and display system
//!
//! Plain and colored renderings of latency summaries, probe outcomes and the
//! final pass/fail report.

mod colored;
mod formatter;

pub use self::colored::{ColorScheme, ColoredFormatter};
pub use self::formatter::{Alignment, Column, FormattingOptions, OutputFormatter, PlainFormatter, RowData};

use crate::{error::Result, probes::SuiteReport};

/// Output formatting factory for creating appropriate formatters
pub struct OutputFormatterFactory;

impl OutputFormatterFactory {
    /// Create a formatter based on color support and preferences
    pub fn create_formatter(enable_color: bool, verbose: bool) -> Box<dyn OutputFormatter> {
        let options = FormattingOptions {
            enable_color,
            verbose_mode: verbose,
            table_borders: true,
        };

        if enable_color {
            Box::new(ColoredFormatter::new(options))
        } else {
            Box::new(PlainFormatter::new(options))
        }
    }

    /// Create a plain text formatter for scripts/logs
    pub fn create_plain_formatter() -> Box<dyn OutputFormatter> {
        Self::create_formatter(false, false)
    }
}

/// Renders the end-of-run report and status line
pub struct OutputCoordinator {
    formatter: Box<dyn OutputFormatter>,
}

impl OutputCoordinator {
    pub fn new(formatter: Box<dyn OutputFormatter>) -> Self {
        Self { formatter }
    }

    /// Final report followed by a one-line verdict
    pub fn display_report(&self, report: &SuiteReport) -> Result<String> {
        let mut output = self.formatter.format_report(report)?;
        output.push('\n');

        let verdict = if report.all_passed() {
            self.formatter.format_success(&format!("All {} probes passed", report.passed_count()))?
        } else {
            self.formatter
                .format_error(&format!("{} of {} probes failed", report.failed_count(), report.outcomes().len()))?
        };
        output.push_str(&verdict);

        Ok(output)
    }

    pub fn display_warning(&self, warning: &str) -> Result<String> {
        self.formatter.format_warning(warning)
    }

    pub fn display_error(&self, error: &str) -> Result<String> {
        self.formatter.format_error(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::probes::ProbeOutcome;
    use crate::types::SuiteKind;
    use std::time::Duration;

    #[test]
    fn test_plain_verdicts() {
        let coordinator = OutputCoordinator::new(OutputFormatterFactory::create_plain_formatter());

        let mut report = SuiteReport::new();
        report.push(ProbeOutcome::passed(SuiteKind::Functional, "cache_connection", None, Duration::ZERO));
        assert!(coordinator.display_report(&report).unwrap().ends_with("SUCCESS: All 1 probes passed"));

        report.push(ProbeOutcome::failed(
            SuiteKind::Functional,
            "secrets_connection",
            None,
            &AppError::secrets("permission denied"),
            Duration::ZERO,
        ));
        assert!(coordinator.display_report(&report).unwrap().ends_with("ERROR: 1 of 2 probes failed"));
    }

    #[test]
    fn test_factory_picks_formatter() {
        let plain = OutputFormatterFactory::create_formatter(false, false);
        assert_eq!(plain.format_warning("x").unwrap(), "WARNING: x");
    }
}
