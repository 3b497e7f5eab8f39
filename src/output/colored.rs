//! Colored formatter implementation with terminal color support

use super::formatter::{
    fmt_err, format_duration, report_columns, report_rows, FormattingOptions, OutputFormatter, PlainFormatter,
};
use crate::{
    error::Result,
    models::{LatencyReport, MemoryReport},
    probes::{ProbeOutcome, SuiteReport},
    types::{PerformanceLevel, ProbeStatus, SuiteKind},
};
use colored::*;
use std::fmt::Write as _;

impl PerformanceLevel {
    /// Get color for this performance level
    pub fn color(&self) -> Color {
        match self {
            Self::Good => Color::Green,
            Self::Moderate => Color::Yellow,
            Self::Poor => Color::Red,
        }
    }

    /// Get descriptive text
    pub fn description(&self) -> &'static str {
        match self {
            Self::Good => "Good",
            Self::Moderate => "Near threshold",
            Self::Poor => "Over threshold",
        }
    }
}

/// Color scheme configuration
#[derive(Debug, Clone)]
pub struct ColorScheme {
    pub header: Color,
    pub success: Color,
    pub warning: Color,
    pub error: Color,
    pub info: Color,
    pub muted: Color,
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self {
            header: Color::Blue,
            success: Color::Green,
            warning: Color::Yellow,
            error: Color::Red,
            info: Color::Cyan,
            muted: Color::BrightBlack,
        }
    }
}

/// Colored formatter implementation
pub struct ColoredFormatter {
    plain_formatter: PlainFormatter,
    options: FormattingOptions,
    color_scheme: ColorScheme,
}

impl ColoredFormatter {
    /// Create a new colored formatter with options
    pub fn new(options: FormattingOptions) -> Self {
        Self::with_color_scheme(options, ColorScheme::default())
    }

    /// Create a colored formatter with custom color scheme
    pub fn with_color_scheme(options: FormattingOptions, color_scheme: ColorScheme) -> Self {
        let plain_formatter = PlainFormatter::new(options.clone());
        Self {
            plain_formatter,
            options,
            color_scheme,
        }
    }

    /// Apply color to text if colors are enabled
    fn colorize(&self, text: &str, color: Color) -> ColoredString {
        if self.options.enable_color {
            text.color(color)
        } else {
            text.normal()
        }
    }

    fn status_color(&self, status: ProbeStatus) -> Color {
        match status {
            ProbeStatus::Passed => self.color_scheme.success,
            ProbeStatus::Failed => self.color_scheme.error,
            ProbeStatus::Skipped => self.color_scheme.muted,
        }
    }
}

impl OutputFormatter for ColoredFormatter {
    fn format_header(&self, title: &str) -> Result<String> {
        let mut output = String::new();
        let border = "═".repeat(title.chars().count() + 4);

        writeln!(output, "{}", self.colorize(&format!("╔{}╗", border), self.color_scheme.header)).map_err(fmt_err)?;
        writeln!(
            output,
            "{}",
            self.colorize(&format!("║  {}  ║", title), self.color_scheme.header).bold()
        )
        .map_err(fmt_err)?;
        write!(output, "{}", self.colorize(&format!("╚{}╝", border), self.color_scheme.header)).map_err(fmt_err)?;

        Ok(output)
    }

    fn format_suite_header(&self, suite: SuiteKind) -> Result<String> {
        Ok(format!(
            "\n{} {}",
            self.colorize("▶", self.color_scheme.info),
            self.colorize(&format!("Suite: {}", suite), self.color_scheme.header).bold()
        ))
    }

    fn format_latency(&self, report: &LatencyReport) -> Result<String> {
        let level = report.performance_level();
        let stats = &report.stats;
        let mut output = String::new();

        writeln!(
            output,
            "\n{} {}",
            self.colorize(&format!("{} Performance Results:", report.operation), self.color_scheme.info).bold(),
            self.colorize(&format!("[{}]", level.description()), level.color())
        )
        .map_err(fmt_err)?;
        writeln!(
            output,
            "Average time: {} seconds",
            self.colorize(&format!("{:.6}", stats.mean.as_secs_f64()), level.color())
        )
        .map_err(fmt_err)?;
        writeln!(output, "Max time: {:.6} seconds", stats.max.as_secs_f64()).map_err(fmt_err)?;
        write!(output, "Min time: {:.6} seconds", stats.min.as_secs_f64()).map_err(fmt_err)?;

        if self.options.verbose_mode {
            let extra = format!(
                "Std dev: {:.6} seconds | Samples: {} | Workers: {} | Threshold: {:.6} seconds",
                stats.std_dev.as_secs_f64(),
                stats.count,
                report.workers,
                report.threshold.as_secs_f64()
            );
            write!(output, "\n{}", self.colorize(&extra, self.color_scheme.muted)).map_err(fmt_err)?;
        }

        Ok(output)
    }

    fn format_memory(&self, report: &MemoryReport) -> Result<String> {
        let plain = self.plain_formatter.format_memory(report)?;
        let color = if report.passed() {
            self.color_scheme.success
        } else {
            self.color_scheme.error
        };

        // Highlight only the increase line
        Ok(plain
            .lines()
            .map(|line| {
                if line.starts_with("Memory increase") {
                    self.colorize(line, color).to_string()
                } else {
                    line.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join("\n"))
    }

    fn format_outcome(&self, outcome: &ProbeOutcome) -> Result<String> {
        let symbol = match outcome.status {
            ProbeStatus::Passed => "✓",
            ProbeStatus::Failed => "✗",
            ProbeStatus::Skipped => "-",
        };
        let color = self.status_color(outcome.status);

        let mut line = format!(
            "{} {} {}",
            self.colorize(symbol, color).bold(),
            outcome.qualified_name(),
            self.colorize(
                &format!("({})", format_duration(outcome.elapsed.as_secs_f64() * 1000.0)),
                self.color_scheme.muted
            )
        );
        if let Some(error) = &outcome.error {
            line.push_str(&format!("\n    {}", self.colorize(error, self.color_scheme.error)));
        }
        Ok(line)
    }

    fn format_report(&self, report: &SuiteReport) -> Result<String> {
        let mut output = String::new();

        writeln!(output, "\n{}", self.format_header("Probe Report")?).map_err(fmt_err)?;
        if report.outcomes().is_empty() {
            writeln!(output, "{}", self.colorize("No probes were run.", self.color_scheme.warning)).map_err(fmt_err)?;
        } else {
            let table = self.plain_formatter.create_table(&report_columns(), &report_rows(report));
            for line in table.lines() {
                let colored_line = if line.contains(" FAIL ") {
                    self.colorize(line, self.color_scheme.error).to_string()
                } else if line.contains(" SKIP ") {
                    self.colorize(line, self.color_scheme.muted).to_string()
                } else {
                    line.to_string()
                };
                writeln!(output, "{}", colored_line).map_err(fmt_err)?;
            }
        }

        let summary = format!(
            "Passed: {}  Failed: {}  Skipped: {}  Total time: {}",
            report.passed_count(),
            report.failed_count(),
            report.skipped_count(),
            format_duration(report.elapsed().as_secs_f64() * 1000.0)
        );
        let color = if report.all_passed() {
            self.color_scheme.success
        } else {
            self.color_scheme.error
        };
        write!(output, "{}", self.colorize(&summary, color).bold()).map_err(fmt_err)?;

        Ok(output)
    }

    fn format_error(&self, error: &str) -> Result<String> {
        Ok(format!("{} {}", self.colorize("✗", self.color_scheme.error).bold(), self.colorize(error, self.color_scheme.error)))
    }

    fn format_warning(&self, warning: &str) -> Result<String> {
        Ok(format!(
            "{} {}",
            self.colorize("⚠", self.color_scheme.warning).bold(),
            self.colorize(warning, self.color_scheme.warning)
        ))
    }

    fn format_success(&self, message: &str) -> Result<String> {
        Ok(format!(
            "{} {}",
            self.colorize("✓", self.color_scheme.success).bold(),
            self.colorize(message, self.color_scheme.success)
        ))
    }
}
