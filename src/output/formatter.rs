//! Core formatting trait and the plain text implementation

use crate::{
    error::{AppError, Result},
    models::{LatencyReport, MemoryReport},
    probes::{ProbeDetail, ProbeOutcome, SuiteReport},
    types::SuiteKind,
};
use std::fmt::Write as _;

/// Main trait for output formatting
pub trait OutputFormatter: Send + Sync {
    /// Format a header section
    fn format_header(&self, title: &str) -> Result<String>;

    /// Banner printed before a suite starts
    fn format_suite_header(&self, suite: SuiteKind) -> Result<String>;

    /// Summary statistics of a latency probe
    fn format_latency(&self, report: &LatencyReport) -> Result<String>;

    /// Memory growth of the bulk-insert probe
    fn format_memory(&self, report: &MemoryReport) -> Result<String>;

    /// One-line result of a probe
    fn format_outcome(&self, outcome: &ProbeOutcome) -> Result<String>;

    /// Final pass/fail report
    fn format_report(&self, report: &SuiteReport) -> Result<String>;

    /// Format error messages
    fn format_error(&self, error: &str) -> Result<String>;

    /// Format warning messages
    fn format_warning(&self, warning: &str) -> Result<String>;

    /// Format success messages
    fn format_success(&self, message: &str) -> Result<String>;
}

/// Configuration options for formatting
#[derive(Debug, Clone)]
pub struct FormattingOptions {
    /// Enable colored output
    pub enable_color: bool,
    /// Show standard deviation, worker counts and notes
    pub verbose_mode: bool,
    /// Show table borders
    pub table_borders: bool,
}

impl Default for FormattingOptions {
    fn default() -> Self {
        Self {
            enable_color: true,
            verbose_mode: false,
            table_borders: true,
        }
    }
}

/// Text alignment options
#[derive(Debug, Clone, Copy)]
pub enum Alignment {
    Left,
    Right,
}

/// Column definition for table formatting
#[derive(Debug, Clone)]
pub struct Column {
    pub header: &'static str,
    pub alignment: Alignment,
    pub max_width: usize,
}

/// Row data for table formatting
pub type RowData = Vec<String>;

pub(crate) fn fmt_err(e: std::fmt::Error) -> AppError {
    AppError::io(format!("Failed to format output: {}", e))
}

/// Columns of the final report table
pub(crate) fn report_columns() -> Vec<Column> {
    vec![
        Column { header: "Suite", alignment: Alignment::Left, max_width: 12 },
        Column { header: "Probe", alignment: Alignment::Left, max_width: 28 },
        Column { header: "Status", alignment: Alignment::Left, max_width: 6 },
        Column { header: "Time", alignment: Alignment::Right, max_width: 10 },
        Column { header: "Detail", alignment: Alignment::Left, max_width: 60 },
    ]
}

/// Format duration in human-readable format
pub(crate) fn format_duration(duration_ms: f64) -> String {
    if duration_ms < 1.0 {
        format!("{:.2}μs", duration_ms * 1000.0)
    } else if duration_ms < 1000.0 {
        format!("{:.1}ms", duration_ms)
    } else if duration_ms < 60000.0 {
        format!("{:.2}s", duration_ms / 1000.0)
    } else {
        let minutes = (duration_ms / 60000.0) as u32;
        let seconds = (duration_ms % 60000.0) / 1000.0;
        format!("{}m{:.1}s", minutes, seconds)
    }
}

/// Short description of an outcome for the report's detail column
pub(crate) fn outcome_detail(outcome: &ProbeOutcome) -> String {
    if let Some(error) = &outcome.error {
        return error.clone();
    }
    match &outcome.detail {
        Some(ProbeDetail::Latency(r)) => format!(
            "mean {} (< {})",
            format_duration(r.stats.mean.as_secs_f64() * 1000.0),
            format_duration(r.threshold.as_secs_f64() * 1000.0)
        ),
        Some(ProbeDetail::Memory(r)) => format!("+{:.2} MB for {} keys", r.increase_mb(), r.key_count),
        Some(ProbeDetail::Note(note)) => note.clone(),
        None => String::new(),
    }
}

pub(crate) fn report_rows(report: &SuiteReport) -> Vec<RowData> {
    report
        .outcomes()
        .iter()
        .map(|o| {
            vec![
                o.suite.name().to_string(),
                o.probe.clone(),
                o.status.as_str().to_string(),
                format_duration(o.elapsed.as_secs_f64() * 1000.0),
                outcome_detail(o),
            ]
        })
        .collect()
}

/// Plain text formatter implementation
pub struct PlainFormatter {
    options: FormattingOptions,
}

impl PlainFormatter {
    /// Create a new plain formatter with options
    pub fn new(options: FormattingOptions) -> Self {
        Self { options }
    }

    /// Create a table with the given columns and data
    pub(crate) fn create_table(&self, columns: &[Column], rows: &[RowData]) -> String {
        if rows.is_empty() {
            return String::new();
        }

        let widths = calculate_column_widths(columns, rows);
        let borders = self.options.table_borders;
        let mut output = String::new();

        if borders {
            output.push_str(&horizontal_border(&widths));
            output.push('\n');
        }
        let headers: Vec<String> = columns.iter().map(|c| c.header.to_string()).collect();
        output.push_str(&create_row(&headers, &widths, columns, borders));
        output.push('\n');
        if borders {
            output.push_str(&horizontal_border(&widths));
            output.push('\n');
        }

        for row in rows {
            output.push_str(&create_row(row, &widths, columns, borders));
            output.push('\n');
        }

        if borders {
            output.push_str(&horizontal_border(&widths));
        }

        output.trim_end().to_string()
    }
}

fn calculate_column_widths(columns: &[Column], rows: &[RowData]) -> Vec<usize> {
    columns
        .iter()
        .enumerate()
        .map(|(idx, col)| {
            let content = rows
                .iter()
                .filter_map(|r| r.get(idx))
                .map(|cell| cell.chars().count())
                .max()
                .unwrap_or(0);
            content.max(col.header.len()).min(col.max_width)
        })
        .collect()
}

fn create_row(data: &[String], widths: &[usize], columns: &[Column], borders: bool) -> String {
    let mut row = String::new();
    if borders {
        row.push('|');
    }

    for ((cell, &width), col) in data.iter().zip(widths).zip(columns) {
        if borders {
            row.push(' ');
        }
        row.push_str(&align_text(cell, width, col.alignment));
        if borders {
            row.push_str(" |");
        } else {
            row.push_str("  ");
        }
    }

    row.trim_end().to_string()
}

fn horizontal_border(widths: &[usize]) -> String {
    let mut border = String::from("+");
    for &width in widths {
        border.push_str(&"-".repeat(width + 2));
        border.push('+');
    }
    border
}

/// Pad or truncate to `width` characters
fn align_text(text: &str, width: usize, alignment: Alignment) -> String {
    let len = text.chars().count();
    if len >= width {
        return text.chars().take(width).collect();
    }

    let padding = " ".repeat(width - len);
    match alignment {
        Alignment::Left => format!("{}{}", text, padding),
        Alignment::Right => format!("{}{}", padding, text),
    }
}

impl OutputFormatter for PlainFormatter {
    fn format_header(&self, title: &str) -> Result<String> {
        let mut output = String::new();
        let border = "=".repeat(title.len() + 4);

        writeln!(output, "{}", border).map_err(fmt_err)?;
        writeln!(output, "  {}  ", title).map_err(fmt_err)?;
        write!(output, "{}", border).map_err(fmt_err)?;

        Ok(output)
    }

    fn format_suite_header(&self, suite: SuiteKind) -> Result<String> {
        let title = format!("Suite: {}", suite);
        Ok(format!("\n{}\n{}", title, "-".repeat(title.len())))
    }

    fn format_latency(&self, report: &LatencyReport) -> Result<String> {
        let mut output = String::new();
        let stats = &report.stats;

        writeln!(output, "\n{} Performance Results:", report.operation).map_err(fmt_err)?;
        writeln!(output, "Average time: {:.6} seconds", stats.mean.as_secs_f64()).map_err(fmt_err)?;
        writeln!(output, "Max time: {:.6} seconds", stats.max.as_secs_f64()).map_err(fmt_err)?;
        write!(output, "Min time: {:.6} seconds", stats.min.as_secs_f64()).map_err(fmt_err)?;

        if self.options.verbose_mode {
            write!(
                output,
                "\nStd dev: {:.6} seconds | Samples: {} | Workers: {} | Threshold: {:.6} seconds",
                stats.std_dev.as_secs_f64(),
                stats.count,
                report.workers,
                report.threshold.as_secs_f64()
            )
            .map_err(fmt_err)?;
        }

        Ok(output)
    }

    fn format_memory(&self, report: &MemoryReport) -> Result<String> {
        let mut output = String::new();
        let mb = |bytes: u64| bytes as f64 / 1024.0 / 1024.0;

        writeln!(output, "\nMemory Usage Results:").map_err(fmt_err)?;
        writeln!(output, "Initial memory: {:.2} MB", mb(report.initial_bytes)).map_err(fmt_err)?;
        writeln!(output, "Final memory: {:.2} MB", mb(report.final_bytes)).map_err(fmt_err)?;
        write!(output, "Memory increase: {:.2} MB", report.increase_mb()).map_err(fmt_err)?;

        Ok(output)
    }

    fn format_outcome(&self, outcome: &ProbeOutcome) -> Result<String> {
        let mut line = format!(
            "[{}] {} ({})",
            outcome.status.as_str(),
            outcome.qualified_name(),
            format_duration(outcome.elapsed.as_secs_f64() * 1000.0)
        );
        if let Some(error) = &outcome.error {
            line.push_str(&format!(": {}", error));
        } else if self.options.verbose_mode {
            if let Some(ProbeDetail::Note(note)) = &outcome.detail {
                line.push_str(&format!(": {}", note));
            }
        }
        Ok(line)
    }

    fn format_report(&self, report: &SuiteReport) -> Result<String> {
        let mut output = String::new();

        writeln!(output, "{}", self.format_header("Probe Report")?).map_err(fmt_err)?;
        if report.outcomes().is_empty() {
            writeln!(output, "No probes were run.").map_err(fmt_err)?;
        } else {
            writeln!(output, "{}", self.create_table(&report_columns(), &report_rows(report))).map_err(fmt_err)?;
        }
        write!(
            output,
            "Passed: {}  Failed: {}  Skipped: {}  Total time: {}",
            report.passed_count(),
            report.failed_count(),
            report.skipped_count(),
            format_duration(report.elapsed().as_secs_f64() * 1000.0)
        )
        .map_err(fmt_err)?;

        Ok(output)
    }

    fn format_error(&self, error: &str) -> Result<String> {
        Ok(format!("ERROR: {}", error))
    }

    fn format_warning(&self, warning: &str) -> Result<String> {
        Ok(format!("WARNING: {}", warning))
    }

    fn format_success(&self, message: &str) -> Result<String> {
        Ok(format!("SUCCESS: {}", message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::LatencyStats;
    use std::time::Duration;

    fn plain() -> PlainFormatter {
        PlainFormatter::new(FormattingOptions {
            enable_color: false,
            ..Default::default()
        })
    }

    fn sample_report() -> SuiteReport {
        let stats = LatencyStats::from_durations(vec![Duration::from_micros(200), Duration::from_micros(400)]);
        let latency = LatencyReport::new("cache_set", stats, Duration::from_millis(1), 1);

        let mut report = SuiteReport::new();
        report.push(ProbeOutcome::passed(
            SuiteKind::Performance,
            "cache_set",
            Some(ProbeDetail::Latency(latency)),
            Duration::from_millis(3),
        ));
        report.push(ProbeOutcome::failed(
            SuiteKind::Config,
            "redis_version",
            None,
            &AppError::assertion("image 'redis:7.0' does not contain 'redis:7.2.4'"),
            Duration::from_micros(20),
        ));
        report
    }

    #[test]
    fn test_latency_lines() {
        let stats = LatencyStats::from_durations(vec![Duration::from_micros(250), Duration::from_micros(750)]);
        let report = LatencyReport::new("SET", stats, Duration::from_millis(1), 1);
        let text = plain().format_latency(&report).unwrap();

        assert!(text.contains("Average time: 0.000500 seconds"));
        assert!(text.contains("Max time: 0.000750 seconds"));
        assert!(text.contains("Min time: 0.000250 seconds"));
        assert!(!text.contains("Std dev"));
    }

    #[test]
    fn test_memory_lines() {
        let report = MemoryReport {
            initial_bytes: 1024 * 1024,
            final_bytes: 12 * 1024 * 1024,
            key_count: 10_000,
            value_bytes: 1000,
            limit_bytes: 100 * 1024 * 1024,
        };
        let text = plain().format_memory(&report).unwrap();
        assert!(text.contains("Initial memory: 1.00 MB"));
        assert!(text.contains("Memory increase: 11.00 MB"));
    }

    #[test]
    fn test_outcome_line() {
        let report = sample_report();
        let line = plain().format_outcome(&report.outcomes()[1]).unwrap();
        assert!(line.starts_with("[FAIL] config::redis_version"));
        assert!(line.contains("does not contain"));
    }

    #[test]
    fn test_report_table_and_totals() {
        let text = plain().format_report(&sample_report()).unwrap();
        assert!(text.contains("Probe Report"));
        assert!(text.contains("| Suite"));
        assert!(text.contains("cache_set"));
        assert!(text.contains("mean 300.00μs"));
        assert!(text.contains("Passed: 1  Failed: 1  Skipped: 0"));
    }

    #[test]
    fn test_empty_report() {
        let text = plain().format_report(&SuiteReport::new()).unwrap();
        assert!(text.contains("No probes were run."));
    }

    #[test]
    fn test_align_and_truncate() {
        assert_eq!(align_text("ab", 4, Alignment::Right), "  ab");
        assert_eq!(align_text("abcdef", 3, Alignment::Left), "abc");
        assert_eq!(format_duration(0.5), "500.00μs");
        assert_eq!(format_duration(1500.0), "1.50s");
    }
}
