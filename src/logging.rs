//! Structured logging for the probe harness
//!
//! - Leveled entries with structured fields and correlation ids
//! - Console, JSON and compact output formats
//! - Specialized loggers for probe timing, service readiness and teardown

use crate::error::{AppError, Result};
use crate::models::{HarnessConfig, LatencyReport, MemoryReport};
use crate::types::{ServiceKind, SuiteKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Log level enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
    /// Errors that abort the run
    Fatal = 5,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Fatal => "FATAL",
        }
    }

    /// ANSI color code for console output
    pub fn color_code(&self) -> &'static str {
        match self {
            LogLevel::Trace => "\x1b[37m",
            LogLevel::Debug => "\x1b[36m",
            LogLevel::Info => "\x1b[32m",
            LogLevel::Warn => "\x1b[33m",
            LogLevel::Error => "\x1b[31m",
            LogLevel::Fatal => "\x1b[35m",
        }
    }

    pub fn reset_code() -> &'static str {
        "\x1b[0m"
    }

    /// Level implied by the verbosity flags
    pub fn for_flags(verbose: bool, debug: bool) -> Self {
        if debug {
            LogLevel::Debug
        } else if verbose {
            LogLevel::Info
        } else {
            LogLevel::Warn
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "TRACE" => Ok(LogLevel::Trace),
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARN" | "WARNING" => Ok(LogLevel::Warn),
            "ERROR" => Ok(LogLevel::Error),
            "FATAL" => Ok(LogLevel::Fatal),
            _ => Err(AppError::parse(format!("Invalid log level: {}", s))),
        }
    }
}

/// A structured log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    /// Logger name/component
    pub logger: String,
    /// Correlation ID tying together the entries of one probe
    pub correlation_id: Option<String>,
    pub fields: BTreeMap<String, serde_json::Value>,
    pub location: Option<LogLocation>,
}

/// Source code location information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogLocation {
    pub file: String,
    pub line: u32,
    pub module: Option<String>,
}

/// Log output format options
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogFormat {
    /// Human-readable console format
    Console,
    /// One JSON object per line
    Json,
    /// Compact single-line format
    Compact,
}

/// Shared logging context for correlation and session tracking
#[derive(Debug, Default)]
struct LogContext {
    session_id: Option<String>,
    current_correlation_id: Option<String>,
    context_fields: BTreeMap<String, serde_json::Value>,
}

/// Logger with multiple output formats
#[derive(Clone)]
pub struct Logger {
    min_level: LogLevel,
    use_color: bool,
    include_location: bool,
    format: LogFormat,
    name: String,
    context: Arc<RwLock<LogContext>>,
}

impl Logger {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            min_level: LogLevel::Info,
            use_color: true,
            include_location: false,
            format: LogFormat::Console,
            name: name.into(),
            context: Arc::new(RwLock::new(LogContext::default())),
        }
    }

    /// Logger configured from the harness flags
    pub fn with_config(name: impl Into<String>, config: &HarnessConfig) -> Self {
        Self {
            min_level: LogLevel::for_flags(config.verbose, config.debug),
            use_color: config.enable_color,
            include_location: config.debug,
            format: if config.debug { LogFormat::Json } else { LogFormat::Console },
            name: name.into(),
            context: Arc::new(RwLock::new(LogContext::default())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_level(&mut self, level: LogLevel) {
        self.min_level = level;
    }

    pub fn set_format(&mut self, format: LogFormat) {
        self.format = format;
    }

    pub fn set_color(&mut self, use_color: bool) {
        self.use_color = use_color;
    }

    pub async fn set_session_id(&self, session_id: String) {
        let mut context = self.context.write().await;
        context.session_id = Some(session_id);
    }

    pub async fn session_id(&self) -> Option<String> {
        self.context.read().await.session_id.clone()
    }

    /// Add a field to every subsequent entry
    pub async fn add_context_field<T: Serialize>(&self, key: String, value: T) {
        if let Ok(json_value) = serde_json::to_value(value) {
            let mut context = self.context.write().await;
            context.context_fields.insert(key, json_value);
        }
    }

    /// Start a correlated operation and return its id
    pub async fn start_operation(&self, operation_name: &str) -> String {
        let correlation_id = Uuid::new_v4().to_string();
        {
            let mut context = self.context.write().await;
            context.current_correlation_id = Some(correlation_id.clone());
        }

        self.debug(&format!("Started operation: {}", operation_name))
            .correlation_id(&correlation_id)
            .field("operation", operation_name)
            .field("operation_type", "start")
            .log()
            .await;

        correlation_id
    }

    /// End a correlated operation
    pub async fn end_operation(&self, correlation_id: &str, operation_name: &str, success: bool) {
        let level = if success { LogLevel::Info } else { LogLevel::Warn };
        self.log(level, &format!("Completed operation: {} (success: {})", operation_name, success))
            .correlation_id(correlation_id)
            .field("operation", operation_name)
            .field("operation_type", "end")
            .field("success", success)
            .log()
            .await;

        let mut context = self.context.write().await;
        if context.current_correlation_id.as_deref() == Some(correlation_id) {
            context.current_correlation_id = None;
        }
    }

    pub fn log(&self, level: LogLevel, message: &str) -> LogEntryBuilder {
        LogEntryBuilder::new(self, level, message.to_string())
    }

    pub fn trace(&self, message: &str) -> LogEntryBuilder {
        self.log(LogLevel::Trace, message)
    }

    pub fn debug(&self, message: &str) -> LogEntryBuilder {
        self.log(LogLevel::Debug, message)
    }

    pub fn info(&self, message: &str) -> LogEntryBuilder {
        self.log(LogLevel::Info, message)
    }

    pub fn warn(&self, message: &str) -> LogEntryBuilder {
        self.log(LogLevel::Warn, message)
    }

    pub fn error(&self, message: &str) -> LogEntryBuilder {
        self.log(LogLevel::Error, message)
    }

    pub fn fatal(&self, message: &str) -> LogEntryBuilder {
        self.log(LogLevel::Fatal, message)
    }

    pub fn would_log(&self, level: LogLevel) -> bool {
        level >= self.min_level
    }

    async fn write_entry(&self, mut entry: LogEntry) {
        if entry.level < self.min_level {
            return;
        }

        let context = self.context.read().await;
        if let Some(session_id) = &context.session_id {
            entry.fields.insert("session_id".to_string(), serde_json::Value::String(session_id.clone()));
        }
        if entry.correlation_id.is_none() {
            entry.correlation_id = context.current_correlation_id.clone();
        }
        for (key, value) in &context.context_fields {
            entry.fields.insert(key.clone(), value.clone());
        }
        drop(context);

        let output = self.render(&entry);

        // Warnings and above go to stderr
        if entry.level >= LogLevel::Warn {
            let _ = writeln!(io::stderr(), "{}", output);
        } else {
            let _ = writeln!(io::stdout(), "{}", output);
        }
    }

    fn render(&self, entry: &LogEntry) -> String {
        match self.format {
            LogFormat::Console => self.format_console(entry),
            LogFormat::Json => self.format_json(entry),
            LogFormat::Compact => self.format_compact(entry),
        }
    }

    fn format_console(&self, entry: &LogEntry) -> String {
        let timestamp = entry.timestamp.format("%Y-%m-%d %H:%M:%S%.3f");
        let level_str = entry.level.as_str();

        let formatted_level = if self.use_color {
            format!("{}{:>5}{}", entry.level.color_code(), level_str, LogLevel::reset_code())
        } else {
            format!("{:>5}", level_str)
        };

        let mut output = format!("{} {} [{}] {}", timestamp, formatted_level, entry.logger, entry.message);

        if let Some(correlation_id) = &entry.correlation_id {
            let short: String = correlation_id.chars().take(8).collect();
            output.push_str(&format!(" [{}]", short));
        }

        if !entry.fields.is_empty() {
            let fields_str: Vec<String> = entry.fields.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
            output.push_str(&format!(" {{{}}}", fields_str.join(", ")));
        }

        if self.include_location {
            if let Some(location) = &entry.location {
                output.push_str(&format!(" @ {}:{}", location.file, location.line));
            }
        }

        output
    }

    fn format_json(&self, entry: &LogEntry) -> String {
        match serde_json::to_string(entry) {
            Ok(json) => json,
            Err(_) => serde_json::json!({
                "error": "Failed to serialize log entry",
                "message": entry.message,
            })
            .to_string(),
        }
    }

    fn format_compact(&self, entry: &LogEntry) -> String {
        let timestamp = entry.timestamp.format("%H:%M:%S");
        format!(
            "{} {} {}: {}",
            timestamp,
            entry.level.as_str().chars().next().unwrap_or('?'),
            entry.logger,
            entry.message
        )
    }
}

/// Builder for a single log entry
pub struct LogEntryBuilder<'a> {
    logger: &'a Logger,
    entry: LogEntry,
}

impl<'a> LogEntryBuilder<'a> {
    fn new(logger: &'a Logger, level: LogLevel, message: String) -> Self {
        Self {
            logger,
            entry: LogEntry {
                timestamp: Utc::now(),
                level,
                message,
                logger: logger.name.clone(),
                correlation_id: None,
                fields: BTreeMap::new(),
                location: None,
            },
        }
    }

    pub fn correlation_id(mut self, id: &str) -> Self {
        self.entry.correlation_id = Some(id.to_string());
        self
    }

    pub fn field<T: Serialize>(mut self, key: &str, value: T) -> Self {
        if let Ok(json_value) = serde_json::to_value(value) {
            self.entry.fields.insert(key.to_string(), json_value);
        }
        self
    }

    pub fn location(mut self, file: &str, line: u32, module: Option<&str>) -> Self {
        self.entry.location = Some(LogLocation {
            file: file.to_string(),
            line,
            module: module.map(String::from),
        });
        self
    }

    /// Attach latency statistics in milliseconds
    pub fn latency(self, report: &LatencyReport) -> Self {
        let ms = |d: Duration| d.as_secs_f64() * 1000.0;
        self.field("operation", &report.operation)
            .field("count", report.stats.count)
            .field("workers", report.workers)
            .field("mean_ms", ms(report.stats.mean))
            .field("min_ms", ms(report.stats.min))
            .field("max_ms", ms(report.stats.max))
            .field("std_dev_ms", ms(report.stats.std_dev))
            .field("threshold_ms", ms(report.threshold))
            .field("passed", report.passed())
    }

    pub fn error_info(self, error: &AppError) -> Self {
        self.field("error_category", error.category())
            .field("error_fatal", error.is_fatal())
            .field("error_exit_code", error.exit_code())
    }

    pub async fn log(self) {
        self.logger.write_entry(self.entry).await;
    }

    #[cfg(test)]
    fn into_entry(self) -> LogEntry {
        self.entry
    }
}

/// Probe lifecycle and measurement logger
pub struct ProbeLogger {
    logger: Logger,
}

impl ProbeLogger {
    pub fn new(config: &HarnessConfig) -> Self {
        Self {
            logger: Logger::with_config("PROBE", config),
        }
    }

    /// Log the start of a probe and return its correlation id
    pub async fn probe_started(&self, suite: SuiteKind, probe: &str) -> String {
        let correlation_id = self.logger.start_operation(&format!("{}::{}", suite, probe)).await;
        self.logger
            .debug(&format!("Running probe {}::{}", suite, probe))
            .correlation_id(&correlation_id)
            .field("suite", suite.name())
            .field("probe", probe)
            .log()
            .await;
        correlation_id
    }

    pub async fn probe_finished(
        &self,
        correlation_id: &str,
        suite: SuiteKind,
        probe: &str,
        elapsed: Duration,
        error: Option<&AppError>,
    ) {
        let name = format!("{}::{}", suite, probe);
        self.logger.end_operation(correlation_id, &name, error.is_none()).await;

        let mut builder = match error {
            None => self.logger.info(&format!("Probe {} passed in {:.3}s", name, elapsed.as_secs_f64())),
            Some(e) => self
                .logger
                .warn(&format!("Probe {} failed: {}", name, e))
                .error_info(e),
        };
        builder = builder
            .correlation_id(correlation_id)
            .field("suite", suite.name())
            .field("probe", probe)
            .field("elapsed_ms", elapsed.as_secs_f64() * 1000.0);

        builder.log().await;
    }

    pub async fn latency_measured(&self, report: &LatencyReport) {
        let level = if report.passed() { LogLevel::Info } else { LogLevel::Warn };
        self.logger
            .log(
                level,
                &format!(
                    "{}: mean {:.3}ms over {} samples (threshold {:.3}ms)",
                    report.operation,
                    report.stats.mean.as_secs_f64() * 1000.0,
                    report.stats.count,
                    report.threshold.as_secs_f64() * 1000.0
                ),
            )
            .latency(report)
            .log()
            .await;
    }

    pub async fn memory_measured(&self, report: &MemoryReport) {
        let level = if report.passed() { LogLevel::Info } else { LogLevel::Warn };
        self.logger
            .log(level, &format!("Memory increase {:.2} MB for {} keys", report.increase_mb(), report.key_count))
            .field("initial_bytes", report.initial_bytes)
            .field("final_bytes", report.final_bytes)
            .field("key_count", report.key_count)
            .field("value_bytes", report.value_bytes)
            .field("limit_bytes", report.limit_bytes)
            .log()
            .await;
    }
}

/// Service connection and readiness logger
pub struct ServiceLogger {
    logger: Logger,
}

impl ServiceLogger {
    pub fn new(config: &HarnessConfig) -> Self {
        Self {
            logger: Logger::with_config("SVC", config),
        }
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    pub async fn readiness_attempt(&self, service: ServiceKind, attempt: u32, error: &AppError) {
        self.logger
            .debug(&format!("{} not ready (attempt {}): {}", service, attempt, error))
            .field("service", service.name())
            .field("attempt", attempt)
            .log()
            .await;
    }

    pub async fn service_ready(&self, service: ServiceKind, endpoint: &str, waited: Duration) {
        self.logger
            .info(&format!("{} ready at {} after {:.2}s", service, endpoint, waited.as_secs_f64()))
            .field("service", service.name())
            .field("endpoint", endpoint)
            .field("waited_ms", waited.as_secs_f64() * 1000.0)
            .log()
            .await;
    }

    pub async fn container_started(&self, service: ServiceKind, image: &str, host_port: u16) {
        self.logger
            .info(&format!("Started {} container {} on port {}", service, image, host_port))
            .field("service", service.name())
            .field("image", image)
            .field("host_port", host_port)
            .log()
            .await;
    }
}

/// Teardown logger
#[derive(Clone)]
pub struct CleanupLogger {
    logger: Logger,
}

impl CleanupLogger {
    pub fn new(config: &HarnessConfig) -> Self {
        Self {
            logger: Logger::with_config("CLEANUP", config),
        }
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    /// A registered path was already gone
    pub async fn not_found_skipped(&self, path: &str) {
        self.logger
            .debug(&format!("Secret '{}' already absent, skipping", path))
            .field("path", path)
            .field("outcome", "not_found")
            .log()
            .await;
    }

    pub async fn deleted(&self, path: &str) {
        self.logger
            .trace(&format!("Deleted secret '{}'", path))
            .field("path", path)
            .log()
            .await;
    }

    pub async fn cleanup_failed(&self, target: &str, error: &AppError) {
        self.logger
            .error(&format!("Cleanup of {} failed: {}", target, error))
            .field("target", target)
            .error_info(error)
            .log()
            .await;
    }

    pub async fn finished(&self, deleted: usize, skipped: usize, failed: usize) {
        let level = if failed == 0 { LogLevel::Info } else { LogLevel::Error };
        self.logger
            .log(
                level,
                &format!("Teardown finished: {} deleted, {} already absent, {} failed", deleted, skipped, failed),
            )
            .field("deleted", deleted)
            .field("skipped", skipped)
            .field("failed", failed)
            .log()
            .await;
    }

    /// Log an error that aborts the run
    pub async fn fatal(&self, error: &AppError) {
        self.logger.fatal(&error.to_string()).error_info(error).log().await;
    }
}

/// Creates loggers that share one session id
pub struct LoggerFactory {
    config: HarnessConfig,
    session_id: String,
}

impl LoggerFactory {
    pub fn new(config: HarnessConfig) -> Self {
        Self {
            config,
            session_id: Uuid::new_v4().to_string(),
        }
    }

    pub async fn create_logger(&self, name: &str) -> Logger {
        let logger = Logger::with_config(name, &self.config);
        logger.set_session_id(self.session_id.clone()).await;
        logger
    }

    pub async fn create_probe_logger(&self) -> ProbeLogger {
        let logger = ProbeLogger::new(&self.config);
        logger.logger.set_session_id(self.session_id.clone()).await;
        logger
    }

    pub async fn create_service_logger(&self) -> ServiceLogger {
        let logger = ServiceLogger::new(&self.config);
        logger.logger.set_session_id(self.session_id.clone()).await;
        logger
    }

    pub async fn create_cleanup_logger(&self) -> CleanupLogger {
        let logger = CleanupLogger::new(&self.config);
        logger.logger.set_session_id(self.session_id.clone()).await;
        logger
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

/// Log at debug level with source location
#[macro_export]
macro_rules! log_debug {
    ($logger:expr, $($arg:tt)*) => {
        $logger.debug(&format!($($arg)*))
            .location(file!(), line!(), Some(module_path!()))
            .log()
            .await
    };
}

/// Log at warn level with source location
#[macro_export]
macro_rules! log_warn {
    ($logger:expr, $($arg:tt)*) => {
        $logger.warn(&format!($($arg)*))
            .location(file!(), line!(), Some(module_path!()))
            .log()
            .await
    };
}
