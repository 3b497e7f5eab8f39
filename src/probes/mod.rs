//! Probe catalogue, outcomes and the suite runner
//!
//! A run executes the selected suites in order. Each live suite gets a fresh
//! [`HarnessContext`] from a [`ContextSource`] and tears it down before the
//! next suite starts. Probe failures are recorded and the run continues;
//! only fatal errors (readiness timeouts, provisioning failures) stop it.

pub mod functional;
pub mod integration;
pub mod performance;

use crate::error::{AppError, Result};
use crate::logging::ProbeLogger;
use crate::manifest::{self, CheckOutcome, Manifest};
use crate::models::{HarnessConfig, LatencyReport, MemoryReport};
use crate::output::OutputFormatter;
use crate::provision::{ContextSource, HarnessContext};
use crate::types::{ProbeStatus, SuiteKind};
use crate::defaults::{REDIS_MANIFEST, VAULT_MANIFEST};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// What a probe measured or observed
#[derive(Debug, Clone, Serialize)]
pub enum ProbeDetail {
    Latency(LatencyReport),
    Memory(MemoryReport),
    Note(String),
}

impl ProbeDetail {
    /// Threshold verdict for measurements; notes always pass
    pub fn verdict(&self) -> Result<()> {
        match self {
            ProbeDetail::Latency(report) if report.stats.is_empty() => {
                Err(AppError::assertion(format!("{}: no samples collected", report.operation)))
            }
            ProbeDetail::Latency(report) if !report.passed() => Err(AppError::assertion(format!(
                "{}: mean {:.6}s is not below {:.6}s",
                report.operation,
                report.stats.mean.as_secs_f64(),
                report.threshold.as_secs_f64()
            ))),
            ProbeDetail::Memory(report) if !report.passed() => Err(AppError::assertion(format!(
                "memory increase {:.2} MB is not below {:.2} MB",
                report.increase_mb(),
                report.limit_bytes as f64 / 1024.0 / 1024.0
            ))),
            _ => Ok(()),
        }
    }
}

/// Recorded result of one probe
#[derive(Debug, Clone, Serialize)]
pub struct ProbeOutcome {
    pub suite: SuiteKind,
    pub probe: String,
    pub status: ProbeStatus,
    pub detail: Option<ProbeDetail>,
    pub error: Option<String>,
    pub elapsed: Duration,
}

impl ProbeOutcome {
    pub fn passed(suite: SuiteKind, probe: impl Into<String>, detail: Option<ProbeDetail>, elapsed: Duration) -> Self {
        Self {
            suite,
            probe: probe.into(),
            status: ProbeStatus::Passed,
            detail,
            error: None,
            elapsed,
        }
    }

    pub fn failed(
        suite: SuiteKind,
        probe: impl Into<String>,
        detail: Option<ProbeDetail>,
        error: &AppError,
        elapsed: Duration,
    ) -> Self {
        Self {
            suite,
            probe: probe.into(),
            status: ProbeStatus::Failed,
            detail,
            error: Some(error.to_string()),
            elapsed,
        }
    }

    pub fn skipped(suite: SuiteKind, probe: impl Into<String>, reason: &str) -> Self {
        Self {
            suite,
            probe: probe.into(),
            status: ProbeStatus::Skipped,
            detail: Some(ProbeDetail::Note(reason.to_string())),
            error: None,
            elapsed: Duration::ZERO,
        }
    }

    pub fn is_failure(&self) -> bool {
        self.status == ProbeStatus::Failed
    }

    /// `suite::probe`
    pub fn qualified_name(&self) -> String {
        format!("{}::{}", self.suite, self.probe)
    }
}

/// Ordered outcomes of a run
#[derive(Debug, Clone, Default, Serialize)]
pub struct SuiteReport {
    outcomes: Vec<ProbeOutcome>,
    elapsed: Duration,
}

impl SuiteReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, outcome: ProbeOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn outcomes(&self) -> &[ProbeOutcome] {
        &self.outcomes
    }

    pub fn for_suite(&self, suite: SuiteKind) -> impl Iterator<Item = &ProbeOutcome> {
        self.outcomes.iter().filter(move |o| o.suite == suite)
    }

    fn count(&self, status: ProbeStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }

    pub fn passed_count(&self) -> usize {
        self.count(ProbeStatus::Passed)
    }

    pub fn failed_count(&self) -> usize {
        self.count(ProbeStatus::Failed)
    }

    pub fn skipped_count(&self) -> usize {
        self.count(ProbeStatus::Skipped)
    }

    /// True when nothing failed
    pub fn all_passed(&self) -> bool {
        self.failed_count() == 0
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn set_elapsed(&mut self, elapsed: Duration) {
        self.elapsed = elapsed;
    }
}

/// Every probe that runs against live services
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    CacheConnection,
    SecretsConnection,
    CacheSet,
    CacheGet,
    CacheConcurrent,
    CacheMemory,
    SecretWrite,
    SecretRead,
    SecretConcurrent,
    TokenCreate,
    HealthCheck,
    PasswordHandoff,
}

impl Probe {
    pub fn name(&self) -> &'static str {
        match self {
            Probe::CacheConnection => "cache_connection",
            Probe::SecretsConnection => "secrets_connection",
            Probe::CacheSet => "cache_set",
            Probe::CacheGet => "cache_get",
            Probe::CacheConcurrent => "cache_concurrent",
            Probe::CacheMemory => "cache_memory_usage",
            Probe::SecretWrite => "secret_write",
            Probe::SecretRead => "secret_read",
            Probe::SecretConcurrent => "secret_concurrent",
            Probe::TokenCreate => "token_create",
            Probe::HealthCheck => "health_check",
            Probe::PasswordHandoff => "password_handoff",
        }
    }

    /// Probes of a live suite, in execution order
    pub fn for_suite(suite: SuiteKind) -> &'static [Probe] {
        match suite {
            SuiteKind::Config => &[],
            SuiteKind::Functional => &[Probe::CacheConnection, Probe::SecretsConnection],
            SuiteKind::Performance => &[
                Probe::CacheSet,
                Probe::CacheGet,
                Probe::CacheConcurrent,
                Probe::CacheMemory,
                Probe::SecretWrite,
                Probe::SecretRead,
                Probe::SecretConcurrent,
                Probe::TokenCreate,
                Probe::HealthCheck,
            ],
            SuiteKind::Integration => &[Probe::PasswordHandoff],
        }
    }

    pub async fn run(&self, ctx: &HarnessContext) -> Result<ProbeDetail> {
        match self {
            Probe::CacheConnection => functional::cache_connection(ctx).await,
            Probe::SecretsConnection => functional::secrets_connection(ctx).await,
            Probe::CacheSet => performance::cache_set(ctx).await,
            Probe::CacheGet => performance::cache_get(ctx).await,
            Probe::CacheConcurrent => performance::cache_concurrent(ctx).await,
            Probe::CacheMemory => performance::cache_memory_usage(ctx).await,
            Probe::SecretWrite => performance::secret_write(ctx).await,
            Probe::SecretRead => performance::secret_read(ctx).await,
            Probe::SecretConcurrent => performance::secret_concurrent(ctx).await,
            Probe::TokenCreate => performance::token_create(ctx).await,
            Probe::HealthCheck => performance::health_check(ctx).await,
            Probe::PasswordHandoff => integration::password_handoff(ctx).await,
        }
    }
}

/// Runs suites and collects their outcomes
pub struct SuiteRunner {
    config: HarnessConfig,
    source: Arc<dyn ContextSource>,
    logger: ProbeLogger,
    output: Option<Box<dyn OutputFormatter>>,
}

impl SuiteRunner {
    pub fn new(config: HarnessConfig, source: Arc<dyn ContextSource>, logger: ProbeLogger) -> Self {
        Self {
            config,
            source,
            logger,
            output: None,
        }
    }

    /// Print progress and measurements through `formatter` while running
    pub fn with_output(mut self, formatter: Box<dyn OutputFormatter>) -> Self {
        self.output = Some(formatter);
        self
    }

    /// Run `suites` in order. Returns `Err` only for fatal errors.
    pub async fn run(&self, suites: &[SuiteKind]) -> Result<SuiteReport> {
        let started = Instant::now();
        let mut report = SuiteReport::new();

        for &suite in suites {
            self.emit(|f| f.format_suite_header(suite));

            if suite.needs_services() {
                self.run_live_suite(suite, &mut report).await?;
            } else {
                self.run_config_suite(&mut report).await;
            }
        }

        report.set_elapsed(started.elapsed());
        Ok(report)
    }

    async fn run_config_suite(&self, report: &mut SuiteReport) {
        let manifests = [
            (REDIS_MANIFEST, manifest::redis_expectations()),
            (VAULT_MANIFEST, manifest::vault_expectations()),
        ];

        for (relative, expectations) in manifests {
            let path = self.config.manifest_path(relative);
            let started = Instant::now();
            let correlation_id = self
                .logger
                .probe_started(SuiteKind::Config, &format!("{}_manifest", expectations.service))
                .await;

            let checks = Manifest::load(&path).map(|document| manifest::validate(&document, &expectations));
            self.logger
                .probe_finished(
                    &correlation_id,
                    SuiteKind::Config,
                    &format!("{}_manifest", expectations.service),
                    started.elapsed(),
                    first_failure(&checks),
                )
                .await;

            let outcomes = match checks {
                Ok(checks) => check_outcomes(checks, started),
                Err(e) => vec![ProbeOutcome::failed(
                    SuiteKind::Config,
                    format!("{}_manifest", expectations.service),
                    None,
                    &e,
                    started.elapsed(),
                )],
            };

            for outcome in outcomes {
                self.record(report, outcome);
            }
        }
    }

    async fn run_live_suite(&self, suite: SuiteKind, report: &mut SuiteReport) -> Result<()> {
        let ctx = match self.source.acquire().await {
            Ok(ctx) => ctx,
            Err(e) => {
                for probe in Probe::for_suite(suite) {
                    report.push(ProbeOutcome::skipped(suite, probe.name(), "services unavailable"));
                }
                return Err(e);
            }
        };

        let run_result = match prepare_suite(suite, &ctx).await {
            Ok(()) => self.run_probes(suite, &ctx, report).await,
            Err(e) => {
                self.record(report, ProbeOutcome::failed(suite, "setup", None, &e, Duration::ZERO));
                for probe in Probe::for_suite(suite) {
                    report.push(ProbeOutcome::skipped(suite, probe.name(), "suite setup failed"));
                }
                if e.is_fatal() {
                    Err(e)
                } else {
                    Ok(())
                }
            }
        };

        // teardown runs even when a probe hit a fatal error
        if let Err(e) = ctx.teardown().await {
            let outcome = ProbeOutcome::failed(suite, "teardown", None, &e, Duration::ZERO);
            self.record(report, outcome);
        }

        run_result
    }

    async fn run_probes(&self, suite: SuiteKind, ctx: &HarnessContext, report: &mut SuiteReport) -> Result<()> {
        for probe in Probe::for_suite(suite) {
            let correlation_id = self.logger.probe_started(suite, probe.name()).await;
            let started = Instant::now();

            let result = probe.run(ctx).await;
            let elapsed = started.elapsed();

            let (outcome, error) = match result {
                Ok(detail) => {
                    match &detail {
                        ProbeDetail::Latency(latency) => self.logger.latency_measured(latency).await,
                        ProbeDetail::Memory(memory) => self.logger.memory_measured(memory).await,
                        ProbeDetail::Note(_) => {}
                    }
                    match detail.verdict() {
                        Ok(()) => (ProbeOutcome::passed(suite, probe.name(), Some(detail), elapsed), None),
                        Err(e) => (ProbeOutcome::failed(suite, probe.name(), Some(detail), &e, elapsed), Some(e)),
                    }
                }
                Err(e) => (ProbeOutcome::failed(suite, probe.name(), None, &e, elapsed), Some(e)),
            };

            self.logger
                .probe_finished(&correlation_id, suite, probe.name(), elapsed, error.as_ref())
                .await;
            self.record(report, outcome);

            if let Some(e) = error.filter(AppError::is_fatal) {
                return Err(e);
            }
        }
        Ok(())
    }

    fn record(&self, report: &mut SuiteReport, outcome: ProbeOutcome) {
        match &outcome.detail {
            Some(ProbeDetail::Latency(latency)) => self.emit(|f| f.format_latency(latency)),
            Some(ProbeDetail::Memory(memory)) => self.emit(|f| f.format_memory(memory)),
            _ => {}
        }
        self.emit(|f| f.format_outcome(&outcome));
        report.push(outcome);
    }

    fn emit<F>(&self, render: F)
    where
        F: FnOnce(&dyn OutputFormatter) -> Result<String>,
    {
        if let Some(formatter) = &self.output {
            match render(formatter.as_ref()) {
                Ok(text) if !text.is_empty() => println!("{}", text),
                Ok(_) => {}
                Err(e) => eprintln!("{}", e.format_for_console(false)),
            }
        }
    }
}

/// Setup a live suite needs on its fresh context before the first probe
async fn prepare_suite(suite: SuiteKind, ctx: &HarnessContext) -> Result<()> {
    match suite {
        SuiteKind::Performance => performance::prepare(ctx).await,
        SuiteKind::Integration => {
            ctx.secrets()
                .enable_secrets_engine("kv", &ctx.config().vault_kv_mount)
                .await
        }
        SuiteKind::Config | SuiteKind::Functional => Ok(()),
    }
}

/// First error of a manifest run: the load error or the first failed check
fn first_failure(checks: &Result<Vec<CheckOutcome>>) -> Option<&AppError> {
    match checks {
        Ok(checks) => checks.iter().find_map(|c| c.result.as_ref().err()),
        Err(e) => Some(e),
    }
}

fn check_outcomes(checks: Vec<CheckOutcome>, started: Instant) -> Vec<ProbeOutcome> {
    checks
        .into_iter()
        .map(|check| {
            let name = check.name();
            match &check.result {
                Ok(()) => ProbeOutcome::passed(SuiteKind::Config, name, None, started.elapsed()),
                Err(e) => ProbeOutcome::failed(SuiteKind::Config, name, None, e, started.elapsed()),
            }
        })
        .collect()
}
