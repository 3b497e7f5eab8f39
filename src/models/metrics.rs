//! Latency samples, aggregated statistics and probe reports

use crate::stats::LatencyAccumulator;
use crate::types::PerformanceLevel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One timed client call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Operation label, e.g. `cache_set`
    pub operation: String,

    /// Worker that produced the sample (0 for sequential runs)
    pub worker: usize,

    /// Monotonic elapsed time of the call
    pub elapsed: Duration,
}

impl Sample {
    pub fn new(operation: impl Into<String>, worker: usize, elapsed: Duration) -> Self {
        Self {
            operation: operation.into(),
            worker,
            elapsed,
        }
    }
}

/// Summary statistics over a sample set.
///
/// `count` and `total` always cover every sample that went in; nothing is
/// filtered as an outlier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatencyStats {
    pub count: usize,
    pub total: Duration,
    pub mean: Duration,
    pub min: Duration,
    pub max: Duration,
    pub std_dev: Duration,
}

impl LatencyStats {
    /// Aggregate a sample set
    pub fn from_samples(samples: &[Sample]) -> Self {
        samples.iter().collect::<LatencyAccumulator>().to_stats()
    }

    /// Aggregate raw durations
    pub fn from_durations<I>(durations: I) -> Self
    where
        I: IntoIterator<Item = Duration>,
    {
        let mut acc = LatencyAccumulator::new();
        for d in durations {
            acc.add(d);
        }
        acc.to_stats()
    }

    /// Statistics of an empty set
    pub fn empty() -> Self {
        Self {
            count: 0,
            total: Duration::ZERO,
            mean: Duration::ZERO,
            min: Duration::ZERO,
            max: Duration::ZERO,
            std_dev: Duration::ZERO,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

impl Default for LatencyStats {
    fn default() -> Self {
        Self::empty()
    }
}

/// Latency probe result with its pass criterion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatencyReport {
    /// Operation label
    pub operation: String,

    /// Aggregated statistics over every sample
    pub stats: LatencyStats,

    /// Mean latency must stay strictly below this
    pub threshold: Duration,

    /// Number of concurrent workers (1 for sequential runs)
    pub workers: usize,

    /// When the measurement finished
    pub measured_at: DateTime<Utc>,
}

impl LatencyReport {
    pub fn new(operation: impl Into<String>, stats: LatencyStats, threshold: Duration, workers: usize) -> Self {
        Self {
            operation: operation.into(),
            stats,
            threshold,
            workers,
            measured_at: Utc::now(),
        }
    }

    /// Mean below threshold over a non-empty sample set
    pub fn passed(&self) -> bool {
        self.stats.count > 0 && self.stats.mean < self.threshold
    }

    pub fn performance_level(&self) -> PerformanceLevel {
        PerformanceLevel::classify(self.stats.mean, self.threshold)
    }
}

/// Memory growth measured around a bulk insert
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryReport {
    /// `used_memory` before the insert, in bytes
    pub initial_bytes: u64,

    /// `used_memory` after the insert, in bytes
    pub final_bytes: u64,

    pub key_count: usize,
    pub value_bytes: usize,

    /// Growth must stay strictly below this
    pub limit_bytes: u64,
}

impl MemoryReport {
    /// Growth in bytes; a shrinking heap counts as zero
    pub fn increase(&self) -> u64 {
        self.final_bytes.saturating_sub(self.initial_bytes)
    }

    pub fn increase_mb(&self) -> f64 {
        self.increase() as f64 / (1024.0 * 1024.0)
    }

    pub fn passed(&self) -> bool {
        self.increase() < self.limit_bytes
    }
}
