//! Latency aggregation
//!
//! Samples are folded into a [`LatencyAccumulator`] which keeps exact integer
//! sums in nanoseconds, so totals and means never drift from the recorded
//! durations. Sample sets from concurrent workers are folded per worker and
//! merged without loss.

use crate::models::metrics::{LatencyStats, Sample};
use std::time::Duration;

/// Streaming accumulator for latency samples
#[derive(Debug, Clone, Default)]
pub struct LatencyAccumulator {
    count: usize,
    total_nanos: u128,
    sum_squared: f64,
    min: Option<Duration>,
    max: Option<Duration>,
}

impl LatencyAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one elapsed duration
    pub fn add(&mut self, elapsed: Duration) {
        self.count += 1;
        self.total_nanos += elapsed.as_nanos();

        let secs = elapsed.as_secs_f64();
        self.sum_squared += secs * secs;

        self.min = Some(self.min.map_or(elapsed, |m| m.min(elapsed)));
        self.max = Some(self.max.map_or(elapsed, |m| m.max(elapsed)));
    }

    /// Fold another accumulator into this one
    pub fn merge(&mut self, other: &LatencyAccumulator) {
        self.count += other.count;
        self.total_nanos += other.total_nanos;
        self.sum_squared += other.sum_squared;
        self.min = match (self.min, other.min) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        self.max = match (self.max, other.max) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn total(&self) -> Duration {
        nanos_to_duration(self.total_nanos)
    }

    pub fn mean(&self) -> Duration {
        if self.count == 0 {
            Duration::ZERO
        } else {
            nanos_to_duration(self.total_nanos / self.count as u128)
        }
    }

    /// Population variance in seconds squared
    pub fn variance(&self) -> f64 {
        if self.count <= 1 {
            return 0.0;
        }

        let n = self.count as f64;
        let avg = (self.total_nanos as f64 / 1e9) / n;
        (self.sum_squared / n - avg * avg).max(0.0)
    }

    pub fn std_dev(&self) -> Duration {
        let sd = self.variance().sqrt();
        if sd.is_finite() {
            Duration::from_secs_f64(sd)
        } else {
            Duration::ZERO
        }
    }

    pub fn to_stats(&self) -> LatencyStats {
        if self.count == 0 {
            return LatencyStats::empty();
        }

        LatencyStats {
            count: self.count,
            total: self.total(),
            mean: self.mean(),
            min: self.min.unwrap_or_default(),
            max: self.max.unwrap_or_default(),
            std_dev: self.std_dev(),
        }
    }
}

impl<'a> FromIterator<&'a Sample> for LatencyAccumulator {
    fn from_iter<I: IntoIterator<Item = &'a Sample>>(samples: I) -> Self {
        let mut acc = LatencyAccumulator::new();
        for sample in samples {
            acc.add(sample.elapsed);
        }
        acc
    }
}

fn nanos_to_duration(nanos: u128) -> Duration {
    let secs = (nanos / 1_000_000_000) as u64;
    let sub = (nanos % 1_000_000_000) as u32;
    Duration::new(secs, sub)
}

/// Pool per-worker sample sets into one set of statistics
pub fn pool<'a, I>(workers: I) -> LatencyStats
where
    I: IntoIterator<Item = &'a [Sample]>,
{
    let mut pooled = LatencyAccumulator::new();
    for samples in workers {
        pooled.merge(&samples.iter().collect::<LatencyAccumulator>());
    }
    pooled.to_stats()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_accumulator_basic() {
        let mut acc = LatencyAccumulator::new();
        acc.add(Duration::from_micros(100));
        acc.add(Duration::from_micros(300));

        let stats = acc.to_stats();
        assert_eq!(stats.count, 2);
        assert_eq!(stats.total, Duration::from_micros(400));
        assert_eq!(stats.mean, Duration::from_micros(200));
        assert_eq!(stats.min, Duration::from_micros(100));
        assert_eq!(stats.max, Duration::from_micros(300));

        let sd = stats.std_dev.as_secs_f64();
        assert!((sd - 100e-6).abs() < 1e-9);
    }

    #[test]
    fn test_single_sample_has_zero_deviation() {
        let stats = LatencyStats::from_durations([Duration::from_millis(5)]);
        assert_eq!(stats.std_dev, Duration::ZERO);
        assert_eq!(stats.mean, Duration::from_millis(5));
    }

    #[test]
    fn test_merge_with_empty() {
        let mut a = LatencyAccumulator::new();
        a.add(Duration::from_millis(3));
        let empty = LatencyAccumulator::new();

        a.merge(&empty);
        assert_eq!(a.count(), 1);
        assert_eq!(a.to_stats().min, Duration::from_millis(3));

        let mut b = LatencyAccumulator::new();
        b.merge(&a);
        assert_eq!(b.to_stats(), a.to_stats());
    }

    #[test]
    fn test_pool_worker_sample_sets() {
        let first = vec![
            Sample::new("secret_concurrent", 0, Duration::from_millis(10)),
            Sample::new("secret_concurrent", 0, Duration::from_millis(20)),
        ];
        let second = vec![Sample::new("secret_concurrent", 1, Duration::from_millis(30))];
        let idle: Vec<Sample> = Vec::new();

        let pooled = pool([first.as_slice(), second.as_slice(), idle.as_slice()]);
        assert_eq!(pooled.count, 3);
        assert_eq!(pooled.mean, Duration::from_millis(20));
        assert_eq!(pooled.min, Duration::from_millis(10));
        assert_eq!(pooled.max, Duration::from_millis(30));
    }

    proptest! {
        #[test]
        fn prop_aggregation_is_lossless(nanos in prop::collection::vec(0u64..50_000_000, 0..200)) {
            let durations: Vec<Duration> = nanos.iter().map(|&n| Duration::from_nanos(n)).collect();
            let stats = LatencyStats::from_durations(durations.iter().copied());

            prop_assert_eq!(stats.count, durations.len());
            prop_assert_eq!(stats.total, durations.iter().sum::<Duration>());

            if !durations.is_empty() {
                prop_assert!(stats.min <= stats.mean);
                prop_assert!(stats.mean <= stats.max);
                prop_assert_eq!(stats.min, *durations.iter().min().unwrap());
                prop_assert_eq!(stats.max, *durations.iter().max().unwrap());
            }
        }

        #[test]
        fn prop_pooling_matches_flat_aggregation(
            workers in prop::collection::vec(prop::collection::vec(1u64..10_000_000, 0..50), 1..8)
        ) {
            let sample_sets: Vec<Vec<Sample>> = workers
                .iter()
                .enumerate()
                .map(|(worker, w)| w.iter().map(|&n| Sample::new("op", worker, Duration::from_nanos(n))).collect())
                .collect();

            let pooled = pool(sample_sets.iter().map(Vec::as_slice));
            let flat = LatencyStats::from_durations(workers.iter().flatten().map(|&n| Duration::from_nanos(n)));

            prop_assert_eq!(pooled.count, flat.count);
            prop_assert_eq!(pooled.total, flat.total);
            prop_assert_eq!(pooled.mean, flat.mean);
            prop_assert_eq!(pooled.min, flat.min);
            prop_assert_eq!(pooled.max, flat.max);
        }
    }
}
