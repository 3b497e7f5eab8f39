//! Latency probes
//!
//! Sequential probes time each call with a monotonic clock. Concurrent
//! probes run one task per worker behind a semaphore; every worker touches
//! only keys prefixed `user_{worker}_` and records its own samples, which
//! are pooled once all workers finish. Samples are dropped after
//! aggregation.

use super::ProbeDetail;
use crate::clients::{secret_data, used_memory, CacheClient, SecretData, SecretsClient};
use crate::error::{AppError, Result};
use crate::models::{LatencyReport, LatencyStats, MemoryReport, Sample};
use crate::provision::HarnessContext;
use crate::stats;
use crate::thresholds::*;
use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;

/// Time `iterations` sequential calls of `op(i)`; the first error aborts
pub async fn measure_sequential<F, Fut>(operation: &str, iterations: usize, mut op: F) -> Result<LatencyStats>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let mut samples = Vec::with_capacity(iterations);
    for i in 0..iterations {
        let start = Instant::now();
        op(i).await?;
        samples.push(Sample::new(operation, 0, start.elapsed()));
    }
    Ok(LatencyStats::from_samples(&samples))
}

/// Run `op(worker, i)` for `iterations` per worker across `workers` tasks
/// and pool every sample
pub async fn measure_concurrent<F, Fut>(
    operation: &str,
    workers: usize,
    iterations: usize,
    op: F,
) -> Result<LatencyStats>
where
    F: Fn(usize, usize) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let op = Arc::new(op);
    let operation: Arc<str> = Arc::from(operation);
    let limiter = Arc::new(Semaphore::new(workers.max(1)));

    let tasks: Vec<_> = (0..workers)
        .map(|worker| {
            let op = op.clone();
            let operation = operation.clone();
            let limiter = limiter.clone();
            tokio::spawn(async move {
                let _permit = limiter
                    .acquire()
                    .await
                    .map_err(|e| AppError::internal(format!("worker {} could not start: {}", worker, e)))?;

                let mut samples = Vec::with_capacity(iterations);
                for i in 0..iterations {
                    let start = Instant::now();
                    op(worker, i).await?;
                    samples.push(Sample::new(&*operation, worker, start.elapsed()));
                }
                Ok::<_, AppError>(samples)
            })
        })
        .collect();

    let mut per_worker = Vec::with_capacity(workers);
    for joined in join_all(tasks).await {
        let samples = joined.map_err(|e| AppError::internal(format!("worker task failed: {}", e)))??;
        per_worker.push(samples);
    }

    Ok(stats::pool(per_worker.iter().map(Vec::as_slice)))
}

/// Cache key used by sequential probes
pub fn cache_key(i: usize) -> String {
    format!("key_{}", i)
}

/// Cache key owned by one concurrent worker
pub fn worker_key(worker: usize, i: usize) -> String {
    format!("user_{}_key_{}", worker, i)
}

/// Secret path used by sequential probes
pub fn secret_path(i: usize) -> String {
    format!("test_{}", i)
}

/// Secret path owned by one concurrent worker
pub fn worker_secret_path(worker: usize, i: usize) -> String {
    format!("user_{}_test_{}", worker, i)
}

fn value(i: usize) -> String {
    format!("value_{}", i)
}

fn expect_cached(key: &str, got: Option<String>, expected: &str) -> Result<()> {
    match got {
        Some(v) if v == expected => Ok(()),
        other => Err(AppError::assertion(format!(
            "GET {} returned {:?}, expected {:?}",
            key, other, expected
        ))),
    }
}

fn expect_secret(path: &str, data: &SecretData, expected: &str) -> Result<()> {
    match data.get("key") {
        Some(v) if v == expected => Ok(()),
        other => Err(AppError::assertion(format!(
            "secret '{}' has key={:?}, expected {:?}",
            path, other, expected
        ))),
    }
}

/// Start from an empty cache and make sure the KV engine is mounted
pub async fn prepare(ctx: &HarnessContext) -> Result<()> {
    ctx.cache().flush_all().await?;
    ctx.secrets()
        .enable_secrets_engine("kv", &ctx.config().vault_kv_mount)
        .await
}

pub async fn cache_set(ctx: &HarnessContext) -> Result<ProbeDetail> {
    let cache = ctx.cache();
    let n = ctx.config().scaled(CACHE_ITERATIONS);

    let stats = measure_sequential("cache_set", n, |i| async move { cache.set(&cache_key(i), &value(i)).await }).await?;
    Ok(ProbeDetail::Latency(LatencyReport::new("cache_set", stats, CACHE_OP_MEAN, 1)))
}

pub async fn cache_get(ctx: &HarnessContext) -> Result<ProbeDetail> {
    let cache = ctx.cache();
    let n = ctx.config().scaled(CACHE_ITERATIONS);

    for i in 0..n {
        cache.set(&cache_key(i), &value(i)).await?;
    }

    let stats = measure_sequential("cache_get", n, |i| async move {
        let key = cache_key(i);
        let got = cache.get(&key).await?;
        expect_cached(&key, got, &value(i))
    })
    .await?;
    Ok(ProbeDetail::Latency(LatencyReport::new("cache_get", stats, CACHE_OP_MEAN, 1)))
}

/// Each sample is one SET followed by one GET of the same worker-owned key
pub async fn cache_concurrent(ctx: &HarnessContext) -> Result<ProbeDetail> {
    let cache: Arc<dyn CacheClient> = ctx.cache().clone();
    let n = ctx.config().scaled(CACHE_CONCURRENT_ITERATIONS);

    let stats = measure_concurrent("cache_concurrent", CACHE_CONCURRENT_WORKERS, n, move |worker, i| {
        let cache = cache.clone();
        async move {
            let key = worker_key(worker, i);
            let expected = value(i);
            cache.set(&key, &expected).await?;
            let got = cache.get(&key).await?;
            expect_cached(&key, got, &expected)
        }
    })
    .await?;

    Ok(ProbeDetail::Latency(LatencyReport::new(
        "cache_concurrent",
        stats,
        CACHE_CONCURRENT_MEAN,
        CACHE_CONCURRENT_WORKERS,
    )))
}

pub async fn cache_memory_usage(ctx: &HarnessContext) -> Result<ProbeDetail> {
    let cache = ctx.cache();
    let n = ctx.config().scaled(MEMORY_KEY_COUNT);
    let payload = "x".repeat(MEMORY_VALUE_BYTES);

    let initial_bytes = used_memory(&cache.info().await?)?;
    for i in 0..n {
        cache.set(&format!("large_key_{}", i), &payload).await?;
    }
    let final_bytes = used_memory(&cache.info().await?)?;

    Ok(ProbeDetail::Memory(MemoryReport {
        initial_bytes,
        final_bytes,
        key_count: n,
        value_bytes: MEMORY_VALUE_BYTES,
        limit_bytes: MEMORY_INCREASE_LIMIT_BYTES,
    }))
}

pub async fn secret_write(ctx: &HarnessContext) -> Result<ProbeDetail> {
    let secrets = ctx.secrets();
    let n = ctx.config().scaled(SECRET_ITERATIONS);
    ctx.register_secret_paths((0..n).map(secret_path)).await;

    let stats = measure_sequential("secret_write", n, |i| async move {
        secrets.write_secret(&secret_path(i), &secret_data("key", value(i))).await
    })
    .await?;
    Ok(ProbeDetail::Latency(LatencyReport::new("secret_write", stats, SECRET_OP_MEAN, 1)))
}

pub async fn secret_read(ctx: &HarnessContext) -> Result<ProbeDetail> {
    let secrets = ctx.secrets();
    let n = ctx.config().scaled(SECRET_ITERATIONS);
    ctx.register_secret_paths((0..n).map(secret_path)).await;

    for i in 0..n {
        secrets.write_secret(&secret_path(i), &secret_data("key", value(i))).await?;
    }

    let stats = measure_sequential("secret_read", n, |i| async move {
        let path = secret_path(i);
        let data = secrets.read_secret(&path).await?;
        expect_secret(&path, &data, &value(i))
    })
    .await?;
    Ok(ProbeDetail::Latency(LatencyReport::new("secret_read", stats, SECRET_OP_MEAN, 1)))
}

/// Each sample is one write followed by one read of the same worker-owned path
pub async fn secret_concurrent(ctx: &HarnessContext) -> Result<ProbeDetail> {
    let secrets: Arc<dyn SecretsClient> = ctx.secrets().clone();
    let n = ctx.config().scaled(SECRET_CONCURRENT_ITERATIONS);
    ctx.register_secret_paths(
        (0..SECRET_CONCURRENT_WORKERS).flat_map(|w| (0..n).map(move |i| worker_secret_path(w, i))),
    )
    .await;

    let stats = measure_concurrent("secret_concurrent", SECRET_CONCURRENT_WORKERS, n, move |worker, i| {
        let secrets = secrets.clone();
        async move {
            let path = worker_secret_path(worker, i);
            let expected = value(i);
            secrets.write_secret(&path, &secret_data("key", expected.clone())).await?;
            let data = secrets.read_secret(&path).await?;
            expect_secret(&path, &data, &expected)
        }
    })
    .await?;

    Ok(ProbeDetail::Latency(LatencyReport::new(
        "secret_concurrent",
        stats,
        SECRET_CONCURRENT_MEAN,
        SECRET_CONCURRENT_WORKERS,
    )))
}

pub async fn token_create(ctx: &HarnessContext) -> Result<ProbeDetail> {
    let secrets = ctx.secrets();
    let n = ctx.config().scaled(TOKEN_ITERATIONS);

    let stats = measure_sequential("token_create", n, |_| async move {
        let token = secrets.create_token(&["default"], "1h").await?;
        if token.is_empty() {
            return Err(AppError::assertion("token create returned an empty token"));
        }
        Ok(())
    })
    .await?;
    Ok(ProbeDetail::Latency(LatencyReport::new("token_create", stats, TOKEN_CREATE_MEAN, 1)))
}

pub async fn health_check(ctx: &HarnessContext) -> Result<ProbeDetail> {
    let secrets = ctx.secrets();
    let n = ctx.config().scaled(HEALTH_ITERATIONS);

    let stats = measure_sequential("health_check", n, |_| async move { secrets.health().await.map(|_| ()) }).await?;
    Ok(ProbeDetail::Latency(LatencyReport::new("health_check", stats, HEALTH_CHECK_MEAN, 1)))
}
