//! Minimal round trips against each service with exact assertions

use super::ProbeDetail;
use crate::clients::secret_data;
use crate::error::{AppError, Result};
use crate::provision::HarnessContext;

pub const TEST_KEY: &str = "test_key";
pub const TEST_VALUE: &str = "test_value";

/// Secret path written by [`secrets_connection`]
pub const TEST_SECRET_PATH: &str = "test";

/// `PING`, then `set(test_key)` must read back unchanged
pub async fn cache_connection(ctx: &HarnessContext) -> Result<ProbeDetail> {
    let cache = ctx.cache();
    cache.ping().await?;

    cache.set(TEST_KEY, TEST_VALUE).await?;
    let got = cache.get(TEST_KEY).await?;
    if got.as_deref() != Some(TEST_VALUE) {
        return Err(AppError::assertion(format!(
            "GET {} returned {:?}, expected {:?}",
            TEST_KEY, got, TEST_VALUE
        )));
    }

    Ok(ProbeDetail::Note(format!("PING and SET/GET ok on {}", cache.endpoint())))
}

/// Token accepted, KV engine mounted, `{test_key: test_value}` readable at `test`
pub async fn secrets_connection(ctx: &HarnessContext) -> Result<ProbeDetail> {
    let secrets = ctx.secrets();
    if !secrets.is_authenticated().await? {
        return Err(AppError::assertion("configured token is not authenticated"));
    }

    secrets.enable_secrets_engine("kv", &ctx.config().vault_kv_mount).await?;

    ctx.register_secret_path(TEST_SECRET_PATH).await;
    secrets
        .write_secret(TEST_SECRET_PATH, &secret_data(TEST_KEY, TEST_VALUE))
        .await?;

    let stored = secrets.read_secret(TEST_SECRET_PATH).await?;
    match stored.get(TEST_KEY) {
        Some(value) if value == TEST_VALUE => {}
        other => {
            return Err(AppError::assertion(format!(
                "secret '{}' has {}={:?}, expected {:?}",
                TEST_SECRET_PATH, TEST_KEY, other, TEST_VALUE
            )))
        }
    }

    Ok(ProbeDetail::Note(format!(
        "write/read ok at {}/{}",
        ctx.config().vault_kv_mount,
        TEST_SECRET_PATH
    )))
}
