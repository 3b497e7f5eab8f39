//! Credential handoff from the secrets service to the cache

use super::ProbeDetail;
use crate::clients::secret_data;
use crate::error::{AppError, Result};
use crate::provision::HarnessContext;

/// Secret path holding the cache password
pub const PASSWORD_PATH: &str = "redis";

const HANDOFF_KEY: &str = "integration_key";
const HANDOFF_VALUE: &str = "integration_value";

/// Store the cache password at `redis`, read it back, and use the retrieved
/// value to authenticate a fresh cache client
pub async fn password_handoff(ctx: &HarnessContext) -> Result<ProbeDetail> {
    let secrets = ctx.secrets();
    let password = ctx.config().redis_password.as_str();

    ctx.register_secret_path(PASSWORD_PATH).await;
    secrets
        .write_secret(PASSWORD_PATH, &secret_data("password", password))
        .await?;

    let stored = secrets.read_secret(PASSWORD_PATH).await?;
    let retrieved = stored
        .get("password")
        .ok_or_else(|| AppError::assertion(format!("secret '{}' has no 'password' field", PASSWORD_PATH)))?;
    if retrieved != password {
        return Err(AppError::assertion(format!(
            "secret '{}' returned a different password than was stored",
            PASSWORD_PATH
        )));
    }

    let cache = ctx
        .connect_cache(retrieved)
        .await
        .map_err(|e| e.context("Connecting with the retrieved password"))?;
    cache.ping().await?;

    cache.set(HANDOFF_KEY, HANDOFF_VALUE).await?;
    let got = cache.get(HANDOFF_KEY).await?;
    if got.as_deref() != Some(HANDOFF_VALUE) {
        return Err(AppError::assertion(format!(
            "GET {} on the fresh client returned {:?}",
            HANDOFF_KEY, got
        )));
    }

    Ok(ProbeDetail::Note(format!(
        "password from '{}' authenticated a new client to {}",
        PASSWORD_PATH,
        cache.endpoint()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::{InMemoryCache, InMemoryConnector, InMemorySecrets, SecretsClient};
    use crate::models::HarnessConfig;
    use std::sync::Arc;

    fn context(secrets: InMemorySecrets, cache_password: &str) -> HarnessContext {
        let cache = InMemoryCache::new();
        let connector = InMemoryConnector::new(cache.clone(), cache_password);
        HarnessContext::new(HarnessConfig::default(), Arc::new(cache), Arc::new(secrets), Arc::new(connector))
    }

    #[tokio::test]
    async fn test_password_round_trips_and_authenticates() {
        let secrets = InMemorySecrets::new("root");
        let ctx = context(secrets.clone(), "YourStrongPassword");

        password_handoff(&ctx).await.unwrap();
        assert_eq!(secrets.read_secret(PASSWORD_PATH).await.unwrap()["password"], "YourStrongPassword");
        assert_eq!(ctx.registered_paths().await, vec![PASSWORD_PATH]);
    }

    #[tokio::test]
    async fn test_wrong_password_fails_probe() {
        let ctx = context(InMemorySecrets::new("root"), "a-different-password");

        let err = password_handoff(&ctx).await.unwrap_err();
        assert_eq!(err.category(), "CACHE");
        assert!(err.to_string().contains("retrieved password"));
    }

    #[tokio::test]
    async fn test_unauthorized_secrets_fail_before_connecting() {
        let ctx = context(InMemorySecrets::new("root").with_token("nope"), "YourStrongPassword");
        assert_eq!(password_handoff(&ctx).await.unwrap_err().category(), "SECRETS");
    }
}
