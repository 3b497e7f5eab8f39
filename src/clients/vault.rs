//! HashiCorp Vault client over the HTTP API (v1, KV version 2)

use super::{SecretData, SecretsClient};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const TOKEN_HEADER: &str = "X-Vault-Token";

/// Token-authenticated Vault client.
///
/// Cloning shares the underlying connection pool.
#[derive(Clone)]
pub struct VaultClient {
    base_url: String,
    token: String,
    kv_mount: String,
    http_client: Client,
}

impl VaultClient {
    /// Create a client for `addr` using `token`; every request is bounded by `request_timeout`
    pub fn new(addr: &str, token: &str, kv_mount: &str, request_timeout: Duration) -> Result<Self> {
        let parsed = url::Url::parse(addr)?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(AppError::config(format!("Vault address must use http or https: {}", addr)));
        }

        let http_client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| AppError::secrets(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: addr.trim_end_matches('/').to_string(),
            token: token.to_string(),
            kv_mount: kv_mount.trim_matches('/').to_string(),
            http_client,
        })
    }

    /// Same server and mount, different token
    pub fn with_token(&self, token: &str) -> Self {
        Self {
            token: token.to_string(),
            ..self.clone()
        }
    }

    pub fn kv_mount(&self) -> &str {
        &self.kv_mount
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// URL for KV v2 data operations
    fn kv_url(&self, path: &str) -> String {
        self.api_url(&format!("{}/data/{}", self.kv_mount, path.trim_start_matches('/')))
    }

    /// URL for KV v2 metadata operations
    fn kv_metadata_url(&self, path: &str) -> String {
        self.api_url(&format!("{}/metadata/{}", self.kv_mount, path.trim_start_matches('/')))
    }
}

/// Map a non-success response to an error, keeping status and body
async fn handle_error_response(response: reqwest::Response, context: &str) -> AppError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = format!("{} with status {}: {}", context, status, body.trim());

    match status {
        StatusCode::NOT_FOUND => AppError::not_found(message),
        _ => AppError::secrets(message),
    }
}

#[async_trait]
impl SecretsClient for VaultClient {
    async fn is_authenticated(&self) -> Result<bool> {
        let response = self
            .http_client
            .get(self.api_url("auth/token/lookup-self"))
            .header(TOKEN_HEADER, &self.token)
            .send()
            .await?;

        match response.status() {
            s if s.is_success() => Ok(true),
            StatusCode::FORBIDDEN | StatusCode::UNAUTHORIZED => Ok(false),
            _ => Err(handle_error_response(response, "Token lookup failed").await),
        }
    }

    async fn enable_secrets_engine(&self, engine_type: &str, path: &str) -> Result<()> {
        let path = path.trim_matches('/');
        let request = MountRequest {
            mount_type: engine_type,
            options: (engine_type == "kv").then(|| MountOptions { version: "2" }),
        };

        let response = self
            .http_client
            .post(self.api_url(&format!("sys/mounts/{}", path)))
            .header(TOKEN_HEADER, &self.token)
            .json(&request)
            .send()
            .await?;

        if response.status().is_success() {
            return Ok(());
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::BAD_REQUEST && body.contains("path is already in use") {
            return Ok(());
        }

        Err(AppError::secrets(format!(
            "Failed to enable {} engine at {} with status {}: {}",
            engine_type,
            path,
            status,
            body.trim()
        )))
    }

    async fn write_secret(&self, path: &str, data: &SecretData) -> Result<()> {
        let response = self
            .http_client
            .post(self.kv_url(path))
            .header(TOKEN_HEADER, &self.token)
            .json(&KvV2WriteRequest { data })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(handle_error_response(response, &format!("Failed to write secret to path {}", path)).await);
        }

        Ok(())
    }

    async fn read_secret(&self, path: &str) -> Result<SecretData> {
        let response = self
            .http_client
            .get(self.kv_url(path))
            .header(TOKEN_HEADER, &self.token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(handle_error_response(response, &format!("Failed to read secret at path {}", path)).await);
        }

        let read_response: KvV2ReadResponse = response
            .json()
            .await
            .map_err(|e| AppError::secrets(format!("Failed to parse secret response: {}", e)))?;

        Ok(read_response
            .data
            .data
            .into_iter()
            .map(|(k, v)| {
                let value = match v {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                };
                (k, value)
            })
            .collect())
    }

    async fn delete_secret(&self, path: &str) -> Result<()> {
        let response = self
            .http_client
            .delete(self.kv_metadata_url(path))
            .header(TOKEN_HEADER, &self.token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(handle_error_response(response, &format!("Failed to delete secret at path {}", path)).await);
        }

        Ok(())
    }

    async fn create_token(&self, policies: &[&str], ttl: &str) -> Result<String> {
        let response = self
            .http_client
            .post(self.api_url("auth/token/create"))
            .header(TOKEN_HEADER, &self.token)
            .json(&TokenCreateRequest { policies, ttl })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(handle_error_response(response, "Token creation failed").await);
        }

        let created: TokenCreateResponse = response
            .json()
            .await
            .map_err(|e| AppError::secrets(format!("Failed to parse token response: {}", e)))?;

        if created.auth.client_token.is_empty() {
            return Err(AppError::secrets("Token creation returned an empty token"));
        }

        Ok(created.auth.client_token)
    }

    async fn health(&self) -> Result<HealthStatus> {
        let response = self.http_client.get(self.api_url("sys/health")).send().await?;

        // Vault encodes standby/sealed/uninitialized states in the status code
        // but always returns the same body shape.
        match response.status().as_u16() {
            200 | 429 | 472 | 473 | 501 | 503 => response
                .json()
                .await
                .map_err(|e| AppError::secrets(format!("Failed to parse health response: {}", e))),
            _ => Err(handle_error_response(response, "Health check failed").await),
        }
    }

    fn endpoint(&self) -> String {
        self.base_url.clone()
    }
}

/// Body of `GET /v1/sys/health`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub initialized: bool,
    pub sealed: bool,
    #[serde(default)]
    pub standby: bool,
    #[serde(default)]
    pub version: Option<String>,
}

impl HealthStatus {
    /// Initialized and unsealed
    pub fn is_ready(&self) -> bool {
        self.initialized && !self.sealed
    }
}

#[derive(Debug, Serialize)]
struct MountRequest<'a> {
    #[serde(rename = "type")]
    mount_type: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<MountOptions<'a>>,
}

#[derive(Debug, Serialize)]
struct MountOptions<'a> {
    version: &'a str,
}

#[derive(Debug, Serialize)]
struct KvV2WriteRequest<'a> {
    data: &'a SecretData,
}

#[derive(Debug, Deserialize)]
struct KvV2ReadResponse {
    data: KvV2Data,
}

#[derive(Debug, Deserialize)]
struct KvV2Data {
    data: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct TokenCreateRequest<'a> {
    policies: &'a [&'a str],
    ttl: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenCreateResponse {
    auth: TokenAuth,
}

#[derive(Debug, Deserialize)]
struct TokenAuth {
    client_token: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::secret_data;
    use serde_json::json;
    use wiremock::{
        matchers::{body_json, header, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    /// Mock Vault server with the dev root token
    struct MockVault {
        server: MockServer,
    }

    impl MockVault {
        async fn start() -> Self {
            Self {
                server: MockServer::start().await,
            }
        }

        fn client(&self) -> VaultClient {
            VaultClient::new(&self.server.uri(), "root", "secret", Duration::from_secs(5)).unwrap()
        }

        async fn respond(&self, verb: &str, request_path: &str, template: ResponseTemplate) {
            Mock::given(method(verb))
                .and(path(request_path))
                .and(header(TOKEN_HEADER, "root"))
                .respond_with(template)
                .mount(&self.server)
                .await;
        }
    }

    #[test]
    fn test_urls() {
        let client = VaultClient::new("http://127.0.0.1:8200/", "root", "/secret/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.kv_url("test"), "http://127.0.0.1:8200/v1/secret/data/test");
        assert_eq!(client.kv_metadata_url("/redis"), "http://127.0.0.1:8200/v1/secret/metadata/redis");
        assert_eq!(client.api_url("sys/health"), "http://127.0.0.1:8200/v1/sys/health");
    }

    #[test]
    fn test_rejects_non_http_address() {
        assert!(VaultClient::new("ftp://vault:8200", "root", "secret", Duration::from_secs(1)).is_err());
        assert!(VaultClient::new("vault", "root", "secret", Duration::from_secs(1)).is_err());
    }

    #[tokio::test]
    async fn test_is_authenticated() {
        let vault = MockVault::start().await;
        vault
            .respond("GET", "/v1/auth/token/lookup-self", ResponseTemplate::new(200).set_body_json(json!({"data": {"id": "root"}})))
            .await;

        assert!(vault.client().is_authenticated().await.unwrap());
    }

    #[tokio::test]
    async fn test_bad_token_is_not_authenticated() {
        let vault = MockVault::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/auth/token/lookup-self"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({"errors": ["permission denied"]})))
            .mount(&vault.server)
            .await;

        let client = vault.client().with_token("wrong");
        assert!(!client.is_authenticated().await.unwrap());
    }

    #[tokio::test]
    async fn test_enable_kv_engine_sends_version_2() {
        let vault = MockVault::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/sys/mounts/kv-test"))
            .and(body_json(json!({"type": "kv", "options": {"version": "2"}})))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&vault.server)
            .await;

        vault.client().enable_secrets_engine("kv", "kv-test").await.unwrap();
    }

    #[tokio::test]
    async fn test_enable_engine_already_mounted_is_accepted() {
        let vault = MockVault::start().await;
        vault
            .respond(
                "POST",
                "/v1/sys/mounts/secret",
                ResponseTemplate::new(400).set_body_json(json!({
                    "errors": ["path is already in use at secret/"]
                })),
            )
            .await;

        assert!(vault.client().enable_secrets_engine("kv", "secret").await.is_ok());
    }

    #[tokio::test]
    async fn test_enable_engine_other_error_surfaces() {
        let vault = MockVault::start().await;
        vault
            .respond("POST", "/v1/sys/mounts/secret", ResponseTemplate::new(403).set_body_string("denied"))
            .await;

        let err = vault.client().enable_secrets_engine("kv", "secret").await.unwrap_err();
        assert_eq!(err.category(), "SECRETS");
    }

    #[tokio::test]
    async fn test_write_secret_body() {
        let vault = MockVault::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/secret/data/test"))
            .and(body_json(json!({"data": {"test_key": "test_value"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"version": 1}})))
            .expect(1)
            .mount(&vault.server)
            .await;

        vault
            .client()
            .write_secret("test", &secret_data("test_key", "test_value"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_read_secret() {
        let vault = MockVault::start().await;
        vault
            .respond(
                "GET",
                "/v1/secret/data/redis",
                ResponseTemplate::new(200).set_body_json(json!({
                    "data": {
                        "data": {"password": "YourStrongPassword", "rotations": 3},
                        "metadata": {"version": 2}
                    }
                })),
            )
            .await;

        let data = vault.client().read_secret("redis").await.unwrap();
        assert_eq!(data["password"], "YourStrongPassword");
        assert_eq!(data["rotations"], "3");
    }

    #[tokio::test]
    async fn test_read_missing_secret_is_not_found() {
        let vault = MockVault::start().await;
        vault
            .respond("GET", "/v1/secret/data/missing", ResponseTemplate::new(404).set_body_json(json!({"errors": []})))
            .await;

        let err = vault.client().read_secret("missing").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_delete_uses_metadata_endpoint() {
        let vault = MockVault::start().await;
        Mock::given(method("DELETE"))
            .and(path("/v1/secret/metadata/test_1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&vault.server)
            .await;
        vault
            .respond("DELETE", "/v1/secret/metadata/gone", ResponseTemplate::new(404))
            .await;

        let client = vault.client();
        client.delete_secret("test_1").await.unwrap();
        assert!(client.delete_secret("gone").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_create_token() {
        let vault = MockVault::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/auth/token/create"))
            .and(body_json(json!({"policies": ["default"], "ttl": "1h"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "auth": {"client_token": "hvs.child", "policies": ["default"], "lease_duration": 3600}
            })))
            .mount(&vault.server)
            .await;

        let token = vault.client().create_token(&["default"], "1h").await.unwrap();
        assert_eq!(token, "hvs.child");
    }

    #[tokio::test]
    async fn test_health_states() {
        let vault = MockVault::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/sys/health"))
            .respond_with(ResponseTemplate::new(503).set_body_json(json!({
                "initialized": true, "sealed": true, "standby": true, "version": "1.15.2"
            })))
            .mount(&vault.server)
            .await;

        let health = vault.client().health().await.unwrap();
        assert!(!health.is_ready());
        assert_eq!(health.version.as_deref(), Some("1.15.2"));
    }

    #[tokio::test]
    async fn test_health_unexpected_status_is_error() {
        let vault = MockVault::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/sys/health"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&vault.server)
            .await;

        assert!(vault.client().health().await.is_err());
    }

    #[tokio::test]
    async fn test_request_timeout_applies() {
        let vault = MockVault::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/sys/health"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"initialized": true, "sealed": false}))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&vault.server)
            .await;

        let client = VaultClient::new(&vault.server.uri(), "root", "secret", Duration::from_millis(200)).unwrap();
        let err = client.health().await.unwrap_err();
        assert_eq!(err.category(), "SECRETS");
    }
}
