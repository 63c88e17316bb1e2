use super::{SecretResolver, SecretValue, version_name};
use crate::error::AppError;
use crate::google::{self, TokenSource, endpoints::GoogleEndpoints};
use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use tracing::info;
use url::Url;

/// Resolves secrets through the Secret Manager REST API.
///
/// Each call builds its own HTTP client and drops it before returning; no
/// client outlives startup.
#[derive(Debug, Clone)]
pub struct SecretManagerResolver {
    endpoint: Url,
    tokens: TokenSource,
}

impl SecretManagerResolver {
    pub fn new(endpoint: Url, tokens: TokenSource) -> Self {
        Self { endpoint, tokens }
    }

    async fn access(&self, name: &str) -> Result<SecretValue, AppError> {
        let client = google::http_client()?;
        let token = self.tokens.access_token(&client).await?;
        let resp =
            GoogleEndpoints::access_secret_version(&self.endpoint, name, &token, &client).await?;
        decode_payload(&resp.payload.data)
    }
}

#[async_trait]
impl SecretResolver for SecretManagerResolver {
    async fn resolve(&self, secret_id: &str) -> Result<SecretValue, AppError> {
        let name = version_name(secret_id)?;
        info!(secret = %name, "fetching secret from Secret Manager");
        self.access(&name)
            .await
            .map_err(|e| AppError::SecretAccess {
                name,
                source: Box::new(e),
            })
    }
}

fn decode_payload(data: &str) -> Result<SecretValue, AppError> {
    let bytes = STANDARD
        .decode(data)
        .map_err(|e| AppError::SecretPayload(format!("invalid base64: {e}")))?;
    let text = String::from_utf8(bytes)
        .map_err(|_| AppError::SecretPayload("not valid UTF-8".to_string()))?;
    Ok(SecretValue::new(text))
}
