use super::endpoints::GoogleEndpoints;
use crate::config::Config;
use crate::error::AppError;
use serde::Deserialize;
use serde_json::Value;
use std::{fmt, fs, path::Path};
use tracing::debug;

/// User credentials as written by `gcloud auth application-default login`.
#[derive(Clone, Deserialize)]
pub struct AuthorizedUserCredential {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

impl fmt::Debug for AuthorizedUserCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizedUserCredential")
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

/// Where access tokens for Google APIs come from.
#[derive(Debug, Clone)]
pub enum TokenSource {
    /// The instance metadata server of the runtime (Cloud Run, GCE, GKE).
    Metadata { host: String },
    AuthorizedUser(AuthorizedUserCredential),
}

impl TokenSource {
    pub fn from_config(cfg: &Config) -> Result<Self, AppError> {
        match cfg.credentials_file.as_deref() {
            Some(path) => Self::from_file(path),
            None => Ok(Self::Metadata {
                host: cfg.metadata_host.clone(),
            }),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, AppError> {
        let contents = fs::read_to_string(path)?;
        let value: Value = serde_json::from_str(&contents)?;
        Self::from_payload(&value)
    }

    pub fn from_payload(value: &Value) -> Result<Self, AppError> {
        match value.get("type").and_then(Value::as_str) {
            Some("authorized_user") => Ok(Self::AuthorizedUser(serde_json::from_value(
                value.clone(),
            )?)),
            other => Err(AppError::UnsupportedCredential(
                other.unwrap_or("<missing>").to_string(),
            )),
        }
    }

    /// Fetch a fresh bearer token. Nothing is cached between calls.
    pub async fn access_token(&self, http_client: &reqwest::Client) -> Result<String, AppError> {
        match self {
            Self::Metadata { host } => {
                debug!(host = %host, "requesting access token from metadata server");
                GoogleEndpoints::metadata_token(host, http_client).await
            }
            Self::AuthorizedUser(creds) => {
                debug!(client_id = %creds.client_id, "refreshing authorized_user access token");
                GoogleEndpoints::refresh_access_token(creds, http_client).await
            }
        }
    }
}
