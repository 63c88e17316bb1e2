use crate::config::GOOGLE_TOKEN_URI;
use crate::error::{AppError, GoogleError};
use crate::google::credentials::AuthorizedUserCredential;

use oauth2::{
    ClientId, ClientSecret, RefreshToken, TokenResponse, TokenUrl, basic::BasicClient,
};
use serde::Deserialize;
use std::net::IpAddr;
use tracing::info;
use url::Url;

/// Stateless Google REST endpoints.
pub(crate) struct GoogleEndpoints;

impl GoogleEndpoints {
    /// Ask the metadata server for the default service account's token.
    pub(crate) async fn metadata_token(
        host: &str,
        http_client: &reqwest::Client,
    ) -> Result<String, AppError> {
        let url = Url::parse(&format!(
            "http://{host}/computeMetadata/v1/instance/service-accounts/default/token"
        ))?;
        let resp = http_client
            .get(url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(GoogleError::from_response(resp).await);
        }
        let token: MetadataToken = resp.json().await?;
        Ok(token.access_token)
    }

    /// Exchange the refresh token of an `authorized_user` credential for an access token.
    pub(crate) async fn refresh_access_token(
        creds: &AuthorizedUserCredential,
        http_client: &reqwest::Client,
    ) -> Result<String, AppError> {
        let client = BasicClient::new(ClientId::new(creds.client_id.clone()))
            .set_client_secret(ClientSecret::new(creds.client_secret.clone()))
            .set_token_uri(TokenUrl::from_url(GOOGLE_TOKEN_URI.clone()));
        let token_result = client
            .exchange_refresh_token(&RefreshToken::new(creds.refresh_token.clone()))
            .request_async(http_client)
            .await?;
        Ok(token_result.access_token().secret().clone())
    }

    /// `GET v1/{name}:access` on Secret Manager.
    pub(crate) async fn access_secret_version(
        endpoint: &Url,
        version_name: &str,
        access_token: &str,
        http_client: &reqwest::Client,
    ) -> Result<AccessSecretVersionResponse, AppError> {
        let url = endpoint.join(&format!("v1/{version_name}:access"))?;
        let resp = http_client
            .get(url)
            .bearer_auth(access_token)
            .header("Accept", "application/json")
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(GoogleError::from_response(resp).await);
        }
        let body: AccessSecretVersionResponse = resp.json().await?;
        info!(version = %body.name, "secret version accessed");
        Ok(body)
    }

    /// `GET sql/v1beta4/projects/{project}/instances/{instance}/connectSettings` on Cloud SQL Admin.
    pub(crate) async fn connect_settings(
        endpoint: &Url,
        project: &str,
        instance: &str,
        access_token: &str,
        http_client: &reqwest::Client,
    ) -> Result<ConnectSettings, AppError> {
        let url = endpoint.join(&format!(
            "sql/v1beta4/projects/{project}/instances/{instance}/connectSettings"
        ))?;
        let resp = http_client
            .get(url)
            .bearer_auth(access_token)
            .header("Accept", "application/json")
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(GoogleError::from_response(resp).await);
        }
        Ok(resp.json().await?)
    }
}

#[derive(Debug, Deserialize)]
struct MetadataToken {
    access_token: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AccessSecretVersionResponse {
    pub name: String,
    pub payload: SecretPayload,
}

#[derive(Deserialize)]
pub(crate) struct SecretPayload {
    /// Base64, standard alphabet with padding.
    #[serde(default)]
    pub data: String,
}

impl std::fmt::Debug for SecretPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretPayload(***)")
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectSettings {
    #[serde(default)]
    pub ip_addresses: Vec<IpMapping>,
    #[serde(default)]
    pub server_ca_cert: Option<SslCert>,
    #[serde(default)]
    pub database_version: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpMapping {
    /// `PRIMARY`, `OUTGOING` or `PRIVATE`.
    #[serde(rename = "type")]
    pub kind: String,
    pub ip_address: IpAddr,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SslCert {
    /// PEM encoded.
    pub cert: String,
}
