use axum::{http::StatusCode, response::IntoResponse};
use oauth2::basic::BasicErrorResponseType;
use oauth2::reqwest::Error as ReqwestClientError;
use oauth2::{HttpClientError, RequestTokenError, StandardErrorResponse};
use serde::Deserialize;
use sqlx::Error as SqlxError;
use thiserror::Error as ThisError;

use crate::config::ConfigError;

#[derive(Debug, ThisError)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("HTTP request error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not create HTTP client: {0}")]
    HttpClient(reqwest::Error),

    #[error("unsupported credential type {0:?}; only authorized_user files are accepted")]
    UnsupportedCredential(String),

    #[error("OAuth2 token request error: {0}")]
    Oauth2Token(String),

    #[error("OAuth2 server error: {error}")]
    Oauth2Server { error: String },

    #[error("Google API error ({status}): {message}")]
    GoogleApi { status: StatusCode, message: String },

    #[error("malformed secret id {0:?}; expected a Secret Manager resource name")]
    MalformedSecretId(String),

    #[error("could not access secret version {name}: {source}")]
    SecretAccess {
        name: String,
        #[source]
        source: Box<AppError>,
    },

    #[error("secret payload is unusable: {0}")]
    SecretPayload(String),

    #[error("malformed instance connection name {0:?}; expected PROJECT:REGION:INSTANCE")]
    MalformedConnectionName(String),

    #[error("Cloud SQL instance {0} has no private IP address")]
    NoPrivateIp(String),

    #[error("{step}: {source}")]
    Startup {
        step: &'static str,
        #[source]
        source: Box<AppError>,
    },

    #[error("failed to ping database: {0}")]
    Ping(#[source] SqlxError),
}

impl
    From<
        RequestTokenError<
            HttpClientError<ReqwestClientError>,
            StandardErrorResponse<BasicErrorResponseType>,
        >,
    > for AppError
{
    fn from(
        e: RequestTokenError<
            HttpClientError<ReqwestClientError>,
            StandardErrorResponse<BasicErrorResponseType>,
        >,
    ) -> Self {
        match e {
            RequestTokenError::ServerResponse(err) => AppError::Oauth2Server {
                error: err.error().to_string(),
            },
            RequestTokenError::Request(req_e) => {
                AppError::Oauth2Token(format!("request failed: {}", req_e))
            }
            RequestTokenError::Parse(parse_err, _body) => AppError::Json(parse_err.into_inner()),
            RequestTokenError::Other(s) => AppError::Oauth2Token(s),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let body = match self {
            AppError::Ping(_) => self.to_string(),
            _ => "An internal server error occurred.".to_string(),
        };
        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
    }
}

/// Google API error response structure
#[derive(Deserialize, Debug)]
pub struct GoogleError {
    pub error: GoogleErrorBody,
}

#[derive(Deserialize, Debug)]
pub struct GoogleErrorBody {
    pub code: u16,
    pub message: String,
    #[serde(default)]
    pub status: Option<String>,
}

impl GoogleError {
    /// Build an [`AppError::GoogleApi`] from a non-success response, keeping
    /// Google's message when the body is the usual error envelope.
    pub async fn from_response(resp: reqwest::Response) -> AppError {
        let status = resp.status();
        let message = match resp.text().await {
            Ok(text) => match serde_json::from_str::<GoogleError>(&text) {
                Ok(parsed) => match parsed.error.status {
                    Some(s) => format!("{s}: {}", parsed.error.message),
                    None => parsed.error.message,
                },
                Err(_) if text.trim().is_empty() => status.to_string(),
                Err(_) => text,
            },
            Err(e) => e.to_string(),
        };
        AppError::GoogleApi { status, message }
    }
}
