//! Google Cloud plumbing: access tokens and the stateless REST calls made with them.
//!
//! Layout:
//! - `credentials.rs`: where access tokens come from (metadata server or `authorized_user` file)
//! - `endpoints.rs`: raw calls to the token, Secret Manager and Cloud SQL Admin endpoints

pub mod credentials;
pub(crate) mod endpoints;

pub use credentials::{AuthorizedUserCredential, TokenSource};
pub use endpoints::{ConnectSettings, IpMapping, SslCert};

use crate::error::AppError;
use std::time::Duration;

/// Build a short-lived HTTP client for one round of Google API calls.
pub(crate) fn http_client() -> Result<reqwest::Client, AppError> {
    reqwest::Client::builder()
        .user_agent(concat!("backend-api/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(5))
        .build()
        .map_err(AppError::HttpClient)
}
