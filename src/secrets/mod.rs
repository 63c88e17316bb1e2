//! Secret resolution: turning a secret id into the plaintext database password.

pub mod manager;

pub use manager::SecretManagerResolver;

use crate::error::AppError;
use async_trait::async_trait;
use std::fmt;

/// Plaintext secret. Never printed by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretValue(String);

impl SecretValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretValue(***)")
    }
}

#[async_trait]
pub trait SecretResolver: Send + Sync {
    async fn resolve(&self, secret_id: &str) -> Result<SecretValue, AppError>;
}

/// Normalize a secret id into a version resource name.
///
/// A bare secret name (`projects/P/secrets/S` or the regional
/// `projects/P/locations/L/secrets/S`) resolves to its latest version.
/// Anything else is treated as an opaque version name and forwarded as is;
/// Secret Manager rejects what it does not know.
pub fn version_name(secret_id: &str) -> Result<String, AppError> {
    let id = secret_id.trim().trim_matches('/');
    if id.is_empty() {
        return Err(AppError::MalformedSecretId(secret_id.to_string()));
    }
    let parts: Vec<&str> = id.split('/').collect();
    let bare = match parts.as_slice() {
        ["projects", project, "secrets", secret] => !project.is_empty() && !secret.is_empty(),
        ["projects", project, "locations", location, "secrets", secret] => {
            !project.is_empty() && !location.is_empty() && !secret.is_empty()
        }
        _ => false,
    };
    Ok(if bare {
        format!("{id}/versions/latest")
    } else {
        id.to_string()
    })
}
