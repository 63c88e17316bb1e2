use crate::error::AppError;
use crate::google::{self, ConnectSettings, TokenSource, endpoints::GoogleEndpoints};
use sqlx::postgres::{PgConnectOptions, PgSslMode};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use tracing::{info, warn};
use url::Url;

/// Postgres port on a Cloud SQL private IP.
pub const CLOUD_SQL_PG_PORT: u16 = 5432;

/// `PROJECT:REGION:INSTANCE`. Domain-scoped projects (`example.com:proj`) keep
/// their colon in `project`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceConnectionName {
    pub project: String,
    pub region: String,
    pub instance: String,
}

impl FromStr for InstanceConnectionName {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || AppError::MalformedConnectionName(s.to_string());
        let mut parts = s.trim().rsplitn(3, ':');
        let instance = parts.next().ok_or_else(malformed)?;
        let region = parts.next().ok_or_else(malformed)?;
        let project = parts.next().ok_or_else(malformed)?;
        if [project, region, instance].iter().any(|p| p.is_empty()) {
            return Err(malformed());
        }
        Ok(Self {
            project: project.to_string(),
            region: region.to_string(),
            instance: instance.to_string(),
        })
    }
}

impl fmt::Display for InstanceConnectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.project, self.region, self.instance)
    }
}

/// What the dialer learned about an instance.
#[derive(Debug, Clone)]
pub struct ResolvedInstance {
    pub private_ip: IpAddr,
    pub server_ca_pem: Option<String>,
}

/// Resolves Cloud SQL instances to their private address through the Admin API.
#[derive(Debug, Clone)]
pub struct CloudSqlDialer {
    endpoint: Url,
    tokens: TokenSource,
}

impl CloudSqlDialer {
    pub fn new(endpoint: Url, tokens: TokenSource) -> Self {
        Self { endpoint, tokens }
    }

    pub async fn resolve(
        &self,
        name: &InstanceConnectionName,
    ) -> Result<ResolvedInstance, AppError> {
        let client = google::http_client()?;
        let token = self.tokens.access_token(&client).await?;
        let settings = GoogleEndpoints::connect_settings(
            &self.endpoint,
            &name.project,
            &name.instance,
            &token,
            &client,
        )
        .await?;
        Self::pick_private(name, settings)
    }

    fn pick_private(
        name: &InstanceConnectionName,
        settings: ConnectSettings,
    ) -> Result<ResolvedInstance, AppError> {
        let private_ip = settings
            .ip_addresses
            .iter()
            .find(|m| m.kind == "PRIVATE")
            .map(|m| m.ip_address)
            .ok_or_else(|| AppError::NoPrivateIp(name.to_string()))?;
        info!(
            instance = %name,
            ip = %private_ip,
            version = settings.database_version.as_deref().unwrap_or("<unknown>"),
            "resolved Cloud SQL private address"
        );
        Ok(ResolvedInstance {
            private_ip,
            server_ca_pem: settings.server_ca_cert.map(|c| c.cert),
        })
    }

    /// Connection options pointing at the instance's private IP, with TLS
    /// verified against the instance CA when the API returns one.
    pub async fn connect_options(&self, connection_name: &str) -> Result<PgConnectOptions, AppError> {
        let name: InstanceConnectionName = connection_name.parse()?;
        let resolved = self.resolve(&name).await?;
        let options = PgConnectOptions::new()
            .host(&resolved.private_ip.to_string())
            .port(CLOUD_SQL_PG_PORT);
        Ok(match resolved.server_ca_pem {
            Some(pem) => options
                .ssl_mode(PgSslMode::VerifyCa)
                .ssl_root_cert_from_pem(pem.into_bytes()),
            None => {
                warn!(instance = %name, "no server CA certificate returned; TLS will not be verified");
                options.ssl_mode(PgSslMode::Require)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::google::IpMapping;

    #[test]
    fn parses_regular_connection_name() {
        let name: InstanceConnectionName = "ozan-gcp-demo:europe-west3:products".parse().unwrap();
        assert_eq!(name.project, "ozan-gcp-demo");
        assert_eq!(name.region, "europe-west3");
        assert_eq!(name.instance, "products");
        assert_eq!(name.to_string(), "ozan-gcp-demo:europe-west3:products");
    }

    #[test]
    fn domain_scoped_project_keeps_its_colon() {
        let name: InstanceConnectionName = "example.com:demo:us-central1:db".parse().unwrap();
        assert_eq!(name.project, "example.com:demo");
        assert_eq!(name.instance, "db");
    }

    #[test]
    fn malformed_names_are_rejected() {
        for bad in ["", "instance", "project:instance", "project::instance", ":region:db"] {
            assert!(
                matches!(
                    bad.parse::<InstanceConnectionName>(),
                    Err(AppError::MalformedConnectionName(_))
                ),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn private_address_wins_over_public() {
        let name: InstanceConnectionName = "p:r:i".parse().unwrap();
        let settings = ConnectSettings {
            ip_addresses: vec![
                IpMapping {
                    kind: "PRIMARY".to_string(),
                    ip_address: "34.1.2.3".parse().unwrap(),
                },
                IpMapping {
                    kind: "PRIVATE".to_string(),
                    ip_address: "10.20.0.3".parse().unwrap(),
                },
            ],
            server_ca_cert: None,
            database_version: Some("POSTGRES_15".to_string()),
        };
        let resolved = CloudSqlDialer::pick_private(&name, settings).unwrap();
        assert_eq!(resolved.private_ip, "10.20.0.3".parse::<IpAddr>().unwrap());
        assert!(resolved.server_ca_pem.is_none());
    }

    #[test]
    fn public_only_instance_has_no_private_ip() {
        let name: InstanceConnectionName = "p:r:i".parse().unwrap();
        let settings = ConnectSettings {
            ip_addresses: vec![IpMapping {
                kind: "PRIMARY".to_string(),
                ip_address: "34.1.2.3".parse().unwrap(),
            }],
            server_ca_cert: None,
            database_version: None,
        };
        assert!(matches!(
            CloudSqlDialer::pick_private(&name, settings),
            Err(AppError::NoPrivateIp(n)) if n == "p:r:i"
        ));
    }
}
