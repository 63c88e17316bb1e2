use super::{CloudSqlDialer, Database, LivenessProbe};
use crate::config::DbTarget;
use crate::error::AppError;
use crate::google::TokenSource;
use crate::secrets::SecretValue;
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgSslMode};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use url::Url;

#[derive(Debug, Clone)]
pub struct DbCredentials {
    pub user: String,
    pub password: SecretValue,
    pub database: String,
}

/// Turns a target plus credentials into the process-wide database handle.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        target: &DbTarget,
        creds: &DbCredentials,
    ) -> Result<Arc<dyn LivenessProbe>, AppError>;
}

pub struct PgConnector {
    dialer: CloudSqlDialer,
    acquire_timeout: Duration,
}

impl PgConnector {
    pub fn new(tokens: TokenSource, sqladmin_endpoint: Url, acquire_timeout: Duration) -> Self {
        Self {
            dialer: CloudSqlDialer::new(sqladmin_endpoint, tokens),
            acquire_timeout,
        }
    }

    async fn options_for(&self, target: &DbTarget) -> Result<PgConnectOptions, AppError> {
        match target {
            DbTarget::CloudSql { connection_name } => {
                self.dialer.connect_options(connection_name).await
            }
            // The proxy owns the encrypted hop.
            DbTarget::Proxy { host, port } => Ok(PgConnectOptions::new()
                .host(host)
                .port(*port)
                .ssl_mode(PgSslMode::Disable)),
        }
    }
}

#[async_trait]
impl Connector for PgConnector {
    async fn connect(
        &self,
        target: &DbTarget,
        creds: &DbCredentials,
    ) -> Result<Arc<dyn LivenessProbe>, AppError> {
        let options = self
            .options_for(target)
            .await?
            .username(&creds.user)
            .password(creds.password.expose())
            .database(&creds.database);
        info!(
            user = %creds.user,
            database = %creds.database,
            db_target = ?target,
            "database handle created"
        );
        Ok(Arc::new(Database::connect_lazy(
            options,
            self.acquire_timeout,
        )))
    }
}
