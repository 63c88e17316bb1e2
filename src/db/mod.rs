//! Database module: the shared connection handle and how it gets built.
//!
//! Layout:
//! - `postgres.rs`: `Database`, the lazily connected Postgres pool behind the liveness probe
//! - `connector.rs`: `Connector` trait and the production connector for both targets
//! - `cloudsql.rs`: Cloud SQL dialer resolving an instance connection name to its private IP

pub mod cloudsql;
pub mod connector;
pub mod postgres;

pub use cloudsql::{CloudSqlDialer, InstanceConnectionName};
pub use connector::{Connector, DbCredentials, PgConnector};
pub use postgres::Database;

use crate::error::AppError;
use async_trait::async_trait;

/// Handle shared by every request. Implementations must be safe to ping concurrently.
#[async_trait]
pub trait LivenessProbe: Send + Sync {
    /// One round trip to the database.
    async fn ping(&self) -> Result<(), AppError>;

    /// Release underlying connections. Called once, on shutdown.
    async fn close(&self) {}
}
