//! Startup sequence: secret first, then the database handle. Strictly in order.

use crate::config::Config;
use crate::db::{Connector, DbCredentials, LivenessProbe};
use crate::error::AppError;
use crate::google::TokenSource;
use crate::secrets::SecretResolver;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

pub const STEP_CREDENTIALS: &str = "could not load Google credentials";
pub const STEP_BIND: &str = "could not bind HTTP listener";
pub const STEP_SECRET: &str = "could not fetch database password";
pub const STEP_CONNECT: &str = "could not set up database connection";

fn step(step: &'static str) -> impl FnOnce(AppError) -> AppError {
    move |e| AppError::Startup {
        step,
        source: Box::new(e),
    }
}

pub fn token_source(cfg: &Config) -> Result<TokenSource, AppError> {
    TokenSource::from_config(cfg).map_err(step(STEP_CREDENTIALS))
}

pub async fn bind(addr: SocketAddr) -> Result<TcpListener, AppError> {
    TcpListener::bind(addr)
        .await
        .map_err(|e| step(STEP_BIND)(AppError::Io(e)))
}

/// Resolve the password and build the handle. A secret failure returns before
/// the connector is touched.
pub async fn bootstrap(
    cfg: &Config,
    secrets: &dyn SecretResolver,
    connector: &dyn Connector,
) -> Result<Arc<dyn LivenessProbe>, AppError> {
    let password = secrets
        .resolve(&cfg.db_secret_id)
        .await
        .map_err(step(STEP_SECRET))?;
    info!("database password retrieved");

    let creds = DbCredentials {
        user: cfg.db_user.clone(),
        password,
        database: cfg.db_name.clone(),
    };
    connector
        .connect(&cfg.target, &creds)
        .await
        .map_err(step(STEP_CONNECT))
}
