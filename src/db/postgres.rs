use super::LivenessProbe;
use crate::error::AppError;
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{Connection, PgConnection, PgPool};
use std::time::Duration;

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
    acquire_timeout: Duration,
}

impl Database {
    /// Build the pool without touching the network. Connection problems show
    /// up on the first [`LivenessProbe::ping`].
    pub fn connect_lazy(options: PgConnectOptions, acquire_timeout: Duration) -> Self {
        let pool = PgPoolOptions::new()
            .acquire_timeout(acquire_timeout)
            .connect_lazy_with(options);
        Self {
            pool,
            acquire_timeout,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// One connection opened outside the pool. The pool retries refused
    /// connections until its deadline and then only reports `PoolTimedOut`;
    /// this surfaces the underlying connect error instead.
    async fn connect_direct(&self) -> Result<PgConnection, AppError> {
        let options = self.pool.connect_options();
        match tokio::time::timeout(self.acquire_timeout, PgConnection::connect_with(&options))
            .await
        {
            Ok(Ok(conn)) => Ok(conn),
            Ok(Err(e)) => Err(AppError::Ping(e)),
            Err(_) => Err(AppError::Ping(sqlx::Error::PoolTimedOut)),
        }
    }
}

#[async_trait]
impl LivenessProbe for Database {
    async fn ping(&self) -> Result<(), AppError> {
        // Nothing pooled yet (first request, or every connection dropped after an
        // outage): check reachability directly so failures come back immediately.
        if self.pool.size() == 0 {
            let conn = self.connect_direct().await?;
            let _ = conn.close().await;
        }

        let mut conn = match self.pool.acquire().await {
            Ok(conn) => conn,
            Err(sqlx::Error::PoolTimedOut) => {
                let conn = self.connect_direct().await?;
                let _ = conn.close().await;
                return Err(AppError::Ping(sqlx::Error::PoolTimedOut));
            }
            Err(e) => return Err(AppError::Ping(e)),
        };
        conn.ping().await.map_err(AppError::Ping)
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
