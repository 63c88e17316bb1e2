use axum::extract::State;
use tracing::warn;

use crate::{AppError, router::AppState};

pub const SUCCESS_MESSAGE: &str = "CONGRATULATIONS! Demo 2.0 complete!\n\
Cloud Run reached the private-IP Cloud SQL instance through the VPC connector!";

/// `GET /`: ping the shared handle, answer with the fixed message.
pub async fn root_handler(State(state): State<AppState>) -> Result<&'static str, AppError> {
    state
        .probe
        .ping()
        .await
        .inspect_err(|e| warn!(error = %e, "database liveness probe failed"))?;
    Ok(SUCCESS_MESSAGE)
}
