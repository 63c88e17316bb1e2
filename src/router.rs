use axum::{Router, routing::get};
use std::sync::Arc;

use crate::db::LivenessProbe;
use crate::handlers::root::root_handler;

#[derive(Clone)]
pub struct AppState {
    pub probe: Arc<dyn LivenessProbe>,
}

impl AppState {
    pub fn new(probe: Arc<dyn LivenessProbe>) -> Self {
        Self { probe }
    }
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .with_state(state)
}
