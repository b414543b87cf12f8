use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::control::WorkerControl;
use crate::handlers::{
    health::health_check,
    host::{keepalive_ping, report_traffic},
    status::{get_status, run_now},
};

#[derive(Clone)]
pub struct AppState {
    pub worker: Arc<dyn WorkerControl>,
}

pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/status", get(get_status))
        .route("/api/run-now", post(run_now))
        .route("/api/keepalive/ping", post(keepalive_ping))
        .route("/api/traffic", post(report_traffic))
        .with_state(state)
}
