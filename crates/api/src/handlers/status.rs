use axum::{extract::State, response::IntoResponse};
use tracing::info;

use crate::{response::reply, routes::AppState};

/// Status snapshot; the backend health check runs on every call.
pub async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    reply(state.worker.status().await)
}

/// Runs a cycle (or reports it skipped) and replies once it is done.
pub async fn run_now(State(state): State<AppState>) -> impl IntoResponse {
    info!("Run now requested over HTTP");
    reply(state.worker.run_now().await)
}
