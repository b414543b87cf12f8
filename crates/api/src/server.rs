use std::net::SocketAddr;

use relay_errors::{RelayError, RelayResult};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::info;

use crate::routes::{create_routes, AppState};

/// Serves the status API until a shutdown signal arrives.
pub async fn serve(
    bind_address: &str,
    state: AppState,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> RelayResult<()> {
    let addr: SocketAddr = bind_address
        .parse()
        .map_err(|e| RelayError::config_error(format!("Invalid bind address {bind_address}: {e}")))?;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| RelayError::Internal(format!("Cannot bind {addr}: {e}")))?;
    info!("Status API listening on http://{}", addr);

    axum::serve(listener, create_routes(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
            info!("Status API shutting down");
        })
        .await
        .map_err(|e| RelayError::Internal(format!("Status API failed: {e}")))
}
