use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, info};

/// Fans one shutdown signal out to the dispatcher, the keepalive timers and the status API.
#[derive(Debug, Clone)]
pub struct ShutdownManager {
    shutdown_tx: broadcast::Sender<()>,
    is_shutdown: Arc<AtomicBool>,
}

impl ShutdownManager {
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(16);
        Self {
            shutdown_tx,
            is_shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A receiver subscribed after shutdown fires immediately.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        if self.is_shutdown() {
            let (tx, rx) = broadcast::channel(1);
            let _ = tx.send(());
            return rx;
        }
        self.shutdown_tx.subscribe()
    }

    pub fn shutdown(&self) {
        if self.is_shutdown.swap(true, Ordering::SeqCst) {
            debug!("Shutdown already triggered");
            return;
        }

        debug!(
            "Sending shutdown to {} subscriber(s)",
            self.shutdown_tx.receiver_count()
        );
        // no receivers is fine
        let _ = self.shutdown_tx.send(());
        info!("Shutdown signal sent");
    }

    pub fn is_shutdown(&self) -> bool {
        self.is_shutdown.load(Ordering::SeqCst)
    }
}

impl Default for ShutdownManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_shutdown_manager_basic() {
        let manager = ShutdownManager::new();
        assert!(!manager.is_shutdown());

        let mut rx = manager.subscribe();
        manager.shutdown();

        let result = timeout(Duration::from_millis(100), rx.recv()).await;
        assert!(result.is_ok());
        assert!(manager.is_shutdown());
    }

    #[tokio::test]
    async fn test_clones_share_shutdown() {
        let manager = ShutdownManager::new();
        let clone = manager.clone();
        let mut from_clone = clone.subscribe();

        manager.shutdown();

        assert!(clone.is_shutdown());
        assert!(timeout(Duration::from_millis(100), from_clone.recv())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_late_subscriber_fires_immediately() {
        let manager = ShutdownManager::new();
        manager.shutdown();
        manager.shutdown();

        let mut rx = manager.subscribe();
        let result = timeout(Duration::from_millis(100), rx.recv()).await;
        assert!(matches!(result, Ok(Ok(()))));
    }
}
