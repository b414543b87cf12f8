use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use relay_api::{serve, AppState};
use relay_config::AppConfig;
use relay_domain::{CycleResult, TrafficObserver, TriggerSource};
use relay_worker::{
    event_channel, BrowserSession, EventDispatcher, HeaderHarvester, HostEvent, InternalApiBridge,
    KeepAliveManager, QueueClient, SessionTabHost, StatusService, WorkerCycle,
};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::shutdown::ShutdownManager;

/// The wired worker: session, converter, queue, keepalive and status API.
pub struct Application {
    config: AppConfig,
    cycle: Arc<WorkerCycle>,
    keepalive: Arc<KeepAliveManager>,
    status: Arc<StatusService>,
    dispatcher: EventDispatcher,
    events_rx: mpsc::UnboundedReceiver<HostEvent>,
    shutdown: ShutdownManager,
}

impl Application {
    pub fn new(config: AppConfig, shutdown: ShutdownManager) -> Result<Self> {
        let api = &config.internal_api;

        let session =
            BrowserSession::from_config(&config.session).context("Failed to seed browser session")?;

        let harvester = Arc::new(HeaderHarvester::new(&config.header_capture));
        // every request the session issues passes through the observer hook
        harvester.init(true);

        let observer: Arc<dyn TrafficObserver> = harvester.clone();
        let tabs = SessionTabHost::new(
            &session,
            Duration::from_secs(api.request_timeout_seconds),
            Some(observer),
        )
        .context("Failed to create tab host")?;

        let bridge = InternalApiBridge::from_config(
            api,
            &session,
            Arc::new(session.cookie_store()),
            Arc::new(tabs),
            Some(harvester.clone()),
        )
        .context("Failed to create internal API bridge")?;
        let route = bridge.route().to_string();

        let queue =
            Arc::new(QueueClient::new(&config.backend).context("Failed to create queue client")?);
        let cycle = Arc::new(WorkerCycle::new(
            &config.worker,
            queue.clone(),
            Arc::new(bridge),
        ));

        let (events, events_rx) = event_channel();
        let keepalive = Arc::new(KeepAliveManager::new(
            &config.keepalive,
            cycle.clone(),
            events.clone(),
            shutdown.clone(),
        ));
        let dispatcher = EventDispatcher::new(cycle.clone(), keepalive.clone(), harvester.clone());

        let backend_base_url = queue.base_url().to_string();
        let status = Arc::new(StatusService::new(
            backend_base_url,
            api.auth_mode.to_string(),
            route,
            queue,
            cycle.clone(),
            keepalive.clone(),
            harvester,
            events,
        ));

        Ok(Self {
            config,
            cycle,
            keepalive,
            status,
            dispatcher,
            events_rx,
            shutdown,
        })
    }

    /// Runs until the shutdown signal arrives.
    pub async fn run(self) -> Result<()> {
        let Self {
            config,
            keepalive,
            status,
            dispatcher,
            events_rx,
            shutdown,
            ..
        } = self;
        let mut shutdown_rx = shutdown.subscribe();

        let dispatcher_handle = tokio::spawn(dispatcher.run(events_rx, shutdown.subscribe()));

        // the first cycle failing is recorded in the status, not fatal
        match keepalive.init().await {
            Ok(result) => info!(
                "Startup cycle processed {} job(s), {} failed",
                result.processed_count, result.failure_count
            ),
            Err(e) => warn!("Startup cycle failed: {}", e),
        }

        let server_handle = if config.status_server.enabled {
            let state = AppState { worker: status };
            let bind_address = config.status_server.bind_address.clone();
            let server_shutdown = shutdown.subscribe();
            Some(tokio::spawn(async move {
                serve(&bind_address, state, server_shutdown).await
            }))
        } else {
            info!("Status API disabled");
            None
        };

        let _ = shutdown_rx.recv().await;
        info!("Worker shutting down");

        if let Some(handle) = server_handle {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Status API stopped with error: {}", e),
                Err(e) => error!("Status API task failed: {}", e),
            }
        }
        if let Err(e) = dispatcher_handle.await {
            error!("Event dispatcher task failed: {}", e);
        }

        Ok(())
    }

    /// One cycle without timers or the status API.
    pub async fn run_once(self) -> Result<CycleResult> {
        let result = self
            .cycle
            .run_cycle(TriggerSource::Once)
            .await
            .context("Worker cycle failed")?;
        Ok(result)
    }
}
