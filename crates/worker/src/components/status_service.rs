use std::sync::Arc;

use relay_domain::{JobQueue, ObservedRequest, StatusReply, StatusSnapshot};
use relay_errors::RelayResult;
use tracing::{debug, warn};

use super::dispatcher::{EventSender, HostEvent};
use super::{HeaderHarvester, KeepAliveManager, WorkerCycle};

/// Read side of the worker plus the host inlets the status server exposes.
pub struct StatusService {
    backend_base_url: String,
    auth_mode: String,
    route: String,
    queue: Arc<dyn JobQueue>,
    cycle: Arc<WorkerCycle>,
    keepalive: Arc<KeepAliveManager>,
    harvester: Arc<HeaderHarvester>,
    events: EventSender,
}

impl StatusService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        backend_base_url: impl Into<String>,
        auth_mode: impl Into<String>,
        route: impl Into<String>,
        queue: Arc<dyn JobQueue>,
        cycle: Arc<WorkerCycle>,
        keepalive: Arc<KeepAliveManager>,
        harvester: Arc<HeaderHarvester>,
        events: EventSender,
    ) -> Self {
        Self {
            backend_base_url: backend_base_url.into(),
            auth_mode: auth_mode.into(),
            route: route.into(),
            queue,
            cycle,
            keepalive,
            harvester,
            events,
        }
    }

    pub async fn snapshot(&self) -> StatusSnapshot {
        let backend_health = self.queue.check_health().await;
        StatusSnapshot {
            backend_base_url: self.backend_base_url.clone(),
            auth_mode: self.auth_mode.clone(),
            route: self.route.clone(),
            backend_health,
            keep_alive: self.keepalive.status(),
            worker: self.cycle.status(),
            header_cache: self.harvester.status(),
        }
    }

    pub async fn status(&self) -> StatusReply {
        StatusReply::status(self.snapshot().await)
    }

    /// Runs a cycle right away; failures come back inside the reply.
    pub async fn run_now(&self) -> StatusReply {
        match self.events.run_now().await {
            Ok(result) => StatusReply::ran(result, self.snapshot().await),
            Err(e) => {
                warn!("Run now failed: {}", e);
                StatusReply::failed(e.to_string())
            }
        }
    }

    /// Forwards an external helper ping to the dispatcher.
    pub fn ping(&self) -> RelayResult<()> {
        debug!("External keepalive ping");
        self.events.send(HostEvent::KeepAlivePing)
    }

    pub fn observe(&self, request: ObservedRequest) -> RelayResult<()> {
        self.events.send(HostEvent::Traffic(request))
    }
}
