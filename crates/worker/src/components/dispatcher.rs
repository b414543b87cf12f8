use std::sync::Arc;

use relay_domain::{CycleResult, ObservedRequest, TrafficObserver, TriggerSource};
use relay_errors::{RelayError, RelayResult};
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, error, info};

use super::{HeaderHarvester, KeepAliveManager, WorkerCycle};

/// Everything the host can tell the worker.
#[derive(Debug)]
pub enum HostEvent {
    Alarm,
    /// Sent by the keepalive helper.
    KeepAlivePing,
    RunNow {
        reply: oneshot::Sender<RelayResult<CycleResult>>,
    },
    Traffic(ObservedRequest),
}

/// Cloneable handle for posting host events.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<HostEvent>,
}

impl EventSender {
    pub fn send(&self, event: HostEvent) -> RelayResult<()> {
        self.tx
            .send(event)
            .map_err(|_| RelayError::Internal("Worker event loop is not running.".to_string()))
    }

    /// Runs a cycle through the event loop and waits for its result.
    pub async fn run_now(&self) -> RelayResult<CycleResult> {
        let (reply, rx) = oneshot::channel();
        self.send(HostEvent::RunNow { reply })?;
        rx.await
            .map_err(|_| RelayError::Internal("Run now was dropped before finishing.".to_string()))?
    }
}

pub fn event_channel() -> (EventSender, mpsc::UnboundedReceiver<HostEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSender { tx }, rx)
}

/// Routes host events to the worker cycle, the keepalive status and the harvester.
///
/// Each trigger runs its cycle in a spawned task, so the loop keeps draining
/// events while a cycle is in flight and overlapping triggers come back skipped.
pub struct EventDispatcher {
    cycle: Arc<WorkerCycle>,
    keepalive: Arc<KeepAliveManager>,
    harvester: Arc<HeaderHarvester>,
}

impl EventDispatcher {
    pub fn new(
        cycle: Arc<WorkerCycle>,
        keepalive: Arc<KeepAliveManager>,
        harvester: Arc<HeaderHarvester>,
    ) -> Self {
        Self {
            cycle,
            keepalive,
            harvester,
        }
    }

    pub async fn run(
        self,
        mut events: mpsc::UnboundedReceiver<HostEvent>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        info!("Event dispatcher started");
        loop {
            tokio::select! {
                event = events.recv() => {
                    match event {
                        Some(event) => self.dispatch(event),
                        None => break,
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Event dispatcher shutting down");
                    break;
                }
            }
        }
    }

    pub fn dispatch(&self, event: HostEvent) {
        match event {
            HostEvent::Alarm => self.spawn_cycle(TriggerSource::Alarm),
            HostEvent::KeepAlivePing => {
                self.keepalive.record_tick();
                self.spawn_cycle(TriggerSource::KeepaliveTick);
            }
            HostEvent::RunNow { reply } => {
                let cycle = Arc::clone(&self.cycle);
                tokio::spawn(async move {
                    let result = cycle.run_cycle(TriggerSource::RunNow).await;
                    if reply.send(result).is_err() {
                        debug!("Run now caller went away before the result");
                    }
                });
            }
            HostEvent::Traffic(request) => self.harvester.observe(&request),
        }
    }

    fn spawn_cycle(&self, trigger: TriggerSource) {
        let cycle = Arc::clone(&self.cycle);
        tokio::spawn(async move {
            if let Err(e) = cycle.run_cycle(trigger).await {
                error!("Worker {} cycle failed: {}", trigger, e);
            }
        });
    }
}
