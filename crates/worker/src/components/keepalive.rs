use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use chrono::Utc;
use relay_config::KeepAliveConfig;
use relay_domain::{CycleResult, KeepAliveStatus, TriggerSource};
use relay_errors::RelayResult;
use tokio::task::JoinHandle;
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::dispatcher::{EventSender, HostEvent};
use super::WorkerCycle;
use crate::shutdown::ShutdownManager;

/// Keeps the worker polling: a fast helper ping plus a coarse fallback timer.
pub struct KeepAliveManager {
    config: KeepAliveConfig,
    cycle: Arc<WorkerCycle>,
    events: EventSender,
    shutdown: ShutdownManager,
    status: RwLock<KeepAliveStatus>,
    timers_bound: AtomicBool,
    helper: Mutex<Option<JoinHandle<()>>>,
    alarm: Mutex<Option<JoinHandle<()>>>,
}

impl KeepAliveManager {
    pub fn new(
        config: &KeepAliveConfig,
        cycle: Arc<WorkerCycle>,
        events: EventSender,
        shutdown: ShutdownManager,
    ) -> Self {
        let status = KeepAliveStatus {
            helper_supported: config.helper_enabled,
            ..KeepAliveStatus::default()
        };

        Self {
            config: config.clone(),
            cycle,
            events,
            shutdown,
            status: RwLock::new(status),
            timers_bound: AtomicBool::new(false),
            helper: Mutex::new(None),
            alarm: Mutex::new(None),
        }
    }

    /// Starts the timers once and runs the first cycle.
    pub async fn init(&self) -> RelayResult<CycleResult> {
        if !self.timers_bound.swap(true, Ordering::SeqCst) {
            self.setup_alarm();
        }
        self.status_mut().initialized_at = Some(Utc::now());
        self.ensure_helper();

        match self.cycle.run_cycle(TriggerSource::Startup).await {
            Ok(result) => {
                self.status_mut().last_init_error = None;
                info!("Keepalive initialized");
                Ok(result)
            }
            Err(e) => {
                error!("Initial worker cycle failed: {}", e);
                self.status_mut().last_init_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    fn setup_alarm(&self) {
        let period = Duration::from_secs(self.config.alarm_period_seconds.max(60));
        let events = self.events.clone();
        let mut shutdown_rx = self.shutdown.subscribe();

        let handle = tokio::spawn(async move {
            let mut alarm = interval_at(Instant::now() + period, period);
            alarm.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = alarm.tick() => {
                        if let Err(e) = events.send(HostEvent::Alarm) {
                            warn!("Alarm could not reach the worker: {}", e);
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!("Keepalive alarm shutting down");
                        break;
                    }
                }
            }
        });

        *self.alarm.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
        info!("Keepalive alarm set every {:?}", period);
    }

    /// Starts the ping helper unless it is disabled or already alive.
    pub fn ensure_helper(&self) {
        if !self.config.helper_enabled {
            return;
        }

        let mut helper = self.helper.lock().unwrap_or_else(|e| e.into_inner());
        if helper.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }

        let every = Duration::from_secs(self.config.ping_interval_seconds.max(1));
        let events = self.events.clone();
        let mut shutdown_rx = self.shutdown.subscribe();

        // first tick fires immediately
        *helper = Some(tokio::spawn(async move {
            let mut ping = interval(every);
            ping.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ping.tick() => {
                        if let Err(e) = events.send(HostEvent::KeepAlivePing) {
                            debug!("Keepalive ping not delivered: {}", e);
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!("Keepalive helper shutting down");
                        break;
                    }
                }
            }
        }));
        self.status_mut().helper_active = true;
        info!("Keepalive helper pinging every {:?}", every);
    }

    /// Called for every helper ping that reaches the dispatcher.
    pub fn record_tick(&self) {
        self.status_mut().last_keepalive_tick_at = Some(Utc::now());
    }

    pub fn helper_alive(&self) -> bool {
        self.helper
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    pub fn status(&self) -> KeepAliveStatus {
        let helper_active = self.helper_alive();
        let mut status = self.status_mut();
        status.helper_active = helper_active;
        status.clone()
    }

    fn status_mut(&self) -> std::sync::RwLockWriteGuard<'_, KeepAliveStatus> {
        self.status.write().unwrap_or_else(|e| e.into_inner())
    }
}
