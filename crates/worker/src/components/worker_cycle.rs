use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockWriteGuard};
use std::time::Duration;

use chrono::Utc;
use relay_config::WorkerConfig;
use relay_domain::{
    ConversionOutcome, CycleResult, JobQueue, LinkConverter, TriggerSource, WorkerRuntimeStatus,
};
use relay_errors::RelayResult;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

const MIN_IDLE_RETRY_DELAY_MS: u64 = 50;

/// Drains up to `max_batch` jobs per trigger, one at a time.
///
/// Only one cycle runs at a time; a trigger that arrives while a cycle is in
/// flight returns a skipped result instead of waiting.
pub struct WorkerCycle {
    queue: Arc<dyn JobQueue>,
    converter: Arc<dyn LinkConverter>,
    max_batch: usize,
    idle_retry_count: u32,
    idle_retry_delay: Duration,
    running: AtomicBool,
    status: RwLock<WorkerRuntimeStatus>,
}

/// Clears the running flag however the cycle ends.
struct RunGuard<'a> {
    cycle: &'a WorkerCycle,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        {
            let mut status = self.cycle.write_status();
            status.last_cycle_finished_at = Some(Utc::now());
            status.running = false;
        }
        self.cycle.running.store(false, Ordering::SeqCst);
    }
}

impl WorkerCycle {
    pub fn new(
        config: &WorkerConfig,
        queue: Arc<dyn JobQueue>,
        converter: Arc<dyn LinkConverter>,
    ) -> Self {
        let status = WorkerRuntimeStatus {
            initialized_at: Some(Utc::now()),
            ..WorkerRuntimeStatus::default()
        };

        Self {
            queue,
            converter,
            max_batch: config.max_batch.max(1),
            idle_retry_count: config.idle_retry_count,
            idle_retry_delay: Duration::from_millis(
                config.idle_retry_delay_ms.max(MIN_IDLE_RETRY_DELAY_MS),
            ),
            running: AtomicBool::new(false),
            status: RwLock::new(status),
        }
    }

    pub fn status(&self) -> WorkerRuntimeStatus {
        self.status.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn write_status(&self) -> RwLockWriteGuard<'_, WorkerRuntimeStatus> {
        self.status.write().unwrap_or_else(|e| e.into_inner())
    }

    pub async fn run_cycle(&self, trigger: TriggerSource) -> RelayResult<CycleResult> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Worker cycle already running, skipping {} trigger", trigger);
            return Ok(CycleResult::skipped(self.status()));
        }
        let _guard = RunGuard { cycle: self };

        {
            let mut status = self.write_status();
            status.running = true;
            status.last_trigger = Some(trigger);
            status.last_cycle_started_at = Some(Utc::now());
        }
        debug!("Worker cycle started by {}", trigger);

        match self.run_batch().await {
            Ok((processed_count, failure_count, last_failure_message)) => {
                {
                    let mut status = self.write_status();
                    status.last_processed_count = processed_count;
                    status.last_failure_count = failure_count;
                    status.last_failure_message = last_failure_message.clone();
                    status.last_error = last_failure_message.clone();
                }
                if processed_count > 0 {
                    info!(
                        "Worker cycle ({}) processed {} job(s), {} failed",
                        trigger, processed_count, failure_count
                    );
                }
                Ok(CycleResult::completed(
                    processed_count,
                    failure_count,
                    last_failure_message,
                ))
            }
            Err(e) => {
                error!("Worker cycle ({}) aborted: {}", trigger, e);
                self.write_status().last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    async fn run_batch(&self) -> RelayResult<(u32, u32, Option<String>)> {
        let mut processed_count = 0u32;
        let mut failure_count = 0u32;
        let mut last_failure_message = None;

        for attempt in 0..self.max_batch {
            // the queue may only just be filling up, so the first fetch gets a few retries
            let outcome = if attempt == 0 {
                self.process_one_with_idle_retry().await?
            } else {
                self.process_one().await?
            };

            match outcome {
                None => break,
                Some(ConversionOutcome::Success { .. }) => processed_count += 1,
                Some(ConversionOutcome::Failure { message }) => {
                    processed_count += 1;
                    failure_count += 1;
                    last_failure_message = Some(message);
                }
            }
        }

        Ok((processed_count, failure_count, last_failure_message))
    }

    async fn process_one_with_idle_retry(&self) -> RelayResult<Option<ConversionOutcome>> {
        let first = self.process_one().await?;
        if first.is_some() {
            return Ok(first);
        }

        for _ in 0..self.idle_retry_count {
            sleep(self.idle_retry_delay).await;
            let retried = self.process_one().await?;
            if retried.is_some() {
                return Ok(retried);
            }
        }
        Ok(None)
    }

    /// Fetches, converts and reports one job. `Ok(None)` means the queue was empty.
    async fn process_one(&self) -> RelayResult<Option<ConversionOutcome>> {
        let Some(job) = self.queue.fetch_next_job().await? else {
            return Ok(None);
        };

        let converted = match self.converter.convert(&job.url).await {
            Ok(aff_link) => self
                .queue
                .report_complete(&job.job_id, &aff_link)
                .await
                .map(|_| aff_link),
            Err(e) => Err(e),
        };

        let outcome = match converted {
            Ok(aff_link) => {
                info!("Job {} converted", job.job_id);
                ConversionOutcome::Success { aff_link }
            }
            Err(e) => {
                let message = e.to_string();
                match e.conversion_kind() {
                    Some(kind) => warn!("Job {} failed ({}): {}", job.job_id, kind, message),
                    None => warn!("Job {} could not be reported: {}", job.job_id, message),
                }
                if let Err(report_err) = self.queue.report_fail(&job.job_id, &message).await {
                    error!("Could not report failure of job {}: {}", job.job_id, report_err);
                }
                ConversionOutcome::Failure { message }
            }
        };

        Ok(Some(outcome))
    }
}
