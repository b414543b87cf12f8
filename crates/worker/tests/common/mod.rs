#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use relay_domain::{
    BackendHealth, ConversionErrorKind, Job, JobQueue, LinkConverter, RelayError, RelayResult,
};
use tokio::sync::Notify;

/// In-memory queue that records every call.
#[derive(Default)]
pub struct FakeQueue {
    jobs: Mutex<VecDeque<Job>>,
    /// Jobs that appear after this many empty fetches.
    late_jobs: Mutex<Vec<(usize, Job)>>,
    pub fetches: Mutex<usize>,
    pub completed: Mutex<Vec<(String, String)>>,
    pub failed: Mutex<Vec<(String, String)>>,
    pub fail_fetch: Mutex<bool>,
    pub fail_report_fail: Mutex<bool>,
    pub fail_report_complete: Mutex<bool>,
}

impl FakeQueue {
    pub fn with_jobs(count: usize) -> Arc<Self> {
        let queue = Self::default();
        {
            let mut jobs = queue.jobs.lock().unwrap();
            for i in 0..count {
                jobs.push_back(job(&format!("job-{i}"), &format!("https://shopee.vn/p-{i}")));
            }
        }
        Arc::new(queue)
    }

    pub fn push(&self, job: Job) {
        self.jobs.lock().unwrap().push_back(job);
    }

    /// Makes `job` visible once `after_fetches` fetches have come back empty.
    pub fn push_late(&self, after_fetches: usize, job: Job) {
        self.late_jobs.lock().unwrap().push((after_fetches, job));
    }

    pub fn fetch_count(&self) -> usize {
        *self.fetches.lock().unwrap()
    }

    pub fn completed_ids(&self) -> Vec<String> {
        self.completed
            .lock()
            .unwrap()
            .iter()
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn failed_jobs(&self) -> Vec<(String, String)> {
        self.failed.lock().unwrap().clone()
    }
}

pub fn job(id: &str, url: &str) -> Job {
    Job {
        job_id: id.to_string(),
        url: url.to_string(),
    }
}

#[async_trait]
impl JobQueue for FakeQueue {
    async fn fetch_next_job(&self) -> RelayResult<Option<Job>> {
        let fetch_no = {
            let mut fetches = self.fetches.lock().unwrap();
            *fetches += 1;
            *fetches
        };
        if *self.fail_fetch.lock().unwrap() {
            return Err(RelayError::queue("Could not fetch job (HTTP 500)."));
        }

        let mut late = self.late_jobs.lock().unwrap();
        let mut jobs = self.jobs.lock().unwrap();
        let (ready, waiting): (Vec<_>, Vec<_>) =
            late.drain(..).partition(|(after, _)| fetch_no > *after);
        *late = waiting;
        jobs.extend(ready.into_iter().map(|(_, job)| job));

        Ok(jobs.pop_front())
    }

    async fn report_complete(&self, job_id: &str, aff_link: &str) -> RelayResult<()> {
        if *self.fail_report_complete.lock().unwrap() {
            return Err(RelayError::queue("Could not mark job done (HTTP 409)."));
        }
        self.completed
            .lock()
            .unwrap()
            .push((job_id.to_string(), aff_link.to_string()));
        Ok(())
    }

    async fn report_fail(&self, job_id: &str, error_message: &str) -> RelayResult<()> {
        self.failed
            .lock()
            .unwrap()
            .push((job_id.to_string(), error_message.to_string()));
        if *self.fail_report_fail.lock().unwrap() {
            return Err(RelayError::queue("Could not mark job failed (HTTP 503)."));
        }
        Ok(())
    }

    async fn check_health(&self) -> BackendHealth {
        BackendHealth {
            ok: true,
            started_at: Utc::now(),
            checked_at: Utc::now(),
            status: 200,
            server_time: None,
            error: None,
        }
    }
}

/// Converter that appends `-aff` to the URL, failing for URLs containing `bad`.
#[derive(Default)]
pub struct FakeConverter {
    pub calls: Mutex<Vec<String>>,
    gate: Option<Arc<Notify>>,
}

impl FakeConverter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every conversion waits for `gate` to be notified.
    pub fn gated(gate: Arc<Notify>) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            gate: Some(gate),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl LinkConverter for FakeConverter {
    async fn convert(&self, url: &str) -> RelayResult<String> {
        self.calls.lock().unwrap().push(url.to_string());
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if url.contains("bad") {
            return Err(RelayError::conversion(
                "cookie/direct",
                ConversionErrorKind::FailCode,
                "API returned failCode=7 (expected 0).",
            ));
        }
        Ok(format!("{url}-aff"))
    }
}
