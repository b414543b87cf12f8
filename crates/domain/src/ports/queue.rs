use async_trait::async_trait;
use relay_errors::RelayResult;

use crate::entities::Job;
use crate::status::BackendHealth;

/// Remote job queue the worker drains.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// `Ok(None)` when the queue is empty.
    async fn fetch_next_job(&self) -> RelayResult<Option<Job>>;
    async fn report_complete(&self, job_id: &str, aff_link: &str) -> RelayResult<()>;
    async fn report_fail(&self, job_id: &str, error_message: &str) -> RelayResult<()>;
    /// Never fails; transport problems come back inside the health record.
    async fn check_health(&self) -> BackendHealth;
}

/// Turns a product URL into an affiliate link.
#[async_trait]
pub trait LinkConverter: Send + Sync {
    async fn convert(&self, url: &str) -> RelayResult<String>;
}
