use crate::validation::{ConfigValidator, ValidationUtils};
use serde::{Deserialize, Serialize};

/// Remote job queue the worker polls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: String,
    pub worker_key: String,
    pub request_timeout_seconds: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8787".to_string(),
            worker_key: "change-me-worker-key".to_string(),
            request_timeout_seconds: 15,
        }
    }
}

impl ConfigValidator for BackendConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_http_url(&self.base_url, "backend.base_url")?;
        ValidationUtils::validate_not_empty(&self.worker_key, "backend.worker_key")?;
        ValidationUtils::validate_range(
            self.request_timeout_seconds,
            "backend.request_timeout_seconds",
            1,
            300,
        )?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Upper bound of job attempts per cycle.
    pub max_batch: usize,
    /// Extra fetches on the first attempt when the queue is empty.
    pub idle_retry_count: u32,
    pub idle_retry_delay_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_batch: 15,
            idle_retry_count: 3,
            idle_retry_delay_ms: 250,
        }
    }
}

impl ConfigValidator for WorkerConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_count(self.max_batch, "worker.max_batch", 100)?;
        if self.idle_retry_count > 50 {
            return Err(crate::ConfigError::Validation(
                "worker.idle_retry_count must be less than or equal to 50".to_string(),
            ));
        }
        ValidationUtils::validate_range(
            self.idle_retry_delay_ms,
            "worker.idle_retry_delay_ms",
            50,
            10_000,
        )?;
        Ok(())
    }
}
