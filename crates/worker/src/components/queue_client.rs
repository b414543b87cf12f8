use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use relay_config::BackendConfig;
use relay_domain::{BackendHealth, Job, JobQueue};
use relay_errors::{RelayError, RelayResult};
use reqwest::Response;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use url::Url;

const WORKER_KEY_HEADER: &str = "X-Worker-Key";

/// HTTP client for the remote job queue.
pub struct QueueClient {
    base_url: Url,
    worker_key: String,
    http_client: reqwest::Client,
}

impl QueueClient {
    pub fn new(config: &BackendConfig) -> RelayResult<Self> {
        let base_url = Url::parse(config.base_url.trim_end_matches('/'))?;
        if base_url.cannot_be_a_base() {
            return Err(RelayError::config_error(format!(
                "backend.base_url cannot be used as a base URL: {}",
                config.base_url
            )));
        }

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()?;

        Ok(Self {
            base_url,
            worker_key: config.worker_key.clone(),
            http_client,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    /// Joins path segments onto the base URL, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn error_message(response: Response, fallback: String) -> String {
        let data: Value = response.json().await.unwrap_or(Value::Null);
        data.get("error")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or(fallback)
    }

    /// A job without a usable `url` still has to reach `/fail`, so only the `jobId` is required.
    fn parse_job(value: &Value) -> RelayResult<Job> {
        let job_id = match value.get("jobId") {
            Some(Value::String(id)) if !id.trim().is_empty() => id.clone(),
            Some(Value::Number(id)) => id.to_string(),
            _ => return Err(RelayError::queue("Queue returned a job without a jobId.")),
        };
        let url = value
            .get("url")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        Ok(Job { job_id, url })
    }

    async fn post_report(&self, job_id: &str, action: &str, body: Value) -> RelayResult<()> {
        let url = self.endpoint(&["api", "worker", "jobs", job_id, action]);

        let response = self
            .http_client
            .post(url)
            .header(WORKER_KEY_HEADER, &self.worker_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| RelayError::queue(format!("Queue connection error: {e}")))?;

        if response.status().is_success() {
            debug!("Reported job {} as {}", job_id, action);
            Ok(())
        } else {
            let status = response.status().as_u16();
            let label = if action == "complete" { "done" } else { "failed" };
            let message = Self::error_message(
                response,
                format!("Could not mark job {label} (HTTP {status})."),
            )
            .await;
            warn!("Failed to report job {} as {}: {}", job_id, action, message);
            Err(RelayError::queue(message))
        }
    }
}

#[async_trait]
impl JobQueue for QueueClient {
    async fn fetch_next_job(&self) -> RelayResult<Option<Job>> {
        let url = self.endpoint(&["api", "worker", "jobs", "next"]);

        let response = self
            .http_client
            .get(url)
            .header(WORKER_KEY_HEADER, &self.worker_key)
            .send()
            .await
            .map_err(|e| RelayError::queue(format!("Queue connection error: {e}")))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message =
                Self::error_message(response, format!("Could not fetch job (HTTP {status}).")).await;
            warn!("Fetching next job failed: {}", message);
            return Err(RelayError::queue(message));
        }

        let data: Value = response.json().await.unwrap_or(Value::Null);
        match data.get("job") {
            None | Some(Value::Null) => Ok(None),
            Some(job) => {
                let job = Self::parse_job(job)?;
                info!("Fetched job {}", job.job_id);
                Ok(Some(job))
            }
        }
    }

    async fn report_complete(&self, job_id: &str, aff_link: &str) -> RelayResult<()> {
        self.post_report(job_id, "complete", json!({ "affLink": aff_link }))
            .await
    }

    async fn report_fail(&self, job_id: &str, error_message: &str) -> RelayResult<()> {
        self.post_report(job_id, "fail", json!({ "error": error_message }))
            .await
    }

    async fn check_health(&self) -> BackendHealth {
        let started_at = Utc::now();
        let url = self.endpoint(&["api", "health"]);

        match self.http_client.get(url).send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                let success = response.status().is_success();
                let data: Value = response.json().await.unwrap_or(Value::Null);

                if success {
                    BackendHealth {
                        ok: data.get("ok").and_then(Value::as_bool).unwrap_or(false),
                        started_at,
                        checked_at: Utc::now(),
                        status,
                        server_time: data.get("time").and_then(Value::as_str).map(str::to_string),
                        error: None,
                    }
                } else {
                    let error = data
                        .get("error")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("Backend health check failed (HTTP {status})."));
                    BackendHealth {
                        ok: false,
                        started_at,
                        checked_at: Utc::now(),
                        status,
                        server_time: None,
                        error: Some(error),
                    }
                }
            }
            Err(e) => {
                debug!("Backend health check could not connect: {}", e);
                BackendHealth {
                    ok: false,
                    started_at,
                    checked_at: Utc::now(),
                    status: 0,
                    server_time: None,
                    error: Some(format!("Could not reach backend: {e}")),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base_url: &str) -> QueueClient {
        QueueClient::new(&BackendConfig {
            base_url: base_url.to_string(),
            ..BackendConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_endpoint_encodes_job_id() {
        let client = client("http://127.0.0.1:8787/");
        let url = client.endpoint(&["api", "worker", "jobs", "a/b c", "complete"]);
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:8787/api/worker/jobs/a%2Fb%20c/complete"
        );
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let client = client("https://queue.example.com/relay");
        let url = client.endpoint(&["api", "health"]);
        assert_eq!(url.as_str(), "https://queue.example.com/relay/api/health");
        assert_eq!(client.base_url(), "https://queue.example.com/relay");
    }
}
