use serde::{Deserialize, Serialize};

use crate::status::WorkerRuntimeStatus;

/// One queued link conversion. Owned by the remote queue; the worker only holds it while converting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub job_id: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionOutcome {
    Success { aff_link: String },
    Failure { message: String },
}

/// What woke the worker up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TriggerSource {
    Startup,
    Alarm,
    KeepaliveTick,
    RunNow,
    Once,
}

impl TriggerSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerSource::Startup => "startup",
            TriggerSource::Alarm => "alarm",
            TriggerSource::KeepaliveTick => "keepaliveTick",
            TriggerSource::RunNow => "runNow",
            TriggerSource::Once => "once",
        }
    }
}

impl std::fmt::Display for TriggerSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one `run_cycle` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleResult {
    pub skipped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub processed_count: u32,
    pub failure_count: u32,
    pub last_failure_message: Option<String>,
    /// Only set on skipped results, so the caller can see the cycle in flight.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<WorkerRuntimeStatus>,
}

impl CycleResult {
    pub fn skipped(status: WorkerRuntimeStatus) -> Self {
        Self {
            skipped: true,
            reason: Some("running".to_string()),
            processed_count: 0,
            failure_count: 0,
            last_failure_message: None,
            status: Some(status),
        }
    }

    pub fn completed(
        processed_count: u32,
        failure_count: u32,
        last_failure_message: Option<String>,
    ) -> Self {
        Self {
            skipped: false,
            reason: None,
            processed_count,
            failure_count,
            last_failure_message,
            status: None,
        }
    }
}
