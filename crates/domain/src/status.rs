use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::{CycleResult, TriggerSource};

/// Process-wide worker state. Mutated only by the worker cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerRuntimeStatus {
    pub running: bool,
    pub initialized_at: Option<DateTime<Utc>>,
    pub last_trigger: Option<TriggerSource>,
    pub last_cycle_started_at: Option<DateTime<Utc>>,
    pub last_cycle_finished_at: Option<DateTime<Utc>>,
    pub last_processed_count: u32,
    pub last_failure_count: u32,
    pub last_failure_message: Option<String>,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeepAliveStatus {
    pub initialized_at: Option<DateTime<Utc>>,
    pub last_init_error: Option<String>,
    pub helper_supported: bool,
    pub helper_active: bool,
    pub last_keepalive_tick_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaderCacheStatus {
    pub enabled: bool,
    pub initialized_at: Option<DateTime<Utc>>,
    pub last_captured_at: Option<DateTime<Utc>>,
    pub header_count: usize,
    /// Names only; captured values never leave the harvester through status.
    pub names: Vec<String>,
}

/// Outcome of probing the queue backend's `/health` endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendHealth {
    pub ok: bool,
    pub started_at: DateTime<Utc>,
    pub checked_at: DateTime<Utc>,
    /// HTTP status, or 0 when the request never produced a response.
    pub status: u16,
    pub server_time: Option<String>,
    pub error: Option<String>,
}

/// Everything the status boundary reports about the worker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub backend_base_url: String,
    pub auth_mode: String,
    pub route: String,
    pub backend_health: BackendHealth,
    pub keep_alive: KeepAliveStatus,
    pub worker: WorkerRuntimeStatus,
    pub header_cache: HeaderCacheStatus,
}

/// Reply envelope of the status boundary. Failures are reported, never thrown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReply {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<StatusSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<CycleResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatusReply {
    pub fn status(snapshot: StatusSnapshot) -> Self {
        Self {
            ok: true,
            status: Some(snapshot),
            result: None,
            error: None,
        }
    }

    pub fn ran(result: CycleResult, snapshot: StatusSnapshot) -> Self {
        Self {
            ok: true,
            status: Some(snapshot),
            result: Some(result),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            status: None,
            result: None,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_reply_shape() {
        let value = serde_json::to_value(StatusReply::failed("boom")).unwrap();
        assert_eq!(value, serde_json::json!({"ok": false, "error": "boom"}));
    }

    #[test]
    fn test_worker_status_field_names() {
        let status = WorkerRuntimeStatus {
            last_trigger: Some(TriggerSource::Alarm),
            last_processed_count: 3,
            ..Default::default()
        };
        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["lastTrigger"], serde_json::json!("alarm"));
        assert_eq!(value["lastProcessedCount"], serde_json::json!(3));
        assert_eq!(value["running"], serde_json::json!(false));
    }
}
