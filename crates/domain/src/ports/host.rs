use async_trait::async_trait;
use relay_errors::RelayResult;
use serde::{Deserialize, Serialize};

use super::page::{PageRequest, PageResponse};

pub type TabId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TabStatus {
    Loading,
    Complete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabInfo {
    pub id: TabId,
    pub url: String,
    pub status: TabStatus,
}

impl TabInfo {
    pub fn is_complete(&self) -> bool {
        self.status == TabStatus::Complete
    }
}

/// Read access to the session cookie store.
pub trait CookieStore: Send + Sync {
    /// Value of cookie `name` as it would be sent to `url`.
    fn get(&self, url: &str, name: &str) -> Option<String>;
}

/// Live, authenticated pages the worker can borrow for delegated requests.
#[async_trait]
pub trait TabHost: Send + Sync {
    async fn query_tabs(&self, url_patterns: &[String]) -> RelayResult<Vec<TabInfo>>;
    /// Opens a tab and starts loading `url`; the returned record is usually still loading.
    async fn create_tab(&self, url: &str, active: bool) -> RelayResult<TabInfo>;
    async fn update_tab(&self, tab_id: TabId, url: &str) -> RelayResult<TabInfo>;
    async fn get_tab(&self, tab_id: TabId) -> RelayResult<TabInfo>;
    /// Runs the page agent inside the tab's own realm.
    async fn execute_in_page(&self, tab_id: TabId, request: PageRequest) -> RelayResult<PageResponse>;
}

/// An outbound request seen on the wire, header names as sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedRequest {
    pub url: String,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
}

impl ObservedRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Receives outbound traffic as it is sent.
pub trait TrafficObserver: Send + Sync {
    fn observe(&self, request: &ObservedRequest);
}
