use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use relay_domain::match_pattern::any_matches;
use relay_domain::{PageRequest, PageResponse, TabHost, TabId, TabInfo, TabStatus, TrafficObserver};
use relay_errors::{RelayError, RelayResult};
use tracing::{debug, info, warn};
use url::Url;

use super::{BrowserSession, JarCookieStore, SessionRealm};
use crate::internal_api::page_agent;

#[derive(Debug, Clone)]
struct TabRecord {
    url: String,
    status: TabStatus,
    /// Bumped on each navigation so a slow earlier load cannot overwrite a later one.
    generation: u64,
}

type TabTable = Arc<Mutex<BTreeMap<TabId, TabRecord>>>;

/// Tabs backed by the worker's own HTTP session instead of a browser.
///
/// Navigation issues a GET with the session cookies in a background task and
/// settles on the final URL after redirects, so a session that got bounced to
/// a verification page shows up as a tab on that page.
pub struct SessionTabHost {
    client: reqwest::Client,
    session: BrowserSession,
    observer: Option<Arc<dyn TrafficObserver>>,
    tabs: TabTable,
    next_id: AtomicU64,
}

impl SessionTabHost {
    pub fn new(
        session: &BrowserSession,
        timeout: Duration,
        observer: Option<Arc<dyn TrafficObserver>>,
    ) -> RelayResult<Self> {
        Ok(Self {
            client: session.client(true, timeout)?,
            session: session.clone(),
            observer,
            tabs: Arc::new(Mutex::new(BTreeMap::new())),
            next_id: AtomicU64::new(1),
        })
    }

    fn lock(tabs: &TabTable) -> MutexGuard<'_, BTreeMap<TabId, TabRecord>> {
        tabs.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn info(id: TabId, record: &TabRecord) -> TabInfo {
        TabInfo {
            id,
            url: record.url.clone(),
            status: record.status,
        }
    }

    fn navigate(&self, tab_id: TabId, url: &str) -> RelayResult<TabInfo> {
        let target = Url::parse(url)?;

        let (info, generation) = {
            let mut tabs = Self::lock(&self.tabs);
            let record = tabs.entry(tab_id).or_insert_with(|| TabRecord {
                url: String::new(),
                status: TabStatus::Loading,
                generation: 0,
            });
            record.url = target.to_string();
            record.status = TabStatus::Loading;
            record.generation += 1;
            (Self::info(tab_id, record), record.generation)
        };

        let client = self.client.clone();
        let tabs = Arc::clone(&self.tabs);
        tokio::spawn(async move {
            let final_url = match client.get(target.clone()).send().await {
                Ok(response) => {
                    let landed = response.url().to_string();
                    // drain the body like a page load would
                    let _ = response.bytes().await;
                    landed
                }
                Err(e) => {
                    warn!("Tab {} failed to load {}: {}", tab_id, target, e);
                    target.to_string()
                }
            };

            let mut tabs = Self::lock(&tabs);
            if let Some(record) = tabs.get_mut(&tab_id) {
                if record.generation == generation {
                    debug!("Tab {} finished loading {}", tab_id, final_url);
                    record.url = final_url;
                    record.status = TabStatus::Complete;
                }
            }
        });

        Ok(info)
    }
}

#[async_trait]
impl TabHost for SessionTabHost {
    async fn query_tabs(&self, url_patterns: &[String]) -> RelayResult<Vec<TabInfo>> {
        let tabs = Self::lock(&self.tabs);
        Ok(tabs
            .iter()
            .filter(|(_, record)| any_matches(url_patterns, &record.url))
            .map(|(id, record)| Self::info(*id, record))
            .collect())
    }

    async fn create_tab(&self, url: &str, active: bool) -> RelayResult<TabInfo> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        info!("Opening tab {} at {} (active={})", id, url, active);
        self.navigate(id, url)
    }

    async fn update_tab(&self, tab_id: TabId, url: &str) -> RelayResult<TabInfo> {
        if !Self::lock(&self.tabs).contains_key(&tab_id) {
            return Err(RelayError::host(format!("Tab {tab_id} does not exist")));
        }
        self.navigate(tab_id, url)
    }

    async fn get_tab(&self, tab_id: TabId) -> RelayResult<TabInfo> {
        let tabs = Self::lock(&self.tabs);
        tabs.get(&tab_id)
            .map(|record| Self::info(tab_id, record))
            .ok_or_else(|| RelayError::host(format!("Tab {tab_id} does not exist")))
    }

    async fn execute_in_page(&self, tab_id: TabId, request: PageRequest) -> RelayResult<PageResponse> {
        let location = {
            let tabs = Self::lock(&self.tabs);
            let record = tabs
                .get(&tab_id)
                .ok_or_else(|| RelayError::host("Could not run script in the affiliate tab."))?;
            Url::parse(&record.url).map_err(|e| {
                RelayError::host(format!("Affiliate tab has no usable location: {e}"))
            })?
        };

        let realm = SessionRealm::new(
            location,
            self.client.clone(),
            JarCookieStore::new(self.session.jar()),
            self.observer.clone(),
        );
        Ok(page_agent::execute(&realm, &request).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_config::SessionConfig;

    fn host() -> SessionTabHost {
        let session = BrowserSession::from_config(&SessionConfig::default()).unwrap();
        SessionTabHost::new(&session, Duration::from_secs(5), None).unwrap()
    }

    #[tokio::test]
    async fn test_tab_loads_and_is_queryable() {
        let mut server = mockito::Server::new_async().await;
        let page = server
            .mock("GET", "/offer/custom_link")
            .with_status(200)
            .with_body("<html></html>")
            .create_async()
            .await;

        let host = host();
        let url = format!("{}/offer/custom_link", server.url());
        let tab = host.create_tab(&url, false).await.unwrap();
        assert_eq!(tab.status, TabStatus::Loading);

        let mut loaded = host.get_tab(tab.id).await.unwrap();
        for _ in 0..100 {
            if loaded.is_complete() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
            loaded = host.get_tab(tab.id).await.unwrap();
        }
        assert!(loaded.is_complete());
        page.assert_async().await;

        let pattern = format!("{}/*", server.url());
        assert_eq!(host.query_tabs(&[pattern]).await.unwrap().len(), 1);
        assert!(host
            .query_tabs(&["https://affiliate.shopee.vn/*".to_string()])
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_unknown_tab_is_host_error() {
        let host = host();
        assert!(matches!(host.get_tab(42).await, Err(RelayError::Host(_))));
        assert!(matches!(
            host.update_tab(42, "https://affiliate.shopee.vn/").await,
            Err(RelayError::Host(_))
        ));
        assert!(matches!(
            host.execute_in_page(42, PageRequest::default()).await,
            Err(RelayError::Host(_))
        ));
    }
}
