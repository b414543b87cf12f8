use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use relay_config::InternalApiConfig;
use relay_domain::{ConversionErrorKind, PageFailure, PageRequest, TabHost, TabId, TabInfo};
use relay_errors::{RelayError, RelayResult};
use serde_json::{Map, Value};
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use super::response::{ConversionFailure, ResponseRules};
use super::ConversionStrategy;
use crate::components::HeaderHarvester;

/// Issues the conversion request from inside a live tab on the affiliate site.
pub struct DelegatedStrategy {
    config: InternalApiConfig,
    rules: ResponseRules,
    api_origin: String,
    body_template: Option<Value>,
    extra_body: Map<String, Value>,
    tabs: Arc<dyn TabHost>,
    harvester: Option<Arc<HeaderHarvester>>,
}

impl DelegatedStrategy {
    pub fn new(
        config: &InternalApiConfig,
        tabs: Arc<dyn TabHost>,
        harvester: Option<Arc<HeaderHarvester>>,
    ) -> RelayResult<Self> {
        let to_config_error = |e: relay_config::ConfigError| RelayError::config_error(e.to_string());
        Ok(Self {
            config: config.clone(),
            rules: ResponseRules::from_config(config),
            api_origin: config.api_origin().map_err(to_config_error)?,
            body_template: config.body_template_value().map_err(to_config_error)?,
            extra_body: config.extra_body_value().map_err(to_config_error)?,
            tabs,
            harvester,
        })
    }

    /// Finds a tab on the API origin, repointing or opening one when needed.
    pub async fn ensure_tab(&self) -> Result<TabInfo, ConversionFailure> {
        let tabs = self.tabs.query_tabs(&self.config.tab_match_urls).await?;

        if !tabs.is_empty() {
            let mut tab = tabs
                .iter()
                .find(|t| origin_of(&t.url) == self.api_origin)
                .unwrap_or(&tabs[0])
                .clone();

            let current_origin = origin_of(&tab.url);
            if !current_origin.is_empty() && current_origin != self.api_origin {
                info!(
                    "Tab {} is on {}, navigating to {}",
                    tab.id, current_origin, self.config.tab_open_url
                );
                tab = self
                    .tabs
                    .update_tab(tab.id, &self.config.tab_open_url)
                    .await?;
            }
            self.wait_tab_complete(tab.id).await;
            return Ok(tab);
        }

        if !self.config.auto_open_tab {
            return Err(ConversionFailure::new(
                ConversionErrorKind::NoTab,
                format!(
                    "No affiliate tab is open. Open {} first.",
                    self.config.tab_open_url
                ),
            ));
        }

        info!("Opening background tab at {}", self.config.tab_open_url);
        let tab = self
            .tabs
            .create_tab(&self.config.tab_open_url, false)
            .await?;
        self.wait_tab_complete(tab.id).await;
        Ok(tab)
    }

    /// Polls until the tab finishes loading. Timing out is not an error.
    pub async fn wait_tab_complete(&self, tab_id: TabId) {
        let timeout = Duration::from_millis(self.config.tab_ready_timeout_ms);
        let poll = Duration::from_millis(self.config.tab_poll_interval_ms.max(10));
        let started = Instant::now();

        while started.elapsed() < timeout {
            match self.tabs.get_tab(tab_id).await {
                Ok(tab) if tab.is_complete() => return,
                Ok(_) => {}
                Err(e) => debug!("Tab {} not readable yet: {}", tab_id, e),
            }
            sleep(poll).await;
        }
        warn!(
            "Tab {} did not finish loading within {:?}, continuing anyway",
            tab_id, timeout
        );
    }

    fn page_request(&self, url: &str) -> PageRequest {
        let mut extra_headers = self.config.extra_headers.clone();
        if self.config.use_captured_headers {
            if let Some(harvester) = &self.harvester {
                extra_headers.extend(harvester.snapshot());
            }
        }

        PageRequest {
            url: url.to_string(),
            request_url: self.config.url.clone(),
            method: self.config.method.clone(),
            body_template: self.body_template.clone(),
            url_field: self.config.url_field.clone(),
            extra_body: self.extra_body.clone(),
            extra_headers,
            csrf_cookie_name: self.config.csrf_cookie_name.clone(),
            csrf_header_name: self.config.csrf_header_name.clone(),
            referrer: self.config.referrer.clone(),
            referrer_policy: self.config.referrer_policy.clone(),
            captcha_path_markers: self.config.captcha_path_markers.clone(),
        }
    }
}

#[async_trait]
impl ConversionStrategy for DelegatedStrategy {
    async fn convert(&self, url: &str) -> Result<String, ConversionFailure> {
        let tab = self.ensure_tab().await?;
        let response = self
            .tabs
            .execute_in_page(tab.id, self.page_request(url))
            .await?;

        let mut data = match &response.data {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        };
        if let Some(error) = &response.error {
            if !data.contains_key("error") {
                data.insert("error".to_string(), Value::String(error.clone()));
            }
        }

        // other page failures keep the kind the response rules assign
        let page_kind = match response.failure {
            Some(PageFailure::WrongOrigin) => Some(ConversionErrorKind::WrongOrigin),
            Some(PageFailure::CaptchaRequired) => Some(ConversionErrorKind::CaptchaRequired),
            Some(PageFailure::MissingUrl) | Some(PageFailure::InvalidRequestUrl) => {
                Some(ConversionErrorKind::InvalidInput)
            }
            _ => None,
        };

        self.rules
            .interpret(response.ok, response.status, &Value::Object(data))
            .map_err(|mut failure| {
                if let Some(kind) = page_kind.filter(|_| !response.ok) {
                    failure.kind = kind;
                }
                failure
            })
    }
}

fn origin_of(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .filter(|u| u.origin().is_tuple())
        .map(|u| u.origin().ascii_serialization())
        .unwrap_or_default()
}
