use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use relay_config::{AuthMode, InternalApiConfig};
use relay_domain::{ConversionErrorKind, CookieStore};
use relay_errors::{RelayError, RelayResult};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, REFERER};
use reqwest::Method;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::body::{build_request_body, parse_response_text};
use super::response::{ConversionFailure, ResponseRules};
use super::ConversionStrategy;
use crate::components::HeaderHarvester;
use crate::session::BrowserSession;

/// Calls the conversion API straight from the worker process.
pub struct DirectStrategy {
    config: InternalApiConfig,
    rules: ResponseRules,
    body_template: Option<Value>,
    extra_body: Map<String, Value>,
    cookies: Arc<dyn CookieStore>,
    harvester: Option<Arc<HeaderHarvester>>,
    credentialed: reqwest::Client,
    anonymous: reqwest::Client,
}

impl DirectStrategy {
    pub fn new(
        config: &InternalApiConfig,
        session: &BrowserSession,
        cookies: Arc<dyn CookieStore>,
        harvester: Option<Arc<HeaderHarvester>>,
    ) -> RelayResult<Self> {
        let timeout = Duration::from_secs(config.request_timeout_seconds);
        Ok(Self {
            config: config.clone(),
            rules: ResponseRules::from_config(config),
            body_template: config
                .body_template_value()
                .map_err(|e| RelayError::config_error(e.to_string()))?,
            extra_body: config
                .extra_body_value()
                .map_err(|e| RelayError::config_error(e.to_string()))?,
            cookies,
            harvester,
            credentialed: session.client(true, timeout)?,
            anonymous: session.client(false, timeout)?,
        })
    }

    /// Headers in override order; later layers win. Names are lower-cased.
    pub fn request_headers(&self) -> BTreeMap<String, String> {
        let mut headers = BTreeMap::new();
        headers.insert(
            "content-type".to_string(),
            "application/json; charset=UTF-8".to_string(),
        );

        match self.config.auth_mode {
            AuthMode::Bearer => {
                if !self.config.token.trim().is_empty() {
                    headers.insert(
                        "authorization".to_string(),
                        format!("Bearer {}", self.config.token),
                    );
                }
            }
            AuthMode::Cookie => {
                if let Some((cookie_name, header_name)) = self.config.csrf_pair() {
                    match self.cookies.get(&self.config.url, cookie_name) {
                        Some(value) if !value.trim().is_empty() => {
                            headers.insert(header_name.to_ascii_lowercase(), value);
                        }
                        _ => debug!("CSRF cookie {} not present", cookie_name),
                    }
                }
            }
        }

        for (name, value) in &self.config.extra_headers {
            headers.insert(name.to_ascii_lowercase(), value.clone());
        }

        if self.config.use_captured_headers {
            if let Some(harvester) = &self.harvester {
                headers.extend(harvester.snapshot());
            }
        }

        headers
    }

    fn header_map(headers: &BTreeMap<String, String>) -> HeaderMap {
        let mut map = HeaderMap::with_capacity(headers.len());
        for (name, value) in headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    map.insert(name, value);
                }
                _ => warn!("Skipping invalid request header {}", name),
            }
        }
        map
    }
}

#[async_trait]
impl ConversionStrategy for DirectStrategy {
    async fn convert(&self, url: &str) -> Result<String, ConversionFailure> {
        let body = build_request_body(
            self.body_template.as_ref(),
            &self.config.url_field,
            &self.extra_body,
            url,
        );
        let method = Method::from_bytes(self.config.method.trim().to_ascii_uppercase().as_bytes())
            .map_err(|_| {
                ConversionFailure::new(
                    ConversionErrorKind::InvalidInput,
                    format!("Invalid HTTP method: {}", self.config.method),
                )
            })?;

        let client = if self.config.sends_credentials() {
            &self.credentialed
        } else {
            &self.anonymous
        };

        let mut request = client
            .request(method, &self.config.url)
            .headers(Self::header_map(&self.request_headers()))
            .body(body.to_string());
        if let Some(referrer) = self.config.referrer.as_deref().filter(|r| !r.trim().is_empty()) {
            request = request.header(REFERER, referrer);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        debug!("Conversion API answered HTTP {}", status.as_u16());

        let data = parse_response_text(&text);
        self.rules
            .interpret(status.is_success(), status.as_u16(), &data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_config::{HeaderCaptureConfig, SessionConfig};

    struct FixedCookies(Option<String>);

    impl CookieStore for FixedCookies {
        fn get(&self, _url: &str, name: &str) -> Option<String> {
            (name == "csrftoken").then(|| self.0.clone()).flatten()
        }
    }

    fn strategy(
        config: InternalApiConfig,
        csrf: Option<&str>,
        harvester: Option<Arc<HeaderHarvester>>,
    ) -> DirectStrategy {
        let session = BrowserSession::from_config(&SessionConfig::default()).unwrap();
        DirectStrategy::new(
            &config,
            &session,
            Arc::new(FixedCookies(csrf.map(str::to_string))),
            harvester,
        )
        .unwrap()
    }

    #[test]
    fn test_header_override_order() {
        let harvester = Arc::new(HeaderHarvester::new(&HeaderCaptureConfig::default()));
        harvester.init(true);
        harvester.capture(&[
            ("x-sz-sdk-version".to_string(), "9.9.9".to_string()),
            ("csrf-token".to_string(), "captured".to_string()),
        ]);

        let strategy = strategy(InternalApiConfig::default(), Some("from-cookie"), Some(harvester));
        let headers = strategy.request_headers();

        assert_eq!(
            headers.get("content-type").map(String::as_str),
            Some("application/json; charset=UTF-8")
        );
        // captured headers are applied last
        assert_eq!(headers.get("x-sz-sdk-version").map(String::as_str), Some("9.9.9"));
        assert_eq!(headers.get("csrf-token").map(String::as_str), Some("captured"));
        assert!(!headers.contains_key("authorization"));
    }

    #[test]
    fn test_cookie_mode_reads_csrf_from_store() {
        let config = InternalApiConfig {
            use_captured_headers: false,
            ..InternalApiConfig::default()
        };
        let headers = strategy(config.clone(), Some("abc"), None).request_headers();
        assert_eq!(headers.get("csrf-token").map(String::as_str), Some("abc"));

        let headers = strategy(config, None, None).request_headers();
        assert!(!headers.contains_key("csrf-token"));
    }

    #[test]
    fn test_bearer_mode_sends_token_without_csrf() {
        let config = InternalApiConfig {
            auth_mode: AuthMode::Bearer,
            token: "t0k".to_string(),
            ..InternalApiConfig::default()
        };
        let strategy = strategy(config, Some("abc"), None);
        let headers = strategy.request_headers();
        assert_eq!(headers.get("authorization").map(String::as_str), Some("Bearer t0k"));
        assert!(!headers.contains_key("csrf-token"));
        assert!(!strategy.config.sends_credentials());
    }
}
