//! Browserless stand-in for the user's logged-in browser: one cookie jar shared by
//! every client and tab the worker uses.

mod realm;
mod tab_host;

use std::sync::Arc;
use std::time::Duration;

use relay_config::SessionConfig;
use relay_domain::CookieStore;
use relay_errors::RelayResult;
use reqwest::cookie::{CookieStore as _, Jar};
use tracing::{debug, warn};
use url::Url;

pub use realm::SessionRealm;
pub use tab_host::SessionTabHost;

#[derive(Clone)]
pub struct BrowserSession {
    jar: Arc<Jar>,
    user_agent: String,
}

impl BrowserSession {
    /// Seeds the jar with the configured `Set-Cookie` strings.
    pub fn from_config(config: &SessionConfig) -> RelayResult<Self> {
        let jar = Arc::new(Jar::default());
        let cookie_url = Url::parse(&config.cookie_url)?;
        for cookie in config.cookies.iter().filter(|c| !c.trim().is_empty()) {
            jar.add_cookie_str(cookie, &cookie_url);
        }
        debug!(
            "Session seeded with {} cookie(s) for {}",
            config.cookies.len(),
            cookie_url
        );

        Ok(Self {
            jar,
            user_agent: config.user_agent.clone(),
        })
    }

    pub fn jar(&self) -> Arc<Jar> {
        Arc::clone(&self.jar)
    }

    /// HTTP client that sends the session cookies, or one that never does.
    pub fn client(&self, with_cookies: bool, timeout: Duration) -> RelayResult<reqwest::Client> {
        let mut builder = reqwest::Client::builder()
            .user_agent(self.user_agent.clone())
            .timeout(timeout);
        if with_cookies {
            builder = builder.cookie_provider(self.jar());
        }
        Ok(builder.build()?)
    }

    pub fn cookie_store(&self) -> JarCookieStore {
        JarCookieStore::new(self.jar())
    }
}

/// [`CookieStore`] over the session jar.
pub struct JarCookieStore {
    jar: Arc<Jar>,
}

impl JarCookieStore {
    pub fn new(jar: Arc<Jar>) -> Self {
        Self { jar }
    }

    /// The `Cookie` header value the jar would send to `url`.
    pub fn cookie_header(&self, url: &Url) -> String {
        self.jar
            .cookies(url)
            .and_then(|value| value.to_str().ok().map(str::to_string))
            .unwrap_or_default()
    }
}

impl CookieStore for JarCookieStore {
    fn get(&self, url: &str, name: &str) -> Option<String> {
        let url = match Url::parse(url) {
            Ok(url) => url,
            Err(e) => {
                warn!("Cannot read cookie {} for invalid URL {}: {}", name, url, e);
                return None;
            }
        };
        cookie_value(&self.cookie_header(&url), name)
    }
}

/// Finds `name` in a `a=1; b=2` cookie string.
pub fn cookie_value(header: &str, name: &str) -> Option<String> {
    if name.is_empty() {
        return None;
    }
    header.split(';').find_map(|part| {
        let (key, value) = part.trim().split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}
