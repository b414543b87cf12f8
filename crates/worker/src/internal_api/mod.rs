//! Affiliate link conversion through the target site's private API.

pub mod body;
pub mod delegated;
pub mod direct;
pub mod page_agent;
pub mod response;

use std::sync::Arc;

use async_trait::async_trait;
use relay_config::InternalApiConfig;
use relay_domain::{ConversionErrorKind, CookieStore, LinkConverter, TabHost};
use relay_errors::{RelayError, RelayResult};
use tracing::{debug, info, warn};

pub use delegated::DelegatedStrategy;
pub use direct::DirectStrategy;
pub use response::{ConversionFailure, ResponseRules};

use crate::components::HeaderHarvester;
use crate::session::BrowserSession;

/// One way of reaching the conversion endpoint.
#[async_trait]
pub trait ConversionStrategy: Send + Sync {
    async fn convert(&self, url: &str) -> Result<String, ConversionFailure>;
}

pub struct InternalApiBridge {
    route: String,
    strategy: Box<dyn ConversionStrategy>,
}

impl InternalApiBridge {
    pub fn new(route: impl Into<String>, strategy: Box<dyn ConversionStrategy>) -> Self {
        Self {
            route: route.into(),
            strategy,
        }
    }

    /// Picks the strategy from the auth mode and cookie source.
    pub fn from_config(
        config: &InternalApiConfig,
        session: &BrowserSession,
        cookies: Arc<dyn CookieStore>,
        tabs: Arc<dyn TabHost>,
        harvester: Option<Arc<HeaderHarvester>>,
    ) -> RelayResult<Self> {
        let route = config.route_label();
        let strategy: Box<dyn ConversionStrategy> = if config.uses_delegated_tab() {
            Box::new(DelegatedStrategy::new(config, tabs, harvester)?)
        } else {
            Box::new(DirectStrategy::new(config, session, cookies, harvester)?)
        };
        info!("Internal API route: {}", route);
        Ok(Self::new(route, strategy))
    }

    pub fn route(&self) -> &str {
        &self.route
    }
}

#[async_trait]
impl LinkConverter for InternalApiBridge {
    async fn convert(&self, url: &str) -> RelayResult<String> {
        let url = url.trim();
        if url.is_empty() {
            return Err(RelayError::conversion(
                &self.route,
                ConversionErrorKind::InvalidInput,
                "Missing URL to convert.",
            ));
        }

        match self.strategy.convert(url).await {
            Ok(link) => {
                debug!("[{}] converted {} -> {}", self.route, url, link);
                Ok(link)
            }
            Err(failure) => {
                if failure.kind.needs_operator() {
                    warn!("[{}] conversion needs attention: {}", self.route, failure.message);
                }
                Err(RelayError::conversion(
                    &self.route,
                    failure.kind,
                    failure.message,
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Result<String, ConversionFailure>);

    #[async_trait]
    impl ConversionStrategy for Fixed {
        async fn convert(&self, _url: &str) -> Result<String, ConversionFailure> {
            self.0.clone()
        }
    }

    #[tokio::test]
    async fn test_blank_url_is_invalid_input() {
        let bridge = InternalApiBridge::new("cookie/direct", Box::new(Fixed(Ok("x".into()))));
        let err = bridge.convert("   ").await.unwrap_err();
        assert_eq!(err.conversion_kind(), Some(ConversionErrorKind::InvalidInput));
        assert_eq!(err.to_string(), "[cookie/direct] Missing URL to convert.");
    }

    #[tokio::test]
    async fn test_failures_are_tagged_with_route() {
        let bridge = InternalApiBridge::new(
            "cookie/delegated_tab",
            Box::new(Fixed(Err(ConversionFailure::new(
                ConversionErrorKind::CaptchaRequired,
                "solve the captcha",
            )))),
        );
        let err = bridge.convert("https://shopee.vn/p").await.unwrap_err();
        assert_eq!(err.to_string(), "[cookie/delegated_tab] solve the captcha");
        assert_eq!(err.conversion_kind(), Some(ConversionErrorKind::CaptchaRequired));
    }
}
