use std::sync::Arc;

use async_trait::async_trait;
use relay_domain::{ObservedRequest, TrafficObserver};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, REFERER};
use reqwest::Method;
use tracing::{debug, warn};
use url::Url;

use super::JarCookieStore;
use crate::internal_api::page_agent::{PageFetch, PageFetchResponse, PageRealm};

/// Page realm of a session tab: its location plus the shared cookie jar.
pub struct SessionRealm {
    location: Url,
    client: reqwest::Client,
    cookies: JarCookieStore,
    observer: Option<Arc<dyn TrafficObserver>>,
}

impl SessionRealm {
    pub fn new(
        location: Url,
        client: reqwest::Client,
        cookies: JarCookieStore,
        observer: Option<Arc<dyn TrafficObserver>>,
    ) -> Self {
        Self {
            location,
            client,
            cookies,
            observer,
        }
    }
}

#[async_trait]
impl PageRealm for SessionRealm {
    fn location(&self) -> Url {
        self.location.clone()
    }

    fn document_cookie(&self) -> String {
        self.cookies.cookie_header(&self.location)
    }

    async fn fetch(&self, request: PageFetch) -> Result<PageFetchResponse, String> {
        let method = Method::from_bytes(request.method.as_bytes()).map_err(|e| e.to_string())?;

        let mut headers = HeaderMap::new();
        for (name, value) in &request.headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => warn!("Page fetch dropped invalid header {}", name),
            }
        }
        if let Some(referer) = referer_for(&request.referrer, &request.referrer_policy, &request.url)
        {
            if let Ok(value) = HeaderValue::from_str(&referer) {
                headers.insert(REFERER, value);
            }
        }

        if let Some(observer) = &self.observer {
            let observed = ObservedRequest {
                url: request.url.to_string(),
                headers: headers
                    .iter()
                    .filter_map(|(name, value)| {
                        value
                            .to_str()
                            .ok()
                            .map(|v| (name.as_str().to_string(), v.to_string()))
                    })
                    .collect(),
            };
            observer.observe(&observed);
        }

        debug!("Page fetch {} {}", request.method, request.url);
        let response = self
            .client
            .request(method, request.url)
            .headers(headers)
            .body(request.body)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(|e| e.to_string())?;
        Ok(PageFetchResponse { status, text })
    }
}

/// `Referer` value a browser would send under `policy`.
fn referer_for(referrer: &str, policy: &str, target: &Url) -> Option<String> {
    let referrer = Url::parse(referrer).ok()?;
    if !matches!(referrer.scheme(), "http" | "https") {
        return None;
    }

    let same_origin = referrer.origin() == target.origin();
    let downgrade = referrer.scheme() == "https" && target.scheme() == "http";
    let full = {
        let mut stripped = referrer.clone();
        stripped.set_fragment(None);
        let _ = stripped.set_username("");
        let _ = stripped.set_password(None);
        stripped.to_string()
    };
    let origin_only = format!("{}/", referrer.origin().ascii_serialization());

    match policy {
        "no-referrer" => None,
        "origin" => Some(origin_only),
        "same-origin" => same_origin.then_some(full),
        "strict-origin" => (!downgrade).then_some(origin_only),
        "origin-when-cross-origin" => Some(if same_origin { full } else { origin_only }),
        "unsafe-url" => Some(full),
        "no-referrer-when-downgrade" => (!downgrade).then_some(full),
        // strict-origin-when-cross-origin
        _ => {
            if same_origin {
                Some(full)
            } else if downgrade {
                None
            } else {
                Some(origin_only)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> Url {
        Url::parse("https://affiliate.shopee.vn/api/v3/gql?q=batchCustomLink").unwrap()
    }

    #[test]
    fn test_referer_policies() {
        let same = "https://affiliate.shopee.vn/offer/custom_link#top";
        assert_eq!(
            referer_for(same, "strict-origin-when-cross-origin", &target()).as_deref(),
            Some("https://affiliate.shopee.vn/offer/custom_link")
        );
        assert_eq!(
            referer_for("https://shopee.vn/p", "strict-origin-when-cross-origin", &target())
                .as_deref(),
            Some("https://shopee.vn/")
        );
        assert_eq!(referer_for(same, "no-referrer", &target()), None);
        assert_eq!(
            referer_for(same, "origin", &target()).as_deref(),
            Some("https://affiliate.shopee.vn/")
        );
        assert_eq!(referer_for("about:blank", "unsafe-url", &target()), None);
    }
}
