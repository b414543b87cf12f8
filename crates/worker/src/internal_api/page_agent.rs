//! Logic executed inside a tab's page realm on behalf of the delegated strategy.
//!
//! The agent only sees what a page script would: its own location, its own
//! cookies and a `fetch` that carries the page's session. It re-checks the
//! page origin before firing, so a tab that drifted to a verification page or
//! another site never sends the conversion request.

use std::collections::BTreeMap;

use async_trait::async_trait;
use percent_encoding::percent_decode_str;
use relay_domain::{PageFailure, PageRequest, PageResponse};
use serde_json::{json, Value};
use url::Url;

use super::body::{build_request_body, parse_response_text};
use crate::session::cookie_value;

pub const DEFAULT_REFERRER_POLICY: &str = "strict-origin-when-cross-origin";

/// Request as issued by page script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageFetch {
    pub method: String,
    pub url: Url,
    pub headers: BTreeMap<String, String>,
    pub body: String,
    pub referrer: String,
    pub referrer_policy: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageFetchResponse {
    pub status: u16,
    pub text: String,
}

/// What a page script can reach.
#[async_trait]
pub trait PageRealm: Send + Sync {
    fn location(&self) -> Url;
    /// `document.cookie` of the page.
    fn document_cookie(&self) -> String;
    async fn fetch(&self, request: PageFetch) -> Result<PageFetchResponse, String>;
}

pub async fn execute(realm: &dyn PageRealm, input: &PageRequest) -> PageResponse {
    let location = realm.location();
    let page_origin = location.origin().ascii_serialization();

    let url = input.url.trim();
    if url.is_empty() {
        return PageResponse::failure(PageFailure::MissingUrl, 0, "Missing URL to convert.", json!({}));
    }

    let request_url = location
        .join(&input.request_url)
        .ok()
        .filter(|u| u.origin().is_tuple());
    let request_origin = request_url
        .as_ref()
        .map(|u| u.origin().ascii_serialization())
        .unwrap_or_default();
    let diagnostics = json!({
        "pageOrigin": page_origin,
        "requestOrigin": request_origin,
        "pageUrl": location.as_str(),
    });

    let Some(request_url) = request_url else {
        return PageResponse::failure(
            PageFailure::InvalidRequestUrl,
            0,
            "Internal API URL is invalid.",
            diagnostics,
        );
    };

    if page_origin != request_origin {
        return if on_captcha_page(&location, &input.captcha_path_markers) {
            PageResponse::failure(
                PageFailure::CaptchaRequired,
                0,
                "The site requires captcha verification. Open the worker tab, complete the verification and try again.",
                diagnostics,
            )
        } else {
            PageResponse::failure(
                PageFailure::WrongOrigin,
                0,
                "The worker tab is not on the affiliate domain. Reopen the custom link page and try again.",
                diagnostics,
            )
        };
    }

    let mut headers = BTreeMap::new();
    headers.insert(
        "content-type".to_string(),
        "application/json; charset=UTF-8".to_string(),
    );
    for (name, value) in &input.extra_headers {
        headers.insert(name.to_ascii_lowercase(), value.clone());
    }
    if let (Some(cookie_name), Some(header_name)) =
        (input.csrf_cookie_name.as_deref(), input.csrf_header_name.as_deref())
    {
        if !header_name.is_empty() {
            if let Some(csrf) = cookie_value(&realm.document_cookie(), cookie_name)
                .map(|v| decode_cookie_value(&v))
                .filter(|v| !v.is_empty())
            {
                headers.insert(header_name.to_ascii_lowercase(), csrf);
            }
        }
    }

    let method = if input.method.trim().is_empty() {
        "POST".to_string()
    } else {
        input.method.trim().to_ascii_uppercase()
    };
    let body = build_request_body(input.body_template.as_ref(), &input.url_field, &input.extra_body, url);

    let fetch = PageFetch {
        method,
        url: request_url,
        headers,
        body: body.to_string(),
        referrer: non_empty(input.referrer.as_deref()).unwrap_or_else(|| location.to_string()),
        referrer_policy: non_empty(input.referrer_policy.as_deref())
            .unwrap_or_else(|| DEFAULT_REFERRER_POLICY.to_string()),
    };

    match realm.fetch(fetch).await {
        Ok(response) => {
            let data = parse_response_text(&response.text);
            if (200..300).contains(&response.status) {
                PageResponse::success(response.status, data)
            } else {
                let error = ["error", "message"]
                    .iter()
                    .find_map(|key| data.get(*key).and_then(Value::as_str).filter(|s| !s.is_empty()))
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("HTTP {}", response.status));
                PageResponse::failure(PageFailure::HttpStatus, response.status, error, data)
            }
        }
        Err(message) => {
            let message = if message.is_empty() {
                "Page fetch failed.".to_string()
            } else {
                message
            };
            PageResponse::failure(PageFailure::FetchFailed, 0, message, diagnostics)
        }
    }
}

fn on_captcha_page(location: &Url, markers: &[String]) -> bool {
    let path = location.path().to_ascii_lowercase();
    markers
        .iter()
        .filter(|m| !m.is_empty())
        .any(|marker| path.contains(&marker.to_ascii_lowercase()))
}

/// Malformed escapes leave the value as it was.
fn decode_cookie_value(raw: &str) -> String {
    percent_decode_str(raw)
        .decode_utf8()
        .map(|v| v.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
