//! Message contract between the bridge and the page agent running inside a tab.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    /// Product URL to convert.
    pub url: String,
    pub request_url: String,
    pub method: String,
    pub body_template: Option<Value>,
    pub url_field: String,
    #[serde(default)]
    pub extra_body: Map<String, Value>,
    #[serde(default)]
    pub extra_headers: BTreeMap<String, String>,
    pub csrf_cookie_name: Option<String>,
    pub csrf_header_name: Option<String>,
    pub referrer: Option<String>,
    pub referrer_policy: Option<String>,
    /// Path fragments that mark a verification interstitial.
    #[serde(default)]
    pub captcha_path_markers: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageFailure {
    MissingUrl,
    InvalidRequestUrl,
    WrongOrigin,
    CaptchaRequired,
    HttpStatus,
    FetchFailed,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResponse {
    pub ok: bool,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<PageFailure>,
    /// Parsed response body, or `{pageOrigin, requestOrigin, pageUrl}` diagnostics.
    pub data: Value,
}

impl PageResponse {
    pub fn success(status: u16, data: Value) -> Self {
        Self {
            ok: true,
            status,
            error: None,
            failure: None,
            data,
        }
    }

    pub fn failure(failure: PageFailure, status: u16, error: impl Into<String>, data: Value) -> Self {
        Self {
            ok: false,
            status,
            error: Some(error.into()),
            failure: Some(failure),
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_request_wire_names() {
        let request = PageRequest {
            url: "https://shopee.vn/x".into(),
            request_url: "https://affiliate.shopee.vn/api/v3/gql".into(),
            csrf_cookie_name: Some("csrftoken".into()),
            ..Default::default()
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["requestUrl"], "https://affiliate.shopee.vn/api/v3/gql");
        assert_eq!(value["csrfCookieName"], "csrftoken");
    }

    #[test]
    fn test_page_failure_response() {
        let response = PageResponse::failure(
            PageFailure::WrongOrigin,
            0,
            "wrong origin",
            serde_json::json!({"pageOrigin": "https://a"}),
        );
        assert!(!response.ok);
        assert_eq!(response.failure, Some(PageFailure::WrongOrigin));
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["failure"], "wrong_origin");
    }
}
