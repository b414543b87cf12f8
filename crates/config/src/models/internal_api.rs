use std::collections::BTreeMap;

use crate::validation::{ConfigValidator, ValidationUtils};
use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// How requests to the conversion API authenticate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    /// Reuse the logged-in session cookies.
    #[default]
    Cookie,
    /// Send a static `Authorization: Bearer` token.
    Bearer,
}

impl AuthMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMode::Cookie => "cookie",
            AuthMode::Bearer => "bearer",
        }
    }
}

impl std::fmt::Display for AuthMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the cookie-mode request is issued from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CookieSource {
    /// Inside a live tab on the affiliate site.
    #[default]
    DelegatedTab,
    /// Straight from the worker process.
    Direct,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InternalApiConfig {
    pub url: String,
    pub method: String,
    pub auth_mode: AuthMode,
    pub cookie_source: CookieSource,
    /// Only used in bearer mode.
    pub token: String,
    pub with_credentials: bool,
    pub referrer: Option<String>,
    pub referrer_policy: Option<String>,
    pub csrf_cookie_name: Option<String>,
    pub csrf_header_name: Option<String>,
    pub use_captured_headers: bool,
    /// JSON text; every `__URL__` inside it is replaced by the link being converted.
    pub body_template: Option<String>,
    /// Used with `extra_body` when no template is configured.
    pub url_field: String,
    pub extra_body: Option<String>,
    pub result_fields: Vec<String>,
    pub fail_code_field: Option<String>,
    pub success_fail_code: Value,
    pub fallback_item_path: Option<String>,
    pub fallback_link_keys: Vec<String>,
    pub original_link_field: String,
    pub tab_match_urls: Vec<String>,
    pub auto_open_tab: bool,
    pub tab_open_url: String,
    pub tab_ready_timeout_ms: u64,
    pub tab_poll_interval_ms: u64,
    pub captcha_path_markers: Vec<String>,
    pub request_timeout_seconds: u64,
    /// Static headers added to every conversion request.
    pub extra_headers: BTreeMap<String, String>,
}

const DEFAULT_BODY_TEMPLATE: &str = r#"{
  "operationName": "batchGetCustomLink",
  "query": "\n    query batchGetCustomLink($linkParams: [CustomLinkParam!], $sourceCaller: SourceCaller){\n      batchCustomLink(linkParams: $linkParams, sourceCaller: $sourceCaller){\n        shortLink\n        longLink\n        failCode\n      }\n    }\n    ",
  "variables": {
    "linkParams": [
      {
        "originalLink": "__URL__",
        "advancedLinkParams": {}
      }
    ],
    "sourceCaller": "CUSTOM_LINK_CALLER"
  }
}"#;

impl Default for InternalApiConfig {
    fn default() -> Self {
        let strings = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        let mut extra_headers = BTreeMap::new();
        extra_headers.insert("x-sz-sdk-version".to_string(), "1.12.21".to_string());

        Self {
            url: "https://affiliate.shopee.vn/api/v3/gql?q=batchCustomLink".to_string(),
            method: "POST".to_string(),
            auth_mode: AuthMode::Cookie,
            cookie_source: CookieSource::DelegatedTab,
            token: String::new(),
            with_credentials: true,
            referrer: Some("https://affiliate.shopee.vn/offer/custom_link".to_string()),
            referrer_policy: Some("strict-origin-when-cross-origin".to_string()),
            csrf_cookie_name: Some("csrftoken".to_string()),
            csrf_header_name: Some("csrf-token".to_string()),
            use_captured_headers: true,
            body_template: Some(DEFAULT_BODY_TEMPLATE.to_string()),
            url_field: "url".to_string(),
            extra_body: None,
            result_fields: strings(&[
                "data.batchCustomLink[0].shortLink",
                "data.batchCustomLink[0].longLink",
                "data.batchCustomLink[0].short_link",
                "data.batchCustomLink[0].long_link",
                "data.shortLink",
                "data.longLink",
                "data.short_link",
                "data.long_link",
            ]),
            fail_code_field: Some("data.batchCustomLink[0].failCode".to_string()),
            success_fail_code: Value::from(0),
            fallback_item_path: Some("data.batchCustomLink[0]".to_string()),
            fallback_link_keys: strings(&[
                "shortLink",
                "short_link",
                "longLink",
                "long_link",
                "trackingLink",
                "tracking_link",
                "deepLink",
                "deeplink",
            ]),
            original_link_field: "originalLink".to_string(),
            tab_match_urls: strings(&["https://affiliate.shopee.vn/*"]),
            auto_open_tab: true,
            tab_open_url: "https://affiliate.shopee.vn/offer/custom_link".to_string(),
            tab_ready_timeout_ms: 12_000,
            tab_poll_interval_ms: 250,
            captcha_path_markers: strings(&["/verify/captcha", "/verify/traffic"]),
            request_timeout_seconds: 30,
            extra_headers,
        }
    }
}

impl InternalApiConfig {
    pub fn uses_delegated_tab(&self) -> bool {
        self.auth_mode == AuthMode::Cookie && self.cookie_source == CookieSource::DelegatedTab
    }

    /// Label attached to every conversion error, e.g. `cookie/delegated_tab`.
    pub fn route_label(&self) -> String {
        if self.uses_delegated_tab() {
            "cookie/delegated_tab".to_string()
        } else {
            format!("{}/direct", self.auth_mode)
        }
    }

    /// Cookies only travel with the request in cookie mode.
    pub fn sends_credentials(&self) -> bool {
        self.auth_mode == AuthMode::Cookie && self.with_credentials
    }

    pub fn csrf_pair(&self) -> Option<(&str, &str)> {
        match (&self.csrf_cookie_name, &self.csrf_header_name) {
            (Some(cookie), Some(header)) if !cookie.trim().is_empty() && !header.trim().is_empty() => {
                Some((cookie.as_str(), header.as_str()))
            }
            _ => None,
        }
    }

    pub fn body_template_value(&self) -> ConfigResult<Option<Value>> {
        match self.body_template.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(text) => {
                let value: Value = serde_json::from_str(text)?;
                if value.is_object() {
                    Ok(Some(value))
                } else {
                    Ok(None)
                }
            }
        }
    }

    pub fn extra_body_value(&self) -> ConfigResult<Map<String, Value>> {
        match self.extra_body.as_deref().map(str::trim) {
            None | Some("") => Ok(Map::new()),
            Some(text) => match serde_json::from_str::<Value>(text)? {
                Value::Object(map) => Ok(map),
                _ => Ok(Map::new()),
            },
        }
    }

    pub fn api_origin(&self) -> ConfigResult<String> {
        let parsed = url::Url::parse(&self.url)?;
        Ok(parsed.origin().ascii_serialization())
    }
}

impl ConfigValidator for InternalApiConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_http_url(&self.url, "internal_api.url")?;
        ValidationUtils::validate_not_empty(&self.method, "internal_api.method")?;
        ValidationUtils::validate_not_empty(&self.url_field, "internal_api.url_field")?;

        if let Some(template) = &self.body_template {
            if !template.trim().is_empty() {
                ValidationUtils::validate_json_object(template, "internal_api.body_template")?;
            }
        }
        if let Some(extra) = &self.extra_body {
            if !extra.trim().is_empty() {
                ValidationUtils::validate_json_object(extra, "internal_api.extra_body")?;
            }
        }

        if self.uses_delegated_tab() {
            ValidationUtils::validate_http_url(&self.tab_open_url, "internal_api.tab_open_url")?;
            if self.tab_match_urls.is_empty() {
                return Err(ConfigError::Validation(
                    "internal_api.tab_match_urls cannot be empty in delegated_tab mode".to_string(),
                ));
            }
            ValidationUtils::validate_range(
                self.tab_poll_interval_ms,
                "internal_api.tab_poll_interval_ms",
                10,
                5_000,
            )?;
        }
        ValidationUtils::validate_range(
            self.request_timeout_seconds,
            "internal_api.request_timeout_seconds",
            1,
            300,
        )?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_template_has_placeholder() {
        let config = InternalApiConfig::default();
        let template = config.body_template_value().unwrap().unwrap();
        assert_eq!(
            template["variables"]["linkParams"][0]["originalLink"],
            Value::from("__URL__")
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_route_label() {
        let mut config = InternalApiConfig::default();
        assert_eq!(config.route_label(), "cookie/delegated_tab");

        config.cookie_source = CookieSource::Direct;
        assert_eq!(config.route_label(), "cookie/direct");

        config.auth_mode = AuthMode::Bearer;
        config.cookie_source = CookieSource::DelegatedTab;
        assert_eq!(config.route_label(), "bearer/direct");
        assert!(!config.sends_credentials());
    }

    #[test]
    fn test_invalid_template_rejected() {
        let config = InternalApiConfig {
            body_template: Some("{not json".to_string()),
            ..InternalApiConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_csrf_pair_requires_both_names() {
        let mut config = InternalApiConfig::default();
        assert_eq!(config.csrf_pair(), Some(("csrftoken", "csrf-token")));
        config.csrf_header_name = Some(" ".to_string());
        assert_eq!(config.csrf_pair(), None);
    }

    #[test]
    fn test_api_origin() {
        let config = InternalApiConfig::default();
        assert_eq!(config.api_origin().unwrap(), "https://affiliate.shopee.vn");
    }
}
