use relay_config::InternalApiConfig;
use relay_domain::ConversionErrorKind;
use serde_json::Value;

use super::body::get_by_path;

const PAGE_URL_LIMIT: usize = 240;
const SAMPLE_LIMIT: usize = 220;

/// A failed conversion before the route label is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionFailure {
    pub kind: ConversionErrorKind,
    pub message: String,
}

impl ConversionFailure {
    pub fn new(kind: ConversionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for ConversionFailure {
    fn from(err: reqwest::Error) -> Self {
        Self::new(ConversionErrorKind::Transport, format!("Request failed: {err}"))
    }
}

impl From<relay_errors::RelayError> for ConversionFailure {
    fn from(err: relay_errors::RelayError) -> Self {
        match err {
            relay_errors::RelayError::Conversion { kind, message, .. } => Self::new(kind, message),
            relay_errors::RelayError::Host(message) => {
                Self::new(ConversionErrorKind::Host, message)
            }
            other => Self::new(ConversionErrorKind::Transport, other.to_string()),
        }
    }
}

/// How a conversion response body is searched for the affiliate link.
#[derive(Debug, Clone)]
pub struct ResponseRules {
    pub result_fields: Vec<String>,
    pub fail_code_field: Option<String>,
    pub success_fail_code: Value,
    pub fallback_item_path: Option<String>,
    pub fallback_link_keys: Vec<String>,
    pub original_link_field: String,
}

impl ResponseRules {
    pub fn from_config(config: &InternalApiConfig) -> Self {
        Self {
            result_fields: config.result_fields.clone(),
            fail_code_field: config.fail_code_field.clone(),
            success_fail_code: config.success_fail_code.clone(),
            fallback_item_path: config.fallback_item_path.clone(),
            fallback_link_keys: config.fallback_link_keys.clone(),
            original_link_field: config.original_link_field.clone(),
        }
    }

    /// Turns a transport result plus parsed body into an affiliate link.
    pub fn interpret(&self, ok: bool, status: u16, data: &Value) -> Result<String, ConversionFailure> {
        if !ok {
            let kind = if graphql_error(data).is_some() {
                ConversionErrorKind::GraphQl
            } else {
                ConversionErrorKind::Transport
            };
            return Err(ConversionFailure::new(kind, transport_message(status, data)));
        }

        if let Some(message) = graphql_error(data) {
            return Err(ConversionFailure::new(ConversionErrorKind::GraphQl, message));
        }

        self.check_fail_code(data)?;

        self.pick_aff_link(data).ok_or_else(|| {
            ConversionFailure::new(
                ConversionErrorKind::MissingResult,
                self.missing_result_message(data),
            )
        })
    }

    fn check_fail_code(&self, data: &Value) -> Result<(), ConversionFailure> {
        let Some(field) = self.fail_code_field.as_deref().filter(|f| !f.is_empty()) else {
            return Ok(());
        };
        match get_by_path(data, field) {
            None | Some(Value::Null) => Ok(()),
            Some(value) if *value == self.success_fail_code => Ok(()),
            Some(value) => Err(ConversionFailure::new(
                ConversionErrorKind::FailCode,
                format!(
                    "API returned failCode={} (expected {}).",
                    plain(value),
                    plain(&self.success_fail_code)
                ),
            )),
        }
    }

    pub fn pick_aff_link(&self, data: &Value) -> Option<String> {
        for field in &self.result_fields {
            if let Some(link) = get_by_path(data, field).and_then(non_empty) {
                return Some(link);
            }
        }

        let item = self.fallback_item(data)?.as_object()?;
        for key in &self.fallback_link_keys {
            if let Some(link) = item.get(key).and_then(non_empty) {
                return Some(link);
            }
        }

        item.iter()
            .filter(|(key, _)| {
                key.to_ascii_lowercase().contains("link")
                    && !key.eq_ignore_ascii_case(&self.original_link_field)
            })
            .find_map(|(_, value)| non_empty(value))
    }

    fn fallback_item<'a>(&self, data: &'a Value) -> Option<&'a Value> {
        self.fallback_item_path
            .as_deref()
            .and_then(|path| get_by_path(data, path))
    }

    fn missing_result_message(&self, data: &Value) -> String {
        let mut parts = Vec::new();

        if let Some(item) = self.fallback_item(data).filter(|v| v.is_object()) {
            parts.push(format!("batchItem={}", truncate(&item.to_string(), SAMPLE_LIMIT)));
        }

        if let Some(raw) = data.get("raw").and_then(Value::as_str) {
            let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
            parts.push(format!("raw={}", truncate(&collapsed, SAMPLE_LIMIT)));
        }

        if let Some(map) = data.as_object() {
            parts.push(format!("keys={}", key_list(map)));
            if let Some(inner) = map.get("data").and_then(Value::as_object) {
                parts.push(format!("dataKeys={}", key_list(inner)));
            }
        }

        if parts.is_empty() {
            "API returned no valid affLink.".to_string()
        } else {
            format!("API returned no valid affLink. {}", parts.join(" | "))
        }
    }
}

/// First GraphQL error message, if the body carries an `errors` list.
pub fn graphql_error(data: &Value) -> Option<String> {
    let first = data.get("errors")?.as_array()?.first()?;
    Some(
        first
            .get("message")
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
            .unwrap_or("GraphQL returned an error.")
            .to_string(),
    )
}

fn transport_message(status: u16, data: &Value) -> String {
    let base = graphql_error(data)
        .or_else(|| text_field(data, "error"))
        .unwrap_or_else(|| format!("API error HTTP {status}"));

    let mut debug = Vec::new();
    if let Some(origin) = text_field(data, "pageOrigin") {
        debug.push(format!("pageOrigin={origin}"));
    }
    if let Some(origin) = text_field(data, "requestOrigin") {
        debug.push(format!("requestOrigin={origin}"));
    }
    if let Some(page_url) = text_field(data, "pageUrl") {
        debug.push(format!("pageUrl={}", truncate(&page_url, PAGE_URL_LIMIT)));
    }

    if debug.is_empty() {
        base
    } else {
        format!("{base} ({})", debug.join(", "))
    }
}

fn text_field(data: &Value, key: &str) -> Option<String> {
    data.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn non_empty(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn plain(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn key_list(map: &serde_json::Map<String, Value>) -> String {
    if map.is_empty() {
        "<none>".to_string()
    } else {
        map.keys().cloned().collect::<Vec<_>>().join(",")
    }
}

/// Cuts at `limit` characters and marks the cut with `...`.
pub fn truncate(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rules() -> ResponseRules {
        ResponseRules::from_config(&InternalApiConfig::default())
    }

    #[test]
    fn test_short_link_from_result_path() {
        let data = json!({"data": {"batchCustomLink": [{"shortLink": "X", "failCode": 0}]}});
        assert_eq!(rules().interpret(true, 200, &data).unwrap(), "X");
    }

    #[test]
    fn test_fail_code_mismatch_at_http_200() {
        let data = json!({"data": {"batchCustomLink": [{"shortLink": "X", "failCode": 7}]}});
        let failure = rules().interpret(true, 200, &data).unwrap_err();
        assert_eq!(failure.kind, ConversionErrorKind::FailCode);
        assert_eq!(failure.message, "API returned failCode=7 (expected 0).");
    }

    #[test]
    fn test_graphql_errors_fail_even_on_success() {
        let data = json!({"errors": [{"message": "rate limited"}], "data": null});
        let failure = rules().interpret(true, 200, &data).unwrap_err();
        assert_eq!(failure.kind, ConversionErrorKind::GraphQl);
        assert_eq!(failure.message, "rate limited");

        let data = json!({"errors": [{}]});
        let failure = rules().interpret(true, 200, &data).unwrap_err();
        assert_eq!(failure.message, "GraphQL returned an error.");
    }

    #[test]
    fn test_transport_failure_with_diagnostics() {
        let long_url = format!("https://shopee.vn/verify/captcha?{}", "x".repeat(300));
        let data = json!({
            "error": "wrong tab",
            "pageOrigin": "https://shopee.vn",
            "requestOrigin": "https://affiliate.shopee.vn",
            "pageUrl": long_url,
        });
        let failure = rules().interpret(false, 0, &data).unwrap_err();
        assert_eq!(failure.kind, ConversionErrorKind::Transport);
        assert!(failure.message.starts_with(
            "wrong tab (pageOrigin=https://shopee.vn, requestOrigin=https://affiliate.shopee.vn, pageUrl="
        ));
        assert!(failure.message.ends_with("...)"));

        let failure = rules().interpret(false, 502, &json!({})).unwrap_err();
        assert_eq!(failure.message, "API error HTTP 502");
    }

    #[test]
    fn test_transport_failure_prefers_graphql_message() {
        let data = json!({"errors": [{"message": "gql says no"}], "error": "generic"});
        let failure = rules().interpret(false, 403, &data).unwrap_err();
        assert_eq!(failure.kind, ConversionErrorKind::GraphQl);
        assert_eq!(failure.message, "gql says no");
    }

    #[test]
    fn test_fallback_keys_and_link_scan() {
        let data = json!({"data": {"batchCustomLink": [{"tracking_link": " https://t/1 "}]}});
        assert_eq!(rules().interpret(true, 200, &data).unwrap(), "https://t/1");

        let data = json!({"data": {"batchCustomLink": [{
            "originalLink": "https://shopee.vn/p",
            "affiliateLinkV2": "https://s.shopee.vn/abc"
        }]}});
        assert_eq!(
            rules().interpret(true, 200, &data).unwrap(),
            "https://s.shopee.vn/abc"
        );
    }

    #[test]
    fn test_missing_result_lists_keys() {
        let data = json!({"data": {"batchCustomLink": [{"originalLink": "https://shopee.vn/p", "failCode": 0}]}});
        let failure = rules().interpret(true, 200, &data).unwrap_err();
        assert_eq!(failure.kind, ConversionErrorKind::MissingResult);
        assert!(failure.message.starts_with("API returned no valid affLink. batchItem={"));
        assert!(failure.message.contains("| keys=data | dataKeys=batchCustomLink"));
    }

    #[test]
    fn test_missing_result_from_raw_body() {
        let data = json!({"raw": "<html>\n  <body>   blocked </body>\n</html>"});
        let failure = rules().interpret(true, 200, &data).unwrap_err();
        assert_eq!(
            failure.message,
            "API returned no valid affLink. raw=<html> <body> blocked </body> </html> | keys=raw"
        );
    }

    #[test]
    fn test_truncate_is_char_safe() {
        assert_eq!(truncate("abc", 5), "abc");
        assert_eq!(truncate("ááááá", 2), "áá...");
        assert_eq!(truncate("abc", 3), "abc");
    }
}
