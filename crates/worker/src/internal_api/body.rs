use serde_json::{Map, Value};

/// Placeholder replaced by the product URL inside a body template.
pub const URL_PLACEHOLDER: &str = "__URL__";

/// Replaces every placeholder occurrence in strings, recursively through arrays and objects.
pub fn replace_url_placeholder(value: &Value, url: &str) -> Value {
    match value {
        Value::String(s) => Value::String(s.replace(URL_PLACEHOLDER, url)),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| replace_url_placeholder(item, url))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), replace_url_placeholder(v, url)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Template with the URL substituted, or `{ ...extra_body, url_field: url }` without one.
pub fn build_request_body(
    template: Option<&Value>,
    url_field: &str,
    extra_body: &Map<String, Value>,
    url: &str,
) -> Value {
    if let Some(template) = template.filter(|t| t.is_object()) {
        return replace_url_placeholder(template, url);
    }

    let field = if url_field.is_empty() { "url" } else { url_field };
    let mut body = extra_body.clone();
    body.insert(field.to_string(), Value::String(url.to_string()));
    Value::Object(body)
}

/// Parses a response body; empty text gives `{}` and non-JSON text gives `{ "raw": text }`.
pub fn parse_response_text(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Object(Map::new());
    }
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Null) => Value::Object(Map::new()),
        Ok(value) => value,
        Err(_) => {
            let mut map = Map::new();
            map.insert("raw".to_string(), Value::String(text.to_string()));
            Value::Object(map)
        }
    }
}

/// Looks up a dotted path; `a.b[0].c` and `a.b.0.c` are equivalent.
pub fn get_by_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if path.trim().is_empty() {
        return None;
    }

    let normalized = normalize_path(path);
    let mut current = value;
    for part in normalized.split('.').filter(|p| !p.is_empty()) {
        current = match current {
            Value::Object(map) => map.get(part)?,
            Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

fn normalize_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut chars = path.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '[' {
            out.push(c);
            continue;
        }

        let mut digits = String::new();
        while let Some(d) = chars.peek().copied().filter(char::is_ascii_digit) {
            digits.push(d);
            chars.next();
        }
        if !digits.is_empty() && chars.peek() == Some(&']') {
            chars.next();
            out.push('.');
            out.push_str(&digits);
        } else {
            out.push('[');
            out.push_str(&digits);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_placeholder_replaced_everywhere() {
        let template = json!({
            "query": "q",
            "variables": {
                "linkParams": [{"originalLink": "__URL__", "note": "see __URL__"}],
                "count": 1
            }
        });

        let body = build_request_body(Some(&template), "url", &Map::new(), "https://shopee.vn/p");
        assert_eq!(
            body["variables"]["linkParams"][0]["originalLink"],
            "https://shopee.vn/p"
        );
        assert_eq!(
            body["variables"]["linkParams"][0]["note"],
            "see https://shopee.vn/p"
        );
        assert_eq!(body["variables"]["count"], 1);
        assert!(!body.to_string().contains(URL_PLACEHOLDER));
    }

    #[test]
    fn test_flat_body_without_template() {
        let mut extra = Map::new();
        extra.insert("source".to_string(), json!("worker"));
        extra.insert("link".to_string(), json!("stale"));

        let body = build_request_body(None, "link", &extra, "https://shopee.vn/p");
        assert_eq!(body, json!({"source": "worker", "link": "https://shopee.vn/p"}));

        let body = build_request_body(Some(&json!("not an object")), "", &Map::new(), "u");
        assert_eq!(body, json!({"url": "u"}));
    }

    #[test]
    fn test_parse_response_text() {
        assert_eq!(parse_response_text(""), json!({}));
        assert_eq!(parse_response_text("null"), json!({}));
        assert_eq!(parse_response_text(r#"{"a":1}"#), json!({"a": 1}));
        assert_eq!(parse_response_text("<html>"), json!({"raw": "<html>"}));
    }

    #[test]
    fn test_get_by_path() {
        let data = json!({"data": {"batchCustomLink": [{"shortLink": "X"}]}});
        assert_eq!(
            get_by_path(&data, "data.batchCustomLink[0].shortLink"),
            Some(&json!("X"))
        );
        assert_eq!(
            get_by_path(&data, "data.batchCustomLink.0.shortLink"),
            Some(&json!("X"))
        );
        assert_eq!(get_by_path(&data, "data.batchCustomLink[1]"), None);
        assert_eq!(get_by_path(&data, "data.missing.deeper"), None);
        assert_eq!(get_by_path(&data, ""), None);
    }
}
