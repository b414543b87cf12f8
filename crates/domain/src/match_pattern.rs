//! Browser-style URL match patterns (`https://*.example.com/api/*`).
//!
//! Scheme `*` matches http and https. Host `*` matches any host, `*.name` matches
//! `name` and every subdomain of it. The path glob is matched against path plus query.

use regex::Regex;
use url::Url;

#[derive(Debug, Clone)]
pub struct MatchPattern {
    raw: String,
    scheme: String,
    host: String,
    path: Regex,
}

impl MatchPattern {
    /// Returns `None` for text that is not a `scheme://host/path` pattern.
    pub fn parse(pattern: &str) -> Option<Self> {
        let raw = pattern.trim();
        if raw == "<all_urls>" {
            return Some(Self {
                raw: raw.to_string(),
                scheme: "*".to_string(),
                host: "*".to_string(),
                path: path_regex("/*")?,
            });
        }

        let (scheme, rest) = raw.split_once("://")?;
        let (host, path) = match rest.find('/') {
            Some(idx) => (&rest[..idx], &rest[idx..]),
            None => return None,
        };
        // ports never take part in matching
        let host = match host.strip_prefix('[') {
            Some(rest) => rest.split(']').next().unwrap_or_default(),
            None => host.split(':').next().unwrap_or_default(),
        };
        if scheme.is_empty() || host.is_empty() {
            return None;
        }
        if host.contains('*') && host != "*" && !host.starts_with("*.") {
            return None;
        }

        Some(Self {
            raw: raw.to_string(),
            scheme: scheme.to_ascii_lowercase(),
            host: host.to_ascii_lowercase(),
            path: path_regex(path)?,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn matches(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };
        self.matches_url(&parsed)
    }

    pub fn matches_url(&self, url: &Url) -> bool {
        let scheme_ok = match self.scheme.as_str() {
            "*" => matches!(url.scheme(), "http" | "https"),
            scheme => url.scheme() == scheme,
        };
        if !scheme_ok {
            return false;
        }

        let host = url
            .host_str()
            .unwrap_or_default()
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_ascii_lowercase();
        let host_ok = if self.host == "*" {
            true
        } else if let Some(base) = self.host.strip_prefix("*.") {
            host == base || host.ends_with(&format!(".{base}"))
        } else {
            host == self.host
        };
        if !host_ok {
            return false;
        }

        let mut target = url.path().to_string();
        if let Some(query) = url.query() {
            target.push('?');
            target.push_str(query);
        }
        self.path.is_match(&target)
    }
}

/// True when any of `patterns` matches `url`. Unparseable patterns never match.
pub fn any_matches(patterns: &[String], url: &str) -> bool {
    patterns
        .iter()
        .filter_map(|p| MatchPattern::parse(p))
        .any(|p| p.matches(url))
}

/// Anchored regex for a path glob; `*` is the only wildcard.
fn path_regex(glob: &str) -> Option<Regex> {
    let body = glob
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    Regex::new(&format!("^(?s){body}$")).ok()
}
