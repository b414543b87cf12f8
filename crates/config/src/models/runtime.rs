use crate::validation::{ConfigValidator, ValidationUtils};
use crate::ConfigError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeaderCaptureConfig {
    pub enabled: bool,
    /// Whitelist, compared case-insensitively.
    pub header_names: Vec<String>,
    /// Match patterns such as `https://*.affiliate.shopee.vn/*`.
    pub url_patterns: Vec<String>,
}

impl Default for HeaderCaptureConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            header_names: [
                "csrf-token",
                "x-sap-ri",
                "x-sap-sec",
                "af-ac-enc-dat",
                "af-ac-enc-sz-token",
                "x-sz-sdk-version",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            url_patterns: vec![
                "https://affiliate.shopee.vn/api/v3/gql*".to_string(),
                "https://*.affiliate.shopee.vn/*".to_string(),
            ],
        }
    }
}

impl ConfigValidator for HeaderCaptureConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        for name in &self.header_names {
            ValidationUtils::validate_not_empty(name, "header_capture.header_names")?;
        }
        for pattern in &self.url_patterns {
            ValidationUtils::validate_not_empty(pattern, "header_capture.url_patterns")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeepAliveConfig {
    /// Coarse fallback timer.
    pub alarm_period_seconds: u64,
    pub ping_interval_seconds: u64,
    /// When false the helper is never started and only the coarse timer runs.
    pub helper_enabled: bool,
}

impl Default for KeepAliveConfig {
    fn default() -> Self {
        Self {
            alarm_period_seconds: 60,
            ping_interval_seconds: 2,
            helper_enabled: true,
        }
    }
}

impl ConfigValidator for KeepAliveConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_range(
            self.alarm_period_seconds,
            "keepalive.alarm_period_seconds",
            60,
            3600,
        )?;
        ValidationUtils::validate_range(
            self.ping_interval_seconds,
            "keepalive.ping_interval_seconds",
            1,
            60,
        )?;
        Ok(())
    }
}

/// Logged-in session the tab host and direct strategy share.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// `Set-Cookie` style strings, e.g. `csrftoken=abc; Domain=affiliate.shopee.vn; Path=/`.
    pub cookies: Vec<String>,
    /// URL the cookies above are scoped to when they carry no `Domain`.
    pub cookie_url: String,
    pub user_agent: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookies: Vec::new(),
            cookie_url: "https://affiliate.shopee.vn/".to_string(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36".to_string(),
        }
    }
}

impl ConfigValidator for SessionConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_http_url(&self.cookie_url, "session.cookie_url")?;
        ValidationUtils::validate_not_empty(&self.user_agent, "session.user_agent")?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusServerConfig {
    pub enabled: bool,
    pub bind_address: String,
}

impl Default for StatusServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "127.0.0.1:8790".to_string(),
        }
    }
}

impl ConfigValidator for StatusServerConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        if self.enabled {
            self.bind_address
                .parse::<std::net::SocketAddr>()
                .map_err(|e| {
                    ConfigError::Validation(format!("status_server.bind_address is invalid: {e}"))
                })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keepalive_alarm_has_one_minute_floor() {
        let mut config = KeepAliveConfig::default();
        assert!(config.validate().is_ok());
        config.alarm_period_seconds = 30;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_status_server_bind_address() {
        let mut config = StatusServerConfig::default();
        assert!(config.validate().is_ok());
        config.bind_address = "localhost".to_string();
        assert!(config.validate().is_err());
        config.enabled = false;
        assert!(config.validate().is_ok());
    }
}
