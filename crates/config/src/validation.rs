use crate::{ConfigError, ConfigResult};

/// Trait for configuration validation
pub trait ConfigValidator {
    fn validate(&self) -> ConfigResult<()>;
}

/// General validation utilities
pub struct ValidationUtils;

impl ValidationUtils {
    /// Validate that a string is not empty
    pub fn validate_not_empty(value: &str, field_name: &str) -> ConfigResult<()> {
        if value.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "{field_name} cannot be empty"
            )));
        }
        Ok(())
    }

    /// Validate that a count lies in `1..=max`
    pub fn validate_count(count: usize, field_name: &str, max: usize) -> ConfigResult<()> {
        if count == 0 {
            return Err(ConfigError::Validation(format!(
                "{field_name} must be greater than 0"
            )));
        }
        if count > max {
            return Err(ConfigError::Validation(format!(
                "{field_name} must be less than or equal to {max}"
            )));
        }
        Ok(())
    }

    /// Validate that a duration lies in `min..=max`
    pub fn validate_range(value: u64, field_name: &str, min: u64, max: u64) -> ConfigResult<()> {
        if value < min || value > max {
            return Err(ConfigError::Validation(format!(
                "{field_name} must be between {min} and {max}, got {value}"
            )));
        }
        Ok(())
    }

    /// Validate that a URL parses and uses http(s)
    pub fn validate_http_url(value: &str, field_name: &str) -> ConfigResult<()> {
        Self::validate_not_empty(value, field_name)?;
        let parsed = url::Url::parse(value)
            .map_err(|e| ConfigError::Validation(format!("{field_name} is not a valid URL: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::Validation(format!(
                "{field_name} must use http or https"
            )));
        }
        Ok(())
    }

    /// Validate that a string holds a JSON object
    pub fn validate_json_object(value: &str, field_name: &str) -> ConfigResult<()> {
        let parsed: serde_json::Value = serde_json::from_str(value)
            .map_err(|e| ConfigError::Validation(format!("{field_name} is not valid JSON: {e}")))?;
        if !parsed.is_object() {
            return Err(ConfigError::Validation(format!(
                "{field_name} must be a JSON object"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_count() {
        assert!(ValidationUtils::validate_count(1, "worker.max_batch", 100).is_ok());
        assert!(ValidationUtils::validate_count(0, "worker.max_batch", 100).is_err());
        assert!(ValidationUtils::validate_count(101, "worker.max_batch", 100).is_err());
    }

    #[test]
    fn test_validate_http_url() {
        assert!(ValidationUtils::validate_http_url("http://127.0.0.1:8787", "backend.base_url").is_ok());
        assert!(ValidationUtils::validate_http_url("ftp://example.com", "backend.base_url").is_err());
        assert!(ValidationUtils::validate_http_url("not a url", "backend.base_url").is_err());
        assert!(ValidationUtils::validate_http_url("  ", "backend.base_url").is_err());
    }

    #[test]
    fn test_validate_json_object() {
        assert!(ValidationUtils::validate_json_object(r#"{"a":1}"#, "x").is_ok());
        assert!(ValidationUtils::validate_json_object("[1,2]", "x").is_err());
        assert!(ValidationUtils::validate_json_object("{", "x").is_err());
    }
}
