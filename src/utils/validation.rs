use crate::domain::ports::ConfigProvider;
use crate::utils::error::{PulseError, Result};
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub const MIN_TICK_INTERVAL_MS: u64 = 1;
pub const MAX_TICK_INTERVAL_MS: u64 = 24 * 60 * 60 * 1000;
pub const MAX_MUTATION_DELAY_MS: u64 = 10 * 60 * 1000;

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(PulseError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: "URL cannot be empty".to_string(),
        });
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(PulseError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: url_str.to_string(),
                reason: format!("Unsupported URL scheme: {}", scheme),
            }),
        },
        Err(e) => Err(PulseError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: format!("Invalid URL format: {}", e),
        }),
    }
}

pub fn validate_positive_number(field_name: &str, value: u64, min_value: u64) -> Result<()> {
    if value < min_value {
        return Err(PulseError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(PulseError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}

/// 兩種配置來源共用的檢查
pub fn validate_provider<C: ConfigProvider + ?Sized>(config: &C) -> Result<()> {
    if !config.offline() {
        validate_url("api_endpoint", config.api_endpoint())?;
    }

    validate_range(
        "tick_interval_ms",
        config.tick_interval().as_millis() as u64,
        MIN_TICK_INTERVAL_MS,
        MAX_TICK_INTERVAL_MS,
    )?;
    validate_range(
        "mutation_delay_ms",
        config.mutation_delay().as_millis() as u64,
        0,
        MAX_MUTATION_DELAY_MS,
    )?;

    if let Some(timeout) = config.request_timeout() {
        validate_positive_number("request_timeout_secs", timeout.as_secs(), 1)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("api_endpoint", "https://example.com").is_ok());
        assert!(validate_url("api_endpoint", "http://example.com").is_ok());
        assert!(validate_url("api_endpoint", "").is_err());
        assert!(validate_url("api_endpoint", "invalid-url").is_err());
        assert!(validate_url("api_endpoint", "ftp://example.com").is_err());
    }

    #[test]
    fn test_validate_positive_number() {
        assert!(validate_positive_number("request_timeout_secs", 5, 1).is_ok());
        assert!(validate_positive_number("request_timeout_secs", 0, 1).is_err());
    }

    #[test]
    fn test_validate_range() {
        assert!(validate_range("tick_interval_ms", 3000u64, 1, 10_000).is_ok());
        assert!(validate_range("tick_interval_ms", 0u64, 1, 10_000).is_err());

        match validate_range("tick_interval_ms", 20_000u64, 1, 10_000) {
            Err(PulseError::InvalidConfigValueError { field, reason, .. }) => {
                assert_eq!(field, "tick_interval_ms");
                assert!(reason.contains("between 1 and 10000"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
