//! Parsing helpers for environment values.

use std::net::SocketAddr;

use url::Url;

use crate::error::{ConfigError, ConfigResult};

/// Trim a raw variable and drop it entirely when blank.
pub(crate) fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub(crate) fn parse_http_addr(name: &'static str, value: &str) -> ConfigResult<SocketAddr> {
    value.parse().map_err(|_| ConfigError::InvalidVar {
        name,
        value: value.to_string(),
        message: "must be a host:port socket address".to_string(),
    })
}

pub(crate) fn parse_base_url(name: &'static str, value: &str) -> ConfigResult<Url> {
    let url: Url = value.parse().map_err(|_| ConfigError::InvalidVar {
        name,
        value: value.to_string(),
        message: "must be an absolute URL".to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidVar {
            name,
            value: value.to_string(),
            message: "must use the http or https scheme".to_string(),
        });
    }
    Ok(url)
}

pub(crate) fn parse_log_format(name: &'static str, value: &str) -> ConfigResult<String> {
    let normalized = value.to_ascii_lowercase();
    if matches!(normalized.as_str(), "json" | "pretty") {
        return Ok(normalized);
    }
    Err(ConfigError::InvalidVar {
        name,
        value: value.to_string(),
        message: "must be 'json' or 'pretty'".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trimming_drops_blank_values() {
        assert_eq!(trimmed(Some("  x  ".to_string())).as_deref(), Some("x"));
        assert_eq!(trimmed(Some("   ".to_string())), None);
        assert_eq!(trimmed(None), None);
    }

    #[test]
    fn base_url_requires_a_web_scheme() {
        assert!(parse_base_url("VAR", "http://127.0.0.1:8090").is_ok());
        assert!(parse_base_url("VAR", "https://backend.example").is_ok());
        assert!(parse_base_url("VAR", "ftp://backend.example").is_err());
        assert!(parse_base_url("VAR", "not a url").is_err());
    }

    #[test]
    fn log_format_accepts_known_names_case_insensitively() -> ConfigResult<()> {
        assert_eq!(parse_log_format("VAR", "JSON")?, "json");
        assert_eq!(parse_log_format("VAR", "pretty")?, "pretty");
        assert!(parse_log_format("VAR", "verbose").is_err());
        Ok(())
    }
}
