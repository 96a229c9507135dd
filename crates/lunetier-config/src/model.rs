//! Typed application configuration sourced from the environment.

use std::fmt;
use std::net::SocketAddr;

use url::Url;

use crate::error::ConfigResult;
use crate::validate::{parse_base_url, parse_http_addr, parse_log_format, trimmed};

/// Environment variable naming the HTTP listen address.
pub const ENV_HTTP_ADDR: &str = "LUNETIER_HTTP_ADDR";
/// Environment variable naming the persistence backend base URL.
pub const ENV_POCKETBASE_URL: &str = "POCKETBASE_URL";
/// Environment variable carrying the completion API key.
pub const ENV_OPENROUTER_API_KEY: &str = "OPENROUTER_API_KEY";
/// Environment variable overriding the completion model.
pub const ENV_OPENROUTER_MODEL: &str = "OPENROUTER_MODEL";
/// Environment variable overriding the attributed site URL.
pub const ENV_OPENROUTER_SITE: &str = "OPENROUTER_SITE";
/// Environment variable overriding the attributed site title.
pub const ENV_OPENROUTER_TITLE: &str = "OPENROUTER_TITLE";
/// Environment variable forcing the log output format.
pub const ENV_LOG_FORMAT: &str = "LUNETIER_LOG_FORMAT";
/// Environment variable carrying the build identifier for health and logs.
pub const ENV_BUILD_SHA: &str = "LUNETIER_BUILD_SHA";

const DEFAULT_HTTP_ADDR: &str = "127.0.0.1:4321";
const DEFAULT_POCKETBASE_URL: &str = "http://127.0.0.1:8090";
const DEFAULT_MODEL: &str = "anthropic/claude-3.5-sonnet";
const DEFAULT_SITE: &str = "https://tavuee.ethantouitou.fr";
const DEFAULT_TITLE: &str = "TaVue Configurateur IA";

/// Complete runtime configuration for the service.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Address the HTTP listener binds to.
    pub http_addr: SocketAddr,
    /// Base URL of the persistence backend.
    pub pocketbase_url: Url,
    /// Connection settings for the suggestion engine.
    pub suggestion: SuggestionConfig,
    /// Forced log output format (`json` or `pretty`), when set.
    pub log_format: Option<String>,
    /// Build identifier reported by health and logs, when set.
    pub build_sha: Option<String>,
}

/// Connection settings for the completion endpoint.
#[derive(Clone)]
pub struct SuggestionConfig {
    /// Bearer token. Suggestions are disabled when absent.
    pub api_key: Option<String>,
    /// Model identifier routed by the endpoint.
    pub model: String,
    /// Referer URL attributed to the calling site.
    pub site: String,
    /// Display title attributed to the calling site.
    pub title: String,
}

impl fmt::Debug for SuggestionConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SuggestionConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("site", &self.site)
            .field("title", &self.title)
            .finish()
    }
}

impl AppConfig {
    /// Read configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if any variable carries a value that fails
    /// validation. Unset or blank variables fall back to defaults.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration using `lookup` as the variable source.
    ///
    /// # Errors
    ///
    /// Returns an error if any variable carries a value that fails
    /// validation.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<Self> {
        let http_addr =
            trimmed(lookup(ENV_HTTP_ADDR)).unwrap_or_else(|| DEFAULT_HTTP_ADDR.to_string());
        let http_addr = parse_http_addr(ENV_HTTP_ADDR, &http_addr)?;

        let pocketbase_url = trimmed(lookup(ENV_POCKETBASE_URL))
            .unwrap_or_else(|| DEFAULT_POCKETBASE_URL.to_string());
        let pocketbase_url = parse_base_url(ENV_POCKETBASE_URL, &pocketbase_url)?;

        let suggestion = SuggestionConfig {
            api_key: trimmed(lookup(ENV_OPENROUTER_API_KEY)),
            model: trimmed(lookup(ENV_OPENROUTER_MODEL))
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            site: trimmed(lookup(ENV_OPENROUTER_SITE))
                .unwrap_or_else(|| DEFAULT_SITE.to_string()),
            title: trimmed(lookup(ENV_OPENROUTER_TITLE))
                .unwrap_or_else(|| DEFAULT_TITLE.to_string()),
        };

        let log_format = trimmed(lookup(ENV_LOG_FORMAT))
            .map(|value| parse_log_format(ENV_LOG_FORMAT, &value))
            .transpose()?;

        let build_sha = trimmed(lookup(ENV_BUILD_SHA));

        Ok(Self {
            http_addr,
            pocketbase_url,
            suggestion,
            log_format,
            build_sha,
        })
    }
}
