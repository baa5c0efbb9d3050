//! Runtime configuration.
//!
//! Values come from three layers, later ones winning:
//! 1. built-in defaults
//! 2. an optional `key = value` config file (strings double-quoted, `#` comments)
//! 3. `SONGBRIDGE_*` environment variables
//!
//! Every value is validated against an explicit range after merging.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use crate::adapter::AdapterCredentials;
use crate::cache::{CacheTtl, DEFAULT_LINK_TTL, DEFAULT_SHORT_LINK_TTL};
use crate::http::{CONNECT_TIMEOUT_SECS, DEFAULT_MAX_RETRIES, HttpSettings, REQUEST_TIMEOUT_SECS, RetryPolicy};
use crate::model::ServiceKind;
use crate::rate_limit::{
    API_MAX_REQUESTS, SlidingWindowLimiter, WEB_MAX_REQUESTS, WINDOW,
};

/// Public URL of the web app; universal links point here.
pub const DEFAULT_APP_URL: &str = "https://songbridge.app";

const ENV_PREFIX: &str = "SONGBRIDGE_";
const RETRY_BACKOFF_STEP: Duration = Duration::from_millis(500);
/// `{service}_base_url` keys override a search API endpoint, e.g. `deezer_base_url`.
const BASE_URL_SUFFIX: &str = "_base_url";

/// Invalid configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config syntax on line {line}: expected key = value")]
    Syntax { line: usize },

    #[error("Unknown configuration key '{key}'\n  Suggestion: Check the spelling; keys are snake_case, e.g. spotify_client_id")]
    UnknownKey { key: String },

    #[error("Invalid value for `{key}`: {reason}")]
    InvalidValue { key: String, reason: String },
}

impl ConfigError {
    fn invalid(key: &str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

/// Every setting the engine and the CLI read.
#[derive(Debug, Clone)]
pub struct Config {
    pub credentials: AdapterCredentials,
    pub app_url: String,
    pub shortener_url: Option<String>,
    pub shortener_api_key: Option<String>,
    /// SQLite cache file; the cache is in-memory when unset.
    pub cache_path: Option<PathBuf>,
    pub link_ttl_secs: u64,
    pub metadata_ttl_secs: u64,
    pub short_link_ttl_secs: u64,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    pub rate_limit_window_secs: u64,
    pub web_rate_limit: u32,
    pub api_rate_limit: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            credentials: AdapterCredentials::default(),
            app_url: DEFAULT_APP_URL.to_string(),
            shortener_url: None,
            shortener_api_key: None,
            cache_path: None,
            link_ttl_secs: DEFAULT_LINK_TTL.as_secs(),
            metadata_ttl_secs: DEFAULT_LINK_TTL.as_secs(),
            short_link_ttl_secs: DEFAULT_SHORT_LINK_TTL.as_secs(),
            connect_timeout_secs: CONNECT_TIMEOUT_SECS,
            request_timeout_secs: REQUEST_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            rate_limit_window_secs: WINDOW.as_secs(),
            web_rate_limit: WEB_MAX_REQUESTS,
            api_rate_limit: API_MAX_REQUESTS,
        }
    }
}

impl Config {
    /// Defaults, then `file` if given, then the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read or parsed, or a
    /// merged value is out of range.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let env: HashMap<String, String> = std::env::vars().collect();
        Self::load_with_env(file, &env)
    }

    /// Like [`Config::load`] with an explicit environment.
    ///
    /// # Errors
    ///
    /// See [`Config::load`].
    pub fn load_with_env(
        file: Option<&Path>,
        env: &HashMap<String, String>,
    ) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(path) = file {
            let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            config.apply_file(&raw)?;
            debug!(path = %path.display(), "loaded config file");
        }
        config.apply_env(env)?;
        config.validate()?;
        Ok(config)
    }

    fn apply_file(&mut self, raw: &str) -> Result<(), ConfigError> {
        for (index, raw_line) in raw.lines().enumerate() {
            let line = strip_inline_comment(raw_line).trim();
            if line.is_empty() {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                return Err(ConfigError::Syntax { line: index + 1 });
            };
            let key = key.trim();
            let value = parse_file_value(key, value.trim())?;
            self.set(key, &value)?;
        }
        Ok(())
    }

    fn apply_env(&mut self, env: &HashMap<String, String>) -> Result<(), ConfigError> {
        for (name, value) in env {
            let Some(key) = name.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let key = key.to_ascii_lowercase();
            if KEYS.contains(&key.as_str()) || key.ends_with(BASE_URL_SUFFIX) {
                self.set(&key, value)?;
            }
        }
        Ok(())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let text = || non_empty(value);
        match key {
            "spotify_client_id" => self.credentials.spotify_client_id = value.to_string(),
            "spotify_client_secret" => self.credentials.spotify_client_secret = value.to_string(),
            "tidal_client_id" => self.credentials.tidal_client_id = value.to_string(),
            "tidal_client_secret" => self.credentials.tidal_client_secret = value.to_string(),
            "youtube_api_key" => self.credentials.youtube_api_key = text(),
            "qobuz_app_id" => self.credentials.qobuz_app_id = text(),
            "app_url" => self.app_url = value.trim_end_matches('/').to_string(),
            "shortener_url" => self.shortener_url = text(),
            "shortener_api_key" => self.shortener_api_key = text(),
            "cache_path" => self.cache_path = text().map(PathBuf::from),
            "link_ttl_secs" => self.link_ttl_secs = parse_u64(key, value)?,
            "metadata_ttl_secs" => self.metadata_ttl_secs = parse_u64(key, value)?,
            "short_link_ttl_secs" => self.short_link_ttl_secs = parse_u64(key, value)?,
            "connect_timeout_secs" => self.connect_timeout_secs = parse_u64(key, value)?,
            "request_timeout_secs" => self.request_timeout_secs = parse_u64(key, value)?,
            "max_retries" => self.max_retries = parse_u32(key, value)?,
            "rate_limit_window_secs" => self.rate_limit_window_secs = parse_u64(key, value)?,
            "web_rate_limit" => self.web_rate_limit = parse_u32(key, value)?,
            "api_rate_limit" => self.api_rate_limit = parse_u32(key, value)?,
            other if other.ends_with(BASE_URL_SUFFIX) => {
                let service = base_url_service(other)?;
                match text() {
                    Some(url) => self.credentials.base_urls.insert(service, url),
                    None => self.credentials.base_urls.remove(&service),
                };
            }
            unknown => {
                return Err(ConfigError::UnknownKey {
                    key: unknown.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Checks merged values against their allowed ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] naming the first bad key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_range("connect_timeout_secs", self.connect_timeout_secs, 1..=300)?;
        validate_range("request_timeout_secs", self.request_timeout_secs, 1..=300)?;
        validate_range("max_retries", u64::from(self.max_retries), 0..=10)?;
        validate_range("link_ttl_secs", self.link_ttl_secs, 1..=31_536_000)?;
        validate_range("metadata_ttl_secs", self.metadata_ttl_secs, 1..=31_536_000)?;
        validate_range("short_link_ttl_secs", self.short_link_ttl_secs, 1..=31_536_000)?;
        validate_range("rate_limit_window_secs", self.rate_limit_window_secs, 1..=86_400)?;
        validate_range("web_rate_limit", u64::from(self.web_rate_limit), 1..=10_000)?;
        validate_range("api_rate_limit", u64::from(self.api_rate_limit), 1..=10_000)?;
        if !self.app_url.starts_with("http://") && !self.app_url.starts_with("https://") {
            return Err(ConfigError::invalid("app_url", "expected an http(s) URL"));
        }
        for (service, url) in &self.credentials.base_urls {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::invalid(
                    &format!("{}{BASE_URL_SUFFIX}", service.as_str().to_ascii_lowercase()),
                    "expected an http(s) URL",
                ));
            }
        }
        if self.shortener_url.is_some() != self.shortener_api_key.is_some() {
            return Err(ConfigError::invalid(
                "shortener_url",
                "shortener_url and shortener_api_key must be set together",
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn http_settings(&self) -> HttpSettings {
        HttpSettings {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            retry: RetryPolicy::new(self.max_retries, RETRY_BACKOFF_STEP),
        }
    }

    #[must_use]
    pub fn cache_ttl(&self) -> CacheTtl {
        CacheTtl {
            links: Duration::from_secs(self.link_ttl_secs),
            metadata: Duration::from_secs(self.metadata_ttl_secs),
            short_links: Duration::from_secs(self.short_link_ttl_secs),
        }
    }

    /// Limiter for the web form surface.
    #[must_use]
    pub fn web_limiter(&self) -> SlidingWindowLimiter {
        SlidingWindowLimiter::new(
            Duration::from_secs(self.rate_limit_window_secs),
            self.web_rate_limit,
        )
    }

    /// Limiter for the programmatic API surface.
    #[must_use]
    pub fn api_limiter(&self) -> SlidingWindowLimiter {
        SlidingWindowLimiter::new(
            Duration::from_secs(self.rate_limit_window_secs),
            self.api_rate_limit,
        )
    }
}

const KEYS: [&str; 19] = [
    "spotify_client_id",
    "spotify_client_secret",
    "tidal_client_id",
    "tidal_client_secret",
    "youtube_api_key",
    "qobuz_app_id",
    "app_url",
    "shortener_url",
    "shortener_api_key",
    "cache_path",
    "link_ttl_secs",
    "metadata_ttl_secs",
    "short_link_ttl_secs",
    "connect_timeout_secs",
    "request_timeout_secs",
    "max_retries",
    "rate_limit_window_secs",
    "web_rate_limit",
    "api_rate_limit",
];

fn base_url_service(key: &str) -> Result<ServiceKind, ConfigError> {
    key.strip_suffix(BASE_URL_SUFFIX)
        .and_then(|service| service.parse::<ServiceKind>().ok())
        .ok_or_else(|| ConfigError::UnknownKey {
            key: key.to_string(),
        })
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

/// Strings must be double-quoted; integers are bare.
fn parse_file_value(key: &str, raw: &str) -> Result<String, ConfigError> {
    if raw.starts_with('"') {
        if raw.len() < 2 || !raw.ends_with('"') {
            return Err(ConfigError::invalid(key, "unterminated string"));
        }
        return Ok(raw[1..raw.len() - 1].to_string());
    }
    if raw.chars().all(|c| c.is_ascii_digit()) && !raw.is_empty() {
        return Ok(raw.to_string());
    }
    Err(ConfigError::invalid(key, "expected a double-quoted string or an integer"))
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::invalid(key, format!("expected a non-negative integer, got '{value}'")))
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    let parsed = parse_u64(key, value)?;
    u32::try_from(parsed).map_err(|_| ConfigError::invalid(key, "out of range"))
}

fn validate_range(
    key: &str,
    value: u64,
    range: std::ops::RangeInclusive<u64>,
) -> Result<(), ConfigError> {
    if range.contains(&value) {
        return Ok(());
    }
    Err(ConfigError::invalid(
        key,
        format!(
            "{value}. Expected range: {}..={}",
            range.start(),
            range.end()
        ),
    ))
}
