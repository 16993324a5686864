//! Backend configuration parsed from environment variables.

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_REFRESH_MARGIN_SECS: u64 = 60;
pub const DEFAULT_QUERY_STALE_SECS: u64 = 30;
pub const DEFAULT_SESSION_FILE: &str = ".pitbox-session.json";

/// Errors produced while reading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is not set.
    #[error("missing required env var {var}")]
    Missing { var: &'static str },

    /// A configuration value could not be parsed.
    #[error("config parse failed: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl HttpTimeouts {
    #[must_use]
    pub fn request(&self) -> Duration {
        Duration::from_secs(self.request_secs)
    }

    #[must_use]
    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    /// Project base URL without trailing slash, e.g. `https://abc.supabase.co`.
    pub url: String,
    /// Public anon key sent as `apikey` on every request.
    pub anon_key: String,
    /// Where the signed-in session is persisted between runs.
    pub session_path: PathBuf,
    pub timeouts: HttpTimeouts,
    /// Refresh the access token once it is this close to expiry.
    pub refresh_margin_secs: u64,
    /// Cached query results younger than this are served without a fetch.
    pub query_stale_secs: u64,
}

impl BackendConfig {
    /// Build typed backend config from environment variables.
    ///
    /// Required:
    /// - `PITBOX_SUPABASE_URL`
    /// - `PITBOX_SUPABASE_KEY`
    ///
    /// Optional:
    /// - `PITBOX_SESSION_PATH`: default `.pitbox-session.json`
    /// - `PITBOX_REQUEST_TIMEOUT_SECS`: default 30
    /// - `PITBOX_CONNECT_TIMEOUT_SECS`: default 10
    /// - `PITBOX_REFRESH_MARGIN_SECS`: default 60
    /// - `PITBOX_QUERY_STALE_SECS`: default 30
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or the URL is not http(s).
    pub fn from_env() -> Result<Self, ConfigError> {
        let url = std::env::var("PITBOX_SUPABASE_URL").map_err(|_| ConfigError::Missing { var: "PITBOX_SUPABASE_URL" })?;
        let anon_key =
            std::env::var("PITBOX_SUPABASE_KEY").map_err(|_| ConfigError::Missing { var: "PITBOX_SUPABASE_KEY" })?;
        let session_path = std::env::var("PITBOX_SESSION_PATH")
            .map_or_else(|_| PathBuf::from(DEFAULT_SESSION_FILE), PathBuf::from);

        Ok(Self {
            url: normalize_base_url(&url)?,
            anon_key,
            session_path,
            timeouts: HttpTimeouts {
                request_secs: env_parse("PITBOX_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
                connect_secs: env_parse("PITBOX_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
            },
            refresh_margin_secs: env_parse("PITBOX_REFRESH_MARGIN_SECS", DEFAULT_REFRESH_MARGIN_SECS),
            query_stale_secs: env_parse("PITBOX_QUERY_STALE_SECS", DEFAULT_QUERY_STALE_SECS),
        })
    }

    /// Config with default tuning for the given project.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is not http(s).
    pub fn new(url: &str, anon_key: impl Into<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            url: normalize_base_url(url)?,
            anon_key: anon_key.into(),
            session_path: PathBuf::from(DEFAULT_SESSION_FILE),
            timeouts: HttpTimeouts {
                request_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
                connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            },
            refresh_margin_secs: DEFAULT_REFRESH_MARGIN_SECS,
            query_stale_secs: DEFAULT_QUERY_STALE_SECS,
        })
    }

    /// Build the shared HTTP client used by the auth, REST and storage wrappers.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying client cannot be constructed.
    pub fn http_client(&self) -> Result<reqwest::Client, ConfigError> {
        reqwest::Client::builder()
            .timeout(self.timeouts.request())
            .connect_timeout(self.timeouts.connect())
            .build()
            .map_err(|e| ConfigError::Parse(format!("http client: {e}")))
    }
}

fn normalize_base_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if !(trimmed.starts_with("https://") || trimmed.starts_with("http://")) {
        return Err(ConfigError::Parse(format!("backend url must be http(s): {raw}")));
    }
    Ok(trimmed.to_string())
}

fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
