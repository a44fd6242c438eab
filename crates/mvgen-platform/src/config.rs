//! Platform client configuration.

use std::time::Duration;

use crate::error::{PlatformError, PlatformResult};

pub const DEFAULT_API_URL: &str = "https://www.kaggle.com/api/v1";
pub const DEFAULT_WEB_URL: &str = "https://www.kaggle.com";

/// Platform client configuration.
#[derive(Clone)]
pub struct PlatformConfig {
    /// REST API base URL
    pub api_url: String,
    /// Human-facing site base URL, used to build job links
    pub web_url: String,
    /// Account name, also the default slot owner
    pub username: String,
    /// API key paired with `username` for basic auth
    pub key: String,
    /// Request timeout
    pub timeout: Duration,
    /// Connect timeout
    pub connect_timeout: Duration,
}

impl std::fmt::Debug for PlatformConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformConfig")
            .field("api_url", &self.api_url)
            .field("web_url", &self.web_url)
            .field("username", &self.username)
            .field("key", &"<redacted>")
            .field("timeout", &self.timeout)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

impl PlatformConfig {
    /// Config pointing at an explicit API base, with default timeouts.
    pub fn new(
        api_url: impl Into<String>,
        username: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            api_url: api_url.into(),
            web_url: DEFAULT_WEB_URL.to_string(),
            username: username.into(),
            key: key.into(),
            timeout: Duration::from_secs(120),
            connect_timeout: Duration::from_secs(10),
        }
    }

    /// Create config from environment variables.
    pub fn from_env() -> PlatformResult<Self> {
        let username = required_var("PLATFORM_USERNAME")?;
        let key = required_var("PLATFORM_KEY")?;

        let timeout_secs: u64 = std::env::var("PLATFORM_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(120);

        let connect_timeout_secs: u64 = std::env::var("PLATFORM_CONNECT_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10);

        Ok(Self {
            api_url: std::env::var("PLATFORM_API_URL")
                .unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
            web_url: std::env::var("PLATFORM_WEB_URL")
                .unwrap_or_else(|_| DEFAULT_WEB_URL.to_string()),
            username,
            key,
            timeout: Duration::from_secs(timeout_secs),
            connect_timeout: Duration::from_secs(connect_timeout_secs),
        })
    }
}

fn required_var(name: &str) -> PlatformResult<String> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        Ok(_) => Err(PlatformError::config(format!("{} cannot be empty", name))),
        Err(_) => Err(PlatformError::config(format!("{} must be set", name))),
    }
}
