//! Client configuration.

use crate::Error;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Configuration for a [`Compendium`](crate::Compendium) client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API root, e.g. `https://compendium.example/api/v1`.
    pub base_url: String,

    /// Optional bearer token.
    pub token: Option<String>,

    /// Total request timeout.
    pub timeout: Duration,

    /// Connection timeout.
    pub connect_timeout: Duration,
}

impl ClientConfig {
    /// Create a config for the given API root.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }

    /// Read `COMPENDIUM_API_URL`, `COMPENDIUM_API_TOKEN` and
    /// `COMPENDIUM_API_TIMEOUT_SECS` from the environment.
    pub fn from_env() -> Result<Self, Error> {
        let base_url = std::env::var("COMPENDIUM_API_URL").map_err(|_| Error::NoBaseUrl)?;
        let mut config = Self::new(base_url);

        if let Ok(token) = std::env::var("COMPENDIUM_API_TOKEN") {
            if !token.is_empty() {
                config = config.with_token(token);
            }
        }

        if let Ok(secs) = std::env::var("COMPENDIUM_API_TIMEOUT_SECS") {
            let secs: u64 = secs
                .parse()
                .map_err(|_| Error::Config(format!("Invalid COMPENDIUM_API_TIMEOUT_SECS: {secs}")))?;
            config = config.with_timeout(Duration::from_secs(secs));
        }

        Ok(config)
    }

    /// Set the bearer token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Set the total request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the connection timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Join a path onto the API root. Absolute URLs pass through untouched.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}
