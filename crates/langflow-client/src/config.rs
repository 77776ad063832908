//! Client configuration

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::time::Duration;
use url::Url;

use crate::auth::ApiKey;
use crate::error::ConfigError;

/// Environment variable holding the server base URL
pub const SERVER_URL_ENV: &str = "LANGFLOW_SERVER_URL";
/// Environment variable holding the API key
pub const API_KEY_ENV: &str = "LANGFLOW_API_KEY";

/// Settings shared read-only by every call made through a client
///
/// Request paths are appended to `base_url` verbatim, so the base should
/// include the API root, e.g. `http://localhost:7860/api`.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: Url,
    pub api_key: Option<ApiKey>,
    /// Sent on every request; per-call headers override these
    pub default_headers: HeaderMap,
    pub connect_timeout: Option<Duration>,
}

impl ClientConfig {
    /// Create a config with no key and no extra headers
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            api_key: None,
            default_headers: HeaderMap::new(),
            connect_timeout: None,
        }
    }

    /// Create a config from a base URL string
    pub fn from_url(base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self::new(Url::parse(base_url)?))
    }

    /// Read `LANGFLOW_SERVER_URL` (required) and `LANGFLOW_API_KEY` (optional)
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url = std::env::var(SERVER_URL_ENV)
            .map_err(|_| ConfigError::MissingEnv(SERVER_URL_ENV))?;
        let config = Self::from_url(&base_url)?;
        match std::env::var(API_KEY_ENV) {
            Ok(key) if !key.is_empty() => config.with_api_key(key),
            _ => Ok(config),
        }
    }

    /// Authenticate every request with `key`
    pub fn with_api_key(mut self, key: impl AsRef<str>) -> Result<Self, ConfigError> {
        self.api_key = Some(ApiKey::new(key)?);
        Ok(self)
    }

    /// Add a header sent on every request
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::InvalidHeader {
            name: name.to_string(),
        };
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
        let value = HeaderValue::from_str(value).map_err(|_| invalid())?;
        self.default_headers.insert(name, value);
        Ok(self)
    }

    /// Limit how long connecting to the server may take
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }
}
