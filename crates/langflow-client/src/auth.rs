//! API key authentication for the Langflow client

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::fmt;

use crate::error::ConfigError;

/// Header carrying the API key on every request
pub const API_KEY_HEADER: HeaderName = HeaderName::from_static("x-api-key");

/// Langflow API key (`x-api-key: <token>`)
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(HeaderValue);

impl ApiKey {
    /// Wrap a token; fails if it cannot be sent as a header value
    pub fn new(token: impl AsRef<str>) -> Result<Self, ConfigError> {
        let mut value =
            HeaderValue::from_str(token.as_ref()).map_err(|_| ConfigError::InvalidHeader {
                name: API_KEY_HEADER.to_string(),
            })?;
        value.set_sensitive(true);
        Ok(Self(value))
    }

    /// Apply the key to outgoing headers unless the caller already set one
    pub fn apply_to_headers(&self, headers: &mut HeaderMap) {
        if !headers.contains_key(&API_KEY_HEADER) {
            headers.insert(API_KEY_HEADER, self.0.clone());
        }
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}
