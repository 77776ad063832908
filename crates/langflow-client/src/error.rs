//! Error types for the Langflow client
//!
//! Every failed call surfaces exactly one [`LangflowError`]: either the server
//! answered with a non-success status ([`HttpError`]) or the call could not be
//! completed at all ([`TransportError`]).

use bytes::Bytes;
use langflow_api_contract::ErrorDetail;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::fmt;
use thiserror::Error;

/// Errors surfaced by `request`, `stream` and everything built on them
#[derive(Debug, Error)]
pub enum LangflowError {
    #[error(transparent)]
    Http(#[from] HttpError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Which half of the taxonomy an error belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Http,
    Transport,
}

impl LangflowError {
    /// Get the error kind
    pub fn kind(&self) -> ErrorKind {
        match self {
            LangflowError::Http(_) => ErrorKind::Http,
            LangflowError::Transport(_) => ErrorKind::Transport,
        }
    }

    /// Response status, for HTTP errors
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            LangflowError::Http(err) => Some(err.status()),
            LangflowError::Transport(_) => None,
        }
    }

    /// Whether the call was aborted through its cancellation token
    pub fn is_cancelled(&self) -> bool {
        matches!(self, LangflowError::Transport(TransportError::Cancelled))
    }

    /// The HTTP error, if the server answered with a failure status
    pub fn as_http(&self) -> Option<&HttpError> {
        match self {
            LangflowError::Http(err) => Some(err),
            LangflowError::Transport(_) => None,
        }
    }

    /// The transport error, if the call could not complete
    pub fn as_transport(&self) -> Option<&TransportError> {
        match self {
            LangflowError::Transport(err) => Some(err),
            LangflowError::Http(_) => None,
        }
    }
}

/// Failures to complete a call: network, cancellation, malformed responses
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request cancelled")]
    Cancelled,

    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unexpected record: {0}")]
    Contract(#[from] langflow_api_contract::ContractError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl TransportError {
    /// Wrap a failure raised by a custom [`crate::HttpTransport`]
    pub fn other<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        TransportError::Other(err.into())
    }
}

/// Non-success response from the server
///
/// The body is read when the failure is detected so the error can be inspected
/// after the connection is gone.
#[derive(Debug, Clone)]
pub struct HttpError {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl HttpError {
    /// Create an HTTP error from a response head and its full body
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Get the response status
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Canonical reason phrase for the status, e.g. "Not Found"
    pub fn reason(&self) -> &str {
        self.status.canonical_reason().unwrap_or("Unknown Status")
    }

    /// Get the response headers
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Get the raw response body
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Body as text, lossily decoded
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Parse the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// The server's `{"detail": ...}` body, if it sent one
    pub fn detail(&self) -> Option<ErrorDetail> {
        self.json().ok()
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {} {}", self.status.as_u16(), self.reason())?;
        match self.detail() {
            Some(detail) => match detail.message() {
                Some(message) => write!(f, ": {message}"),
                None => write!(f, ": {}", detail.detail),
            },
            None if !self.body.is_empty() => write!(f, ": {}", self.text()),
            None => Ok(()),
        }
    }
}

impl std::error::Error for HttpError {}

/// Errors raised while building a client
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid base URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("invalid header value for {name}")]
    InvalidHeader { name: String },

    #[error("missing environment variable {0}")]
    MissingEnv(&'static str),

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Result type alias for Langflow client operations
pub type LangflowResult<T> = Result<T, LangflowError>;
