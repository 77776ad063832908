//! Error types for contract conversions and server error bodies

use thiserror::Error;

/// Errors raised while converting raw JSON into contract types
#[derive(Debug, Error)]
pub enum ContractError {
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Log record must be a single-key object, got: {0}")]
    InvalidLogRecord(String),

    #[error("Stream event is missing the `event` field: {0}")]
    MissingEventKind(String),
}

/// Error body returned by the server on validation and lookup failures
///
/// Langflow sits on FastAPI, so `detail` is either a plain message or a list
/// of validation entries; it is kept as raw JSON.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ErrorDetail {
    pub detail: serde_json::Value,
}

impl ErrorDetail {
    /// Plain message, when the server sent a string
    pub fn message(&self) -> Option<&str> {
        self.detail.as_str()
    }
}
