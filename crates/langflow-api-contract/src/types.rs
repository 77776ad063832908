//! API contract types for the Langflow REST service

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::ContractError;

/// How the server should interpret `input_value`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    #[default]
    Chat,
    Text,
    Any,
}

/// Which output components the server should report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputType {
    #[default]
    Chat,
    Text,
    Any,
    Debug,
}

/// Body of `POST /v1/run/{flow_id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRequest {
    pub input_value: String,
    pub input_type: InputType,
    pub output_type: OutputType,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub tweaks: Map<String, Value>,
}

/// Result of a buffered flow run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowResponse {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub outputs: Vec<Value>,
}

impl FlowResponse {
    /// Text of the first chat message found in the run outputs.
    ///
    /// Walks `outputs[*].outputs[*]` and accepts the shapes Langflow has used
    /// for chat components across releases.
    pub fn chat_output_text(&self) -> Option<String> {
        self.outputs
            .iter()
            .filter_map(|run| run.get("outputs").and_then(Value::as_array))
            .flatten()
            .find_map(chat_text_of_component)
    }
}

fn chat_text_of_component(component: &Value) -> Option<String> {
    let candidates = [
        component.pointer("/results/message/text"),
        component.pointer("/outputs/message/message"),
        component.pointer("/messages/0/message"),
    ];
    candidates
        .into_iter()
        .flatten()
        .find_map(Value::as_str)
        .map(str::to_string)
}

/// Kind of an event produced by a streaming flow run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEventKind {
    AddMessage,
    Token,
    End,
    Error,
    Other(String),
}

impl StreamEventKind {
    fn parse(event: &str) -> Self {
        match event {
            "add_message" => Self::AddMessage,
            "token" => Self::Token,
            "end" => Self::End,
            "error" => Self::Error,
            other => Self::Other(other.to_string()),
        }
    }
}

/// One NDJSON record of a streaming flow run
///
/// Only the `event` discriminator is required; `data` is whatever the server
/// attached to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEvent {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl StreamEvent {
    /// Classify the `event` field
    pub fn kind(&self) -> StreamEventKind {
        StreamEventKind::parse(&self.event)
    }

    /// Message text carried by `add_message` and `token` events
    pub fn text(&self) -> Option<&str> {
        self.data
            .get("text")
            .or_else(|| self.data.get("chunk"))
            .and_then(Value::as_str)
    }
}

impl TryFrom<Value> for StreamEvent {
    type Error = ContractError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        if value.get("event").and_then(Value::as_str).is_none() {
            return Err(ContractError::MissingEventKind(value.to_string()));
        }
        Ok(serde_json::from_value(value)?)
    }
}

/// File stored on the server through the v2 files API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserFile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default, alias = "type")]
    pub content_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Response of a flow-scoped upload (`POST /v1/files/upload/{flow_id}`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowFileUpload {
    #[serde(alias = "flowId")]
    pub flow_id: String,
    pub file_path: String,
}

/// Window of server logs to fetch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lines_before: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lines_after: Option<u32>,
}

impl LogQuery {
    /// Logs around a Unix timestamp, in seconds
    pub fn around(timestamp: i64) -> Self {
        Self {
            timestamp: Some(timestamp),
            ..Self::default()
        }
    }

    /// Lines to return before the timestamp
    pub fn with_lines_before(mut self, lines: u32) -> Self {
        self.lines_before = Some(lines);
        self
    }

    /// Lines to return after the timestamp
    pub fn with_lines_after(mut self, lines: u32) -> Self {
        self.lines_after = Some(lines);
        self
    }

    /// Query-string pairs for the set fields, in a stable order
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if let Some(timestamp) = self.timestamp {
            pairs.push(("timestamp".to_string(), timestamp.to_string()));
        }
        if let Some(lines) = self.lines_before {
            pairs.push(("lines_before".to_string(), lines.to_string()));
        }
        if let Some(lines) = self.lines_after {
            pairs.push(("lines_after".to_string(), lines.to_string()));
        }
        pairs
    }
}

/// One server log line
#[derive(Debug, Clone, PartialEq)]
pub struct Log {
    /// Parsed timestamp; `None` when the key was not a recognisable time
    pub timestamp: Option<DateTime<Utc>>,
    pub raw_timestamp: String,
    pub message: String,
}

impl TryFrom<Value> for Log {
    type Error = ContractError;

    /// Build a log line from a `{timestamp: message}` record
    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let Value::Object(map) = value else {
            return Err(ContractError::InvalidLogRecord(value.to_string()));
        };
        if map.len() != 1 {
            return Err(ContractError::InvalidLogRecord(Value::Object(map).to_string()));
        }
        let Some((raw_timestamp, message)) = map.into_iter().next() else {
            return Err(ContractError::InvalidLogRecord("{}".to_string()));
        };
        let message = match message {
            Value::String(text) => text,
            other => other.to_string(),
        };
        Ok(Self {
            timestamp: parse_timestamp(&raw_timestamp),
            raw_timestamp,
            message,
        })
    }
}

/// Parse the timestamp formats the server emits.
///
/// Accepts RFC 3339, naive ISO-8601 (taken as UTC) and integer Unix seconds.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    raw.parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::String(text)) => parse_timestamp(&text),
        Some(Value::Number(number)) => number
            .as_i64()
            .and_then(|secs| DateTime::from_timestamp(secs, 0)),
        _ => None,
    })
}
