//! Request descriptors

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::TransportError;
use crate::files::FilePayload;

/// Body of a [`RequestDescriptor`]
#[derive(Debug, Clone)]
pub enum RequestBody {
    Json(Value),
    File(FilePayload),
}

/// Everything needed to issue one call: path, method, query, body, header
/// overrides and an optional cancellation token.
///
/// Built with the consuming `with_*` methods and read-only afterwards. Cloning
/// a descriptor and sending it again re-issues the same call.
///
/// `path` is a fixed route and is used as written. Caller-supplied ids belong
/// in [`RequestDescriptor::with_path_segment`], which percent-encodes them.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    method: Method,
    path: String,
    /// Appended to `path` one encoded segment each
    segments: Vec<String>,
    query: Vec<(String, String)>,
    body: Option<RequestBody>,
    headers: HeaderMap,
    cancellation: Option<CancellationToken>,
}

impl RequestDescriptor {
    /// Create a request for `path`, relative to the client's base URL
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            segments: Vec::new(),
            query: Vec::new(),
            body: None,
            headers: HeaderMap::new(),
            cancellation: None,
        }
    }

    /// `GET` request for `path`
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// `POST` request for `path`
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// `DELETE` request for `path`
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Append one path segment; `/`, `?`, `#` and the like are escaped
    pub fn with_path_segment(mut self, segment: impl Into<String>) -> Self {
        self.segments.push(segment.into());
        self
    }

    /// Add a query pair; repeated keys are kept in order
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Add several query pairs
    pub fn with_query_pairs(mut self, pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        self.query.extend(pairs);
        self
    }

    /// Use `body` as the JSON payload
    pub fn with_json_value(mut self, body: Value) -> Self {
        self.body = Some(RequestBody::Json(body));
        self
    }

    /// Serialize `body` as the JSON payload
    pub fn with_json<B: Serialize>(self, body: &B) -> Result<Self, TransportError> {
        Ok(self.with_json_value(serde_json::to_value(body)?))
    }

    /// Send `file` as a multipart upload
    pub fn with_file(mut self, file: FilePayload) -> Self {
        self.body = Some(RequestBody::File(file));
        self
    }

    /// Override a header; caller values win over every computed default
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Override several headers at once
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers.extend(headers);
        self
    }

    /// Abort the call when `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Attach `token` when present; keeps call sites with optional tokens flat
    pub fn with_optional_cancellation(self, token: Option<CancellationToken>) -> Self {
        match token {
            Some(token) => self.with_cancellation(token),
            None => self,
        }
    }

    /// Get the HTTP method
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Get the path, relative to the base URL
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Unencoded segments appended after [`RequestDescriptor::path`]
    pub fn path_segments(&self) -> &[String] {
        &self.segments
    }

    /// Get the query pairs, in insertion order
    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    /// Get the body, if any
    pub fn body(&self) -> Option<&RequestBody> {
        self.body.as_ref()
    }

    /// Get the caller's header overrides
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Get the cancellation token, if any
    pub fn cancellation(&self) -> Option<&CancellationToken> {
        self.cancellation.as_ref()
    }
}
