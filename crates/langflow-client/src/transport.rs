//! Pluggable HTTP execution
//!
//! [`LangflowClient`](crate::LangflowClient) prepares fully-formed requests and
//! hands them to an [`HttpTransport`]. The default is [`ReqwestTransport`];
//! tests and unusual network stacks can substitute their own.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use std::fmt;
use std::time::Duration;
use url::Url;

use crate::error::TransportError;
use crate::files::FilePayload;

/// Response body delivered incrementally, in transport-chosen chunks
pub type ByteStream = BoxStream<'static, Result<Bytes, TransportError>>;

/// Request body as handed to the transport
#[derive(Debug, Clone)]
pub enum HttpBody {
    /// Serialized JSON; the transport sets `content-type: application/json`
    Json(Bytes),
    /// Single-file `multipart/form-data` upload under the form field `file`
    Multipart(FilePayload),
}

/// A request with URL, headers and body already resolved
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<HttpBody>,
}

/// Response head plus a body that has not been read yet
pub struct HttpResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: ByteStream,
}

impl HttpResponse {
    /// Create a response from its head and unread body
    pub fn new(status: StatusCode, headers: HeaderMap, body: ByteStream) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Whether the status is 2xx
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Get the response status
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Canonical reason phrase for the status
    pub fn reason(&self) -> Option<&'static str> {
        self.status.canonical_reason()
    }

    /// Get the response headers
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Read the whole body
    pub async fn bytes(self) -> Result<Bytes, TransportError> {
        let mut body = self.body;
        let mut collected = BytesMut::new();
        while let Some(chunk) = body.next().await {
            collected.extend_from_slice(&chunk?);
        }
        Ok(collected.freeze())
    }

    /// Read the whole body as text, lossily decoded
    pub async fn text(self) -> Result<String, TransportError> {
        let bytes = self.bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Read the whole body and parse it as JSON
    pub async fn json<T: DeserializeOwned>(self) -> Result<T, TransportError> {
        let bytes = self.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Split into head and the unread body stream
    pub fn into_parts(self) -> (StatusCode, HeaderMap, ByteStream) {
        (self.status, self.headers, self.body)
    }
}

impl fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Executes prepared requests
///
/// Implementations must return as soon as the response head is available and
/// leave the body to be pulled through [`HttpResponse`].
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Default transport backed by `reqwest`
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a transport with its own `reqwest` client
    pub fn new(connect_timeout: Option<Duration>) -> Result<Self, reqwest::Error> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }

    /// Use an existing `reqwest` client, e.g. one with proxy or TLS settings
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method, request.url)
            .headers(request.headers);

        match request.body {
            Some(HttpBody::Json(bytes)) => {
                builder = builder
                    .header(reqwest::header::CONTENT_TYPE, "application/json")
                    .body(bytes);
            }
            Some(HttpBody::Multipart(file)) => {
                let part = reqwest::multipart::Part::bytes(file.bytes.to_vec())
                    .file_name(file.file_name)
                    .mime_str(&file.content_type)?;
                builder = builder.multipart(reqwest::multipart::Form::new().part("file", part));
            }
            None => {}
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes_stream().map_err(TransportError::from).boxed();
        Ok(HttpResponse::new(status, headers, body))
    }
}
