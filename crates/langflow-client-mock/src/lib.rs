//! Scripted HTTP transport for Langflow client tests
//!
//! [`MockTransport`] answers each request with the next queued
//! [`MockResponse`] and records what it was asked to send.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use langflow_client::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use langflow_client::{
    ByteStream, ClientConfig, HttpRequest, HttpResponse, HttpTransport, LangflowClient,
    StatusCode, TransportError,
};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One scripted answer
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Respond with `status` and deliver `chunks` as the body
    Body {
        status: StatusCode,
        content_type: &'static str,
        chunks: Vec<Bytes>,
        chunk_delay: Option<Duration>,
        /// Keep the body open after the last chunk instead of closing it
        hang_after: bool,
    },
    /// Fail before any response head, like a refused connection
    NetworkError(String),
    /// Never produce a response head
    Pending,
}

impl MockResponse {
    /// JSON body with the given status
    pub fn json(status: StatusCode, body: Value) -> Self {
        Self::Body {
            status,
            content_type: "application/json",
            chunks: vec![Bytes::from(body.to_string())],
            chunk_delay: None,
            hang_after: false,
        }
    }

    /// `200 OK` with a JSON body
    pub fn ok_json(body: Value) -> Self {
        Self::json(StatusCode::OK, body)
    }

    /// Successful response with an empty body
    pub fn no_content() -> Self {
        Self::Body {
            status: StatusCode::NO_CONTENT,
            content_type: "application/json",
            chunks: Vec::new(),
            chunk_delay: None,
            hang_after: false,
        }
    }

    /// Plain-text body with the given status
    pub fn text(status: StatusCode, body: &str) -> Self {
        Self::Body {
            status,
            content_type: "text/plain",
            chunks: vec![Bytes::from(body.to_string())],
            chunk_delay: None,
            hang_after: false,
        }
    }

    /// NDJSON body with one record per chunk
    pub fn ndjson(records: &[Value]) -> Self {
        let chunks = records
            .iter()
            .map(|record| format!("{record}\n"))
            .collect::<Vec<_>>();
        Self::ndjson_chunks(chunks)
    }

    /// NDJSON body split exactly at the given chunk boundaries
    pub fn ndjson_chunks<S: Into<String>>(chunks: impl IntoIterator<Item = S>) -> Self {
        Self::Body {
            status: StatusCode::OK,
            content_type: "application/x-ndjson",
            chunks: chunks
                .into_iter()
                .map(|chunk| Bytes::from(chunk.into()))
                .collect(),
            chunk_delay: None,
            hang_after: false,
        }
    }

    /// Fail the call before a response head arrives
    pub fn network_error(message: impl Into<String>) -> Self {
        Self::NetworkError(message.into())
    }

    /// Sleep before each body chunk
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        if let Self::Body { chunk_delay, .. } = &mut self {
            *chunk_delay = Some(delay);
        }
        self
    }

    /// Leave the body open after the scripted chunks
    pub fn hanging(mut self) -> Self {
        if let Self::Body { hang_after, .. } = &mut self {
            *hang_after = true;
        }
        self
    }
}

/// [`HttpTransport`] that replays [`MockResponse`]s in order
#[derive(Debug, Default)]
pub struct MockTransport {
    responses: Mutex<VecDeque<MockResponse>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    /// Create a transport with nothing queued
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Transport preloaded with `responses`
    pub fn with_responses(responses: impl IntoIterator<Item = MockResponse>) -> Arc<Self> {
        let transport = Self::new();
        for response in responses {
            transport.push(response);
        }
        transport
    }

    /// Queue the next response
    pub fn push(&self, response: MockResponse) {
        lock(&self.responses).push_back(response);
    }

    /// Requests seen so far, oldest first
    pub fn requests(&self) -> Vec<HttpRequest> {
        lock(&self.requests).clone()
    }

    /// Most recent request sent through the transport
    pub fn last_request(&self) -> Option<HttpRequest> {
        lock(&self.requests).last().cloned()
    }

    /// Client against `http://langflow.test/api` using this transport
    pub fn client(self: &Arc<Self>, api_key: Option<&str>) -> LangflowClient {
        let mut config = ClientConfig::from_url("http://langflow.test/api")
            .expect("static test URL parses");
        if let Some(key) = api_key {
            config = config.with_api_key(key).expect("test API key is a valid header");
        }
        LangflowClient::with_transport(config, Arc::clone(self) as Arc<dyn HttpTransport>)
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        lock(&self.requests).push(request);
        let next = lock(&self.responses).pop_front();

        match next {
            Some(MockResponse::Body {
                status,
                content_type,
                chunks,
                chunk_delay,
                hang_after,
            }) => {
                let mut headers = HeaderMap::new();
                headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
                Ok(HttpResponse::new(
                    status,
                    headers,
                    body_stream(chunks, chunk_delay, hang_after),
                ))
            }
            Some(MockResponse::NetworkError(message)) => Err(TransportError::other(
                std::io::Error::new(std::io::ErrorKind::ConnectionRefused, message),
            )),
            Some(MockResponse::Pending) => futures::future::pending().await,
            None => Err(TransportError::other("no scripted response left")),
        }
    }
}

fn body_stream(chunks: Vec<Bytes>, delay: Option<Duration>, hang_after: bool) -> ByteStream {
    let body = stream::iter(chunks).then(move |chunk| async move {
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok::<_, TransportError>(chunk)
    });
    if hang_after {
        body.chain(stream::pending()).boxed()
    } else {
        body.boxed()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Install a `tracing` subscriber writing through the test harness
///
/// Filtered by `RUST_LOG`; safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use langflow_client::{Method, RequestDescriptor};
    use serde_json::json;

    #[tokio::test]
    async fn test_replays_in_order_and_records_requests() {
        let transport = MockTransport::with_responses([
            MockResponse::ok_json(json!({"n": 1})),
            MockResponse::ok_json(json!({"n": 2})),
        ]);
        let client = transport.client(None);

        let first = client.request(RequestDescriptor::get("/a")).await.unwrap();
        let second = client.request(RequestDescriptor::post("/b")).await.unwrap();

        assert_eq!(first, json!({"n": 1}));
        assert_eq!(second, json!({"n": 2}));
        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].method, Method::POST);
        assert_eq!(requests[1].url.path(), "/api/b");
    }

    #[tokio::test]
    async fn test_exhausted_script_is_transport_error() {
        let transport = MockTransport::new();
        let err = transport
            .client(None)
            .request(RequestDescriptor::get("/a"))
            .await
            .unwrap_err();
        assert!(err.as_transport().is_some());
    }
}
