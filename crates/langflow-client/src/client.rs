//! Transport core: request construction, error normalization, cancellation

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::auth::ApiKey;
use crate::config::ClientConfig;
use crate::error::{ConfigError, HttpError, LangflowResult, TransportError};
use crate::files::Files;
use crate::flow::{Flow, Tweaks};
use crate::logs::Logs;
use crate::ndjson::{NdjsonDecoder, SkipHook};
use crate::request::{RequestBody, RequestDescriptor};
use crate::stream::{ndjson_stream, NdjsonStream};
use crate::transport::{HttpBody, HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};

/// Client for a Langflow server
///
/// Cheap to clone; clones share the same read-only configuration and
/// transport. Every call owns its own request, connection and decoder.
#[derive(Clone)]
pub struct LangflowClient {
    inner: Arc<ClientInner>,
}

#[derive(Clone)]
struct ClientInner {
    /// Base URL without a trailing slash; paths are appended verbatim
    base_url: String,
    api_key: Option<ApiKey>,
    default_headers: HeaderMap,
    user_agent: HeaderValue,
    transport: Arc<dyn HttpTransport>,
    skip_hook: Option<SkipHook>,
}

impl LangflowClient {
    /// Create a client using the default `reqwest` transport
    pub fn new(config: ClientConfig) -> Result<Self, ConfigError> {
        let transport = ReqwestTransport::new(config.connect_timeout)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Create a client that executes requests through `transport`
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn HttpTransport>) -> Self {
        let base_url = config.base_url.as_str().trim_end_matches('/').to_string();
        Self {
            inner: Arc::new(ClientInner {
                base_url,
                api_key: config.api_key,
                default_headers: config.default_headers,
                user_agent: default_user_agent(),
                transport,
                skip_hook: None,
            }),
        }
    }

    /// Create a client from a base URL string and optional API key
    pub fn from_url(base_url: &str, api_key: Option<&str>) -> Result<Self, ConfigError> {
        let mut config = ClientConfig::from_url(base_url)?;
        if let Some(key) = api_key {
            config = config.with_api_key(key)?;
        }
        Self::new(config)
    }

    /// Report NDJSON lines the decoder skips on every stream of this client
    pub fn with_skip_hook(self, hook: SkipHook) -> Self {
        let mut inner = (*self.inner).clone();
        inner.skip_hook = Some(hook);
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Get the base URL, without a trailing slash
    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// Handle for the flow `flow_id`
    pub fn flow(&self, flow_id: impl Into<String>) -> Flow {
        Flow::new(self.clone(), flow_id, Tweaks::new())
    }

    /// Handle for the flow `flow_id` with initial tweaks
    pub fn flow_with_tweaks(&self, flow_id: impl Into<String>, tweaks: Tweaks) -> Flow {
        Flow::new(self.clone(), flow_id, tweaks)
    }

    /// File upload, listing and deletion
    pub fn files(&self) -> Files<'_> {
        Files::new(self)
    }

    /// Server log access
    pub fn logs(&self) -> Logs<'_> {
        Logs::new(self)
    }

    /// Issue a call and return its parsed JSON body (`null` for an empty body)
    pub async fn request(&self, descriptor: RequestDescriptor) -> LangflowResult<Value> {
        self.request_as(descriptor).await
    }

    /// Issue a call and deserialize its JSON body into `T`
    pub async fn request_as<T: DeserializeOwned>(
        &self,
        descriptor: RequestDescriptor,
    ) -> LangflowResult<T> {
        let response = self.send(&descriptor).await?;
        let body = cancellable(descriptor.cancellation(), response.bytes()).await?;
        let parsed = if body.iter().all(u8::is_ascii_whitespace) {
            serde_json::from_value(Value::Null)
        } else {
            serde_json::from_slice(&body)
        };
        Ok(parsed.map_err(TransportError::from)?)
    }

    /// Issue a call and decode its body as NDJSON, lazily
    pub async fn stream(&self, descriptor: RequestDescriptor) -> LangflowResult<NdjsonStream> {
        let response = self.send(&descriptor).await?;
        let (_, _, body) = response.into_parts();
        let decoder = match &self.inner.skip_hook {
            Some(hook) => NdjsonDecoder::new().with_skip_hook(Arc::clone(hook)),
            None => NdjsonDecoder::new(),
        };
        Ok(ndjson_stream(body, decoder, descriptor.cancellation().cloned()))
    }

    /// Execute the call and turn non-success statuses into [`HttpError`]
    async fn send(&self, descriptor: &RequestDescriptor) -> LangflowResult<HttpResponse> {
        let request = self.prepare(descriptor)?;
        tracing::debug!(method = %request.method, url = %request.url, "sending request");

        let cancellation = descriptor.cancellation();
        let response = cancellable(cancellation, self.inner.transport.execute(request)).await?;
        if response.is_success() {
            return Ok(response);
        }

        let status = response.status();
        let headers = response.headers().clone();
        let body = match cancellable(cancellation, response.bytes()).await {
            Ok(body) => body,
            Err(TransportError::Cancelled) => return Err(TransportError::Cancelled.into()),
            Err(err) => {
                tracing::debug!(error = %err, "failed to read error response body");
                Bytes::new()
            }
        };
        tracing::debug!(status = status.as_u16(), "server returned error status");
        Err(HttpError::new(status, headers, body).into())
    }

    fn prepare(&self, descriptor: &RequestDescriptor) -> Result<HttpRequest, TransportError> {
        let body = match descriptor.body() {
            Some(RequestBody::Json(value)) => {
                Some(HttpBody::Json(Bytes::from(serde_json::to_vec(value)?)))
            }
            Some(RequestBody::File(file)) => Some(HttpBody::Multipart(file.clone())),
            None => None,
        };
        Ok(HttpRequest {
            method: descriptor.method().clone(),
            url: self.url_for(descriptor)?,
            headers: self.headers_for(descriptor),
            body,
        })
    }

    fn url_for(&self, descriptor: &RequestDescriptor) -> Result<Url, TransportError> {
        let path = descriptor.path();
        let separator = if path.starts_with('/') { "" } else { "/" };
        let raw = format!("{}{}{}", self.inner.base_url, separator, path);
        let mut url =
            Url::parse(&raw).map_err(|err| TransportError::InvalidRequest(format!("{raw}: {err}")))?;
        if !descriptor.path_segments().is_empty() {
            url.path_segments_mut()
                .map_err(|()| TransportError::InvalidRequest(format!("{raw}: not a base URL")))?
                .pop_if_empty()
                .extend(descriptor.path_segments());
        }
        if !descriptor.query().is_empty() {
            url.query_pairs_mut().extend_pairs(descriptor.query());
        }
        Ok(url)
    }

    /// Caller overrides, then client defaults, then computed defaults
    fn headers_for(&self, descriptor: &RequestDescriptor) -> HeaderMap {
        let mut headers = descriptor.headers().clone();
        for name in self.inner.default_headers.keys() {
            if headers.contains_key(name) {
                continue;
            }
            for value in self.inner.default_headers.get_all(name) {
                headers.append(name.clone(), value.clone());
            }
        }
        if !headers.contains_key(USER_AGENT) {
            headers.insert(USER_AGENT, self.inner.user_agent.clone());
        }
        if let Some(key) = &self.inner.api_key {
            key.apply_to_headers(&mut headers);
        }
        headers
    }
}

impl fmt::Debug for LangflowClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LangflowClient")
            .field("base_url", &self.inner.base_url)
            .field("api_key", &self.inner.api_key)
            .finish_non_exhaustive()
    }
}

/// Race `future` against `token`; an already-cancelled token wins immediately
async fn cancellable<T, F>(token: Option<&CancellationToken>, future: F) -> Result<T, TransportError>
where
    F: Future<Output = Result<T, TransportError>>,
{
    match token {
        Some(token) => tokio::select! {
            biased;
            _ = token.cancelled() => {
                tracing::debug!("request cancelled");
                Err(TransportError::Cancelled)
            }
            result = future => result,
        },
        None => future.await,
    }
}

/// `langflow-client-rust/<version> (<os> <arch>) rust/<rustc version>`
///
/// The rustc version is the compiler that built this crate, captured by the
/// build script.
pub fn default_user_agent() -> HeaderValue {
    let rust_version = env!("LANGFLOW_CLIENT_RUSTC_VERSION");
    let agent = format!(
        "langflow-client-rust/{} ({} {}) rust/{}",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH,
        rust_version,
    );
    HeaderValue::from_str(&agent).unwrap_or_else(|_| HeaderValue::from_static("langflow-client-rust"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderName;

    struct UnreachableTransport;

    #[async_trait::async_trait]
    impl HttpTransport for UnreachableTransport {
        async fn execute(&self, _request: HttpRequest) -> Result<HttpResponse, TransportError> {
            Err(TransportError::other("no network in unit tests"))
        }
    }

    fn client(base_url: &str, api_key: Option<&str>) -> LangflowClient {
        let mut config = ClientConfig::from_url(base_url).unwrap();
        if let Some(key) = api_key {
            config = config.with_api_key(key).unwrap();
        }
        LangflowClient::with_transport(config, Arc::new(UnreachableTransport))
    }

    #[test]
    fn test_client_creation() {
        let client = LangflowClient::from_url("http://localhost:7860/api/", None).unwrap();
        assert_eq!(client.base_url(), "http://localhost:7860/api");
    }

    #[test]
    fn test_url_joins_path_and_query() {
        let client = client("http://localhost:7860/api", None);
        let descriptor = RequestDescriptor::get("/logs")
            .with_query("lines_before", "10")
            .with_query("note", "a b&c");
        let url = client.url_for(&descriptor).unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:7860/api/logs?lines_before=10&note=a+b%26c"
        );

        let relative = client.url_for(&RequestDescriptor::get("v1/run/x")).unwrap();
        assert_eq!(relative.as_str(), "http://localhost:7860/api/v1/run/x");
    }

    #[test]
    fn test_path_segments_are_percent_encoded() {
        let client = client("http://localhost:7860/api/", None);
        let descriptor = RequestDescriptor::post("/v1/run")
            .with_path_segment("my flow#x/../y?z")
            .with_query("stream", "true");
        let url = client.url_for(&descriptor).unwrap();

        assert_eq!(
            url.as_str(),
            "http://localhost:7860/api/v1/run/my%20flow%23x%2F..%2Fy%3Fz?stream=true"
        );
        assert_eq!(url.fragment(), None);
        assert_eq!(url.path_segments().unwrap().count(), 4);
    }

    #[test]
    fn test_default_headers() {
        let client = client("http://localhost:7860", Some("secret"));
        let headers = client.headers_for(&RequestDescriptor::get("/v2/files"));

        assert_eq!(headers.get("x-api-key").unwrap(), "secret");
        let agent = headers.get(USER_AGENT).unwrap().to_str().unwrap();
        assert!(agent.starts_with("langflow-client-rust/"));
        assert!(agent.contains(std::env::consts::OS));
    }

    #[test]
    fn test_user_agent_reports_building_compiler() {
        let agent = default_user_agent();
        let agent = agent.to_str().unwrap();
        let rustc = env!("LANGFLOW_CLIENT_RUSTC_VERSION");

        assert!(agent.ends_with(&format!(" rust/{rustc}")));
        // a full compiler version, not the two-part minimum from Cargo.toml
        let parts: Vec<&str> = rustc.split(['.', '-']).collect();
        assert!(parts.len() >= 3, "unexpected rustc version {rustc}");
        assert!(parts[..3].iter().all(|part| part.parse::<u64>().is_ok()));
    }

    #[test]
    fn test_caller_headers_win() {
        let config = ClientConfig::from_url("http://localhost:7860")
            .unwrap()
            .with_api_key("secret")
            .unwrap()
            .with_header("x-team", "default")
            .unwrap()
            .with_header("x-shared", "client")
            .unwrap();
        let client = LangflowClient::with_transport(config, Arc::new(UnreachableTransport));

        let descriptor = RequestDescriptor::get("/v2/files")
            .with_header(HeaderName::from_static("x-api-key"), HeaderValue::from_static("other"))
            .with_header(USER_AGENT, HeaderValue::from_static("custom/1.0"))
            .with_header(HeaderName::from_static("x-shared"), HeaderValue::from_static("call"));
        let headers = client.headers_for(&descriptor);

        assert_eq!(headers.get("x-api-key").unwrap(), "other");
        assert_eq!(headers.get(USER_AGENT).unwrap(), "custom/1.0");
        assert_eq!(headers.get("x-team").unwrap(), "default");
        assert_eq!(headers.get("x-shared").unwrap(), "call");
    }

    #[test]
    fn test_no_api_key_header_without_key() {
        let client = client("http://localhost:7860", None);
        let headers = client.headers_for(&RequestDescriptor::get("/v2/files"));
        assert!(headers.get("x-api-key").is_none());
    }

    #[test]
    fn test_debug_hides_key() {
        let client = client("http://localhost:7860", Some("secret"));
        assert!(!format!("{client:?}").contains("secret"));
    }

    #[tokio::test]
    async fn test_transport_failure_is_transport_error() {
        let client = client("http://localhost:7860", None);
        let err = client.request(RequestDescriptor::get("/v2/files")).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Transport);
    }

    #[tokio::test]
    async fn test_precancelled_token_skips_transport() {
        let client = client("http://localhost:7860", None);
        let token = CancellationToken::new();
        token.cancel();
        let err = client
            .request(RequestDescriptor::get("/v2/files").with_cancellation(token))
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }
}
