//! Flow handles: run a flow, stream its events, attach files to it

use langflow_api_contract::{
    FlowFileUpload, FlowResponse, InputType, OutputType, RunRequest, StreamEvent,
};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::client::LangflowClient;
use crate::error::{LangflowError, LangflowResult, TransportError};
use crate::files::FilePayload;
use crate::request::RequestDescriptor;
use crate::stream::RecordStream;

/// Events of a streaming flow run
pub type FlowEventStream = RecordStream<StreamEvent>;

/// Insertion-ordered component overrides, shared copy-on-write
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tweaks(Arc<Map<String, Value>>);

impl Tweaks {
    /// Create empty tweaks
    pub fn new() -> Self {
        Self::default()
    }

    /// New tweaks with `key` set to `value`; `self` is left untouched
    pub fn with(&self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut map = Arc::clone(&self.0);
        Arc::make_mut(&mut map).insert(key.into(), value.into());
        Self(map)
    }

    /// `self` overlaid with `overrides`; keys in `overrides` win
    pub fn merged(&self, overrides: &Tweaks) -> Self {
        if overrides.is_empty() {
            return self.clone();
        }
        if self.is_empty() {
            return overrides.clone();
        }
        let mut map = (*self.0).clone();
        for (key, value) in overrides.0.iter() {
            map.insert(key.clone(), value.clone());
        }
        Self(Arc::new(map))
    }

    /// Get the override for `key`
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Number of overridden components
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether nothing is overridden
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Copy into a JSON object
    pub fn to_map(&self) -> Map<String, Value> {
        (*self.0).clone()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Tweaks {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let map = iter
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        Self(Arc::new(map))
    }
}

/// Per-call options for [`Flow::run`] and [`Flow::stream`]
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub input_type: InputType,
    pub output_type: OutputType,
    pub session_id: Option<String>,
    /// Override the flow's own tweaks for this call only
    pub tweaks: Tweaks,
    pub cancellation: Option<CancellationToken>,
}

impl RunOptions {
    /// Create options with server defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set how the server reads the input
    pub fn input_type(mut self, input_type: InputType) -> Self {
        self.input_type = input_type;
        self
    }

    /// Set which outputs the server reports
    pub fn output_type(mut self, output_type: OutputType) -> Self {
        self.output_type = output_type;
        self
    }

    /// Continue an existing session
    pub fn session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Override one component setting for this call
    pub fn tweak(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.tweaks = self.tweaks.with(key, value);
        self
    }

    /// Replace the call-level tweaks
    pub fn tweaks(mut self, tweaks: Tweaks) -> Self {
        self.tweaks = tweaks;
        self
    }

    /// Abort the call when `token` is cancelled
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }
}

/// Immutable handle on one server-side flow
///
/// Cloning is cheap and every call builds its own request, so one handle can
/// drive any number of concurrent runs.
#[derive(Debug, Clone)]
pub struct Flow {
    client: LangflowClient,
    id: String,
    tweaks: Tweaks,
}

impl Flow {
    pub(crate) fn new(client: LangflowClient, id: impl Into<String>, tweaks: Tweaks) -> Self {
        Self {
            client,
            id: id.into(),
            tweaks,
        }
    }

    /// Get the flow id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get the flow-level tweaks
    pub fn tweaks(&self) -> &Tweaks {
        &self.tweaks
    }

    /// New handle with `key` tweaked; this one is unchanged
    pub fn tweak(&self, key: impl Into<String>, value: impl Into<Value>) -> Flow {
        Flow {
            client: self.client.clone(),
            id: self.id.clone(),
            tweaks: self.tweaks.with(key, value),
        }
    }

    /// Run the flow and wait for the complete response
    pub async fn run(
        &self,
        input_value: impl Into<String>,
        options: RunOptions,
    ) -> LangflowResult<FlowResponse> {
        let descriptor = self.run_descriptor(input_value.into(), options)?;
        self.client.request_as(descriptor).await
    }

    /// Run the flow and receive its events as the server produces them
    pub async fn stream(
        &self,
        input_value: impl Into<String>,
        options: RunOptions,
    ) -> LangflowResult<FlowEventStream> {
        let descriptor = self
            .run_descriptor(input_value.into(), options)?
            .with_query("stream", "true");
        let records = self.client.stream(descriptor).await?;
        Ok(records.filter_map_records(|record| {
            Some(
                StreamEvent::try_from(record)
                    .map_err(|err| LangflowError::from(TransportError::from(err))),
            )
        }))
    }

    /// Upload a file for use by this flow's components
    pub async fn upload_file(
        &self,
        file: FilePayload,
        cancellation: Option<CancellationToken>,
    ) -> LangflowResult<FlowFileUpload> {
        self.client
            .files()
            .upload_for_flow(&self.id, file, cancellation)
            .await
    }

    fn run_descriptor(
        &self,
        input_value: String,
        options: RunOptions,
    ) -> Result<RequestDescriptor, TransportError> {
        let body = RunRequest {
            input_value,
            input_type: options.input_type,
            output_type: options.output_type,
            session_id: options.session_id,
            tweaks: self.tweaks.merged(&options.tweaks).to_map(),
        };
        Ok(RequestDescriptor::post("/v1/run")
            .with_path_segment(self.id.as_str())
            .with_json(&body)?
            .with_optional_cancellation(options.cancellation))
    }
}
