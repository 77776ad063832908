//! Server log access

use langflow_api_contract::{Log, LogQuery};
use reqwest::header::{HeaderValue, ACCEPT};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::client::LangflowClient;
use crate::error::LangflowResult;
use crate::request::RequestDescriptor;
use crate::stream::{NdjsonStream, RecordStream};

/// Log lines as the server emits them
pub type LogStream = RecordStream<Log>;

/// Logs helper, borrowed from a [`LangflowClient`]
#[derive(Debug, Clone, Copy)]
pub struct Logs<'a> {
    client: &'a LangflowClient,
}

impl<'a> Logs<'a> {
    pub(crate) fn new(client: &'a LangflowClient) -> Self {
        Self { client }
    }

    /// Fetch a window of logs (`GET /logs`)
    pub async fn fetch(
        &self,
        query: &LogQuery,
        cancellation: Option<CancellationToken>,
    ) -> LangflowResult<Vec<Log>> {
        let descriptor = RequestDescriptor::get("/logs")
            .with_query_pairs(query.to_query_pairs())
            .with_header(ACCEPT, HeaderValue::from_static("application/x-ndjson"))
            .with_optional_cancellation(cancellation);
        let records = self.client.stream(descriptor).await?;
        into_logs(records).collect_records().await
    }

    /// Follow new log lines as they are written (`GET /logs-stream`)
    pub async fn stream(&self, cancellation: Option<CancellationToken>) -> LangflowResult<LogStream> {
        let descriptor = RequestDescriptor::get("/logs-stream")
            .with_header(ACCEPT, HeaderValue::from_static("application/x-ndjson"))
            .with_optional_cancellation(cancellation);
        let records = self.client.stream(descriptor).await?;
        Ok(into_logs(records))
    }
}

fn into_logs(records: NdjsonStream) -> LogStream {
    records.filter_map_records(|record: Value| match Log::try_from(record) {
        Ok(log) => Some(Ok(log)),
        Err(err) => {
            tracing::debug!(error = %err, "skipping log record");
            None
        }
    })
}
