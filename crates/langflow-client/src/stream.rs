//! Lazy record streams over NDJSON response bodies

use futures::stream::{self, BoxStream, Stream, StreamExt};
use serde_json::Value;
use std::collections::VecDeque;
use std::fmt;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use tokio_util::sync::CancellationToken;

use crate::error::{LangflowError, LangflowResult, TransportError};
use crate::ndjson::NdjsonDecoder;
use crate::transport::ByteStream;

/// Finite, non-restartable sequence of decoded records
///
/// Ends with `None` once the server closes the body. The first error ends the
/// stream: it is yielded once and every later poll returns `None`.
pub struct RecordStream<T> {
    inner: BoxStream<'static, LangflowResult<T>>,
    done: bool,
}

/// Raw JSON records of an NDJSON body
pub type NdjsonStream = RecordStream<Value>;

impl<T: Send + 'static> RecordStream<T> {
    pub(crate) fn from_boxed(inner: BoxStream<'static, LangflowResult<T>>) -> Self {
        Self { inner, done: false }
    }

    /// Transform each record; `None` drops it, `Some(Err(_))` fails the stream
    pub fn filter_map_records<U, F>(self, mut f: F) -> RecordStream<U>
    where
        U: Send + 'static,
        F: FnMut(T) -> Option<LangflowResult<U>> + Send + 'static,
    {
        let inner = self
            .filter_map(move |item| {
                let mapped = match item {
                    Ok(record) => f(record),
                    Err(err) => Some(Err(err)),
                };
                futures::future::ready(mapped)
            })
            .boxed();
        RecordStream::from_boxed(inner)
    }

    /// Drain the stream into a vector, failing on the first error
    pub async fn collect_records(mut self) -> LangflowResult<Vec<T>> {
        let mut records = Vec::new();
        while let Some(record) = self.next().await {
            records.push(record?);
        }
        Ok(records)
    }
}

impl<T> Stream for RecordStream<T> {
    type Item = LangflowResult<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.done {
            return Poll::Ready(None);
        }
        let item = ready!(self.inner.poll_next_unpin(cx));
        if !matches!(item, Some(Ok(_))) {
            self.done = true;
        }
        Poll::Ready(item)
    }
}

impl<T> fmt::Debug for RecordStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordStream")
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

/// Per-call read state: one body, one decoder, one optional token
struct BodyReader {
    body: ByteStream,
    /// `None` once the body is exhausted and the tail flushed
    decoder: Option<NdjsonDecoder>,
    pending: VecDeque<Value>,
    cancellation: Option<CancellationToken>,
}

impl BodyReader {
    fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }

    async fn next_record(&mut self) -> Option<LangflowResult<Value>> {
        loop {
            if self.decoder.is_none() && self.pending.is_empty() {
                return None;
            }
            if self.is_cancelled() {
                tracing::debug!("NDJSON stream cancelled");
                self.decoder = None;
                self.pending.clear();
                return Some(Err(TransportError::Cancelled.into()));
            }
            if let Some(record) = self.pending.pop_front() {
                return Some(Ok(record));
            }

            let chunk = match &self.cancellation {
                Some(token) => tokio::select! {
                    biased;
                    _ = token.cancelled() => continue,
                    chunk = self.body.next() => chunk,
                },
                None => self.body.next().await,
            };

            match chunk {
                Some(Ok(bytes)) => {
                    if let Some(decoder) = self.decoder.as_mut() {
                        self.pending.extend(decoder.feed(&bytes));
                    }
                }
                Some(Err(err)) => {
                    self.decoder = None;
                    self.pending.clear();
                    return Some(Err(LangflowError::Transport(err)));
                }
                None => {
                    if let Some(decoder) = self.decoder.take() {
                        self.pending.extend(decoder.finish());
                    }
                }
            }
        }
    }
}

/// Decode `body` lazily, racing every read against `cancellation`
pub(crate) fn ndjson_stream(
    body: ByteStream,
    decoder: NdjsonDecoder,
    cancellation: Option<CancellationToken>,
) -> NdjsonStream {
    let reader = BodyReader {
        body,
        decoder: Some(decoder),
        pending: VecDeque::new(),
        cancellation,
    };
    let inner = stream::unfold(reader, |mut reader| async move {
        let item = reader.next_record().await?;
        Some((item, reader))
    })
    .boxed();
    RecordStream::from_boxed(inner)
}
