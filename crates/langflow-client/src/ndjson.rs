//! Incremental newline-delimited JSON decoding
//!
//! HTTP bodies arrive in chunks whose boundaries have nothing to do with the
//! record boundaries. [`NdjsonDecoder`] buffers raw bytes and hands back each
//! record as soon as its terminating `\n` has been seen. Lines are decoded as
//! UTF-8 only once complete, so a multi-byte character split across two chunks
//! is reassembled before decoding.
//!
//! Empty lines and lines that are not valid JSON are skipped, never fatal: the
//! server interleaves heartbeats and the occasional partial write with real
//! records. Skips are reported through `tracing` and an optional hook.

use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// A line that was dropped because it did not parse
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedLine {
    pub line: String,
    pub reason: String,
}

/// Callback invoked for every skipped non-empty line
pub type SkipHook = Arc<dyn Fn(&SkippedLine) + Send + Sync>;

/// Stateful NDJSON decoder; one instance per response body
#[derive(Default)]
pub struct NdjsonDecoder {
    buffer: Vec<u8>,
    /// Bytes of `buffer` already known to contain no newline
    scanned: usize,
    on_skip: Option<SkipHook>,
}

impl NdjsonDecoder {
    /// Create a decoder with an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Call `hook` for every skipped line
    pub fn with_skip_hook(mut self, hook: SkipHook) -> Self {
        self.on_skip = Some(hook);
        self
    }

    /// Append a chunk and return every record it completed, in order
    pub fn feed(&mut self, chunk: impl AsRef<[u8]>) -> Vec<Value> {
        self.buffer.extend_from_slice(chunk.as_ref());

        let mut records = Vec::new();
        let mut start = 0;
        let mut search_from = self.scanned;
        while let Some(offset) = self.buffer[search_from..].iter().position(|b| *b == b'\n') {
            let end = search_from + offset;
            if let Some(record) = self.parse_line(&self.buffer[start..end]) {
                records.push(record);
            }
            start = end + 1;
            search_from = start;
        }

        self.buffer.drain(..start);
        self.scanned = self.buffer.len();
        records
    }

    /// Flush the unterminated tail at end of stream
    pub fn finish(mut self) -> Option<Value> {
        let tail = std::mem::take(&mut self.buffer);
        self.parse_line(&tail)
    }

    /// Bytes held back waiting for a newline
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    fn parse_line(&self, raw: &[u8]) -> Option<Value> {
        let line = match std::str::from_utf8(raw) {
            Ok(line) => line.trim(),
            Err(err) => {
                self.skip(String::from_utf8_lossy(raw).trim(), err.to_string());
                return None;
            }
        };
        if line.is_empty() {
            return None;
        }
        match serde_json::from_str(line) {
            Ok(value) => {
                tracing::trace!(target: "langflow_client::ndjson", "decoded record");
                Some(value)
            }
            Err(err) => {
                self.skip(line, err.to_string());
                None
            }
        }
    }

    fn skip(&self, line: &str, reason: String) {
        tracing::debug!(
            target: "langflow_client::ndjson",
            line = %line,
            reason = %reason,
            "skipping malformed NDJSON line"
        );
        if let Some(hook) = &self.on_skip {
            hook(&SkippedLine {
                line: line.to_string(),
                reason,
            });
        }
    }
}

impl fmt::Debug for NdjsonDecoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NdjsonDecoder")
            .field("buffered", &self.buffer.len())
            .field("on_skip", &self.on_skip.is_some())
            .finish()
    }
}

/// Decode a complete body in one go
pub fn decode_all(body: impl AsRef<[u8]>) -> Vec<Value> {
    let mut decoder = NdjsonDecoder::new();
    let mut records = decoder.feed(body);
    records.extend(decoder.finish());
    records
}
