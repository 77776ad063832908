//! Client library for the Langflow flow-execution service
//!
//! Runs flows, streams their incremental output, manages uploaded files and
//! tails server logs. Calls go through [`LangflowClient::request`] (one parsed
//! JSON body) or [`LangflowClient::stream`] (a lazy sequence of NDJSON
//! records); both accept a per-call cancellation token and fail with a
//! [`LangflowError`].

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod files;
pub mod flow;
pub mod logs;
pub mod ndjson;
pub mod request;
pub mod stream;
pub mod transport;

pub use auth::*;
pub use client::*;
pub use config::*;
pub use error::*;
pub use files::*;
pub use flow::*;
pub use logs::*;
pub use ndjson::{NdjsonDecoder, SkipHook, SkippedLine};
pub use request::*;
pub use stream::*;
pub use transport::*;

pub use langflow_api_contract as contract;
pub use langflow_api_contract::{
    FlowFileUpload, FlowResponse, InputType, Log, LogQuery, OutputType, StreamEvent,
    StreamEventKind, UserFile,
};
pub use reqwest::{header, Method, StatusCode};
pub use tokio_util::sync::CancellationToken;
