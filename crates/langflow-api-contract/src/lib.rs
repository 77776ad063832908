//! Langflow REST API contract types
//!
//! This crate defines the request and response shapes exchanged with a
//! Langflow server. They are shared between the HTTP client and the scripted
//! test transport so both sides agree on the wire format.

pub mod error;
pub mod types;

pub use error::*;
pub use types::*;
