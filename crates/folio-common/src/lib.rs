#![cfg_attr(not(test), deny(unsafe_code))]
#![warn(
    clippy::pedantic,
    clippy::unwrap_used,
    clippy::missing_docs_in_private_items
)]

//! Transport-neutral pieces of the folio relay clients
//!
//! The chat relay answers with newline-delimited `data: <json>` records; this
//! crate owns the incremental decoder for that stream, the wire types of the
//! request body, and the HTTP request plumbing shared by every relay call.

pub mod chat_format;
pub mod error;
pub mod request_builder;
pub mod streaming;

pub use chat_format::{ChatMessage, Role};
pub use error::CommonRequestError;
pub use request_builder::{AuthMethod, Endpoint, RequestBuilder, RequestConfig};
pub use streaming::{ChunkDecoder, DecoderState, Record, decode_deltas};

/// Re-export common types for convenience
pub use futures_util::stream::BoxStream;
pub use serde::{Deserialize, Serialize};
