//! Client for the portfolio site's hosted functions
//!
//! This crate talks to two relays:
//! - the chat relay, which streams an assistant reply as `data: <json>` lines
//! - the contact-form relay, which validates and acknowledges a message
//!
//! # Example
//!
//! ```rust,no_run
//! use folio_relay::{ChatSession, FolioRelay};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let relay = FolioRelay::from_env()?;
//!     let mut session = ChatSession::new(relay);
//!
//!     session
//!         .send("What are you building lately?", |messages| {
//!             if let Some(last) = messages.last() {
//!                 println!("{}: {}", last.role, last.content);
//!             }
//!         })
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod contact;
pub mod error;
mod internal;
pub mod message;
pub mod session;
pub mod transcript;

pub use client::FolioRelay;
pub use contact::{ContactAck, ContactForm};
pub use error::RelayError;
pub use message::Message;
pub use session::ChatSession;
pub use transcript::{apply_delta, fold_deltas};

// Re-export shared types from folio-common
pub use folio_common::{ChatMessage, Role};
