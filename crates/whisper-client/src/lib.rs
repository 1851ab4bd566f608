//! Whisper client: one TCP connection shared by many concurrent requests.
//!
//! [`multiplexer::Multiplexer`] is the request-multiplexing core: request
//! ids are allocated monotonically, a background task demultiplexes
//! responses, and outstanding requests are failed rather than stalled when
//! the connection closes. [`Client`] layers
//! the typed, encrypting/decrypting operations (`notes/*`, `msg/*`,
//! `keys/get`) on top, for an interactive shell or any other caller.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod client;
pub mod error;
pub mod multiplexer;
pub mod transport;

pub use client::{Client, MessageSummary, NoteSummary};
pub use error::ClientError;
pub use multiplexer::Multiplexer;
