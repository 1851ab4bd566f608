//! Envelope framing and payload schemas for the whisper wire protocol.
//!
//! A whisper connection exchanges [`envelope::Envelope`]s: each carries a
//! request id chosen by the requester, a `kind` tag, and a JSON body. The
//! [`payloads`] module defines every registered kind; [`envelope`] carries
//! them over an async byte stream with no length prefix, matching the
//! original Go server's `encoding/json` stream framing.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod envelope;
pub mod error;
pub mod payloads;

pub use envelope::{Envelope, EnvelopeReader};
pub use error::ProtocolError;
pub use payloads::{ErrorBody, Payload};
