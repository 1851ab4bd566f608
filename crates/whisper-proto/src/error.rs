//! Protocol-level errors: framing and kind dispatch.

use thiserror::Error;

/// Errors from encoding, decoding, or dispatching envelopes.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The connection was closed (or failed) before a full envelope could
    /// be read.
    #[error("connection closed while reading envelope")]
    Eof,

    /// Underlying I/O failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The byte stream did not contain a well-formed JSON object.
    #[error("malformed envelope: {0}")]
    Json(#[from] serde_json::Error),

    /// An envelope's `kind` tag is not one of the registered kinds.
    #[error("unknown envelope kind: {0:?}")]
    UnknownKind(String),
}

impl ProtocolError {
    /// Errors worth reporting to a peer as an `error` envelope rather than
    /// tearing down the connection.
    #[must_use]
    pub const fn is_peer_reportable(&self) -> bool {
        matches!(self, Self::UnknownKind(_) | Self::Json(_))
    }
}
