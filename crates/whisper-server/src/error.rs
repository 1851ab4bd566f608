//! Server error types.

use thiserror::Error;
use whisper_proto::ProtocolError;
use whisper_storage::StorageError;

/// Errors that can tear down a connection or the listener itself.
///
/// Per-request failures (bad crypto, not-found, key mismatch) are reported
/// to the peer as an `error` envelope and never surface here; this type is
/// reserved for failures that make it impossible to keep serving the
/// connection at all.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Listener bind or accept failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Envelope framing failure that isn't recoverable by replying with an
    /// `error` envelope (an I/O failure surfaced through the protocol
    /// layer, for instance).
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The per-user storage layer failed in a way that isn't scoped to one
    /// request (e.g. the database file itself could not be opened).
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}
