//! CLI-level error type: wraps every lower-layer error so `main` has one
//! place to print a message and pick an exit code.

use thiserror::Error;
use whisper_client::ClientError;
use whisper_crypto::CryptoError;
use whisper_proto::ProtocolError;
use whisper_server::ServerError;

/// Errors surfaced by the `whisper` binary.
#[derive(Debug, Error)]
pub enum CliError {
    /// Filesystem or socket failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A key file or wire payload was not valid JSON.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Base64 decoding of a ciphertext argument failed.
    #[error("base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Key generation, wrapping, or symmetric encryption failed.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Envelope framing error surfaced outside a connection handler.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The client connection or a request on it failed.
    #[error("client error: {0}")]
    Client(#[from] ClientError),

    /// The server failed to bind or run.
    #[error("server error: {0}")]
    Server(#[from] ServerError),

    /// A required flag was missing for the selected subcommand.
    #[error("{0}")]
    MissingFlag(String),

    /// The host:port pair for a server bind could not be resolved.
    #[error("could not resolve {0}")]
    UnresolvedAddress(String),
}
