//! Client-side error types.

use thiserror::Error;
use whisper_crypto::CryptoError;
use whisper_proto::ProtocolError;

/// Errors from driving a whisper connection or its typed operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Underlying socket failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Envelope framing or dispatch failure.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Key-wrap, symmetric, or field-encryption failure.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// The connection closed (or the reader gave up) before a response to
    /// this request arrived, rather than leaving the waiter to stall
    /// forever.
    #[error("connection closed before a response arrived")]
    ConnectionClosed,

    /// The server reported a request-scoped failure via an `error` envelope.
    #[error("server error: {0}")]
    Server(String),

    /// The server answered with a payload kind the caller did not expect.
    #[error("unexpected response kind: {0}")]
    UnexpectedResponse(String),

    /// A decrypted field was expected to be UTF-8 text and was not.
    #[error("response field was not valid utf-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
}
