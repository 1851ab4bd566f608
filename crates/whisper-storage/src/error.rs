//! Error type for the per-user storage layer.

use thiserror::Error;

use crate::lexid::LexIdError;

/// Errors from opening, reading, or writing a per-user database.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The underlying `redb` engine failed to open, read, or write.
    #[error("storage backend error: {0}")]
    Backend(String),

    /// A stored key's lex-id suffix failed to decode.
    #[error("corrupt lex-id in storage key: {0}")]
    CorruptKey(#[from] LexIdError),

    /// `put_public_key` was called with a key that does not match the one
    /// already bound to this nickname.
    #[error("public key does not match the key already bound to this nickname")]
    KeyMismatch,

    /// A point lookup found nothing at the requested key.
    #[error("key not found: {0:?}")]
    NotFound(String),
}
