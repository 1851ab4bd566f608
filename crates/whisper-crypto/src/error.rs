//! Error types for the crypto layer.

use thiserror::Error;

/// Errors produced by key generation, key-wrap, symmetric encryption, and
/// field-wise document encryption.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// RSA key generation failed.
    #[error("key generation failed: {0}")]
    KeyGen(String),

    /// A key file or wire key could not be parsed into a usable RSA key.
    #[error("invalid key material: {0}")]
    InvalidKey(String),

    /// Wrapping a content key under a recipient's public key failed.
    #[error("key wrap failed: {0}")]
    KeyWrap(String),

    /// Unwrapping a content key under a private key failed.
    #[error("key unwrap failed: {0}")]
    KeyUnwrap(String),

    /// A ciphertext was shorter than one block and could not contain an IV.
    #[error("ciphertext too short to contain an IV")]
    CiphertextTooShort,

    /// Sentinel-padding was not found when unpadding a decrypted plaintext.
    #[error("malformed padding: sentinel byte not found")]
    MalformedPadding,

    /// A field tagged `aes` held a value that was not a string or byte
    /// sequence.
    #[error("field {0:?} has a type that cannot be aes-encrypted")]
    UnsupportedFieldType(String),

    /// A field named by a descriptor was absent from the encrypted document.
    #[error("document is missing field {0:?}")]
    MissingField(String),

    /// A descriptor named a tag the document decoder does not understand.
    #[error("unknown field tag for field {0:?}")]
    UnknownFieldTag(String),

    /// Underlying JSON (de)serialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
