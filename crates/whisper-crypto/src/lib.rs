//! Hybrid cryptography for whisper.
//!
//! Every stored object (note, message, or generic field-wise document) is
//! protected by a fresh symmetric content key. The content key is wrapped
//! for a recipient's RSA public key (PKCS#1 v1.5) and never reused across
//! objects. Bulk data is AES-128-CBC encrypted under the content key.
//!
//! # Pipeline
//!
//! ```text
//! record -> [dox::encrypt_document] -> EncryptedDoc { key, fields, blob }
//!              |                              |
//!              | wrap_key (RSA, recipient pk)  | sym_encrypt (AES-CBC)
//!              v                              v
//!        content key ciphertext        per-field / blob ciphertext
//! ```
//!
//! # Security
//!
//! - No forward secrecy: a compromised private key recovers every content key
//!   it ever wrapped. See the top-level design notes for why this is an
//!   accepted trade-off here.
//! - No authenticated encryption: AES-CBC alone does not detect tampering.
//!   Callers that need tamper-evidence must layer it on top (see
//!   [`symmetric`] module docs).
//! - Padding: every encrypted field uses sentinel-byte padding
//!   ([`symmetric::sentinel_pad`]), never the lossy space-only padding of
//!   older implementations of this protocol.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod bytes;
pub mod dox;
pub mod error;
pub mod keys;
pub mod keywrap;
pub mod symmetric;

pub use bytes::B64Bytes;
pub use error::CryptoError;
pub use keys::{KeyFile, PublicKeyInfo, generate_keypair};
pub use symmetric::{CONTENT_KEY_LEN, ContentKey};
