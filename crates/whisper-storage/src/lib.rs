//! Per-user ordered key-value storage for whisper.
//!
//! Every user nickname gets its own ordered KV namespace
//! ([`userdb::UserDb`]), opened lazily and cached for the life of the
//! process ([`userdb::UserDbCache`]). Notes and messages are appended under
//! `notes/` and `messages/` prefixes with ids assigned by
//! [`lexid::encode`], which guarantees that a plain byte-lexicographic
//! range scan visits them in numeric order.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod error;
pub mod lexid;
pub mod userdb;

pub use error::StorageError;
pub use userdb::{MESSAGES_PREFIX, NOTES_PREFIX, PUBLIC_KEY_KEY, UserDb, UserDbCache};
