//! `key` / `key-response` payloads: directory lookup of a nickname's public
//! key.

use serde::{Deserialize, Serialize};
use whisper_crypto::PublicKeyInfo;

/// Body of a `key` envelope: look up a nickname's public key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRequest {
    /// Nickname to look up.
    pub nick: String,
}

/// Body of a `key-response` envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyResponse {
    /// The nickname that was looked up.
    pub nick: String,
    /// That nickname's bound public key.
    pub key: PublicKeyInfo,
}
