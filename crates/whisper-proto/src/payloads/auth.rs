//! `auth` payload: present a nickname and public key.

use serde::{Deserialize, Serialize};
use whisper_crypto::PublicKeyInfo;

/// Body of an `auth` envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthRequest {
    /// Nickname to authenticate as.
    pub nick: String,
    /// Public key bound to this nickname.
    ///
    /// On first auth for a nickname, this key is persisted. On every later
    /// auth for the same nickname, it must match the stored key's modulus
    /// and exponent.
    pub key: PublicKeyInfo,
}
