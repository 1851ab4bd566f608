//! Base64-as-a-JSON-string wrapper for raw byte fields.
//!
//! The wire format is JSON; representing ciphertext as a native byte array
//! would serialize every byte as a separate JSON number. Wrapping in
//! [`B64Bytes`] gets the compact, conventional base64-string representation
//! instead, analogous to how Go's `encoding/json` treats `[]byte`.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A byte sequence that (de)serializes as a base64 string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct B64Bytes(pub Vec<u8>);

impl From<Vec<u8>> for B64Bytes {
    fn from(value: Vec<u8>) -> Self {
        Self(value)
    }
}

impl From<B64Bytes> for Vec<u8> {
    fn from(value: B64Bytes) -> Self {
        value.0
    }
}

impl AsRef<[u8]> for B64Bytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl std::ops::Deref for B64Bytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl Serialize for B64Bytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for B64Bytes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(&s).map(B64Bytes).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let original = B64Bytes(vec![0, 1, 2, 250, 255]);
        let json = serde_json::to_string(&original).unwrap();
        assert!(json.starts_with('"') && json.ends_with('"'));
        let decoded: B64Bytes = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, original);
    }
}
