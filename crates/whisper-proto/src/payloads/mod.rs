//! Known envelope payload kinds.
//!
//! Every payload maps to exactly one `kind` string. We model the set of
//! known payloads as a tagged-union enum with a table of
//! serializer/deserializer pairs keyed by kind, rather than runtime
//! reflection over struct tags: adding a payload variant here forces a
//! compile error everywhere the match in [`Payload::kind`] or
//! [`Payload::from_kind_and_body`] is not updated to cover it.
//!
//! # Invariants
//!
//! - Kind uniqueness: each [`Payload`] variant corresponds to exactly one
//!   kind string, enforced by exhaustive `match`.
//! - Round-trip: `Payload::from_kind_and_body(p.kind(), p.to_body())` must
//!   reconstruct a value structurally equal to `p`, for every registered
//!   kind.

pub mod auth;
pub mod directory;
pub mod message;
pub mod note;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProtocolError;

pub use auth::AuthRequest;
pub use directory::{KeyRequest, KeyResponse};
pub use message::{
    GetMessageRequest, ListMessagesRequest, ListMessagesResponse, MessageListItem,
};
pub use note::{GetNoteRequest, ListNotesRequest, ListNotesResponse, NoteListItem};
use whisper_crypto::dox::EncryptedDoc;

/// An error reported to a peer, correlated to the request that caused it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human-readable description of what went wrong.
    pub message: String,
}

impl ErrorBody {
    /// Build an error body from any displayable error value.
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// Every payload schema known to whisper, tagged by its wire `kind` string.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// `auth` — present a nickname and public key.
    Auth(AuthRequest),
    /// `bool` — a plain boolean result (e.g. successful auth).
    Bool(bool),
    /// `error` — an operation failed.
    Error(ErrorBody),
    /// `key` — look up a nickname's public key.
    KeyRequest(KeyRequest),
    /// `key-response` — a nickname's public key.
    KeyResponse(KeyResponse),
    /// `note` — a field-wise encrypted note, used both to store one and to
    /// return one from `get-note`.
    Note(EncryptedDoc),
    /// `get-note` — fetch one note by id.
    GetNote(GetNoteRequest),
    /// `list-notes-request` — list the caller's own notes.
    ListNotesRequest(ListNotesRequest),
    /// `list-notes-response` — projection of notes for listing.
    ListNotesResponse(ListNotesResponse),
    /// `send-message` — a field-wise encrypted message, used both to send
    /// one and to return one from `get-message`.
    SendMessage(EncryptedDoc),
    /// `get-message` — fetch one message by id from the caller's own db.
    GetMessage(GetMessageRequest),
    /// `list-messages` — list the caller's own received messages.
    ListMessages(ListMessagesRequest),
    /// `list-messages-response` — projection of messages for listing.
    ListMessagesResponse(ListMessagesResponse),
}

impl Payload {
    /// The wire `kind` string for this payload.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Auth(_) => "auth",
            Self::Bool(_) => "bool",
            Self::Error(_) => "error",
            Self::KeyRequest(_) => "key",
            Self::KeyResponse(_) => "key-response",
            Self::Note(_) => "note",
            Self::GetNote(_) => "get-note",
            Self::ListNotesRequest(_) => "list-notes-request",
            Self::ListNotesResponse(_) => "list-notes-response",
            Self::SendMessage(_) => "send-message",
            Self::GetMessage(_) => "get-message",
            Self::ListMessages(_) => "list-messages",
            Self::ListMessagesResponse(_) => "list-messages-response",
        }
    }

    /// Serialize the payload's body (everything but the kind tag) to JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Json`] if the inner value fails to
    /// serialize, which should not happen for any of the payloads defined
    /// in this module.
    pub fn to_body(&self) -> Result<Value, ProtocolError> {
        let value = match self {
            Self::Auth(v) => serde_json::to_value(v),
            Self::Bool(v) => serde_json::to_value(v),
            Self::Error(v) => serde_json::to_value(v),
            Self::KeyRequest(v) => serde_json::to_value(v),
            Self::KeyResponse(v) => serde_json::to_value(v),
            Self::Note(v) | Self::SendMessage(v) => serde_json::to_value(v),
            Self::GetNote(v) => serde_json::to_value(v),
            Self::ListNotesRequest(v) => serde_json::to_value(v),
            Self::ListNotesResponse(v) => serde_json::to_value(v),
            Self::GetMessage(v) => serde_json::to_value(v),
            Self::ListMessages(v) => serde_json::to_value(v),
            Self::ListMessagesResponse(v) => serde_json::to_value(v),
        }?;
        Ok(value)
    }

    /// Reconstruct a payload from its `kind` tag and JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::UnknownKind`] if `kind` is not one of the
    /// known wire kinds, or [`ProtocolError::Json`] if `body` does not match
    /// the schema for `kind`.
    pub fn from_kind_and_body(kind: &str, body: Value) -> Result<Self, ProtocolError> {
        Ok(match kind {
            "auth" => Self::Auth(serde_json::from_value(body)?),
            "bool" => Self::Bool(serde_json::from_value(body)?),
            "error" => Self::Error(serde_json::from_value(body)?),
            "key" => Self::KeyRequest(serde_json::from_value(body)?),
            "key-response" => Self::KeyResponse(serde_json::from_value(body)?),
            "note" => Self::Note(serde_json::from_value(body)?),
            "get-note" => Self::GetNote(serde_json::from_value(body)?),
            "list-notes-request" => Self::ListNotesRequest(serde_json::from_value(body)?),
            "list-notes-response" => Self::ListNotesResponse(serde_json::from_value(body)?),
            "send-message" => Self::SendMessage(serde_json::from_value(body)?),
            "get-message" => Self::GetMessage(serde_json::from_value(body)?),
            "list-messages" => Self::ListMessages(serde_json::from_value(body)?),
            "list-messages-response" => Self::ListMessagesResponse(serde_json::from_value(body)?),
            other => return Err(ProtocolError::UnknownKind(other.to_string())),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use whisper_crypto::{B64Bytes, PublicKeyInfo};

    use super::*;

    #[test]
    fn bool_round_trips() {
        let p = Payload::Bool(true);
        let body = p.to_body().unwrap();
        let back = Payload::from_kind_and_body(p.kind(), body).unwrap();
        assert_eq!(p, back);
    }

    #[test]
    fn unknown_kind_errors() {
        let err = Payload::from_kind_and_body("nonsense", Value::Null).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownKind(k) if k == "nonsense"));
    }

    #[test]
    fn every_registered_kind_round_trips() {
        let key_info = PublicKeyInfo { n: "123".to_string(), e: "65537".to_string() };
        let doc = EncryptedDoc {
            key: B64Bytes(vec![1, 2, 3]),
            fields: BTreeMap::from([("to".to_string(), Value::String("bob".to_string()))]),
            blob: Some(B64Bytes(vec![4, 5, 6])),
        };

        let samples = vec![
            Payload::Auth(AuthRequest { nick: "alice".to_string(), key: key_info.clone() }),
            Payload::Bool(true),
            Payload::Error(ErrorBody::new("nope")),
            Payload::KeyRequest(KeyRequest { nick: "bob".to_string() }),
            Payload::KeyResponse(KeyResponse { nick: "bob".to_string(), key: key_info }),
            Payload::Note(doc.clone()),
            Payload::GetNote(GetNoteRequest { id: 7 }),
            Payload::ListNotesRequest(ListNotesRequest {}),
            Payload::ListNotesResponse(ListNotesResponse(vec![NoteListItem {
                id: 1,
                key: B64Bytes(vec![9]),
                title: B64Bytes(vec![8]),
            }])),
            Payload::SendMessage(doc),
            Payload::GetMessage(GetMessageRequest { id: 3 }),
            Payload::ListMessages(ListMessagesRequest {}),
            Payload::ListMessagesResponse(ListMessagesResponse(vec![MessageListItem {
                id: 2,
                key: B64Bytes(vec![7]),
                from: B64Bytes(vec![6]),
            }])),
        ];

        // Catches a registered variant silently missing from this table.
        assert_eq!(samples.len(), 13);

        for payload in samples {
            let kind = payload.kind();
            let body = payload.to_body().unwrap();
            let back = Payload::from_kind_and_body(kind, body).unwrap();
            assert_eq!(payload, back, "round trip failed for kind {kind}");
        }
    }
}
