//! `get-message` / `list-messages-*` payloads.
//!
//! The `send-message` kind itself carries a generic
//! [`whisper_crypto::dox::EncryptedDoc`] directly (see
//! [`super::Payload::SendMessage`]), used both to send a message and to
//! return one from `get-message`.

use serde::{Deserialize, Serialize};
use whisper_crypto::B64Bytes;

/// Body of a `get-message` envelope.
///
/// Reads from the *authenticated user's own* database — a sender cannot
/// read a message they sent via this kind, only a recipient can read one
/// addressed to them. Intentional: messages are delivered to the
/// recipient's store only, never the sender's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetMessageRequest {
    /// Lex-id of the message to fetch.
    pub id: u64,
}

/// Body of a `list-messages` envelope.
///
/// Like notes, the server always lists up to the 10 most recent messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListMessagesRequest {}

/// One row of a `list-messages-response`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageListItem {
    /// Lex-id of the message.
    pub id: u64,
    /// The message's wrapped content key.
    pub key: B64Bytes,
    /// The message's encrypted sender-nickname field.
    pub from: B64Bytes,
}

/// Body of a `list-messages-response` envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListMessagesResponse(pub Vec<MessageListItem>);
