//! `get-note` / `list-notes-*` payloads.
//!
//! The `note` kind itself carries a generic [`whisper_crypto::dox::EncryptedDoc`]
//! directly (see [`super::Payload::Note`]) since notes have no fields beyond
//! what field-wise document encryption already provides.

use serde::{Deserialize, Serialize};
use whisper_crypto::B64Bytes;

/// Body of a `get-note` envelope: fetch one note by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetNoteRequest {
    /// Lex-id of the note to fetch, as assigned at store time.
    pub id: u64,
}

/// Body of a `list-notes-request` envelope.
///
/// Always returns up to the 10 most recent notes; this is a fixed
/// server-side limit rather than a client-supplied count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListNotesRequest {}

/// One row of a `list-notes-response`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteListItem {
    /// Lex-id of the note.
    pub id: u64,
    /// The note's wrapped content key, so the client can decrypt without a
    /// second round trip.
    pub key: B64Bytes,
    /// The note's encrypted title field.
    pub title: B64Bytes,
}

/// Body of a `list-notes-response` envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListNotesResponse(pub Vec<NoteListItem>);
