//! Per-connection state machine and dispatch table.
//!
//! Every connection starts **unauthenticated** and only accepts `auth`
//! envelopes; once authenticated it serves the dispatch table below.
//! Dispatch is strictly serial within one connection — the
//! handler loop reads one envelope, fully resolves its response, writes the
//! response, then reads the next. This preserves the authenticated-state
//! invariant without any extra locking per connection.

use std::sync::Arc;

use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, instrument, warn};
use whisper_crypto::B64Bytes;
use whisper_crypto::dox::EncryptedDoc;
use whisper_proto::payloads::{
    GetMessageRequest, GetNoteRequest, KeyResponse, ListMessagesResponse,
    ListNotesResponse, MessageListItem, NoteListItem,
};
use whisper_proto::{ErrorBody, EnvelopeReader, Payload, ProtocolError, envelope};
use whisper_storage::{MESSAGES_PREFIX, NOTES_PREFIX, StorageError, UserDb, UserDbCache};

use crate::error::ServerError;

/// Number of failed authentication attempts a connection tolerates before
/// it is closed, bounding the damage of a client hammering the auth handler.
const MAX_AUTH_FAILURES: u32 = 3;

/// Fixed number of entries returned by the listing kinds; not
/// client-configurable.
const LIST_LIMIT: i64 = 10;

enum ConnectionState {
    Unauthenticated { failures: u32 },
    Authenticated { nick: String, db: UserDb },
}

/// Drive one connection to completion: read envelopes, dispatch, respond,
/// until EOF or an unrecoverable I/O/protocol failure.
#[instrument(skip(stream, cache))]
pub async fn handle_connection<S>(stream: S, cache: Arc<UserDbCache>) -> Result<(), ServerError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (read_half, mut write_half) = tokio::io::split(stream);
    let mut reader = EnvelopeReader::new(read_half);
    let mut state = ConnectionState::Unauthenticated { failures: 0 };

    loop {
        let incoming = match reader.read_envelope().await {
            Ok(envelope) => envelope,
            Err(ProtocolError::Eof) => {
                debug!("connection closed by peer");
                return Ok(());
            },
            Err(e) => return Err(e.into()),
        };
        let id = incoming.id;

        let payload = match incoming.open() {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "malformed envelope");
                envelope::write(&mut write_half, id, &Payload::Error(ErrorBody::new(e.to_string())))
                    .await?;
                continue;
            },
        };

        let (next_state, response) = dispatch(state, payload, &cache);
        state = next_state;
        envelope::write(&mut write_half, id, &response).await?;

        if let ConnectionState::Unauthenticated { failures } = &state {
            if *failures >= MAX_AUTH_FAILURES {
                warn!("closing connection after repeated authentication failures");
                return Ok(());
            }
        }
    }
}

fn dispatch(
    state: ConnectionState,
    payload: Payload,
    cache: &UserDbCache,
) -> (ConnectionState, Payload) {
    match state {
        ConnectionState::Unauthenticated { failures } => match payload {
            Payload::Auth(req) => handle_auth(req.nick, req.key, failures, cache),
            _ => (
                ConnectionState::Unauthenticated { failures },
                Payload::Error(ErrorBody::new("connection is not authenticated")),
            ),
        },
        ConnectionState::Authenticated { nick, db } => {
            let response = handle_authenticated(&nick, &db, payload, cache);
            (ConnectionState::Authenticated { nick, db }, response)
        },
    }
}

fn handle_auth(
    nick: String,
    key: whisper_crypto::PublicKeyInfo,
    failures: u32,
    cache: &UserDbCache,
) -> (ConnectionState, Payload) {
    if nick.is_empty() || key.n.is_empty() || key.e.is_empty() {
        return (
            ConnectionState::Unauthenticated { failures: failures + 1 },
            Payload::Error(ErrorBody::new("nickname and key must not be empty")),
        );
    }

    let db = match cache.open(&nick) {
        Ok(db) => db,
        Err(e) => {
            return (
                ConnectionState::Unauthenticated { failures: failures + 1 },
                Payload::Error(ErrorBody::new(e.to_string())),
            );
        },
    };

    let key_bytes = match serde_json::to_vec(&key) {
        Ok(bytes) => bytes,
        Err(e) => {
            return (
                ConnectionState::Unauthenticated { failures: failures + 1 },
                Payload::Error(ErrorBody::new(e.to_string())),
            );
        },
    };

    match db.put_public_key(&key_bytes) {
        Ok(()) => {
            info!(%nick, "authenticated");
            (ConnectionState::Authenticated { nick, db }, Payload::Bool(true))
        },
        Err(StorageError::KeyMismatch) => (
            ConnectionState::Unauthenticated { failures: failures + 1 },
            Payload::Error(ErrorBody::new("public key does not match the key on file")),
        ),
        Err(e) => (
            ConnectionState::Unauthenticated { failures: failures + 1 },
            Payload::Error(ErrorBody::new(e.to_string())),
        ),
    }
}

fn handle_authenticated(nick: &str, db: &UserDb, payload: Payload, cache: &UserDbCache) -> Payload {
    match payload {
        Payload::Note(doc) => store_note(db, &doc),
        Payload::GetNote(req) => get_note(db, req),
        Payload::ListNotesRequest(_) => list_notes(db),
        Payload::KeyRequest(req) => lookup_key(cache, &req.nick),
        Payload::SendMessage(doc) => send_message(cache, &doc),
        Payload::GetMessage(req) => get_message(db, req),
        Payload::ListMessages(_) => list_messages(db),
        Payload::Auth(req) => {
            // Re-authenticating on an already-authenticated connection is
            // harmless as long as it's the same nickname's key; treat it
            // like the initial handshake.
            if req.nick == nick {
                match handle_auth(req.nick, req.key, 0, cache).1 {
                    response @ (Payload::Bool(_) | Payload::Error(_)) => response,
                    other => other,
                }
            } else {
                Payload::Error(ErrorBody::new("connection is already authenticated as a different nickname"))
            }
        },
        _ => Payload::Error(ErrorBody::new("unsupported request for an authenticated connection")),
    }
}

fn store_note(db: &UserDb, doc: &EncryptedDoc) -> Payload {
    match serde_json::to_vec(doc) {
        Ok(bytes) => match db.append(NOTES_PREFIX, &bytes) {
            Ok(_id) => Payload::Bool(true),
            Err(e) => Payload::Error(ErrorBody::new(e.to_string())),
        },
        Err(e) => Payload::Error(ErrorBody::new(e.to_string())),
    }
}

fn get_note(db: &UserDb, req: GetNoteRequest) -> Payload {
    let key = format!("{NOTES_PREFIX}{}", whisper_storage::lexid::encode(req.id));
    match db.get(&key) {
        Ok(Some(bytes)) => match serde_json::from_slice::<EncryptedDoc>(&bytes) {
            Ok(doc) => Payload::Note(doc),
            Err(e) => Payload::Error(ErrorBody::new(e.to_string())),
        },
        Ok(None) => Payload::Error(ErrorBody::new(format!("note {} not found", req.id))),
        Err(e) => Payload::Error(ErrorBody::new(e.to_string())),
    }
}

fn list_notes(db: &UserDb) -> Payload {
    let mut items = Vec::new();
    let result = db.collect(NOTES_PREFIX, -LIST_LIMIT, |id, value| {
        let doc: EncryptedDoc =
            serde_json::from_slice(value).map_err(|e| StorageError::Backend(e.to_string()))?;
        let title = extract_b64_field(&doc, "title").unwrap_or_else(|| B64Bytes(Vec::new()));
        items.push(NoteListItem { id, key: doc.key, title });
        Ok(())
    });
    match result {
        Ok(()) => Payload::ListNotesResponse(ListNotesResponse(items)),
        Err(e) => Payload::Error(ErrorBody::new(e.to_string())),
    }
}

fn lookup_key(cache: &UserDbCache, nick: &str) -> Payload {
    let db = match cache.open(nick) {
        Ok(db) => db,
        Err(e) => return Payload::Error(ErrorBody::new(e.to_string())),
    };
    match db.get_public_key() {
        Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
            Ok(key) => Payload::KeyResponse(KeyResponse { nick: nick.to_string(), key }),
            Err(e) => Payload::Error(ErrorBody::new(e.to_string())),
        },
        Ok(None) => Payload::Error(ErrorBody::new(format!("no key on file for {nick}"))),
        Err(e) => Payload::Error(ErrorBody::new(e.to_string())),
    }
}

fn send_message(cache: &UserDbCache, doc: &EncryptedDoc) -> Payload {
    let Some(Value::String(to)) = doc.fields.get("to") else {
        return Payload::Error(ErrorBody::new("send-message is missing a plaintext `to` field"));
    };

    let recipient_db = match cache.open(to) {
        Ok(db) => db,
        Err(e) => return Payload::Error(ErrorBody::new(e.to_string())),
    };

    // The recipient must already exist (have authenticated at least once);
    // we key that off whether a public key is on file.
    match recipient_db.get_public_key() {
        Ok(None) => return Payload::Error(ErrorBody::new(format!("unknown recipient {to}"))),
        Err(e) => return Payload::Error(ErrorBody::new(e.to_string())),
        Ok(Some(_)) => {},
    }

    match serde_json::to_vec(doc) {
        Ok(bytes) => match recipient_db.append(MESSAGES_PREFIX, &bytes) {
            Ok(_id) => Payload::Bool(true),
            Err(e) => Payload::Error(ErrorBody::new(e.to_string())),
        },
        Err(e) => Payload::Error(ErrorBody::new(e.to_string())),
    }
}

fn get_message(db: &UserDb, req: GetMessageRequest) -> Payload {
    let key = format!("{MESSAGES_PREFIX}{}", whisper_storage::lexid::encode(req.id));
    match db.get(&key) {
        Ok(Some(bytes)) => match serde_json::from_slice::<EncryptedDoc>(&bytes) {
            Ok(doc) => Payload::SendMessage(doc),
            Err(e) => Payload::Error(ErrorBody::new(e.to_string())),
        },
        Ok(None) => Payload::Error(ErrorBody::new(format!("message {} not found", req.id))),
        Err(e) => Payload::Error(ErrorBody::new(e.to_string())),
    }
}

fn list_messages(db: &UserDb) -> Payload {
    let mut items = Vec::new();
    let result = db.collect(MESSAGES_PREFIX, -LIST_LIMIT, |id, value| {
        let doc: EncryptedDoc =
            serde_json::from_slice(value).map_err(|e| StorageError::Backend(e.to_string()))?;
        let from = extract_b64_field(&doc, "from").unwrap_or_else(|| B64Bytes(Vec::new()));
        items.push(MessageListItem { id, key: doc.key, from });
        Ok(())
    });
    match result {
        Ok(()) => Payload::ListMessagesResponse(ListMessagesResponse(items)),
        Err(e) => Payload::Error(ErrorBody::new(e.to_string())),
    }
}

fn extract_b64_field(doc: &EncryptedDoc, name: &str) -> Option<B64Bytes> {
    doc.fields.get(name).and_then(|v| serde_json::from_value(v.clone()).ok())
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;
    use whisper_crypto::keys::generate_keypair;
    use whisper_crypto::{PublicKeyInfo, dox};
    use whisper_proto::payloads::ListNotesRequest;

    use super::*;

    fn auth_payload(nick: &str, key: &PublicKeyInfo) -> Payload {
        Payload::Auth(whisper_proto::payloads::AuthRequest { nick: nick.to_string(), key: key.clone() })
    }

    #[test]
    fn first_auth_persists_key_and_succeeds() {
        let dir = tempdir().unwrap();
        let cache = UserDbCache::new(dir.path());
        let private = generate_keypair(512).unwrap();
        let key: PublicKeyInfo = (&private.to_public_key()).into();

        let state = ConnectionState::Unauthenticated { failures: 0 };
        let (state, response) = dispatch(state, auth_payload("alice", &key), &cache);
        assert_eq!(response, Payload::Bool(true));
        assert!(matches!(state, ConnectionState::Authenticated { .. }));
    }

    #[test]
    fn mismatched_key_reauth_is_rejected_and_counted() {
        let dir = tempdir().unwrap();
        let cache = UserDbCache::new(dir.path());
        let key_a: PublicKeyInfo = (&generate_keypair(512).unwrap().to_public_key()).into();
        let key_b: PublicKeyInfo = (&generate_keypair(512).unwrap().to_public_key()).into();

        let state = ConnectionState::Unauthenticated { failures: 0 };
        let (state, _) = dispatch(state, auth_payload("alice", &key_a), &cache);
        assert!(matches!(state, ConnectionState::Authenticated { .. }));

        // A fresh connection re-authenticating with a different key.
        let state = ConnectionState::Unauthenticated { failures: 0 };
        let (state, response) = dispatch(state, auth_payload("alice", &key_b), &cache);
        assert!(matches!(response, Payload::Error(_)));
        assert!(matches!(state, ConnectionState::Unauthenticated { failures: 1 }));
    }

    #[test]
    fn note_store_then_list_then_get() {
        let dir = tempdir().unwrap();
        let cache = UserDbCache::new(dir.path());
        let private = generate_keypair(512).unwrap();
        let public = private.to_public_key();
        let key: PublicKeyInfo = (&public).into();

        let state = ConnectionState::Unauthenticated { failures: 0 };
        let (state, _) = dispatch(state, auth_payload("alice", &key), &cache);

        let fields = vec![dox::Field::new(
            "title",
            dox::FieldTag::Aes,
            dox::FieldValue::Text("Groceries".to_string()),
        )];
        let doc = dox::encrypt_document(&public, &fields).unwrap();

        let (state, response) = dispatch(state, Payload::Note(doc), &cache);
        assert_eq!(response, Payload::Bool(true));

        let (state, response) =
            dispatch(state, Payload::ListNotesRequest(ListNotesRequest {}), &cache);
        let Payload::ListNotesResponse(ListNotesResponse(items)) = response else {
            panic!("expected list-notes-response");
        };
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, 0);

        let (_, response) = dispatch(state, Payload::GetNote(GetNoteRequest { id: 0 }), &cache);
        assert!(matches!(response, Payload::Note(_)));
    }

    #[test]
    fn unauthenticated_connection_rejects_non_auth_kinds() {
        let dir = tempdir().unwrap();
        let cache = UserDbCache::new(dir.path());
        let state = ConnectionState::Unauthenticated { failures: 0 };
        let (_, response) =
            dispatch(state, Payload::ListNotesRequest(ListNotesRequest {}), &cache);
        assert!(matches!(response, Payload::Error(_)));
    }
}
