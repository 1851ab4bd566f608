//! Typed, authenticated operations over a [`Multiplexer`] connection.
//!
//! This is the layer an interactive shell or any other caller builds on:
//! it owns the session's private key and nickname, encrypts/decrypts
//! locally, and never lets unencrypted note or message bodies leave the
//! process.

use rsa::RsaPrivateKey;
use tokio::net::tcp::OwnedWriteHalf;
use whisper_crypto::dox::{self, Field, FieldTag, FieldValue};
use whisper_crypto::keywrap::unwrap_key;
use whisper_crypto::symmetric::sym_decrypt;
use whisper_crypto::{B64Bytes, PublicKeyInfo};
use whisper_proto::payloads::{
    AuthRequest, GetMessageRequest, GetNoteRequest, KeyRequest, ListMessagesRequest,
    ListNotesRequest,
};
use whisper_proto::{ErrorBody, Payload};

use crate::error::ClientError;
use crate::multiplexer::Multiplexer;
use crate::transport;

/// One row of a decrypted note listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteSummary {
    /// Lex-id assigned by the server.
    pub id: u64,
    /// Decrypted title.
    pub title: String,
}

/// One row of a decrypted message listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageSummary {
    /// Lex-id assigned by the server (within the recipient's own database).
    pub id: u64,
    /// Decrypted sender nickname.
    pub from: String,
}

/// An authenticated whisper connection.
pub struct Client {
    multiplexer: Multiplexer<OwnedWriteHalf>,
    private_key: RsaPrivateKey,
    nick: String,
}

impl Client {
    /// Connect to `host:port` and authenticate as `nick` with `private_key`.
    ///
    /// On first use of a nickname the server binds `private_key`'s public
    /// half permanently; on later connections the same key must be
    /// presented or authentication fails.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Io`] on a connection failure, or
    /// [`ClientError::Server`] if the server rejects the key.
    pub async fn connect(
        host: &str,
        port: u16,
        nick: impl Into<String>,
        private_key: RsaPrivateKey,
    ) -> Result<Self, ClientError> {
        let nick = nick.into();
        let stream = transport::connect(host, port).await?;
        let (read_half, write_half) = stream.into_split();
        let multiplexer = Multiplexer::spawn(read_half, write_half);

        let public_key: PublicKeyInfo = (&private_key.to_public_key()).into();
        let request = Payload::Auth(AuthRequest { nick: nick.clone(), key: public_key });
        match multiplexer.request(request).await? {
            Payload::Bool(true) => Ok(Self { multiplexer, private_key, nick }),
            Payload::Error(ErrorBody { message }) => Err(ClientError::Server(message)),
            other => Err(ClientError::UnexpectedResponse(other.kind().to_string())),
        }
    }

    /// This connection's authenticated nickname.
    #[must_use]
    pub fn nick(&self) -> &str {
        &self.nick
    }

    /// Store a new note with `title` and `body`, both individually
    /// AES-encrypted under a fresh content key wrapped for this user's own
    /// public key (notes are self-addressed).
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Crypto`] on an encryption failure, or
    /// [`ClientError::Server`] if the server rejects the request.
    pub async fn create_note(&self, title: &str, body: &str) -> Result<(), ClientError> {
        let public = self.private_key.to_public_key();
        let fields = vec![
            Field::new("title", FieldTag::Aes, FieldValue::Text(title.to_string())),
            Field::new("body", FieldTag::Aes, FieldValue::Text(body.to_string())),
        ];
        let doc = dox::encrypt_document(&public, &fields)?;
        self.expect_bool(Payload::Note(doc)).await
    }

    /// Fetch and decrypt one note by id.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Server`] if the note does not exist, or
    /// [`ClientError::Crypto`] if it fails to decrypt.
    pub async fn get_note(&self, id: u64) -> Result<(String, String), ClientError> {
        let response = self.multiplexer.request(Payload::GetNote(GetNoteRequest { id })).await?;
        let doc = match response {
            Payload::Note(doc) => doc,
            Payload::Error(ErrorBody { message }) => return Err(ClientError::Server(message)),
            other => return Err(ClientError::UnexpectedResponse(other.kind().to_string())),
        };
        let descriptor = [("title", FieldTag::Aes), ("body", FieldTag::Aes)];
        let fields = dox::decrypt_document(&self.private_key, &doc, &descriptor)?;
        let title = field_text(&fields[0])?;
        let body = field_text(&fields[1])?;
        Ok((title, body))
    }

    /// List up to the 10 most recently created notes, newest first,
    /// decrypting each title.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Crypto`] if a title fails to decrypt.
    pub async fn list_notes(&self) -> Result<Vec<NoteSummary>, ClientError> {
        let response =
            self.multiplexer.request(Payload::ListNotesRequest(ListNotesRequest {})).await?;
        let items = match response {
            Payload::ListNotesResponse(r) => r.0,
            Payload::Error(ErrorBody { message }) => return Err(ClientError::Server(message)),
            other => return Err(ClientError::UnexpectedResponse(other.kind().to_string())),
        };
        items
            .into_iter()
            .map(|item| {
                let title_bytes = decrypt_field(&self.private_key, &item.key, &item.title)?;
                Ok(NoteSummary { id: item.id, title: String::from_utf8(title_bytes)? })
            })
            .collect()
    }

    /// Look up `nick`'s public key via the server's directory.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Server`] if `nick` has never authenticated.
    pub async fn get_key(&self, nick: &str) -> Result<PublicKeyInfo, ClientError> {
        let response =
            self.multiplexer.request(Payload::KeyRequest(KeyRequest { nick: nick.to_string() })).await?;
        match response {
            Payload::KeyResponse(r) => Ok(r.key),
            Payload::Error(ErrorBody { message }) => Err(ClientError::Server(message)),
            other => Err(ClientError::UnexpectedResponse(other.kind().to_string())),
        }
    }

    /// Encrypt and send a message to `to`. The recipient's public key is
    /// looked up first; sending to a nickname that has never authenticated
    /// fails server-side.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Server`] if the recipient is unknown, or
    /// [`ClientError::Crypto`] on an encryption failure.
    pub async fn send_message(&self, to: &str, text: &str) -> Result<(), ClientError> {
        let recipient_key = self.get_key(to).await?;
        let recipient_public = (&recipient_key).try_into()?;
        let fields = vec![
            Field::new("to", FieldTag::Plaintext, FieldValue::Text(to.to_string())),
            Field::new("from", FieldTag::Aes, FieldValue::Text(self.nick.clone())),
            Field::new("text", FieldTag::Aes, FieldValue::Text(text.to_string())),
        ];
        let doc = dox::encrypt_document(&recipient_public, &fields)?;
        self.expect_bool(Payload::SendMessage(doc)).await
    }

    /// Fetch and decrypt one received message by id, from this user's own
    /// database (messages are readable only by their recipient, never by
    /// the sender — preserved intentionally, see [`whisper_proto::payloads::message`]).
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Server`] if the message does not exist.
    pub async fn get_message(&self, id: u64) -> Result<(String, String), ClientError> {
        let response =
            self.multiplexer.request(Payload::GetMessage(GetMessageRequest { id })).await?;
        let doc = match response {
            Payload::SendMessage(doc) => doc,
            Payload::Error(ErrorBody { message }) => return Err(ClientError::Server(message)),
            other => return Err(ClientError::UnexpectedResponse(other.kind().to_string())),
        };
        let descriptor = [("from", FieldTag::Aes), ("text", FieldTag::Aes)];
        let fields = dox::decrypt_document(&self.private_key, &doc, &descriptor)?;
        let from = field_text(&fields[0])?;
        let text = field_text(&fields[1])?;
        Ok((from, text))
    }

    /// List up to the 10 most recently received messages, newest first,
    /// decrypting each sender nickname.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Crypto`] if a sender field fails to decrypt.
    pub async fn list_messages(&self) -> Result<Vec<MessageSummary>, ClientError> {
        let response =
            self.multiplexer.request(Payload::ListMessages(ListMessagesRequest {})).await?;
        let items = match response {
            Payload::ListMessagesResponse(r) => r.0,
            Payload::Error(ErrorBody { message }) => return Err(ClientError::Server(message)),
            other => return Err(ClientError::UnexpectedResponse(other.kind().to_string())),
        };
        items
            .into_iter()
            .map(|item| {
                let from_bytes = decrypt_field(&self.private_key, &item.key, &item.from)?;
                Ok(MessageSummary { id: item.id, from: String::from_utf8(from_bytes)? })
            })
            .collect()
    }

    async fn expect_bool(&self, payload: Payload) -> Result<(), ClientError> {
        match self.multiplexer.request(payload).await? {
            Payload::Bool(true) => Ok(()),
            Payload::Bool(false) => Err(ClientError::Server("request was not accepted".into())),
            Payload::Error(ErrorBody { message }) => Err(ClientError::Server(message)),
            other => Err(ClientError::UnexpectedResponse(other.kind().to_string())),
        }
    }
}

/// Unwrap `wrapped_key` under `private_key` and decrypt `ciphertext` under
/// the recovered content key. Used for listing views, where only a single
/// field's ciphertext is present rather than a full [`dox::EncryptedDoc`].
fn decrypt_field(
    private_key: &RsaPrivateKey,
    wrapped_key: &B64Bytes,
    ciphertext: &B64Bytes,
) -> Result<Vec<u8>, ClientError> {
    let content_key_bytes = unwrap_key(private_key, wrapped_key)?;
    let content_key = whisper_crypto::ContentKey::from_unwrapped(content_key_bytes)?;
    Ok(sym_decrypt(&content_key, ciphertext)?)
}

fn field_text(field: &Field) -> Result<String, ClientError> {
    match &field.value {
        FieldValue::Bytes(bytes) => Ok(String::from_utf8(bytes.clone())?),
        FieldValue::Text(text) => Ok(text.clone()),
        FieldValue::Json(value) => Ok(value.to_string()),
    }
}
