//! Envelope framing: the single on-wire unit carrying a request id, a
//! `kind` tag, and an opaque JSON body.
//!
//! The wire is a stream of concatenated JSON objects with no length prefix
//! (`examples/original_source/request.go` frames the same way, via
//! `json.NewDecoder(conn).Decode(&env)` in a loop). [`EnvelopeReader`]
//! reproduces that incremental-decode behavior over an async byte stream:
//! it buffers bytes as they arrive and repeatedly tries to parse one
//! complete JSON value, asking for more bytes only when the buffered
//! prefix is a valid-so-far-but-incomplete object.

use bytes::{Buf, BytesMut};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::ProtocolError;
use crate::payloads::Payload;

/// The framed unit exchanged in both directions over a whisper connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Request id, chosen by the requester and echoed in the response.
    pub id: u64,
    /// Selects which payload schema `body` should be parsed as.
    pub kind: String,
    /// The payload's serialized body.
    pub body: Value,
}

impl Envelope {
    /// Serialize `payload` and attach its declared kind and `id`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Json`] if `payload` fails to serialize.
    pub fn wrap(id: u64, payload: &Payload) -> Result<Self, ProtocolError> {
        Ok(Self { id, kind: payload.kind().to_string(), body: payload.to_body()? })
    }

    /// Look up `kind` and deserialize `body` into the matching payload.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::UnknownKind`] if `kind` is not registered,
    /// or [`ProtocolError::Json`] if `body` does not match its schema.
    pub fn open(self) -> Result<Payload, ProtocolError> {
        Payload::from_kind_and_body(&self.kind, self.body)
    }
}

/// Serialize `payload` as an envelope with the given `id` and write it to
/// `sink`.
///
/// # Errors
///
/// Returns [`ProtocolError::Json`] on a serialization failure, or
/// [`ProtocolError::Io`] if the write fails.
pub async fn write<W: AsyncWrite + Unpin>(
    sink: &mut W,
    id: u64,
    payload: &Payload,
) -> Result<(), ProtocolError> {
    let envelope = Envelope::wrap(id, payload)?;
    let bytes = serde_json::to_vec(&envelope)?;
    sink.write_all(&bytes).await?;
    sink.flush().await?;
    Ok(())
}

/// Buffered incremental reader of one or more [`Envelope`]s from a byte
/// stream.
///
/// Owns the leftover-bytes buffer between calls, since a single `read_envelope`
/// call may consume bytes belonging to the *next* envelope (the peer pipelined
/// two requests in one TCP segment) or may need several socket reads to
/// finish one envelope.
pub struct EnvelopeReader<R> {
    inner: R,
    buf: BytesMut,
}

impl<R: AsyncRead + Unpin> EnvelopeReader<R> {
    /// Wrap `inner` with an empty pending-bytes buffer.
    pub fn new(inner: R) -> Self {
        Self { inner, buf: BytesMut::new() }
    }

    /// Read and return exactly one envelope.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Json`] if the buffered bytes are not a
    /// valid JSON object (not merely incomplete), [`ProtocolError::Io`] on
    /// a socket error, or [`ProtocolError::Eof`] if the connection closes
    /// with no (or a partial) envelope pending.
    pub async fn read_envelope(&mut self) -> Result<Envelope, ProtocolError> {
        loop {
            if !self.buf.is_empty() {
                let mut stream = serde_json::Deserializer::from_slice(&self.buf).into_iter::<Envelope>();
                match stream.next() {
                    Some(Ok(envelope)) => {
                        let consumed = stream.byte_offset();
                        self.buf.advance(consumed);
                        return Ok(envelope);
                    },
                    Some(Err(e)) if e.is_eof() => {
                        // incomplete object; fall through and read more bytes
                    },
                    Some(Err(e)) => return Err(ProtocolError::Json(e)),
                    None => {},
                }
            }

            let mut chunk = [0u8; 4096];
            let n = self.inner.read(&mut chunk).await?;
            if n == 0 {
                return Err(ProtocolError::Eof);
            }
            self.buf.extend_from_slice(&chunk[..n]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payloads::Payload;

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let (client, server) = tokio::io::duplex(4096);
        let (_, mut write_half) = tokio::io::split(client);
        let (read_half, _) = tokio::io::split(server);

        write(&mut write_half, 7, &Payload::Bool(true)).await.unwrap();

        let mut reader = EnvelopeReader::new(read_half);
        let envelope = reader.read_envelope().await.unwrap();
        assert_eq!(envelope.id, 7);
        assert_eq!(envelope.kind, "bool");
        assert_eq!(envelope.open().unwrap(), Payload::Bool(true));
    }

    #[tokio::test]
    async fn reads_two_pipelined_envelopes_from_one_write() {
        let (client, server) = tokio::io::duplex(4096);
        let (_, mut write_half) = tokio::io::split(client);
        let (read_half, _) = tokio::io::split(server);

        write(&mut write_half, 1, &Payload::Bool(true)).await.unwrap();
        write(&mut write_half, 2, &Payload::Bool(false)).await.unwrap();

        let mut reader = EnvelopeReader::new(read_half);
        let first = reader.read_envelope().await.unwrap();
        let second = reader.read_envelope().await.unwrap();
        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
    }

    #[tokio::test]
    async fn eof_before_any_bytes_errors() {
        let (client, server) = tokio::io::duplex(4096);
        drop(client);
        let mut reader = EnvelopeReader::new(server);
        assert!(matches!(reader.read_envelope().await, Err(ProtocolError::Eof)));
    }
}
