//! Client request-multiplexing core.
//!
//! One TCP connection is shared by many concurrent logical requests. A
//! monotonic counter assigns each outbound envelope a fresh id; a
//! background reader task demultiplexes inbound envelopes back to the
//! one-shot channel that's waiting for that id.
//!
//! Two correctness properties worth calling out explicitly:
//! - the reader removes a waiter's map entry at the moment it delivers a
//!   response, rather than only closing the channel and leaking the entry;
//! - on EOF (or any unrecoverable read error) every still-outstanding
//!   waiter is failed with [`ClientError::ConnectionClosed`] instead of
//!   being left to stall forever.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{Mutex, oneshot};
use tracing::{debug, warn};
use whisper_proto::{EnvelopeReader, Payload, ProtocolError, envelope};

use crate::error::ClientError;

type PendingResult = Result<Payload, ClientError>;
type Waiters = Mutex<HashMap<u64, oneshot::Sender<PendingResult>>>;

/// A multiplexed connection: one socket, many concurrent in-flight
/// requests.
pub struct Multiplexer<W> {
    next_id: AtomicU64,
    waiters: Arc<Waiters>,
    write_half: Mutex<W>,
}

impl<W: AsyncWrite + Unpin> Multiplexer<W> {
    /// Take ownership of both halves of a connection, spawning a background
    /// task that reads `read_half` for the lifetime of the connection.
    pub fn spawn<R>(read_half: R, write_half: W) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let waiters: Arc<Waiters> = Arc::new(Mutex::new(HashMap::new()));
        let reader_waiters = Arc::clone(&waiters);
        tokio::spawn(run_reader(read_half, reader_waiters));
        Self { next_id: AtomicU64::new(0), waiters, write_half: Mutex::new(write_half) }
    }

    /// Allocate a request id, write `payload`, and return the receiving end
    /// of the one-shot channel that the reader task will deliver the
    /// correlated response to.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Io`] or [`ClientError::Protocol`] if the
    /// write fails; the waiter entry is removed before returning so a
    /// failed send never leaks a slot.
    pub async fn send(
        &self,
        payload: Payload,
    ) -> Result<oneshot::Receiver<PendingResult>, ClientError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.waiters.lock().await.insert(id, tx);

        let mut write_half = self.write_half.lock().await;
        let result = envelope::write(&mut *write_half, id, &payload).await;
        drop(write_half);

        if let Err(e) = result {
            self.waiters.lock().await.remove(&id);
            return Err(e.into());
        }
        Ok(rx)
    }

    /// Send `payload` and await its single correlated response.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::ConnectionClosed`] if the connection tears
    /// down before a response arrives, or whatever [`Self::send`] / the
    /// server's `error` envelope would produce.
    pub async fn request(&self, payload: Payload) -> Result<Payload, ClientError> {
        let rx = self.send(payload).await?;
        rx.await.map_err(|_| ClientError::ConnectionClosed)?
    }
}

async fn run_reader<R: AsyncRead + Unpin>(read_half: R, waiters: Arc<Waiters>) {
    let mut reader = EnvelopeReader::new(read_half);
    loop {
        match reader.read_envelope().await {
            Ok(envelope) => {
                let id = envelope.id;
                let payload = envelope.open().map_err(ClientError::from);
                let mut guard = waiters.lock().await;
                if let Some(tx) = guard.remove(&id) {
                    drop(guard);
                    let _ = tx.send(payload);
                } else {
                    drop(guard);
                    warn!(id, "response for unknown or already-delivered request id, discarding");
                }
            },
            Err(ProtocolError::Eof) => {
                debug!("connection closed; failing outstanding requests");
                fail_all(&waiters).await;
                return;
            },
            Err(e) => {
                warn!(error = %e, "envelope read failed; failing outstanding requests");
                fail_all(&waiters).await;
                return;
            },
        }
    }
}

async fn fail_all(waiters: &Waiters) {
    let mut guard = waiters.lock().await;
    for (_, tx) in guard.drain() {
        let _ = tx.send(Err(ClientError::ConnectionClosed));
    }
}

#[cfg(test)]
mod tests {
    use whisper_proto::ErrorBody;

    use super::*;

    #[tokio::test]
    async fn request_round_trips_by_id() {
        let (client_side, server_side) = tokio::io::duplex(8192);
        let (client_read, client_write) = tokio::io::split(client_side);
        let mux = Multiplexer::spawn(client_read, client_write);

        let (server_read, mut server_write) = tokio::io::split(server_side);
        tokio::spawn(async move {
            let mut reader = EnvelopeReader::new(server_read);
            let envelope = reader.read_envelope().await.unwrap();
            envelope::write(&mut server_write, envelope.id, &Payload::Bool(true)).await.unwrap();
        });

        let response = mux.request(Payload::Bool(false)).await.unwrap();
        assert_eq!(response, Payload::Bool(true));
    }

    #[tokio::test]
    async fn concurrent_requests_each_get_their_own_response() {
        let (client_side, server_side) = tokio::io::duplex(8192);
        let (client_read, client_write) = tokio::io::split(client_side);
        let mux = Arc::new(Multiplexer::spawn(client_read, client_write));

        let (server_read, server_write) = tokio::io::split(server_side);
        let server_write = Arc::new(Mutex::new(server_write));
        tokio::spawn(async move {
            let mut reader = EnvelopeReader::new(server_read);
            loop {
                let envelope = match reader.read_envelope().await {
                    Ok(e) => e,
                    Err(_) => return,
                };
                let mut w = server_write.lock().await;
                envelope::write(&mut *w, envelope.id, &Payload::Bool(envelope.id % 2 == 0))
                    .await
                    .unwrap();
            }
        });

        let a = mux.request(Payload::Bool(false));
        let b = mux.request(Payload::Bool(false));
        let (a, b) = tokio::join!(a, b);
        // ids are assigned 0 and 1, in request order
        assert_eq!(a.unwrap(), Payload::Bool(true));
        assert_eq!(b.unwrap(), Payload::Bool(false));
    }

    #[tokio::test]
    async fn eof_fails_outstanding_requests_instead_of_stalling() {
        let (client_side, server_side) = tokio::io::duplex(8192);
        let (client_read, client_write) = tokio::io::split(client_side);
        let mux = Multiplexer::spawn(client_read, client_write);

        drop(server_side);

        let result = mux.request(Payload::Bool(true)).await;
        assert!(matches!(result, Err(ClientError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn server_error_envelope_surfaces_as_payload() {
        let (client_side, server_side) = tokio::io::duplex(8192);
        let (client_read, client_write) = tokio::io::split(client_side);
        let mux = Multiplexer::spawn(client_read, client_write);

        let (server_read, mut server_write) = tokio::io::split(server_side);
        tokio::spawn(async move {
            let mut reader = EnvelopeReader::new(server_read);
            let envelope = reader.read_envelope().await.unwrap();
            envelope::write(
                &mut server_write,
                envelope.id,
                &Payload::Error(ErrorBody::new("nope")),
            )
            .await
            .unwrap();
        });

        let response = mux.request(Payload::Bool(true)).await.unwrap();
        assert_eq!(response, Payload::Error(ErrorBody::new("nope")));
    }
}
