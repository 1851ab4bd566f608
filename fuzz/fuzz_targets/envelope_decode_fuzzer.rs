//! Fuzz target for the envelope stream parser.
//!
//! # Invariants
//!
//! - Arbitrary byte streams never panic the incremental JSON-object-boundary
//!   parser, however they are chunked across reads.
//! - A zero-length read is always reported as `ProtocolError::Eof`, never a
//!   silent hang or a panic on an empty buffer.

#![no_main]

use std::pin::Pin;
use std::task::{Context, Poll};

use libfuzzer_sys::fuzz_target;
use tokio::io::{AsyncRead, ReadBuf};
use whisper_proto::EnvelopeReader;

/// Replays `data` in fixed-size chunks, so the parser sees the same kind of
/// partial reads a real socket would produce.
struct ChunkedReader<'a> {
    data: &'a [u8],
    pos: usize,
    chunk: usize,
}

impl AsyncRead for ChunkedReader<'_> {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let this = self.get_mut();
        let remaining = &this.data[this.pos..];
        let take = remaining.len().min(this.chunk).min(buf.remaining());
        buf.put_slice(&remaining[..take]);
        this.pos += take;
        Poll::Ready(Ok(()))
    }
}

fuzz_target!(|input: (u8, Vec<u8>)| {
    let (chunk_byte, data) = input;
    let chunk = usize::from(chunk_byte).max(1);
    let reader = ChunkedReader { data: &data, pos: 0, chunk };
    let mut envelope_reader = EnvelopeReader::new(reader);

    let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
    runtime.block_on(async {
        loop {
            match envelope_reader.read_envelope().await {
                Ok(envelope) => {
                    let _ = envelope.open();
                },
                Err(_) => break,
            }
        }
    });
});
