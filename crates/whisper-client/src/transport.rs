//! TCP transport for connecting to a whisper server.

use tokio::net::TcpStream;

use crate::error::ClientError;

/// Connect to `host:port`, disabling Nagle's algorithm so small envelopes
/// (most requests are well under a TCP segment) aren't held back waiting
/// for more data to batch.
///
/// # Errors
///
/// Returns [`ClientError::Io`] if the connection cannot be established.
pub async fn connect(host: &str, port: u16) -> Result<TcpStream, ClientError> {
    let stream = TcpStream::connect((host, port)).await?;
    stream.set_nodelay(true)?;
    Ok(stream)
}
