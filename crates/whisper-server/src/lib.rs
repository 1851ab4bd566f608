//! Whisper TCP server.
//!
//! Accepts connections on a single listener, hands each to an independent
//! task running the [`connection`] state machine, and backs every
//! connection's persistence with one process-wide [`UserDbCache`].

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod connection;
pub mod error;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

pub use error::ServerError;
use tokio::net::TcpListener;
use tracing::{error, info};
use whisper_storage::UserDbCache;

/// Runtime configuration for [`Server`].
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the listener to.
    pub bind_address: SocketAddr,
    /// Directory holding one `<nick>.redb` file per user.
    pub data_dir: PathBuf,
}

/// A bound whisper server, ready to accept connections.
pub struct Server {
    listener: TcpListener,
    cache: Arc<UserDbCache>,
}

impl Server {
    /// Bind a listener at `config.bind_address` and open the per-user
    /// database cache rooted at `config.data_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Io`] if the address cannot be bound.
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(config.bind_address).await?;
        let cache = Arc::new(UserDbCache::new(config.data_dir));
        Ok(Self { listener, cache })
    }

    /// The address the listener is actually bound to (useful when the
    /// configured port is `0`).
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Io`] if the OS cannot report the local
    /// address.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until the process is terminated. Each connection
    /// runs in its own task; a failed connection never brings down the
    /// listener or any other connection. Only returns if the listener
    /// itself is torn down from outside this task.
    pub async fn run(self) {
        info!(addr = ?self.listener.local_addr().ok(), "whisper server listening");
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    let cache = Arc::clone(&self.cache);
                    tokio::spawn(async move {
                        if let Err(e) = connection::handle_connection(stream, cache).await {
                            error!(%peer, error = %e, "connection ended with an error");
                        }
                    });
                },
                Err(e) => {
                    error!(error = %e, "accept failed");
                },
            }
        }
    }
}
