//! Accept loop serving one [`Connection`] per socket.
//!
//! # Example
//!
//! ```ignore
//! use abci_socket::codec::{RawCodec, RawResponse};
//! use abci_socket::handler::{handler_fn, HandlerError};
//! use abci_socket::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let handler = handler_fn(|request: bytes::Bytes| async move {
//!         Ok::<_, HandlerError<RawResponse>>(RawResponse::new(request))
//!     });
//!
//!     Server::bind_tcp("127.0.0.1:26658", RawCodec, handler)
//!         .await?
//!         .serve()
//!         .await;
//!     Ok(())
//! }
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::ToSocketAddrs;

use crate::codec::MessageCodec;
use crate::config::ConnectionConfig;
use crate::connection::Connection;
use crate::error::Result;
use crate::handler::RequestHandler;
use crate::transport::{Listener, SocketStream};

/// Socket server sharing one codec and handler across connections.
pub struct Server<C, H> {
    listener: Listener,
    codec: Arc<C>,
    handler: Arc<H>,
    config: ConnectionConfig,
}

impl<C, H> Server<C, H>
where
    C: MessageCodec,
    H: RequestHandler<C::Request, C::Response>,
{
    /// Create a server over an already bound listener.
    pub fn new(listener: Listener, codec: C, handler: H) -> Self {
        Self {
            listener,
            codec: Arc::new(codec),
            handler: Arc::new(handler),
            config: ConnectionConfig::default(),
        }
    }

    /// Bind a TCP server.
    pub async fn bind_tcp(addr: impl ToSocketAddrs, codec: C, handler: H) -> Result<Self> {
        Ok(Self::new(Listener::bind_tcp(addr).await?, codec, handler))
    }

    /// Bind a Unix Domain Socket server.
    #[cfg(unix)]
    pub fn bind_unix(path: impl AsRef<std::path::Path>, codec: C, handler: H) -> Result<Self> {
        Ok(Self::new(Listener::bind_unix(path)?, codec, handler))
    }

    /// Set the configuration applied to every accepted connection.
    pub fn with_config(mut self, config: ConnectionConfig) -> Self {
        self.config = config;
        self
    }

    /// Local address when serving over TCP.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections forever.
    ///
    /// Each connection runs on its own task. Close events are logged with
    /// the peer address. A failed accept, such as running out of file
    /// descriptors, is logged and the loop keeps accepting.
    pub async fn serve(self) {
        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept connection");
                    continue;
                }
            };

            self.spawn_connection(stream, peer);
        }
    }

    fn spawn_connection(&self, stream: SocketStream, peer: String) {
        tracing::debug!(%peer, "Accepted connection");

        let connection = Connection::with_config(
            stream,
            self.codec.clone(),
            self.handler.clone(),
            self.config.clone(),
        );

        tokio::spawn(async move {
            match connection.run().await {
                Ok(closed) => match closed.error {
                    None => tracing::debug!(%peer, "Connection closed"),
                    Some(e) => tracing::warn!(%peer, "Connection closed with error: {}", e),
                },
                Err(e) => tracing::error!(%peer, "Unhandled error: {}", e),
            }
        });
    }
}
