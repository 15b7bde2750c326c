//! # abci-socket
//!
//! Server-side transport for the ABCI socket protocol: a request/response
//! RPC carried over one persistent duplex byte stream.
//!
//! ## Architecture
//!
//! - **Framing**: each message is `varint(payload_len << 1) || payload`
//! - **Pipeline**: one request in flight per connection, inbound reads
//!   paused while the handler runs, responses written in request order
//! - **Writer**: dedicated writer task with batched vectored writes and
//!   optional forced flush
//! - **Errors**: parse, size and write failures close the connection; a
//!   handler's `ResponseException` is delivered once before closing
//!
//! ## Example
//!
//! ```ignore
//! use abci_socket::codec::{RawCodec, RawResponse};
//! use abci_socket::handler::{handler_fn, HandlerError};
//! use abci_socket::Server;
//!
//! #[tokio::main]
//! async fn main() {
//!     let handler = handler_fn(|request: bytes::Bytes| async move {
//!         Ok::<_, HandlerError<RawResponse>>(RawResponse::new(request))
//!     });
//!
//!     let server = Server::bind_tcp("127.0.0.1:26658", RawCodec, handler)
//!         .await
//!         .unwrap();
//!
//!     server.serve().await;
//! }
//! ```

pub mod classify;
pub mod codec;
pub mod config;
pub mod connection;
pub mod error;
pub mod handler;
pub mod protocol;
pub mod transport;
pub mod writer;

mod server;

pub use config::ConnectionConfig;
pub use connection::{Closed, Connection, ConnectionState, ShutdownHandle};
pub use error::{AbciError, BoxError};
pub use handler::{handler_fn, HandlerError, RequestHandler};
pub use server::Server;
