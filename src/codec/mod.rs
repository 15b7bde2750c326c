//! Codec module - schema encoding for request and response payloads.
//!
//! The connection treats messages as opaque values produced and consumed
//! by a [`MessageCodec`]. It reads exactly one thing off a decoded response:
//! its [`FlushIndicator`].
//!
//! Provided codecs:
//!
//! - [`MsgPackCodec`] - MessagePack using `rmp-serde` for serde message types
//! - [`RawCodec`] - Pass-through for raw bytes (zero-copy)
//!
//! # Example
//!
//! ```
//! use abci_socket::codec::{FlushIndicator, MessageCodec, RawCodec, RawResponse};
//! use bytes::Bytes;
//!
//! let codec = RawCodec;
//! let request = codec.decode_request(Bytes::from_static(b"ping")).unwrap();
//! assert_eq!(&request[..], b"ping");
//!
//! let response = RawResponse::flushed(Bytes::from_static(b"pong"));
//! assert!(response.flush());
//! assert_eq!(&codec.encode_response(&response).unwrap()[..], b"pong");
//! ```

mod msgpack;
mod raw;

use bytes::Bytes;

use crate::error::Result;

pub use msgpack::MsgPackCodec;
pub use raw::{RawCodec, RawResponse};

/// Exposes the flush flag carried by a response.
///
/// When set, the connection waits for the response bytes to be flushed to
/// the transport before handling the next request.
pub trait FlushIndicator {
    /// Whether the response must be flushed before continuing.
    fn flush(&self) -> bool;
}

/// Encodes and decodes the schema messages carried inside frames.
pub trait MessageCodec: Send + Sync + 'static {
    /// Decoded inbound message.
    type Request: Send + 'static;
    /// Outbound message.
    type Response: FlushIndicator + Send + Sync + 'static;

    /// Decode a frame payload into a request.
    fn decode_request(&self, payload: Bytes) -> Result<Self::Request>;

    /// Encode a response into a frame payload.
    fn encode_response(&self, response: &Self::Response) -> Result<Bytes>;
}
