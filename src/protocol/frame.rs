//! Frame struct - one length-prefixed message unit.
//!
//! Uses `bytes::Bytes` for zero-copy payload sharing with the receive buffer.
//!
//! # Example
//!
//! ```
//! use abci_socket::protocol::{build_frame, Frame};
//! use bytes::Bytes;
//!
//! let frame = Frame::new(1, Bytes::from_static(b"ping"));
//! assert_eq!(frame.payload(), b"ping");
//! assert_eq!(frame.wire_len(), 5);
//!
//! assert_eq!(build_frame(b"ping"), vec![0x08, b'p', b'i', b'n', b'g']);
//! ```

use bytes::Bytes;

use super::length_prefix::encode_length;

/// A complete frame extracted from the receive buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Bytes the length prefix occupied on the wire.
    pub prefix_len: usize,
    /// Payload bytes (zero-copy via `bytes::Bytes`).
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame from its prefix width and payload.
    pub fn new(prefix_len: usize, payload: Bytes) -> Self {
        Self {
            prefix_len,
            payload,
        }
    }

    /// Get a reference to the payload bytes.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Consume the frame, yielding its payload.
    #[inline]
    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    /// Get the payload length.
    #[inline]
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    /// Total bytes this frame occupied on the wire.
    #[inline]
    pub fn wire_len(&self) -> usize {
        self.prefix_len + self.payload.len()
    }
}

/// Build a complete frame as a single byte vector.
///
/// The response writer keeps prefix and payload apart for vectored writes.
/// This is for peers and tests that want the frame contiguous.
pub fn build_frame(payload: &[u8]) -> Vec<u8> {
    let prefix = encode_length(payload.len());
    let mut buf = Vec::with_capacity(prefix.len() + payload.len());
    buf.extend_from_slice(prefix.as_bytes());
    buf.extend_from_slice(payload);
    buf
}
