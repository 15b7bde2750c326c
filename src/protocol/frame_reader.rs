//! Frame reader for accumulating partial reads.
//!
//! Uses `bytes::BytesMut` for zero-copy buffer management. Bytes are appended
//! at the back as they arrive from the stream and complete frames are split
//! off the front. Appending never triggers extraction; the caller pulls
//! frames one at a time with [`FrameReader::try_extract`].
//!
//! # Example
//!
//! ```
//! use abci_socket::protocol::FrameReader;
//!
//! let mut reader = FrameReader::new();
//!
//! // varint(4 << 1) followed by a 4-byte payload, split across two reads
//! reader.extend(&[0x08, 1, 2]);
//! assert!(reader.try_extract().unwrap().is_none());
//!
//! reader.extend(&[3, 4]);
//! let frame = reader.try_extract().unwrap().unwrap();
//! assert_eq!(frame.payload(), &[1, 2, 3, 4]);
//! assert!(reader.is_empty());
//! ```

use bytes::{Buf, Bytes, BytesMut};

use super::length_prefix::{decode_length, DEFAULT_MAX_MESSAGE_SIZE};
use super::Frame;
use crate::error::{AbciError, Result};

/// Default initial capacity of the receive buffer (64KB).
pub const DEFAULT_BUFFER_CAPACITY: usize = 64 * 1024;

/// Receive buffer that extracts complete frames as bytes become available.
pub struct FrameReader {
    /// Accumulated bytes from stream reads.
    buffer: BytesMut,
    /// Maximum allowed payload size.
    max_message_size: usize,
}

impl FrameReader {
    /// Create a new frame reader with default settings.
    ///
    /// Default capacity: 64KB, max payload: 100MB.
    pub fn new() -> Self {
        Self::with_capacity_and_max_message_size(DEFAULT_BUFFER_CAPACITY, DEFAULT_MAX_MESSAGE_SIZE)
    }

    /// Create a new frame reader with a custom max payload size.
    pub fn with_max_message_size(max_message_size: usize) -> Self {
        Self::with_capacity_and_max_message_size(DEFAULT_BUFFER_CAPACITY, max_message_size)
    }

    /// Create a new frame reader with custom capacity and max payload.
    pub fn with_capacity_and_max_message_size(capacity: usize, max_message_size: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
            max_message_size,
        }
    }

    /// Append bytes received from the stream.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Try to extract a single frame from the front of the buffer.
    ///
    /// Returns:
    /// - `Ok(Some(frame))` if a complete frame was extracted
    /// - `Ok(None)` if more data is needed (nothing is consumed)
    /// - `Err(...)` on a malformed prefix or an oversized payload
    ///   (nothing is consumed; the connection is expected to close)
    pub fn try_extract(&mut self) -> Result<Option<Frame>> {
        let (length, prefix_len) = match decode_length(&self.buffer) {
            Ok(Some(decoded)) => decoded,
            Ok(None) => return Ok(None),
            Err(e) => return Err(AbciError::parse(e, self.buffered())),
        };

        if length > self.max_message_size as u64 {
            return Err(AbciError::MessageTooLarge {
                size: length,
                max: self.max_message_size,
            });
        }

        // Bounded by max_message_size above
        let frame_len = prefix_len + length as usize;
        if frame_len > self.buffer.len() {
            return Ok(None);
        }

        let mut frame_bytes = self.buffer.split_to(frame_len);
        frame_bytes.advance(prefix_len);

        tracing::trace!(payload_len = length, "Extracted frame");

        Ok(Some(Frame::new(prefix_len, frame_bytes.freeze())))
    }

    /// Copy of the bytes currently buffered, for diagnostics.
    pub fn buffered(&self) -> Bytes {
        Bytes::copy_from_slice(&self.buffer)
    }

    /// Configured maximum payload size.
    pub fn max_message_size(&self) -> usize {
        self.max_message_size
    }

    /// Get the number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

impl Default for FrameReader {
    fn default() -> Self {
        Self::new()
    }
}
