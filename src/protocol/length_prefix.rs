//! Varint length prefix encoding and decoding.
//!
//! Every frame on the wire starts with a base-128 little-endian varint
//! holding the payload length shifted left by one:
//!
//! ```text
//! ┌──────────────────────────┬─────────────────┐
//! │ varint(payload_len << 1) │ payload         │
//! │ 1..=8 bytes              │ payload_len     │
//! └──────────────────────────┴─────────────────┘
//! ```
//!
//! Bit 0 of the encoded value is reserved and always written as zero.
//! Decoding shifts it away without inspecting it.

use crate::error::{AbciError, Result};

/// Number of buffered bytes inspected when decoding a length prefix.
pub const LENGTH_LOOKAHEAD: usize = 8;

/// Maximum bytes a `u64` varint can occupy.
pub const MAX_PREFIX_SIZE: usize = 10;

/// Default maximum payload size (100 MiB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 104_857_600;

/// An encoded length prefix, kept on the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LengthPrefix {
    buf: [u8; MAX_PREFIX_SIZE],
    len: u8,
}

impl LengthPrefix {
    /// The encoded prefix bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len as usize]
    }

    /// Number of bytes the prefix occupies on the wire.
    #[inline]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// A prefix always holds at least one byte.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl AsRef<[u8]> for LengthPrefix {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

/// Encode the length prefix for a payload of `payload_length` bytes.
///
/// # Example
///
/// ```
/// use abci_socket::protocol::encode_length;
///
/// assert_eq!(encode_length(4).as_bytes(), &[0x08]);
/// assert_eq!(encode_length(64).as_bytes(), &[0x80, 0x01]);
/// ```
pub fn encode_length(payload_length: usize) -> LengthPrefix {
    let mut value = (payload_length as u64) << 1;
    let mut buf = [0u8; MAX_PREFIX_SIZE];
    let mut len = 0;

    while value >= 0x80 {
        buf[len] = (value as u8 & 0x7F) | 0x80;
        value >>= 7;
        len += 1;
    }
    buf[len] = value as u8;
    len += 1;

    LengthPrefix {
        buf,
        len: len as u8,
    }
}

/// Decode a length prefix from the front of `buf`.
///
/// Only the first [`LENGTH_LOOKAHEAD`] bytes are inspected. Returns:
/// - `Ok(Some((payload_length, prefix_len)))` for a complete prefix
/// - `Ok(None)` if the prefix is cut short and more bytes may complete it
/// - `Err(...)` if the prefix does not terminate inside the lookahead window
///
/// # Example
///
/// ```
/// use abci_socket::protocol::decode_length;
///
/// assert_eq!(decode_length(&[0x08, 1, 2, 3, 4]).unwrap(), Some((4, 1)));
/// assert_eq!(decode_length(&[0x80]).unwrap(), None);
/// ```
pub fn decode_length(buf: &[u8]) -> Result<Option<(u64, usize)>> {
    let window = &buf[..buf.len().min(LENGTH_LOOKAHEAD)];
    let mut value: u64 = 0;

    for (i, byte) in window.iter().enumerate() {
        value |= u64::from(byte & 0x7F) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(Some((value >> 1, i + 1)));
        }
    }

    if window.len() < LENGTH_LOOKAHEAD {
        return Ok(None);
    }

    Err(AbciError::Protocol(format!(
        "Length prefix does not terminate within {} bytes",
        LENGTH_LOOKAHEAD
    )))
}
