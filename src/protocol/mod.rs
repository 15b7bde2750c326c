//! Protocol module - length prefix codec and framing.
//!
//! This module implements the wire framing of the socket:
//! - Varint length prefix encoding/decoding (`payload_len << 1`)
//! - Frame reader for accumulating partial reads
//! - Frame struct with zero-copy payload

mod frame;
mod frame_reader;
mod length_prefix;

pub use frame::{build_frame, Frame};
pub use frame_reader::{FrameReader, DEFAULT_BUFFER_CAPACITY};
pub use length_prefix::{
    decode_length, encode_length, LengthPrefix, DEFAULT_MAX_MESSAGE_SIZE, LENGTH_LOOKAHEAD,
    MAX_PREFIX_SIZE,
};
