//! Raw codec - pass-through for binary data.
//!
//! Requests are the frame payload itself and responses carry their payload
//! verbatim plus a flush flag. Useful when the schema layer lives elsewhere,
//! and for exercising the framing without a schema.

use bytes::Bytes;

use super::{FlushIndicator, MessageCodec};
use crate::error::Result;

/// Raw codec that passes bytes through without transformation.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawCodec;

/// Response for [`RawCodec`]: opaque payload plus flush flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// Payload written to the wire as-is.
    pub payload: Bytes,
    /// Wait for a flush after writing.
    pub flush: bool,
}

impl RawResponse {
    /// Response written without waiting for a flush.
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
            flush: false,
        }
    }

    /// Response that is flushed before the next request is handled.
    pub fn flushed(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
            flush: true,
        }
    }
}

impl FlushIndicator for RawResponse {
    fn flush(&self) -> bool {
        self.flush
    }
}

impl MessageCodec for RawCodec {
    type Request = Bytes;
    type Response = RawResponse;

    /// Zero-copy: the request is the payload.
    #[inline]
    fn decode_request(&self, payload: Bytes) -> Result<Bytes> {
        Ok(payload)
    }

    #[inline]
    fn encode_response(&self, response: &RawResponse) -> Result<Bytes> {
        Ok(response.payload.clone())
    }
}
