//! MsgPack codec using `rmp-serde`.
//!
//! Structs are encoded with `to_vec_named` (struct-as-map) so peers that key
//! fields by name decode them without a positional schema.
//!
//! # Example
//!
//! ```
//! use abci_socket::codec::{FlushIndicator, MessageCodec, MsgPackCodec};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize, PartialEq, Debug)]
//! struct Echo {
//!     message: String,
//! }
//!
//! #[derive(Serialize, Deserialize, PartialEq, Debug)]
//! struct Reply {
//!     message: String,
//!     flush: bool,
//! }
//!
//! impl FlushIndicator for Reply {
//!     fn flush(&self) -> bool {
//!         self.flush
//!     }
//! }
//!
//! let codec = MsgPackCodec::<Echo, Reply>::new();
//! let payload = MsgPackCodec::<Echo, Reply>::encode(&Echo { message: "hi".into() }).unwrap();
//! let request = codec.decode_request(payload.into()).unwrap();
//! assert_eq!(request.message, "hi");
//! ```

use std::fmt;
use std::marker::PhantomData;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{FlushIndicator, MessageCodec};
use crate::error::Result;

/// MessagePack codec for serde request/response types.
pub struct MsgPackCodec<Req, Resp> {
    _marker: PhantomData<fn() -> (Req, Resp)>,
}

impl<Req, Resp> MsgPackCodec<Req, Resp> {
    /// Create a new codec.
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }

    /// Encode a value to MsgPack bytes.
    ///
    /// Uses `to_vec_named` for struct-as-map format.
    #[inline]
    pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(value)?)
    }

    /// Decode MsgPack bytes to a value.
    #[inline]
    pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}

impl<Req, Resp> Default for MsgPackCodec<Req, Resp> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Req, Resp> Clone for MsgPackCodec<Req, Resp> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<Req, Resp> fmt::Debug for MsgPackCodec<Req, Resp> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MsgPackCodec")
    }
}

impl<Req, Resp> MessageCodec for MsgPackCodec<Req, Resp>
where
    Req: DeserializeOwned + Send + 'static,
    Resp: Serialize + FlushIndicator + Send + Sync + 'static,
{
    type Request = Req;
    type Response = Resp;

    fn decode_request(&self, payload: Bytes) -> Result<Req> {
        Self::decode(&payload)
    }

    fn encode_response(&self, response: &Resp) -> Result<Bytes> {
        Self::encode(response).map(Bytes::from)
    }
}
