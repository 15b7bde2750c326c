//! Error types for abci-socket.

use bytes::Bytes;
use thiserror::Error;

/// Opaque error raised by an application handler or codec.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for all connection operations.
#[derive(Debug, Error)]
pub enum AbciError {
    /// I/O error while reading from the stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed length prefix or request payload.
    ///
    /// `buffered` holds the receive buffer contents that were still
    /// unconsumed when the failure was detected.
    #[error("Unable to parse request: {source}")]
    Parse {
        #[source]
        source: BoxError,
        buffered: Bytes,
    },

    /// Declared payload length exceeds the configured maximum.
    #[error("Request size {size} exceeds maximum {max}")]
    MessageTooLarge { size: u64, max: usize },

    /// Writing a response to the stream failed.
    #[error("Write error: {0}")]
    Write(#[source] std::io::Error),

    /// Framing violation detected before a payload could be isolated.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// MsgPack serialization error.
    #[error("MsgPack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),

    /// MsgPack deserialization error.
    #[error("MsgPack decode error: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),

    /// Unclassified handler failure, returned to the connection owner as-is.
    #[error("Handler error: {0}")]
    Handler(#[source] BoxError),

    /// The writer task is gone; the stream can no longer carry responses.
    #[error("Connection closed")]
    ConnectionClosed,

    /// The owner forced teardown through a [`ShutdownHandle`].
    ///
    /// [`ShutdownHandle`]: crate::connection::ShutdownHandle
    #[error("Connection shut down by its owner")]
    Shutdown,
}

impl AbciError {
    /// Build a parse error around the failure that caused it.
    pub fn parse(source: impl Into<BoxError>, buffered: Bytes) -> Self {
        AbciError::Parse {
            source: source.into(),
            buffered,
        }
    }
}

/// Result type alias using AbciError.
pub type Result<T> = std::result::Result<T, AbciError>;
