//! Per-connection configuration.
//!
//! Limits are injected when a connection is constructed rather than read
//! from process-wide state.

use crate::protocol::{DEFAULT_BUFFER_CAPACITY, DEFAULT_MAX_MESSAGE_SIZE};
use crate::writer::WriterConfig;

/// Default size of a single read from the stream (64KB).
pub const DEFAULT_READ_CHUNK_SIZE: usize = 64 * 1024;

/// Configuration for a single connection.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Maximum accepted request payload in bytes.
    pub max_message_size: usize,
    /// Bytes requested from the stream per read.
    pub read_chunk_size: usize,
    /// Initial capacity of the receive buffer.
    pub initial_buffer_capacity: usize,
    /// Response writer settings.
    pub writer: WriterConfig,
}

impl ConnectionConfig {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum request payload size.
    ///
    /// Default: 104857600 (100MB)
    pub fn max_message_size(mut self, limit: usize) -> Self {
        self.max_message_size = limit;
        self
    }

    /// Set the read chunk size.
    ///
    /// Default: 64KB
    pub fn read_chunk_size(mut self, size: usize) -> Self {
        self.read_chunk_size = size;
        self
    }

    /// Set the initial receive buffer capacity.
    ///
    /// Default: 64KB
    pub fn initial_buffer_capacity(mut self, capacity: usize) -> Self {
        self.initial_buffer_capacity = capacity;
        self
    }

    /// Set the writer channel capacity.
    ///
    /// Default: 1024
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.writer.channel_capacity = capacity;
        self
    }

    /// Set the maximum frames per vectored write.
    ///
    /// Default: 64
    pub fn max_batch_frames(mut self, frames: usize) -> Self {
        self.writer.max_batch_frames = frames;
        self
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            initial_buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            writer: WriterConfig::default(),
        }
    }
}
