//! Response writer backed by a dedicated writer task.
//!
//! Responses are encoded on the connection task, framed with their length
//! prefix and handed to the writer task through an mpsc channel. Each frame
//! is submitted as one unit, so a prefix and its payload are never separated
//! by another write.
//!
//! # Architecture
//!
//! ```text
//! Connection ─► ResponseWriter::write ─► mpsc::Sender<OutboundFrame> ─► Writer Task ─► Stream
//!                                                                          │
//!                        oneshot ack (forced flush only) ◄──────────────────┘
//! ```
//!
//! Frames already queued when the writer task wakes up are written as one
//! batch with scatter/gather I/O (writev) and flushed together. A write
//! without forced flush returns as soon as the frame is queued. A forced
//! flush waits until the batch holding its frame has been written and
//! flushed.

use std::io::IoSlice;
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::codec::MessageCodec;
use crate::error::{AbciError, Result};
use crate::protocol::{encode_length, LengthPrefix};

/// Default channel capacity.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Default maximum frames to batch in a single write operation.
pub const DEFAULT_MAX_BATCH_FRAMES: usize = 64;

/// A frame ready to be written to the stream.
#[derive(Debug)]
pub struct OutboundFrame {
    /// Pre-encoded length prefix.
    pub prefix: LengthPrefix,
    /// Payload bytes.
    pub payload: Bytes,
    /// Completed once the frame has been written and flushed.
    flushed: Option<oneshot::Sender<()>>,
}

impl OutboundFrame {
    /// Create a new outbound frame around an encoded payload.
    #[inline]
    pub fn new(payload: Bytes) -> Self {
        Self {
            prefix: encode_length(payload.len()),
            payload,
            flushed: None,
        }
    }

    /// Create a frame whose flush is acknowledged through `ack`.
    #[inline]
    fn with_flush_ack(payload: Bytes, ack: oneshot::Sender<()>) -> Self {
        Self {
            flushed: Some(ack),
            ..Self::new(payload)
        }
    }

    /// Total size of this frame (prefix + payload).
    #[inline]
    pub fn size(&self) -> usize {
        self.prefix.len() + self.payload.len()
    }
}

/// Configuration for the writer task.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Channel capacity for the frame queue.
    pub channel_capacity: usize,
    /// Maximum frames coalesced into one vectored write.
    pub max_batch_frames: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            max_batch_frames: DEFAULT_MAX_BATCH_FRAMES,
        }
    }
}

/// Serializes responses and queues them on the writer task.
pub struct ResponseWriter<C> {
    /// Channel sender for frames.
    tx: mpsc::Sender<OutboundFrame>,
    /// Codec used to encode responses.
    codec: Arc<C>,
}

impl<C: MessageCodec> ResponseWriter<C> {
    /// Spawn the writer task over `writer` and return a handle for sending
    /// responses.
    ///
    /// The JoinHandle resolves once every queued frame has been written and
    /// the stream shut down, which happens after all writers are dropped.
    /// It yields the first write failure otherwise.
    pub fn spawn<W>(writer: W, codec: Arc<C>, config: WriterConfig) -> (Self, JoinHandle<Result<()>>)
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));
        let task = tokio::spawn(writer_loop(rx, writer, config.max_batch_frames.max(1)));

        (Self { tx, codec }, task)
    }

    /// Encode `response` and write it as one frame.
    ///
    /// With `force_flush`, waits until the frame has been written and the
    /// stream flushed. Otherwise returns once the frame is queued.
    pub async fn write(&self, response: &C::Response, force_flush: bool) -> Result<()> {
        let payload = self.codec.encode_response(response)?;
        self.write_payload(payload, force_flush).await
    }

    /// Write an already-encoded payload as one frame.
    pub async fn write_payload(&self, payload: Bytes, force_flush: bool) -> Result<()> {
        if !force_flush {
            return self.send(OutboundFrame::new(payload)).await;
        }

        let (ack_tx, ack_rx) = oneshot::channel();
        self.send(OutboundFrame::with_flush_ack(payload, ack_tx))
            .await?;

        // Sender dropped without acking: the writer task failed
        ack_rx.await.map_err(|_| AbciError::ConnectionClosed)
    }

    async fn send(&self, frame: OutboundFrame) -> Result<()> {
        self.tx
            .send(frame)
            .await
            .map_err(|_| AbciError::ConnectionClosed)
    }

    /// Check if the writer task has stopped accepting frames.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Main writer loop - receives frames and writes them to the stream.
async fn writer_loop<W>(
    mut rx: mpsc::Receiver<OutboundFrame>,
    mut writer: W,
    max_batch: usize,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut batch = Vec::with_capacity(max_batch);

    while let Some(first) = rx.recv().await {
        batch.push(first);

        // Collect additional ready frames (non-blocking)
        while batch.len() < max_batch {
            match rx.try_recv() {
                Ok(frame) => batch.push(frame),
                Err(_) => break,
            }
        }

        if let Err(e) = write_batch(&mut writer, &batch).await {
            tracing::error!("Writer task failed: {}", e);
            return Err(e);
        }

        for frame in batch.drain(..) {
            if let Some(ack) = frame.flushed {
                let _ = ack.send(());
            }
        }
    }

    // Channel closed, clean shutdown
    writer.shutdown().await.map_err(AbciError::Write)
}

/// Write a batch of frames using scatter/gather I/O (write_vectored), then
/// flush.
async fn write_batch<W>(writer: &mut W, batch: &[OutboundFrame]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let total_size: usize = batch.iter().map(OutboundFrame::size).sum();
    let mut total_written = 0;

    while total_written < total_size {
        let slices = build_remaining_slices(batch, total_written);
        let written = writer
            .write_vectored(&slices)
            .await
            .map_err(AbciError::Write)?;

        if written == 0 {
            return Err(AbciError::Write(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                "write_vectored returned 0",
            )));
        }

        total_written += written;
    }

    writer.flush().await.map_err(AbciError::Write)
}

/// Build IoSlice array for the data remaining after `skip_bytes`.
fn build_remaining_slices(batch: &[OutboundFrame], skip_bytes: usize) -> Vec<IoSlice<'_>> {
    let mut slices = Vec::with_capacity(batch.len() * 2);
    let mut offset = 0;

    for frame in batch {
        for part in [frame.prefix.as_bytes(), &frame.payload[..]] {
            let end = offset + part.len();
            if skip_bytes < end && !part.is_empty() {
                let start = skip_bytes.saturating_sub(offset);
                slices.push(IoSlice::new(&part[start..]));
            }
            offset = end;
        }
    }

    slices
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{RawCodec, RawResponse};
    use std::io::Cursor;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use std::time::Duration;
    use tokio::io::{duplex, AsyncReadExt};

    fn spawn_raw<W>(writer: W) -> (ResponseWriter<RawCodec>, JoinHandle<Result<()>>)
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        ResponseWriter::spawn(writer, Arc::new(RawCodec), WriterConfig::default())
    }

    /// Writer that fails every operation.
    struct BrokenPipe;

    impl AsyncWrite for BrokenPipe {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &[u8],
        ) -> Poll<std::io::Result<usize>> {
            Poll::Ready(Err(std::io::ErrorKind::BrokenPipe.into()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[test]
    fn test_outbound_frame_creation() {
        let frame = OutboundFrame::new(Bytes::from_static(b"hello"));

        assert_eq!(frame.prefix.as_bytes(), &[10]);
        assert_eq!(frame.payload.len(), 5);
        assert_eq!(frame.size(), 6);
    }

    #[test]
    fn test_outbound_frame_empty() {
        let frame = OutboundFrame::new(Bytes::new());

        assert!(frame.payload.is_empty());
        assert_eq!(frame.size(), 1);
    }

    #[test]
    fn test_writer_config_default() {
        let config = WriterConfig::default();
        assert_eq!(config.channel_capacity, DEFAULT_CHANNEL_CAPACITY);
        assert_eq!(config.max_batch_frames, DEFAULT_MAX_BATCH_FRAMES);
    }

    #[test]
    fn test_build_remaining_slices_no_skip() {
        let batch = vec![OutboundFrame::new(Bytes::from_static(b"hello"))];

        let slices = build_remaining_slices(&batch, 0);
        assert_eq!(slices.len(), 2); // prefix + payload
    }

    #[test]
    fn test_build_remaining_slices_partial_prefix() {
        let batch = vec![OutboundFrame::new(Bytes::from(vec![0u8; 300]))];
        assert_eq!(batch[0].prefix.len(), 2);

        let slices = build_remaining_slices(&batch, 1);
        assert_eq!(slices.len(), 2);
        assert_eq!(slices[0].len(), 1);
        assert_eq!(slices[1].len(), 300);
    }

    #[test]
    fn test_build_remaining_slices_skip_prefix() {
        let batch = vec![OutboundFrame::new(Bytes::from_static(b"hello"))];

        let slices = build_remaining_slices(&batch, 1);
        assert_eq!(slices.len(), 1);
        assert_eq!(slices[0].len(), 5);
    }

    #[test]
    fn test_build_remaining_slices_skips_empty_payload() {
        let batch = vec![
            OutboundFrame::new(Bytes::new()),
            OutboundFrame::new(Bytes::from_static(b"abc")),
        ];

        let slices = build_remaining_slices(&batch, 0);
        assert_eq!(slices.len(), 3);
    }

    #[tokio::test]
    async fn test_write_batch_single() {
        let mut buf = Cursor::new(Vec::new());
        let batch = vec![OutboundFrame::new(Bytes::from_static(b"hello"))];

        write_batch(&mut buf, &batch).await.unwrap();

        assert_eq!(buf.into_inner(), b"\x0ahello".to_vec());
    }

    #[tokio::test]
    async fn test_write_batch_multiple() {
        let mut buf = Cursor::new(Vec::new());
        let batch: Vec<_> = (0..5)
            .map(|_| OutboundFrame::new(Bytes::from_static(b"abc")))
            .collect();

        write_batch(&mut buf, &batch).await.unwrap();

        let written = buf.into_inner();
        assert_eq!(written.len(), 5 * 4);
        assert_eq!(&written[..4], b"\x06abc");
    }

    #[tokio::test]
    async fn test_write_encodes_response_with_prefix() {
        let (client, mut server) = duplex(4096);
        let (writer, _task) = spawn_raw(client);

        writer
            .write(&RawResponse::new(Bytes::from_static(b"pong")), true)
            .await
            .unwrap();

        let mut buf = [0u8; 5];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"\x08pong");
    }

    #[tokio::test]
    async fn test_frames_written_in_order() {
        let (client, mut server) = duplex(4096);
        let (writer, task) = spawn_raw(client);

        for i in 0..10u8 {
            writer.write_payload(Bytes::from(vec![i; 3]), false).await.unwrap();
        }
        drop(writer);
        task.await.unwrap().unwrap();

        let mut written = Vec::new();
        server.read_to_end(&mut written).await.unwrap();

        assert_eq!(written.len(), 10 * 4);
        for (i, chunk) in written.chunks(4).enumerate() {
            assert_eq!(chunk, &[6, i as u8, i as u8, i as u8]);
        }
    }

    #[tokio::test]
    async fn test_unflushed_write_does_not_wait_for_transport() {
        // Room for less than one frame; nobody reads the other end
        let (client, _server) = duplex(8);
        let (writer, _task) = spawn_raw(client);

        let result = tokio::time::timeout(
            Duration::from_millis(100),
            writer.write_payload(Bytes::from(vec![1u8; 64]), false),
        )
        .await;

        assert!(result.is_ok(), "unflushed write should return once queued");
        assert!(result.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_forced_flush_waits_for_transport() {
        let (client, mut server) = duplex(8);
        let (writer, _task) = spawn_raw(client);
        let writer = Arc::new(writer);

        let pending = {
            let writer = writer.clone();
            tokio::spawn(async move { writer.write_payload(Bytes::from(vec![1u8; 64]), true).await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!pending.is_finished(), "flush must wait until the peer drains");

        // Two-byte prefix for a 64-byte payload
        let mut buf = vec![0u8; 66];
        server.read_exact(&mut buf).await.unwrap();

        pending.await.unwrap().unwrap();
        assert_eq!(&buf[..2], &[0x80, 0x01]);
        assert!(buf[2..].iter().all(|&b| b == 1));
    }

    #[tokio::test]
    async fn test_write_failure_surfaces_from_task() {
        let (writer, task) = spawn_raw(BrokenPipe);

        // Forced flush observes the failure as a closed connection
        let result = writer.write_payload(Bytes::from_static(b"x"), true).await;
        assert!(matches!(result, Err(AbciError::ConnectionClosed)));

        // The task carries the actual write error
        match task.await.unwrap() {
            Err(AbciError::Write(e)) => assert_eq!(e.kind(), std::io::ErrorKind::BrokenPipe),
            other => panic!("expected write error, got {:?}", other),
        }
        assert!(writer.is_closed());
    }

    #[tokio::test]
    async fn test_writer_shutdown_on_channel_close() {
        let (client, _server) = duplex(4096);
        let (writer, task) = spawn_raw(client);

        drop(writer);

        let result = task.await.unwrap();
        assert!(result.is_ok());
    }
}
