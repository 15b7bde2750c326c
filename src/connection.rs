//! Per-connection request pipeline.
//!
//! A [`Connection`] owns one duplex stream and runs a strict
//! request/response cycle over it:
//!
//! ```text
//!         data arrives / bytes still buffered
//!   Idle ─────────────────────────────────────► Parsing
//!    ▲                                             │ frame decoded (reads paused)
//!    │ buffer empty or                             ▼
//!    │ incomplete frame                         Handling
//!    │                                             │ handler returned (reads resumed)
//!    │                                             ▼
//!    └───────────────────────────────────────── Writing
//!
//!   any parse / size / write failure ──► Closed
//! ```
//!
//! At most one request is in flight. The stream is only read in `Idle`, so
//! while a request is being handled or its response written, inbound bytes
//! stay with the transport. Responses are written in the order their
//! requests were parsed.
//!
//! While idle the connection also watches the writer task, so a response
//! that fails after it was queued still tears the stream down.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::sync::watch;
use tokio::task::JoinError;

use crate::classify::{classify, Failure, Outcome};
use crate::codec::{FlushIndicator, MessageCodec};
use crate::config::ConnectionConfig;
use crate::error::{AbciError, BoxError, Result};
use crate::handler::RequestHandler;
use crate::protocol::FrameReader;
use crate::writer::ResponseWriter;

/// Pipeline state of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Waiting for inbound bytes.
    Idle,
    /// Extracting and decoding the next frame.
    Parsing,
    /// A request is with the handler. Inbound reads are paused.
    Handling,
    /// The response is being written.
    Writing,
    /// The stream has been torn down.
    Closed,
}

impl ConnectionState {
    /// Whether inbound reads are paused in this state.
    pub fn reads_paused(&self) -> bool {
        matches!(self, ConnectionState::Handling)
    }
}

/// Emitted when a connection's stream is closed.
#[derive(Debug)]
pub struct Closed {
    /// Why the stream was torn down, if not cleanly.
    pub error: Option<AbciError>,
}

impl Closed {
    /// True when the connection closed without an error.
    pub fn is_clean(&self) -> bool {
        self.error.is_none()
    }
}

/// Forces a running connection to tear down its stream.
///
/// Takes effect while the connection waits for inbound bytes or for queued
/// responses to drain on close. A request already with the handler runs to
/// completion first. The close reports [`AbciError::Shutdown`].
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    /// Request teardown.
    pub fn shutdown(&self) {
        self.tx.send_replace(true);
    }
}

/// A single accepted stream and the handler serving it.
pub struct Connection<S, C, H> {
    stream: S,
    codec: Arc<C>,
    handler: Arc<H>,
    config: ConnectionConfig,
    state: watch::Sender<ConnectionState>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl<S, C, H> Connection<S, C, H>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    C: MessageCodec,
    H: RequestHandler<C::Request, C::Response>,
{
    /// Create a connection with default configuration.
    pub fn new(stream: S, codec: Arc<C>, handler: Arc<H>) -> Self {
        Self::with_config(stream, codec, handler, ConnectionConfig::default())
    }

    /// Create a connection with custom configuration.
    pub fn with_config(stream: S, codec: Arc<C>, handler: Arc<H>, config: ConnectionConfig) -> Self {
        let (state, _) = watch::channel(ConnectionState::Idle);
        let (shutdown, _) = watch::channel(false);
        Self {
            stream,
            codec,
            handler,
            config,
            state,
            shutdown: Arc::new(shutdown),
        }
    }

    /// Observe pipeline state transitions.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Handle for forcing teardown from outside [`Connection::run`].
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.shutdown.clone(),
        }
    }

    /// Serve requests until the stream closes.
    ///
    /// Returns the close event once the stream has been torn down. An
    /// unclassified handler error is returned as `Err(AbciError::Handler)`
    /// without any further handling.
    pub async fn run(self) -> Result<Closed> {
        let Connection {
            stream,
            codec,
            handler,
            config,
            state,
            shutdown,
        } = self;

        let (mut reader, write_half) = tokio::io::split(stream);
        let (writer, mut writer_task) =
            ResponseWriter::spawn(write_half, codec.clone(), config.writer);
        let mut shutdown_rx = shutdown.subscribe();

        let mut pipeline = Pipeline {
            frames: FrameReader::with_capacity_and_max_message_size(
                config.initial_buffer_capacity,
                config.max_message_size,
            ),
            codec,
            handler,
            writer,
            state,
        };
        let mut chunk = vec![0u8; config.read_chunk_size.max(1)];

        let (error, peer_eof) = loop {
            let read = tokio::select! {
                read = reader.read(&mut chunk) => read,
                joined = &mut writer_task => {
                    // The pipeline still holds a writer, so the task only ends on failure
                    let error = writer_exit(joined).unwrap_or(AbciError::ConnectionClosed);
                    tracing::debug!("Writer task ended while idle");
                    return Ok(pipeline.finish(Some(error)));
                }
                _ = shutdown_requested(&mut shutdown_rx) => {
                    writer_task.abort();
                    return Ok(pipeline.finish(Some(AbciError::Shutdown)));
                }
            };

            let n = match read {
                Ok(0) => {
                    if !pipeline.frames.is_empty() {
                        tracing::debug!(
                            "Peer closed with {} bytes of an incomplete frame buffered",
                            pipeline.frames.len()
                        );
                    }
                    break (None, true);
                }
                Ok(n) => n,
                Err(e) => break (Some(AbciError::Io(e)), true),
            };

            pipeline.frames.extend(&chunk[..n]);

            match pipeline.drain().await {
                Drain::Idle => {}
                Drain::Close(error) => break (error, false),
                Drain::Propagate(e) => {
                    pipeline.set_state(ConnectionState::Closed);
                    writer_task.abort();
                    return Err(AbciError::Handler(e));
                }
            }
        };

        let error = match error {
            // A closed channel means the writer task already failed
            Some(AbciError::ConnectionClosed) | None => {
                pipeline.set_state(ConnectionState::Closed);
                drop(pipeline.writer);

                let drained = tokio::select! {
                    joined = &mut writer_task => writer_exit(joined).or(error),
                    e = peer_reset(&mut reader, peer_eof) => Some(e),
                    _ = shutdown_requested(&mut shutdown_rx) => Some(AbciError::Shutdown),
                };
                writer_task.abort();
                return Ok(closed(drained));
            }
            Some(e) => {
                writer_task.abort();
                Some(e)
            }
        };

        Ok(pipeline.finish(error))
    }
}

/// Error carried by a finished writer task, if any.
fn writer_exit(joined: std::result::Result<Result<()>, JoinError>) -> Option<AbciError> {
    match joined {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(e),
        Err(join_error) => Some(AbciError::Io(std::io::Error::other(join_error))),
    }
}

/// Resolves once the owner has requested teardown.
async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    // The connection holds a sender, so the channel never closes here
    if rx.wait_for(|requested| *requested).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Resolves when the peer resets the stream while responses drain.
///
/// Bytes arriving after close are discarded. A half-close from the peer
/// keeps the drain going.
async fn peer_reset<R: AsyncRead + Unpin>(reader: &mut R, peer_eof: bool) -> AbciError {
    let mut discard = [0u8; 1024];
    if !peer_eof {
        loop {
            match reader.read(&mut discard).await {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => return AbciError::Io(e),
            }
        }
    }
    std::future::pending().await
}

fn closed(error: Option<AbciError>) -> Closed {
    match &error {
        None => tracing::debug!("Connection closed"),
        Some(e) => tracing::warn!("Connection closed: {}", e),
    }

    Closed { error }
}

/// Result of draining the receive buffer.
enum Drain {
    /// Buffer empty or holding an incomplete frame.
    Idle,
    /// Tear down the stream.
    Close(Option<AbciError>),
    /// Unclassified handler failure.
    Propagate(BoxError),
}

/// State owned by a running connection.
struct Pipeline<C: MessageCodec, H> {
    frames: FrameReader,
    codec: Arc<C>,
    handler: Arc<H>,
    writer: ResponseWriter<C>,
    state: watch::Sender<ConnectionState>,
}

impl<C, H> Pipeline<C, H>
where
    C: MessageCodec,
    H: RequestHandler<C::Request, C::Response>,
{
    fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
    }

    /// Handle every complete frame in the buffer, one at a time.
    async fn drain(&mut self) -> Drain {
        loop {
            self.set_state(ConnectionState::Parsing);

            let frame = match self.frames.try_extract() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    self.set_state(ConnectionState::Idle);
                    return Drain::Idle;
                }
                Err(e) => return self.resolve(classify(Failure::Frame(e))).await,
            };

            tracing::trace!(wire_len = frame.wire_len(), "Decoding request");

            let request = match self.codec.decode_request(frame.into_payload()) {
                Ok(request) => request,
                Err(source) => {
                    let buffered = self.frames.buffered();
                    return self
                        .resolve(classify(Failure::Decode { source, buffered }))
                        .await;
                }
            };

            self.set_state(ConnectionState::Handling);
            tracing::trace!("Reads paused while handling request");

            let response = match self.handler.handle(request).await {
                Ok(response) => response,
                Err(e) => return self.resolve(classify(Failure::Handler(e))).await,
            };

            tracing::trace!("Reads resumed");
            self.set_state(ConnectionState::Writing);

            let force_flush = response.flush();
            if let Err(e) = self.writer.write(&response, force_flush).await {
                return self.resolve(classify(Failure::Write(e))).await;
            }
            if self.writer.is_closed() {
                let e = AbciError::ConnectionClosed;
                return self.resolve(classify(Failure::Write(e))).await;
            }

            if self.frames.is_empty() {
                self.set_state(ConnectionState::Idle);
                return Drain::Idle;
            }
        }
    }

    async fn resolve(&mut self, outcome: Outcome<C::Response>) -> Drain {
        match outcome {
            Outcome::Destroy(e) => Drain::Close(Some(e)),
            Outcome::DeliverThenDestroy(response) => {
                self.set_state(ConnectionState::Writing);
                // Errors surface from the writer task when the stream closes
                match self.writer.write(&response, false).await {
                    Ok(()) => Drain::Close(None),
                    Err(e) => Drain::Close(Some(e)),
                }
            }
            Outcome::Propagate(e) => Drain::Propagate(e),
        }
    }

    /// Mark the connection closed once the writer task is settled.
    fn finish(self, error: Option<AbciError>) -> Closed {
        self.set_state(ConnectionState::Closed);
        closed(error)
    }
}
