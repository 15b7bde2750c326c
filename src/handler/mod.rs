//! Handler module - the application side of the connection.
//!
//! A [`RequestHandler`] receives each decoded request and produces exactly
//! one response. It signals failure through [`HandlerError`]:
//!
//! - [`HandlerError::ResponseException`] carries a response that is written
//!   to the peer before the connection closes
//! - [`HandlerError::Other`] is not recovered by the connection and is
//!   returned to its owner unchanged
//!
//! # Example
//!
//! ```
//! use abci_socket::codec::RawResponse;
//! use abci_socket::handler::{handler_fn, HandlerError};
//! use bytes::Bytes;
//!
//! let handler = handler_fn(|request: Bytes| async move {
//!     if request.is_empty() {
//!         return Err(HandlerError::ResponseException(RawResponse::new("empty request")));
//!     }
//!     Ok(RawResponse::new(request))
//! });
//! # let _ = handler;
//! ```

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::BoxError;

/// Boxed future for handler results.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Result type for handler functions.
pub type HandlerResult<Resp> = std::result::Result<Resp, HandlerError<Resp>>;

/// Failure raised by a request handler.
pub enum HandlerError<Resp> {
    /// Application-level failure with a response to deliver before closing.
    ResponseException(Resp),
    /// Any other failure. Propagated to the connection owner.
    Other(BoxError),
}

impl<Resp> HandlerError<Resp> {
    /// Wrap an arbitrary error as an unclassified failure.
    pub fn other(error: impl Into<BoxError>) -> Self {
        HandlerError::Other(error.into())
    }

    /// Returns true for a [`HandlerError::ResponseException`].
    pub fn is_response_exception(&self) -> bool {
        matches!(self, HandlerError::ResponseException(_))
    }
}

impl<Resp> fmt::Debug for HandlerError<Resp> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerError::ResponseException(_) => f.write_str("ResponseException(..)"),
            HandlerError::Other(e) => f.debug_tuple("Other").field(e).finish(),
        }
    }
}

impl<Resp> From<BoxError> for HandlerError<Resp> {
    fn from(error: BoxError) -> Self {
        HandlerError::Other(error)
    }
}

/// Trait for request handlers.
pub trait RequestHandler<Req, Resp>: Send + Sync + 'static {
    /// Handle a single request. May suspend.
    fn handle(&self, request: Req) -> BoxFuture<'static, HandlerResult<Resp>>;
}

impl<Req, Resp, H> RequestHandler<Req, Resp> for Arc<H>
where
    H: RequestHandler<Req, Resp>,
{
    fn handle(&self, request: Req) -> BoxFuture<'static, HandlerResult<Resp>> {
        (**self).handle(request)
    }
}

/// Handler built from an async closure. See [`handler_fn`].
#[derive(Clone)]
pub struct HandlerFn<F> {
    f: F,
}

/// Create a handler from an async closure.
pub fn handler_fn<F>(f: F) -> HandlerFn<F> {
    HandlerFn { f }
}

impl<F, Req, Resp, Fut> RequestHandler<Req, Resp> for HandlerFn<F>
where
    F: Fn(Req) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult<Resp>> + Send + 'static,
{
    fn handle(&self, request: Req) -> BoxFuture<'static, HandlerResult<Resp>> {
        Box::pin((self.f)(request))
    }
}
