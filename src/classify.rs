//! Error classification for the request pipeline.
//!
//! Maps each way a request cycle can fail to what the connection does next:
//!
//! | Failure                         | Outcome                                   |
//! |---------------------------------|-------------------------------------------|
//! | malformed prefix or payload     | close, reporting `AbciError::Parse`       |
//! | payload over the size limit     | close, reporting `AbciError::MessageTooLarge` |
//! | write failure                   | close, reporting the write failure        |
//! | handler `ResponseException(r)`  | write `r` once, then close                |
//! | any other handler error         | propagate to the connection owner         |

use bytes::Bytes;

use crate::error::{AbciError, BoxError};
use crate::handler::HandlerError;

/// Where a request cycle failed.
pub enum Failure<Resp> {
    /// The frame reader rejected the buffered bytes.
    Frame(AbciError),
    /// The codec could not decode an extracted payload.
    Decode {
        source: AbciError,
        /// Receive buffer contents left after the payload was consumed.
        buffered: Bytes,
    },
    /// The request handler failed.
    Handler(HandlerError<Resp>),
    /// Writing the response failed.
    Write(AbciError),
}

/// What the connection does about a failure.
pub enum Outcome<Resp> {
    /// Close the stream, surfacing the error.
    Destroy(AbciError),
    /// Write the response once without forced flush, then close.
    DeliverThenDestroy(Resp),
    /// Not handled here.
    Propagate(BoxError),
}

/// Classify a failure.
pub fn classify<Resp>(failure: Failure<Resp>) -> Outcome<Resp> {
    match failure {
        Failure::Frame(e) => match e {
            e @ (AbciError::Parse { .. } | AbciError::MessageTooLarge { .. }) => {
                Outcome::Destroy(e)
            }
            other => Outcome::Destroy(AbciError::parse(other, Bytes::new())),
        },
        Failure::Decode { source, buffered } => Outcome::Destroy(AbciError::parse(source, buffered)),
        Failure::Handler(HandlerError::ResponseException(response)) => {
            Outcome::DeliverThenDestroy(response)
        }
        Failure::Handler(HandlerError::Other(e)) => Outcome::Propagate(e),
        Failure::Write(e) => Outcome::Destroy(e),
    }
}
