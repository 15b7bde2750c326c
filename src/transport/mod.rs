//! Transport module - listening sockets and accepted streams.
//!
//! Provides abstraction over:
//! - TCP sockets
//! - Unix Domain Sockets (unix only)

mod listener;

pub use listener::{Listener, SocketStream};
