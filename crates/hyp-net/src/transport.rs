//! Transport seam
//!
//! The engine never talks to a socket itself; a host-supplied `Transport`
//! resolves requests and opens server-push connections. Tests use a mock
//! built from `smol::channel`; a production host wraps its HTTP client.

use std::future::Future;
use std::pin::Pin;

use crate::{NetError, Request, Response};

/// Boxed single-threaded future returned by transport calls
pub type SendFuture<T> = Pin<Box<dyn Future<Output = T> + 'static>>;

/// A chunk delivered on a server-push connection
#[derive(Debug, Clone)]
pub enum PushChunk {
    /// Raw SSE wire data (one or more lines, unparsed)
    Data(String),
    /// Connection-level error condition
    Error(String),
}

/// Host-supplied request/response and server-push primitives
pub trait Transport {
    /// Issue a request. The returned future must be `'static`: it resolves
    /// even while other engine tasks run, and may be raced against an abort
    /// signal.
    fn send(&self, req: Request) -> SendFuture<Result<Response, NetError>>;

    /// Open a server-push connection, yielding a stream of wire chunks.
    /// Channel closure signals disconnect.
    fn open_push(&self, url: &str) -> Result<smol::channel::Receiver<PushChunk>, NetError>;
}
