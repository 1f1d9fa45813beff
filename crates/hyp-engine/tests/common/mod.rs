//! Shared test harness: a scriptable in-memory transport.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use hyp_net::{NetError, PushChunk, Request, Response, SendFuture, Transport};
use smol::channel::{Receiver, Sender};

enum Reply {
    Now(Result<Response, NetError>),
    Wait(Receiver<Result<Response, NetError>>),
}

/// Transport that replays queued responses and records every request.
#[derive(Clone, Default)]
pub struct MockTransport {
    requests: Rc<RefCell<Vec<Request>>>,
    replies: Rc<RefCell<VecDeque<Reply>>>,
    push: Rc<RefCell<Option<Receiver<PushChunk>>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_ok(&self, body: &str) {
        self.replies
            .borrow_mut()
            .push_back(Reply::Now(Ok(Response::with_status(200, body))));
    }

    pub fn queue_status(&self, status: u16, body: &str) {
        self.replies
            .borrow_mut()
            .push_back(Reply::Now(Ok(Response::with_status(status, body))));
    }

    #[allow(dead_code)]
    pub fn queue_err(&self) {
        self.replies
            .borrow_mut()
            .push_back(Reply::Now(Err(NetError::Network(
                "connection refused".to_string(),
            ))));
    }

    /// Queue a response that completes only when the returned sender fires.
    #[allow(dead_code)]
    pub fn queue_deferred(&self) -> Sender<Result<Response, NetError>> {
        let (tx, rx) = smol::channel::bounded(1);
        self.replies.borrow_mut().push_back(Reply::Wait(rx));
        tx
    }

    /// Arm the next `open_push` call with a scripted chunk stream.
    #[allow(dead_code)]
    pub fn arm_push(&self) -> Sender<PushChunk> {
        let (tx, rx) = smol::channel::unbounded();
        *self.push.borrow_mut() = Some(rx);
        tx
    }

    pub fn request_count(&self) -> usize {
        self.requests.borrow().len()
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.borrow().clone()
    }

    pub fn last_request(&self) -> Request {
        self.requests
            .borrow()
            .last()
            .cloned()
            .expect("no request was sent")
    }
}

impl Transport for MockTransport {
    fn send(&self, req: Request) -> SendFuture<Result<Response, NetError>> {
        self.requests.borrow_mut().push(req);
        let reply = self.replies.borrow_mut().pop_front();
        Box::pin(async move {
            match reply {
                Some(Reply::Now(result)) => result,
                Some(Reply::Wait(rx)) => rx
                    .recv()
                    .await
                    .unwrap_or(Err(NetError::Network("reply channel closed".to_string()))),
                None => Ok(Response::with_status(200, "")),
            }
        })
    }

    fn open_push(&self, _url: &str) -> Result<Receiver<PushChunk>, NetError> {
        self.push
            .borrow_mut()
            .take()
            .ok_or_else(|| NetError::Push("no stream scripted".to_string()))
    }
}

/// Route engine tracing to the test output, honoring `RUST_LOG`.
pub fn init_logging() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Yield repeatedly so tasks spawned on the engine's executor get to run.
/// Use inside `Engine::run`, which interleaves spawned tasks between polls.
#[allow(dead_code)]
pub async fn settle() {
    for _ in 0..64 {
        smol::future::yield_now().await;
    }
}
