//! hyp Networking
//!
//! Request/response types and the `Transport` seam the engine issues all
//! of its traffic through. The engine treats request/response delivery and
//! server-push connections as reliable primitives supplied by the host.

mod sse;
mod transport;

pub use sse::{SseDecoder, SseEvent};
pub use transport::{PushChunk, SendFuture, Transport};

use std::collections::HashMap;

/// HTTP method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }

    /// Whether the method mutates server state
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Method::Get)
    }
}

/// Request configuration handed to the transport
#[derive(Debug, Clone, Default)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Option<String>,
}

impl Request {
    pub fn get(url: &str) -> Self {
        Self {
            method: Method::Get,
            url: url.to_string(),
            ..Default::default()
        }
    }

    pub fn new(method: Method, url: &str) -> Self {
        Self {
            method,
            url: url.to_string(),
            ..Default::default()
        }
    }

    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.headers.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_body(mut self, body: String) -> Self {
        self.body = Some(body);
        self
    }
}

/// HTTP Response
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Response {
    /// Build a bodied response (header-less), mostly for tests and mocks
    pub fn with_status(status: u16, body: &str) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.to_string(),
        }
    }

    /// Check if response is OK (2xx)
    pub fn ok(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Get a header value, case-insensitive
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Body text
    pub fn text(&self) -> &str {
        &self.body
    }
}

/// Network error
#[derive(Debug, Clone, thiserror::Error)]
pub enum NetError {
    #[error("network error: {0}")]
    Network(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("push connection failed: {0}")]
    Push(String),

    #[error("request cancelled")]
    Cancelled,
}

impl NetError {
    /// Whether this error represents intentional supersession rather than a
    /// fault (abort-policy cancellations are swallowed by callers)
    pub fn is_cancellation(&self) -> bool {
        matches!(self, NetError::Cancelled)
    }
}
