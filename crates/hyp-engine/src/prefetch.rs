//! Prefetch cache and warm-up fetches
//!
//! `h-prefetch` on an anchor warms the cache on hover/focus (or on
//! viewport entry with `h-prefetch="intersect"`). A later GET dispatch for
//! the same URL consumes the cached response instead of refetching.
//!
//! Entries hold the receiving end of a oneshot channel rather than a
//! finished response, so a dispatch can claim an entry whose fetch is still
//! in flight and await it. Claiming removes the entry: exactly one consumer
//! wins. Expiry is checked lazily at the point of use.

use std::collections::HashMap;
use std::rc::Rc;
use std::time::{Duration, Instant};

use hyp_dom::NodeId;
use hyp_net::NetError;
use smol::channel::Receiver;
use tracing::debug;

use crate::attrs;
use crate::config;
use crate::engine::EngineInner;

/// Cached outcome of a prefetched GET
#[derive(Debug, Clone)]
pub struct PrefetchResult {
    pub status: u16,
    pub body: String,
}

struct Entry {
    rx: Receiver<Result<PrefetchResult, NetError>>,
    expires_at: Instant,
}

/// URL-keyed prefetch cache with per-entry TTL
#[derive(Default)]
pub struct PrefetchCache {
    map: HashMap<String, Entry>,
}

impl PrefetchCache {
    pub fn insert(
        &mut self,
        url: &str,
        rx: Receiver<Result<PrefetchResult, NetError>>,
        expires_at: Instant,
    ) {
        self.map.insert(url.to_string(), Entry { rx, expires_at });
    }

    pub fn has_fresh(&self, url: &str, now: Instant) -> bool {
        self.map
            .get(url)
            .map(|e| e.expires_at > now)
            .unwrap_or(false)
    }

    /// Claim the entry for `url` if it exists and has not expired. The
    /// entry is removed either way.
    pub fn take_fresh(
        &mut self,
        url: &str,
        now: Instant,
    ) -> Option<Receiver<Result<PrefetchResult, NetError>>> {
        let entry = self.map.remove(url)?;
        if entry.expires_at > now {
            Some(entry.rx)
        } else {
            debug!(url, "evicting expired prefetch entry");
            None
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Parse the TTL token of `h-prefetch="[trigger] [ttl]"`, defaulting to
/// 30 seconds.
pub(crate) fn parse_ttl(spec: &str) -> Duration {
    spec.split_whitespace()
        .nth(1)
        .and_then(crate::trigger::parse_interval)
        .unwrap_or(Duration::from_secs(30))
}

/// Fetch `url` into the cache unless a fresh entry already covers it.
pub(crate) async fn run_prefetch(inner: Rc<EngineInner>, el: NodeId, url: String, ttl: Duration) {
    if inner
        .prefetch
        .borrow()
        .has_fresh(&url, Instant::now())
    {
        return;
    }

    let (headers_attr, target_sel) = {
        let doc = inner.doc.borrow();
        let tree = doc.tree();
        (
            attrs::attr(tree, el, attrs::HEADERS),
            attrs::attr(tree, el, attrs::TARGET),
        )
    };
    let mut req = hyp_net::Request::get(&url);
    let header_sel = (!target_sel.is_empty()).then_some(target_sel.as_str());
    for (name, value) in config::build_headers(header_sel, &headers_attr) {
        req = req.with_header(&name, &value);
    }

    let (tx, rx) = smol::channel::bounded(1);
    // Insert before awaiting the transport so a dispatch racing this
    // prefetch finds the entry and awaits it.
    inner
        .prefetch
        .borrow_mut()
        .insert(&url, rx, Instant::now() + ttl);
    debug!(url, "prefetching");

    let fut = inner.transport.send(req);
    let result = fut.await.map(|res| PrefetchResult {
        status: res.status,
        body: res.body,
    });
    let _ = tx.try_send(result);
}
