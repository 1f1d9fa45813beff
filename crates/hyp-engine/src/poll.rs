//! Polling loop
//!
//! `h-poll="URL [interval]"` fetches the URL on a timer and swaps the
//! response into the element's target. The loop stops on its own once the
//! element leaves the document; individual round-trip failures are logged
//! and the loop keeps going.

use std::rc::Rc;
use std::time::Duration;

use hyp_dom::NodeId;
use hyp_net::Request;
use tracing::{debug, warn};

use crate::attrs;
use crate::config;
use crate::engine::EngineInner;
use crate::notify::names;
use crate::oob;
use crate::swap::{apply_swap, strategy_or, SwapStrategy};
use crate::trigger::parse_interval;

const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);

pub(crate) fn init_poll(inner: &Rc<EngineInner>, el: NodeId) {
    {
        let mut states = inner.states.borrow_mut();
        let state = states.state(el);
        if state.poll {
            return;
        }
        state.poll = true;
    }

    let (url, interval, target_sel, select, swap) = {
        let doc = inner.doc.borrow();
        let tree = doc.tree();
        let spec = attrs::attr(tree, el, attrs::POLL);
        let mut parts = spec.split_whitespace();
        let Some(url) = parts.next() else {
            return;
        };
        let interval = parts
            .next()
            .and_then(parse_interval)
            .unwrap_or(DEFAULT_INTERVAL);
        (
            url.to_string(),
            interval,
            attrs::attr(tree, el, attrs::TARGET),
            attrs::attr(tree, el, attrs::SELECT),
            strategy_or(&attrs::attr(tree, el, attrs::SWAP), SwapStrategy::Inner),
        )
    };

    inner.emit(
        names::POLL_START,
        el,
        serde_json::json!({ "url": url, "interval_ms": interval.as_millis() as u64 }),
    );

    let task = inner.clone();
    inner.spawn(async move {
        let inner = task;
        loop {
            smol::Timer::after(interval).await;
            if !inner.doc.borrow().contains(el) {
                debug!(url, "poll element left the document, stopping");
                return;
            }
            poll_tick(&inner, el, &url, &target_sel, &select, swap).await;
        }
    });
}

async fn poll_tick(
    inner: &Rc<EngineInner>,
    el: NodeId,
    url: &str,
    target_sel: &str,
    select: &str,
    swap: SwapStrategy,
) {
    let mut req = Request::get(url);
    let header_sel = (!target_sel.is_empty()).then_some(target_sel);
    for (name, value) in config::build_headers(header_sel, "") {
        req = req.with_header(&name, &value);
    }

    let response = match inner.transport.send(req).await {
        Ok(res) => res,
        Err(err) => {
            warn!(%err, url, "poll fetch failed");
            return;
        }
    };
    if !response.ok() {
        warn!(status = response.status, url, "poll returned an error status");
        return;
    }

    // Re-resolve per round trip; the target may have been swapped since.
    // A selector that no longer matches falls back to the element itself.
    let target = {
        let doc = inner.doc.borrow();
        let from_sel = if target_sel.is_empty() || target_sel == "this" {
            None
        } else {
            doc.query_selector(target_sel)
        };
        from_sel.or_else(|| doc.contains(el).then_some(el))
    };
    let Some(target) = target else {
        debug!(selector = target_sel, "poll target missing, skipping round");
        return;
    };

    let mut body = response.body;
    if !select.is_empty() {
        body = config::select_fragment(&body, select);
    }
    {
        let mut doc = inner.doc.borrow_mut();
        let body = oob::process_oob(&mut doc, &body);
        if let Err(err) = apply_swap(&mut doc, target, &body, swap) {
            warn!(%err, "poll swap failed");
        }
    }
    inner.emit(names::POLL, el, serde_json::json!({ "url": url }));
}
