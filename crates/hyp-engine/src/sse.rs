//! Server-sent event routing
//!
//! `h-sse` opens a push channel and swaps incoming payloads into the
//! document. Child `<template h-sse-on="...">` elements route named event
//! types to their own targets; anything arriving as a plain `message`
//! lands on the subscribing element itself.

use std::rc::Rc;

use hyp_dom::NodeId;
use hyp_net::{PushChunk, SseDecoder, SseEvent};
use tracing::{debug, warn};

use crate::attrs;
use crate::engine::EngineInner;
use crate::notify::names;
use crate::oob;
use crate::swap::{apply_swap, strategy_or, SwapStrategy};

struct Route {
    /// Event type this route claims, `message` for the default route.
    event: String,
    /// Target selector, re-resolved per message. Empty means the
    /// subscribing element.
    target: String,
    swap: SwapStrategy,
}

pub(crate) fn init_sse(inner: &Rc<EngineInner>, el: NodeId) {
    {
        let mut states = inner.states.borrow_mut();
        let state = states.state(el);
        if state.sse {
            return;
        }
        state.sse = true;
    }

    let (url, routes) = {
        let doc = inner.doc.borrow();
        let tree = doc.tree();
        let url = attrs::attr(tree, el, attrs::SSE);
        if url.is_empty() {
            return;
        }
        let mut routes = Vec::new();
        for node in tree.descendants(el) {
            if tree.tag(node) != Some("template") {
                continue;
            }
            let event = attrs::attr(tree, node, attrs::SSE_ON);
            if event.is_empty() {
                continue;
            }
            routes.push(Route {
                event,
                target: attrs::attr(tree, node, attrs::TARGET),
                swap: strategy_or(&attrs::attr(tree, node, attrs::SWAP), SwapStrategy::Append),
            });
        }
        routes.push(Route {
            event: "message".to_string(),
            target: String::new(),
            swap: strategy_or(&attrs::attr(tree, el, attrs::SWAP), SwapStrategy::Append),
        });
        (url, routes)
    };

    let rx = match inner.transport.open_push(&url) {
        Ok(rx) => rx,
        Err(err) => {
            warn!(%err, url, "push channel failed to open");
            inner.emit(
                names::SSE_ERROR,
                el,
                serde_json::json!({ "url": url, "error": err.to_string() }),
            );
            return;
        }
    };
    inner.emit(names::SSE_CONNECT, el, serde_json::json!({ "url": url }));

    let task = inner.clone();
    inner.spawn(async move {
        let inner = task;
        let mut decoder = SseDecoder::new();
        while let Ok(chunk) = rx.recv().await {
            match chunk {
                PushChunk::Data(data) => {
                    for event in decoder.feed(&data) {
                        deliver(&inner, el, &routes, event);
                    }
                }
                PushChunk::Error(message) => {
                    inner.emit(
                        names::SSE_ERROR,
                        el,
                        serde_json::json!({ "error": message }),
                    );
                    return;
                }
            }
        }
        // Channel closed; flush any unterminated trailing event.
        if let Some(event) = decoder.finish() {
            deliver(&inner, el, &routes, event);
        }
    });
}

fn deliver(inner: &Rc<EngineInner>, el: NodeId, routes: &[Route], event: SseEvent) {
    let Some(route) = routes.iter().find(|r| r.event == event.event_type) else {
        debug!(event = %event.event_type, "no route for push event");
        return;
    };
    let target = {
        let doc = inner.doc.borrow();
        if route.target.is_empty() {
            doc.contains(el).then_some(el)
        } else {
            doc.query_selector(&route.target)
        }
    };
    let Some(target) = target else {
        debug!(selector = %route.target, "push route target missing");
        return;
    };
    {
        let mut doc = inner.doc.borrow_mut();
        let body = oob::process_oob(&mut doc, &event.data);
        if let Err(err) = apply_swap(&mut doc, target, &body, route.swap) {
            warn!(%err, "push swap failed");
        }
    }
    inner.emit(
        names::SSE_MESSAGE,
        el,
        serde_json::json!({ "event": event.event_type }),
    );
}
