//! Request lifecycle orchestration
//!
//! Binds annotated elements to event listeners and runs the full dispatch
//! pipeline for each firing: confirmation, sync policy, request assembly,
//! visual side effects, transport round trip, response classification,
//! swap, and the trailing side effects (scroll, focus, history).
//!
//! The pipeline holds no document borrow across an await and re-resolves
//! nodes after the swap, since a swap can detach or replace anything.

use std::rc::Rc;

use hyp_dom::{Document, NodeId};
use hyp_net::{Method, NetError, Request, Response};
use tracing::{debug, warn};

use crate::attrs;
use crate::config::{self, RequestConfig, TriggerEvent};
use crate::engine::{Binding, BindingAction, EngineInner, ScrollRequest};
use crate::history::NavigationState;
use crate::notify::names;
use crate::oob;
use crate::prefetch;
use crate::swap::{apply_swap, strategy_or, SwapStrategy};
use crate::trigger::{parse_triggers, TriggerSpec};

/// Bind an element carrying an action attribute. Idempotent per element.
pub(crate) fn bind(inner: &Rc<EngineInner>, el: NodeId) {
    if inner.states.borrow_mut().state(el).initialized {
        return;
    }
    let Some((method, action)) = ({
        let doc = inner.doc.borrow();
        attrs::find_action(doc.tree(), el)
    }) else {
        return;
    };
    // A vetoed element stays unmarked so a later re-scan can bind it.
    if !inner.emit(names::INIT, el, serde_json::json!({ "url": action })) {
        debug!("binding vetoed");
        return;
    }
    inner.states.borrow_mut().state(el).initialized = true;

    let (default_event, trigger_attr) = {
        let doc = inner.doc.borrow();
        let default = if doc.tree().tag(el) == Some("form") {
            "submit"
        } else {
            "click"
        };
        (default, attrs::attr(doc.tree(), el, attrs::TRIGGER))
    };

    let specs = if trigger_attr.is_empty() {
        vec![TriggerSpec {
            event: default_event.to_string(),
            mods: Default::default(),
        }]
    } else {
        parse_triggers(&trigger_attr)
    };

    for spec in specs {
        let listen = match spec.from() {
            Some(selector) => {
                let doc = inner.doc.borrow();
                match doc.query_selector(selector) {
                    Some(node) => node,
                    None => {
                        warn!(selector, "from: selector matched nothing, listening locally");
                        el
                    }
                }
            }
            None => el,
        };
        inner.add_binding(Binding {
            owner: el,
            listen,
            event: spec.event.clone(),
            once: spec.once(),
            debounce: spec.debounce(),
            throttle: spec.throttle(),
            threshold: spec.threshold(),
            root_margin: spec.root_margin(),
            action: BindingAction::Dispatch {
                method,
                action: action.clone(),
            },
            removed: Default::default(),
            last_fire: Default::default(),
            generation: Default::default(),
        });
    }
    inner.emit(names::INITED, el, serde_json::Value::Null);
}

/// Bind the warm-up listeners for an `h-prefetch` anchor.
pub(crate) fn bind_prefetch(inner: &Rc<EngineInner>, el: NodeId) {
    {
        let mut states = inner.states.borrow_mut();
        let state = states.state(el);
        if state.prefetch {
            return;
        }
        state.prefetch = true;
    }
    let (url, spec) = {
        let doc = inner.doc.borrow();
        let tree = doc.tree();
        // Only GET-bearing links are prefetchable.
        match attrs::find_action(tree, el) {
            Some((Method::Get, url)) if tree.tag(el) == Some("a") => {
                (url, attrs::attr(tree, el, attrs::PREFETCH))
            }
            _ => return,
        }
    };
    let ttl = prefetch::parse_ttl(&spec);
    let events: &[&str] = if spec.split_whitespace().any(|p| p == "intersect") {
        &["intersect"]
    } else {
        &["mouseenter", "focus"]
    };
    for event in events {
        inner.add_binding(Binding {
            owner: el,
            listen: el,
            event: event.to_string(),
            once: true,
            debounce: None,
            throttle: None,
            threshold: 0.0,
            root_margin: "0px".to_string(),
            action: BindingAction::Prefetch {
                url: url.clone(),
                ttl,
            },
            removed: Default::default(),
            last_fire: Default::default(),
            generation: Default::default(),
        });
    }
}

/// Run one full request lifecycle for `el`.
pub(crate) async fn dispatch(
    inner: Rc<EngineInner>,
    el: NodeId,
    method: Method,
    action: String,
    trigger: TriggerEvent,
) {
    {
        let doc = inner.doc.borrow();
        if !doc.contains(el) || attrs::ignored(doc.tree(), el) {
            return;
        }
    }

    let confirm_msg = {
        let doc = inner.doc.borrow();
        attrs::attr(doc.tree(), el, attrs::CONFIRM)
    };
    if !confirm_msg.is_empty() {
        // Clone the handle so the confirmer runs without a registry borrow.
        let confirmer = inner.hooks.borrow().confirmer();
        let accepted = confirmer.map(|f| f(&confirm_msg)).unwrap_or(true);
        if !accepted {
            debug!("dispatch declined by confirmer");
            return;
        }
    }

    // Sync policy: an existing in-flight request either gets aborted or
    // makes this dispatch a no-op.
    let sync = {
        let doc = inner.doc.borrow();
        attrs::attr(doc.tree(), el, attrs::SYNC)
    };
    let mut abort = None;
    if !sync.is_empty() {
        let mut states = inner.states.borrow_mut();
        let state = states.state(el);
        if sync.contains("drop") && state.abort.is_some() {
            debug!("dropping dispatch, request already in flight");
            return;
        }
        if sync.contains("abort") {
            if let Some(tx) = state.abort.take() {
                let _ = tx.try_send(());
            }
        }
        let (tx, rx) = smol::channel::bounded(1);
        state.abort = Some(tx);
        state.abort_gen = state.abort_gen.wrapping_add(1);
        abort = Some((rx, state.abort_gen));
    }
    let abort_gen = abort.as_ref().map(|(_, gen)| *gen);

    let cfg = {
        let doc = inner.doc.borrow();
        build_config(&doc, el, method, &action, &trigger)
    };

    let detail = serde_json::json!({
        "method": method.as_str(),
        "url": cfg.action,
        "trigger": trigger.name,
    });
    if !inner.emit(names::BEFORE, el, detail.clone()) {
        clear_abort(&inner, el, abort_gen);
        return;
    }

    let (disabled, indicators) = {
        let mut doc = inner.doc.borrow_mut();
        apply_visuals(&mut doc, el, method)
    };

    let result = execute(&inner, &cfg, abort.map(|(rx, _)| rx)).await;

    match result {
        Ok(response) => handle_response(&inner, el, &cfg, response, detail),
        Err(err) if err.is_cancellation() => {
            debug!(url = %cfg.action, "request aborted");
        }
        Err(err) => {
            inner.emit(
                names::ERROR,
                el,
                serde_json::json!({ "url": cfg.action, "error": err.to_string() }),
            );
        }
    }

    {
        let mut doc = inner.doc.borrow_mut();
        clear_visuals(&mut doc, &disabled, &indicators);
    }
    clear_abort(&inner, el, abort_gen);
}

/// Assemble the request configuration from the element's attributes.
fn build_config(
    doc: &Document,
    el: NodeId,
    method: Method,
    action: &str,
    trigger: &TriggerEvent,
) -> RequestConfig {
    let tree = doc.tree();

    let target_sel = attrs::attr(tree, el, attrs::TARGET);
    let target = if target_sel.is_empty() || target_sel == "this" {
        el
    } else {
        match doc.query_selector(&target_sel) {
            Some(node) => node,
            None => {
                warn!(selector = %target_sel, "h-target matched nothing, using the element");
                el
            }
        }
    };

    let swap = strategy_or(&attrs::attr(tree, el, attrs::SWAP), SwapStrategy::Morph);

    let mut fields = Vec::new();
    if tree.tag(el) == Some("form") {
        fields = config::collect_form_fields(doc, el, trigger.submitter);
    }
    let include = attrs::attr(tree, el, attrs::INCLUDE);
    if !include.is_empty() {
        fields.extend(config::include_fields(doc, &include));
    }

    let header_sel = (!target_sel.is_empty()).then_some(target_sel.as_str());
    let mut headers = config::build_headers(header_sel, &attrs::attr(tree, el, attrs::HEADERS));

    let (action, body) = match method {
        Method::Get => (config::append_query(action, &fields), None),
        Method::Delete => (action.to_string(), None),
        _ => {
            let encoded: String = url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(fields.iter().map(|(k, v)| (k.as_str(), v.as_str())))
                .finish();
            headers.push((
                "Content-Type".to_string(),
                "application/x-www-form-urlencoded".to_string(),
            ));
            (action.to_string(), Some(encoded))
        }
    };

    RequestConfig {
        action,
        method,
        target,
        swap,
        body,
        headers,
    }
}

/// Perform the round trip, consuming a prefetched response when one is
/// fresh, racing the abort channel otherwise.
async fn execute(
    inner: &Rc<EngineInner>,
    cfg: &RequestConfig,
    abort_rx: Option<smol::channel::Receiver<()>>,
) -> Result<Response, NetError> {
    if cfg.method == Method::Get {
        let claimed = inner
            .prefetch
            .borrow_mut()
            .take_fresh(&cfg.action, std::time::Instant::now());
        if let Some(rx) = claimed {
            if let Ok(result) = rx.recv().await {
                debug!(url = %cfg.action, "serving prefetched response");
                return result.map(|cached| {
                    Response::with_status(cached.status, &cached.body)
                });
            }
            // Prefetch task died without reporting; fall through to a
            // normal fetch.
        }
    }

    let mut req = Request::new(cfg.method, &cfg.action);
    for (name, value) in &cfg.headers {
        req = req.with_header(name, value);
    }
    if let Some(body) = &cfg.body {
        req = req.with_body(body.clone());
    }

    let send = inner.transport.send(req);
    match abort_rx {
        Some(rx) => {
            let cancel = async {
                // Either an explicit abort signal or the sender being
                // replaced cancels this request.
                let _ = rx.recv().await;
                Err(NetError::Cancelled)
            };
            smol::future::or(send, cancel).await
        }
        None => send.await,
    }
}

fn handle_response(
    inner: &Rc<EngineInner>,
    el: NodeId,
    cfg: &RequestConfig,
    response: Response,
    detail: serde_json::Value,
) {
    let mut body = {
        let mut doc = inner.doc.borrow_mut();
        config::extract_title(&mut doc, &response.body)
    };
    let select = {
        let doc = inner.doc.borrow();
        attrs::attr(doc.tree(), el, attrs::SELECT)
    };
    if !select.is_empty() {
        body = config::select_fragment(&body, &select);
    }

    if response.status >= 400 {
        let error_target = {
            let doc = inner.doc.borrow();
            let sel = attrs::attr(doc.tree(), el, attrs::ERROR_TARGET);
            if sel.is_empty() {
                None
            } else {
                doc.query_selector(&sel)
            }
        };
        if let Some(target) = error_target {
            let mut doc = inner.doc.borrow_mut();
            if let Err(err) = apply_swap(&mut doc, target, &body, SwapStrategy::Inner) {
                warn!(%err, "error-target swap failed");
            }
        }
        inner.emit(
            names::ERROR,
            el,
            serde_json::json!({ "url": cfg.action, "status": response.status }),
        );
        return;
    }

    let mut after_detail = detail;
    after_detail["status"] = response.status.into();
    if !inner.emit(names::AFTER, el, after_detail) {
        return;
    }

    let body = {
        let mut doc = inner.doc.borrow_mut();
        oob::process_oob(&mut doc, &body)
    };

    // An outer swap replaces the target node; remember its id so scroll
    // can re-resolve afterwards.
    let target_id = {
        let doc = inner.doc.borrow();
        doc.tree()
            .element(cfg.target)
            .and_then(|e| e.id())
            .map(str::to_string)
    };

    {
        let mut doc = inner.doc.borrow_mut();
        if let Err(err) = apply_swap(&mut doc, cfg.target, &body, cfg.swap) {
            warn!(%err, "swap failed");
        }
    }

    let detached = !inner.doc.borrow().contains(el);
    inner.emit(
        names::SWAPPED,
        el,
        serde_json::json!({ "url": cfg.action }),
    );
    if detached {
        // A self-replacing outer swap leaves no element for a document
        // listener to find, so the root gets its own notification.
        inner.emit(
            names::SWAPPED,
            NodeId::ROOT,
            serde_json::json!({ "url": cfg.action }),
        );
    }

    apply_after_effects(inner, el, cfg, target_id.as_deref());
}

/// Scroll, focus and history, in that order.
fn apply_after_effects(
    inner: &Rc<EngineInner>,
    el: NodeId,
    cfg: &RequestConfig,
    target_id: Option<&str>,
) {
    let (scroll, focus, push, replace, target_sel) = {
        let doc = inner.doc.borrow();
        let tree = doc.tree();
        (
            attrs::attr(tree, el, attrs::SCROLL),
            attrs::attr(tree, el, attrs::FOCUS),
            attrs::attr(tree, el, attrs::PUSH_URL),
            attrs::attr(tree, el, attrs::REPLACE_URL),
            attrs::attr(tree, el, attrs::TARGET),
        )
    };

    if !scroll.is_empty() {
        let request = {
            let doc = inner.doc.borrow();
            match scroll.as_str() {
                "top" => Some(ScrollRequest::Top),
                "bottom" => Some(ScrollRequest::Bottom),
                "target" => {
                    let node = target_id
                        .and_then(|id| doc.get_element_by_id(id))
                        .or_else(|| doc.contains(cfg.target).then_some(cfg.target));
                    node.map(ScrollRequest::Element)
                }
                selector => doc.query_selector(selector).map(ScrollRequest::Element),
            }
        };
        if let Some(request) = request {
            inner.request_scroll(request);
        }
    }

    if !focus.is_empty() {
        let node = inner.doc.borrow().query_selector(&focus);
        if let Some(node) = node {
            inner.doc.borrow_mut().focus(node);
        }
    }

    if push.is_empty() && replace.is_empty() {
        return;
    }
    let mode_push = !push.is_empty();

    // Snapshots record the final request URL and the configured target
    // selector; a snapshot with no selector replays as a reload.
    let state = {
        let mut doc = inner.doc.borrow_mut();
        doc.set_url(&cfg.action);
        NavigationState::new(
            &cfg.action,
            (!target_sel.is_empty()).then_some(target_sel),
            cfg.swap,
            {
                let sel = attrs::attr(doc.tree(), el, attrs::SELECT);
                (!sel.is_empty()).then_some(sel)
            },
            doc.title(),
        )
    };
    let mut history = inner.history.borrow_mut();
    if mode_push {
        history.push(&state);
    } else {
        history.replace(&state);
    }
}

/// Disable the relevant controls and light up the busy indicator.
/// Returns the touched nodes so the cleanup pass can undo exactly them.
fn apply_visuals(doc: &mut Document, el: NodeId, method: Method) -> (Vec<NodeId>, Vec<NodeId>) {
    let tree = doc.tree();
    let explicit = attrs::attr(tree, el, attrs::DISABLED);
    let auto = method.is_mutating() && !attrs::has(tree, el, attrs::NO_DISABLE);

    let mut disabled = Vec::new();
    if auto || attrs::has(tree, el, attrs::DISABLED) {
        if tree.tag(el) == Some("form") {
            // Exactly the submit controls, nothing else.
            for node in tree.descendants(el) {
                let Some(control) = tree.element(node) else {
                    continue;
                };
                let is_submit = control.tag == "button"
                    || (control.tag == "input" && control.attr("type") == Some("submit"));
                if is_submit {
                    disabled.push(node);
                }
            }
        } else {
            disabled.push(el);
        }
        if !explicit.is_empty() && explicit != "true" {
            disabled.extend(doc.query_selector_all(&explicit));
        }
    }

    // Loading state goes only to a configured indicator.
    let indicator_sel = attrs::attr(doc.tree(), el, attrs::INDICATOR);
    let indicators = if indicator_sel.is_empty() {
        Vec::new()
    } else {
        doc.query_selector_all(&indicator_sel)
    };

    for &node in &disabled {
        if doc.tree().tag(node) == Some("a") {
            if let Some(e) = doc.tree_mut().element_mut(node) {
                e.add_class(attrs::DISABLED_CLASS);
                e.set_attr("aria-disabled", "true");
            }
        } else {
            doc.tree_mut().set_attr(node, "disabled", "");
        }
    }
    for &node in &indicators {
        if let Some(e) = doc.tree_mut().element_mut(node) {
            e.add_class(attrs::LOADING_CLASS);
        }
    }
    (disabled, indicators)
}

fn clear_visuals(doc: &mut Document, disabled: &[NodeId], indicators: &[NodeId]) {
    for &node in disabled {
        if let Some(e) = doc.tree_mut().element_mut(node) {
            if e.tag == "a" {
                e.remove_class(attrs::DISABLED_CLASS);
                e.remove_attr("aria-disabled");
            } else {
                e.remove_attr("disabled");
            }
        }
    }
    for &node in indicators {
        if let Some(e) = doc.tree_mut().element_mut(node) {
            e.remove_class(attrs::LOADING_CLASS);
        }
    }
}

fn clear_abort(inner: &Rc<EngineInner>, el: NodeId, gen: Option<u64>) {
    let Some(gen) = gen else {
        return;
    };
    let mut states = inner.states.borrow_mut();
    let state = states.state(el);
    // A successor may have installed its own handle; only clear ours.
    if state.abort_gen == gen {
        state.abort = None;
    }
}
