//! Engine core
//!
//! [`Engine`] owns the document, the transport, and a single-threaded
//! cooperative executor. The host embeds it headlessly: it forwards DOM
//! events with [`Engine::fire_event`], drives spawned work with
//! [`Engine::tick`] or [`Engine::run`], and reads effects back out of the
//! document, the notification log and the scroll queue.
//!
//! All interior state lives behind `RefCell`s inside a shared
//! `Rc<EngineInner>`; spawned tasks capture the `Rc`. Borrows are never
//! held across await points. The resulting `Rc` cycle (executor holding
//! tasks holding the `Rc`) is process-lifetime state, matching how a page
//! holds its engine until teardown.

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::future::Future;
use std::rc::Rc;
use std::time::{Duration, Instant};

use hyp_dom::{Document, NodeId};
use hyp_net::{Method, Transport};
use smol::LocalExecutor;
use tracing::debug;

use crate::history::{self, HistoryStack, NavigationState, ReplayOutcome};
use crate::notify::{Hooks, Notice};
use crate::orchestrator;
use crate::poll;
use crate::prefetch::{self, PrefetchCache};
use crate::sse;
use crate::state::StateTable;
use crate::swap::SwapStrategy;
use crate::{attrs, config};

/// Scroll effect requested by `h-scroll`, queued for the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollRequest {
    Top,
    Bottom,
    Element(NodeId),
}

/// Extra event context supplied by the host
#[derive(Debug, Clone, Default)]
pub struct EventInit {
    /// Submit button that initiated a form submission.
    pub submitter: Option<NodeId>,
}

pub(crate) enum BindingAction {
    Dispatch { method: Method, action: String },
    Prefetch { url: String, ttl: Duration },
}

/// One registered event listener
pub(crate) struct Binding {
    /// Element the dispatch runs against.
    pub owner: NodeId,
    /// Element whose events this binding matches (differs from `owner`
    /// under `from:`).
    pub listen: NodeId,
    pub event: String,
    pub once: bool,
    pub debounce: Option<Duration>,
    pub throttle: Option<Duration>,
    /// Observer geometry for `intersect` triggers, recorded for the host.
    pub threshold: f32,
    pub root_margin: String,
    pub action: BindingAction,
    pub removed: Cell<bool>,
    pub last_fire: Cell<Option<Instant>>,
    /// Debounce generation; a newer firing invalidates older sleepers.
    pub generation: Cell<u64>,
}

pub(crate) struct EngineInner {
    pub doc: RefCell<Document>,
    pub transport: Box<dyn Transport>,
    pub hooks: RefCell<Hooks>,
    pub states: RefCell<StateTable>,
    pub prefetch: RefCell<PrefetchCache>,
    pub history: RefCell<HistoryStack>,
    pub bindings: RefCell<Vec<Rc<Binding>>>,
    pub scrolls: RefCell<Vec<ScrollRequest>>,
    executor: LocalExecutor<'static>,
}

impl EngineInner {
    /// Emit a notification. The handler chain runs with no borrow held on
    /// the registry, so handlers may call back into the engine.
    pub fn emit(&self, name: &str, target: NodeId, detail: serde_json::Value) -> bool {
        let notice = Notice {
            name: name.to_string(),
            target,
            detail,
        };
        let chain = {
            let mut hooks = self.hooks.borrow_mut();
            hooks.record(notice.clone());
            hooks.chain(name)
        };
        for handler in chain {
            if !handler(&notice) {
                debug!(name, "notification vetoed");
                return false;
            }
        }
        true
    }

    pub fn add_binding(&self, binding: Binding) {
        self.bindings.borrow_mut().push(Rc::new(binding));
    }

    pub fn request_scroll(&self, request: ScrollRequest) {
        self.scrolls.borrow_mut().push(request);
    }

    pub fn spawn(self: &Rc<Self>, fut: impl Future<Output = ()> + 'static) {
        self.executor.spawn(fut).detach();
    }
}

/// The hypermedia engine. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Engine {
    inner: Rc<EngineInner>,
}

impl Engine {
    /// Parse `html` into the live document and set up an empty engine
    /// around it. The current page becomes the initial history entry.
    pub fn new(html: &str, url: &str, transport: impl Transport + 'static) -> Engine {
        let doc = hyp_html::parse_with_url(html, url);
        let initial =
            NavigationState::new(url, None, SwapStrategy::Morph, None, doc.title());
        let engine = Engine {
            inner: Rc::new(EngineInner {
                doc: RefCell::new(doc),
                transport: Box::new(transport),
                hooks: RefCell::new(Hooks::default()),
                states: RefCell::new(StateTable::default()),
                prefetch: RefCell::new(PrefetchCache::default()),
                history: RefCell::new(HistoryStack::default()),
                bindings: RefCell::new(Vec::new()),
                scrolls: RefCell::new(Vec::new()),
                executor: LocalExecutor::new(),
            }),
        };
        engine.inner.history.borrow_mut().replace(&initial);
        engine
    }

    /// Scan the whole document for annotated elements and bind them.
    pub fn process_document(&self) {
        let root = {
            let doc = self.inner.doc.borrow();
            doc.body().or_else(|| doc.document_element())
        };
        if let Some(root) = root {
            self.process(root);
        }
    }

    /// Scan `node` and its descendants for annotated elements and bind
    /// them. Call after swapping in content that carries annotations of
    /// its own.
    pub fn process(&self, node: NodeId) {
        let candidates: Vec<NodeId> = {
            let doc = self.inner.doc.borrow();
            if !doc.contains(node) || attrs::ignored(doc.tree(), node) {
                return;
            }
            std::iter::once(node)
                .chain(doc.tree().descendants(node))
                .filter(|&n| doc.tree().element(n).is_some())
                .collect()
        };
        for el in candidates {
            let (ignored, has_action, has_sse, has_poll, has_prefetch) = {
                let doc = self.inner.doc.borrow();
                let tree = doc.tree();
                (
                    attrs::ignored(tree, el),
                    attrs::find_action(tree, el).is_some(),
                    attrs::has(tree, el, attrs::SSE),
                    attrs::has(tree, el, attrs::POLL),
                    attrs::has(tree, el, attrs::PREFETCH),
                )
            };
            if ignored {
                continue;
            }
            if has_action {
                orchestrator::bind(&self.inner, el);
            }
            if has_sse {
                sse::init_sse(&self.inner, el);
            }
            if has_poll {
                poll::init_poll(&self.inner, el);
            }
            if has_prefetch {
                orchestrator::bind_prefetch(&self.inner, el);
            }
        }
    }

    /// Deliver a DOM event to the engine.
    pub fn fire_event(&self, target: NodeId, event: &str) {
        self.fire_event_with(target, event, EventInit::default());
    }

    /// Deliver a DOM event with extra context (e.g. the submit button).
    pub fn fire_event_with(&self, target: NodeId, event: &str, init: EventInit) {
        let matched: Vec<Rc<Binding>> = self
            .inner
            .bindings
            .borrow()
            .iter()
            .filter(|b| !b.removed.get() && b.listen == target && b.event == event)
            .cloned()
            .collect();
        for binding in matched {
            if binding.removed.get() {
                continue;
            }
            if binding.once {
                binding.removed.set(true);
            }
            if let Some(window) = binding.throttle {
                if let Some(last) = binding.last_fire.get() {
                    if last.elapsed() < window {
                        debug!(event, "throttled");
                        continue;
                    }
                }
            }
            binding.last_fire.set(Some(Instant::now()));

            let inner = self.inner.clone();
            let init = init.clone();
            let event = event.to_string();
            self.inner.spawn(async move {
                if let Some(delay) = binding.debounce {
                    let generation = binding.generation.get().wrapping_add(1);
                    binding.generation.set(generation);
                    smol::Timer::after(delay).await;
                    if binding.generation.get() != generation {
                        // A later firing superseded this one.
                        return;
                    }
                }
                match &binding.action {
                    BindingAction::Dispatch { method, action } => {
                        let trigger = config::TriggerEvent {
                            name: event,
                            submitter: init.submitter,
                        };
                        orchestrator::dispatch(
                            inner,
                            binding.owner,
                            *method,
                            action.clone(),
                            trigger,
                        )
                        .await;
                    }
                    BindingAction::Prefetch { url, ttl } => {
                        prefetch::run_prefetch(inner, binding.owner, url.clone(), *ttl).await;
                    }
                }
            });
        }
    }

    /// Report that `node` entered the viewport.
    pub fn intersect(&self, node: NodeId) {
        self.fire_event(node, "intersect");
    }

    /// Elements waiting on viewport entry, with their observer geometry
    /// (threshold, root margin). The host wires these to its own
    /// intersection machinery and reports entries via [`Engine::intersect`].
    pub fn intersection_targets(&self) -> Vec<(NodeId, f32, String)> {
        self.inner
            .bindings
            .borrow()
            .iter()
            .filter(|b| !b.removed.get() && b.event == "intersect")
            .map(|b| (b.listen, b.threshold, b.root_margin.clone()))
            .collect()
    }

    /// Run one pending task step. Returns false when nothing was ready.
    pub fn tick(&self) -> bool {
        self.inner.executor.try_tick()
    }

    /// Drive the executor while awaiting `fut`.
    pub async fn run<T>(&self, fut: impl Future<Output = T>) -> T {
        self.inner.executor.run(fut).await
    }

    /// Replay a history state payload handed back by the host's popstate
    /// handler.
    pub async fn handle_popstate(&self, payload: serde_json::Value) -> ReplayOutcome {
        history::replay(self.inner.clone(), payload).await
    }

    /// Traverse the in-process history stack one entry back and replay it.
    pub async fn history_back(&self) -> ReplayOutcome {
        let payload = self.inner.history.borrow_mut().back();
        match payload {
            Some(payload) => self.handle_popstate(payload).await,
            None => ReplayOutcome::Ignored,
        }
    }

    /// Traverse the in-process history stack one entry forward.
    pub async fn history_forward(&self) -> ReplayOutcome {
        let payload = self.inner.history.borrow_mut().forward();
        match payload {
            Some(payload) => self.handle_popstate(payload).await,
            None => ReplayOutcome::Ignored,
        }
    }

    pub fn document(&self) -> Ref<'_, Document> {
        self.inner.doc.borrow()
    }

    pub fn document_mut(&self) -> RefMut<'_, Document> {
        self.inner.doc.borrow_mut()
    }

    /// Register a notification handler. Returning false from a handler
    /// vetoes the veto-able notifications.
    pub fn on<F>(&self, name: &str, handler: F)
    where
        F: Fn(&Notice) -> bool + 'static,
    {
        self.inner.hooks.borrow_mut().on(name, handler);
    }

    /// Install the `h-confirm` prompt handler.
    pub fn set_confirmer<F>(&self, confirmer: F)
    where
        F: Fn(&str) -> bool + 'static,
    {
        self.inner.hooks.borrow_mut().set_confirmer(confirmer);
    }

    /// Names of every notification emitted so far, in order.
    pub fn notification_names(&self) -> Vec<String> {
        self.inner.hooks.borrow().names()
    }

    /// Full notification log.
    pub fn notices(&self) -> Vec<Notice> {
        self.inner.hooks.borrow().log().to_vec()
    }

    /// Drain the queued scroll effects.
    pub fn scroll_requests(&self) -> Vec<ScrollRequest> {
        std::mem::take(&mut *self.inner.scrolls.borrow_mut())
    }

    pub fn prefetch_cache(&self) -> RefMut<'_, PrefetchCache> {
        self.inner.prefetch.borrow_mut()
    }

    pub fn history_stack(&self) -> Ref<'_, HistoryStack> {
        self.inner.history.borrow()
    }
}
