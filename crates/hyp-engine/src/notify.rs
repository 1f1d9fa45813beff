//! Lifecycle notifications
//!
//! Every observable engine step emits a named notification carrying the
//! originating node and a JSON detail payload. Hosts subscribe per name;
//! for the veto-able names (`init`, `before`, `after`) a handler returning false
//! cancels the step. All emissions are also recorded in an ordered log the
//! host can drain, which the tests lean on heavily.

use std::collections::HashMap;
use std::rc::Rc;

use hyp_dom::NodeId;

/// Notification names, in rough lifecycle order.
pub mod names {
    /// Element discovered, about to be bound. Veto-able.
    pub const INIT: &str = "init";
    /// Element bound.
    pub const INITED: &str = "inited";
    /// Request about to be sent. Veto-able.
    pub const BEFORE: &str = "before";
    /// Response received, swap about to run. Veto-able.
    pub const AFTER: &str = "after";
    /// Request failed or returned an error status.
    pub const ERROR: &str = "error";
    /// Swap applied.
    pub const SWAPPED: &str = "swapped";
    /// Push channel opened.
    pub const SSE_CONNECT: &str = "sse-connect";
    /// Push message applied.
    pub const SSE_MESSAGE: &str = "sse-message";
    /// Push channel failed.
    pub const SSE_ERROR: &str = "sse-error";
    /// Polling loop started.
    pub const POLL_START: &str = "poll-start";
    /// One polling round trip applied.
    pub const POLL: &str = "poll";
}

/// One emitted notification
#[derive(Debug, Clone)]
pub struct Notice {
    pub name: String,
    pub target: NodeId,
    pub detail: serde_json::Value,
}

pub(crate) type Handler = Rc<dyn Fn(&Notice) -> bool>;
pub(crate) type Confirmer = Rc<dyn Fn(&str) -> bool>;

/// Handler registry plus the emission log
#[derive(Default)]
pub struct Hooks {
    chains: HashMap<String, Vec<Handler>>,
    confirmer: Option<Confirmer>,
    log: Vec<Notice>,
}

impl Hooks {
    pub fn on<F>(&mut self, name: &str, handler: F)
    where
        F: Fn(&Notice) -> bool + 'static,
    {
        self.chains
            .entry(name.to_string())
            .or_default()
            .push(Rc::new(handler));
    }

    pub fn set_confirmer<F>(&mut self, confirmer: F)
    where
        F: Fn(&str) -> bool + 'static,
    {
        self.confirmer = Some(Rc::new(confirmer));
    }

    /// Handle to the installed confirmer, so callers can invoke it without
    /// holding a borrow on the registry.
    pub(crate) fn confirmer(&self) -> Option<Confirmer> {
        self.confirmer.clone()
    }

    /// Ask the host to confirm a prompt. Without a registered confirmer the
    /// answer is yes, so `h-confirm` never blocks a headless host that does
    /// not care.
    pub fn confirm(&self, message: &str) -> bool {
        match &self.confirmer {
            Some(f) => f(message),
            None => true,
        }
    }

    /// Record an emission in the log.
    pub(crate) fn record(&mut self, notice: Notice) {
        self.log.push(notice);
    }

    /// Cloned handler chain for `name`. Handlers run outside any borrow of
    /// the registry, so a handler may register further handlers or read the
    /// log.
    pub(crate) fn chain(&self, name: &str) -> Vec<Handler> {
        self.chains.get(name).cloned().unwrap_or_default()
    }

    /// Emit a notification. Returns false if any handler vetoed it.
    pub fn emit(&mut self, name: &str, target: NodeId, detail: serde_json::Value) -> bool {
        let notice = Notice {
            name: name.to_string(),
            target,
            detail,
        };
        self.record(notice.clone());
        for handler in self.chain(name) {
            if !handler(&notice) {
                tracing::debug!(name, "notification vetoed");
                return false;
            }
        }
        true
    }

    pub fn log(&self) -> &[Notice] {
        &self.log
    }

    /// Emitted names in order, for terse assertions.
    pub fn names(&self) -> Vec<String> {
        self.log.iter().map(|n| n.name.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_emit_runs_chain_in_order() {
        let mut hooks = Hooks::default();
        let seen = Rc::new(Cell::new(0u32));
        let a = seen.clone();
        hooks.on(names::BEFORE, move |_| {
            a.set(a.get() * 10 + 1);
            true
        });
        let b = seen.clone();
        hooks.on(names::BEFORE, move |_| {
            b.set(b.get() * 10 + 2);
            true
        });
        assert!(hooks.emit(names::BEFORE, NodeId::ROOT, serde_json::Value::Null));
        assert_eq!(seen.get(), 12);
    }

    #[test]
    fn test_veto_short_circuits() {
        let mut hooks = Hooks::default();
        hooks.on(names::BEFORE, |_| false);
        let ran = Rc::new(Cell::new(false));
        let flag = ran.clone();
        hooks.on(names::BEFORE, move |_| {
            flag.set(true);
            true
        });
        assert!(!hooks.emit(names::BEFORE, NodeId::ROOT, serde_json::Value::Null));
        assert!(!ran.get(), "later handlers skipped after a veto");
    }

    #[test]
    fn test_vetoed_emission_still_logged() {
        let mut hooks = Hooks::default();
        hooks.on(names::INIT, |_| false);
        hooks.emit(names::INIT, NodeId::ROOT, serde_json::Value::Null);
        assert_eq!(hooks.names(), vec!["init"]);
    }

    #[test]
    fn test_confirm_defaults_to_yes() {
        let hooks = Hooks::default();
        assert!(hooks.confirm("really?"));
        let mut hooks = Hooks::default();
        hooks.set_confirmer(|_| false);
        assert!(!hooks.confirm("really?"));
    }
}
