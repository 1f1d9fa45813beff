//! History integration
//!
//! `h-push-url` / `h-replace-url` record a navigation state alongside the
//! URL; on traversal the host hands the state payload back to the engine,
//! which replays the request and re-applies the swap. Any state the engine
//! cannot claim as its own, and any replay it cannot perform safely, falls
//! back to a full reload with zero network traffic of its own.

use std::rc::Rc;

use hyp_net::Request;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config;
use crate::engine::EngineInner;
use crate::swap::{apply_swap, SwapStrategy};

/// State recorded with a history entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationState {
    /// Ownership marker distinguishing engine entries from foreign ones.
    #[serde(rename = "h")]
    pub marker: bool,
    pub url: String,
    /// Selector re-resolving the swap target at replay time.
    pub target: Option<String>,
    pub swap: SwapStrategy,
    pub select: Option<String>,
    pub title: String,
}

impl NavigationState {
    pub(crate) fn new(
        url: &str,
        target: Option<String>,
        swap: SwapStrategy,
        select: Option<String>,
        title: &str,
    ) -> Self {
        NavigationState {
            marker: true,
            url: url.to_string(),
            target,
            swap,
            select,
            title: title.to_string(),
        }
    }
}

struct Entry {
    state: serde_json::Value,
    url: String,
}

/// In-process model of the session history, for headless hosts and tests.
/// A browser host would mirror push/replace onto the real History API
/// instead and feed popstate payloads to [`crate::Engine::handle_popstate`].
#[derive(Default)]
pub struct HistoryStack {
    entries: Vec<Entry>,
    index: usize,
}

impl HistoryStack {
    pub fn push(&mut self, state: &NavigationState) {
        let value = serde_json::to_value(state).unwrap_or(serde_json::Value::Null);
        // Pushing discards any forward entries.
        self.entries.truncate(self.index + 1);
        self.entries.push(Entry {
            state: value,
            url: state.url.clone(),
        });
        self.index = self.entries.len() - 1;
    }

    pub fn replace(&mut self, state: &NavigationState) {
        let value = serde_json::to_value(state).unwrap_or(serde_json::Value::Null);
        let entry = Entry {
            state: value,
            url: state.url.clone(),
        };
        if self.entries.is_empty() {
            self.entries.push(entry);
            self.index = 0;
        } else {
            self.entries[self.index] = entry;
        }
    }

    /// Step back, returning the state payload to replay.
    pub fn back(&mut self) -> Option<serde_json::Value> {
        if self.index == 0 {
            return None;
        }
        self.index -= 1;
        Some(self.entries[self.index].state.clone())
    }

    pub fn forward(&mut self) -> Option<serde_json::Value> {
        if self.index + 1 >= self.entries.len() {
            return None;
        }
        self.index += 1;
        Some(self.entries[self.index].state.clone())
    }

    pub fn current_url(&self) -> Option<&str> {
        self.entries.get(self.index).map(|e| e.url.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// What a history traversal resolved to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayOutcome {
    /// Foreign state, not ours to handle.
    Ignored,
    /// The host must perform a full page load of the entry's URL.
    Reload,
    /// The entry was replayed and swapped in place.
    Swapped,
}

/// Replay a popstate payload.
pub(crate) async fn replay(inner: Rc<EngineInner>, payload: serde_json::Value) -> ReplayOutcome {
    let Ok(state) = serde_json::from_value::<NavigationState>(payload) else {
        return ReplayOutcome::Ignored;
    };
    if !state.marker {
        return ReplayOutcome::Ignored;
    }

    {
        let mut doc = inner.doc.borrow_mut();
        doc.set_url(&state.url);
        doc.set_title(&state.title);
    }

    // Without a recorded target there is nothing to swap into.
    let Some(selector) = state.target.as_deref() else {
        debug!(url = %state.url, "no replay target, requesting reload");
        return ReplayOutcome::Reload;
    };
    let target = inner.doc.borrow().query_selector(selector);
    let Some(target) = target else {
        // The selector no longer matches anything; replaying would drop
        // the fragment on the floor.
        debug!(selector, "stale replay target, requesting reload");
        return ReplayOutcome::Reload;
    };

    let mut req = Request::get(&state.url);
    for (name, value) in config::build_headers(Some(selector), "") {
        req = req.with_header(&name, &value);
    }

    info!(url = %state.url, "replaying history entry");
    let response = match inner.transport.send(req).await {
        Ok(res) => res,
        Err(err) => {
            debug!(%err, "history replay fetch failed, requesting reload");
            return ReplayOutcome::Reload;
        }
    };

    let mut doc = inner.doc.borrow_mut();
    let mut body = config::extract_title(&mut doc, &response.body);
    if let Some(select) = state.select.as_deref() {
        body = config::select_fragment(&body, select);
    }
    if apply_swap(&mut doc, target, &body, state.swap).is_err() {
        return ReplayOutcome::Reload;
    }
    ReplayOutcome::Swapped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(url: &str) -> NavigationState {
        NavigationState::new(url, Some("#main".into()), SwapStrategy::Morph, None, "t")
    }

    #[test]
    fn test_push_truncates_forward_entries() {
        let mut stack = HistoryStack::default();
        stack.replace(&state("/a"));
        stack.push(&state("/b"));
        stack.push(&state("/c"));
        assert!(stack.back().is_some());
        stack.push(&state("/d"));
        assert_eq!(stack.len(), 3);
        assert_eq!(stack.current_url(), Some("/d"));
        assert!(stack.forward().is_none());
    }

    #[test]
    fn test_back_and_forward() {
        let mut stack = HistoryStack::default();
        stack.replace(&state("/a"));
        stack.push(&state("/b"));
        let back = stack.back().unwrap();
        let parsed: NavigationState = serde_json::from_value(back).unwrap();
        assert_eq!(parsed.url, "/a");
        assert!(stack.back().is_none(), "at the oldest entry");
        let fwd = stack.forward().unwrap();
        let parsed: NavigationState = serde_json::from_value(fwd).unwrap();
        assert_eq!(parsed.url, "/b");
    }

    #[test]
    fn test_state_round_trips_with_marker() {
        let value = serde_json::to_value(state("/a")).unwrap();
        assert_eq!(value["h"], true);
        let parsed: NavigationState = serde_json::from_value(value).unwrap();
        assert!(parsed.marker);
        assert_eq!(parsed.swap, SwapStrategy::Morph);
    }
}
