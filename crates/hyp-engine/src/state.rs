//! Per-element engine state
//!
//! The engine keeps a small record per bound element: whether it has been
//! initialized, the abort handle of its in-flight request, and whether its
//! side channels are already running. Keyed by arena node id.

use std::collections::HashMap;

use hyp_dom::NodeId;

#[derive(Default)]
pub(crate) struct ElementState {
    pub initialized: bool,
    /// Abort handle for the element's in-flight request under `h-sync`.
    /// Sending (or dropping the receiver side) cancels the request.
    pub abort: Option<smol::channel::Sender<()>>,
    /// Generation counter for `abort`. A finished request clears the handle
    /// only if the generation still matches, so a successor's handle is
    /// never stomped by its predecessor's cleanup.
    pub abort_gen: u64,
    pub sse: bool,
    pub poll: bool,
    pub prefetch: bool,
}

#[derive(Default)]
pub(crate) struct StateTable {
    map: HashMap<NodeId, ElementState>,
}

impl StateTable {
    pub fn state(&mut self, el: NodeId) -> &mut ElementState {
        self.map.entry(el).or_default()
    }
}
