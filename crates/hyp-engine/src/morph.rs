//! Reconciliation engine (morph)
//!
//! Updates a live subtree in place to match freshly parsed markup while
//! reusing existing nodes wherever possible, so element identity, focus and
//! form-control state survive the update.
//!
//! Matching per sibling level: id-keyed lookup first, then positional
//! fallback for unkeyed same-tag elements. Any non-blank text node at a
//! level bails out to full content replacement - a deliberate coarseness
//! callers depend on. The match plan is computed immutably before any
//! mutation is applied, so the walk never iterates a list it is changing.

use std::collections::{HashMap, HashSet};

use hyp_dom::{Document, DomTree, NodeId};

/// Reconcile `target`'s children against `html`
pub fn morph(doc: &mut Document, target: NodeId, html: &str) {
    let fragment = hyp_html::parse_fragment(html.trim());
    let new_root = fragment.tree.root();
    morph_children(doc.tree_mut(), target, &fragment.tree, new_root);
}

/// One step of the computed match plan for a sibling level
enum PlanOp {
    /// Reuse an existing element for an incoming one
    Reuse { old: NodeId, new: NodeId },
    /// No match: clone the incoming element into position
    Insert { new: NodeId },
}

fn morph_children(live: &mut DomTree, parent: NodeId, new_tree: &DomTree, new_parent: NodeId) {
    let old_nodes = live.children(parent);
    let new_nodes = new_tree.children(new_parent);

    let has_text = |tree: &DomTree, nodes: &[NodeId]| {
        nodes.iter().any(|&n| {
            tree.get(n)
                .and_then(|node| node.as_text())
                .map(|t| !t.trim().is_empty())
                .unwrap_or(false)
        })
    };
    // Mixed text/element content: replace wholesale rather than attempting
    // fine-grained text reconciliation.
    if has_text(live, &old_nodes) || has_text(new_tree, &new_nodes) {
        replace_content(live, parent, new_tree, &new_nodes);
        return;
    }

    let old_els: Vec<NodeId> = old_nodes
        .iter()
        .copied()
        .filter(|&n| live.get(n).map(|x| x.is_element()).unwrap_or(false))
        .collect();
    let new_els: Vec<NodeId> = new_nodes
        .iter()
        .copied()
        .filter(|&n| new_tree.get(n).map(|x| x.is_element()).unwrap_or(false))
        .collect();

    // Identity index of keyed existing children.
    let mut by_id: HashMap<&str, NodeId> = HashMap::new();
    for &old in &old_els {
        if let Some(id) = live.element(old).and_then(|e| e.id()) {
            by_id.insert(id, old);
        }
    }

    // Compute the full plan before touching the tree.
    let mut used: HashSet<NodeId> = HashSet::new();
    let mut plan: Vec<PlanOp> = Vec::with_capacity(new_els.len());
    for (i, &new) in new_els.iter().enumerate() {
        let mut matched = None;
        if let Some(id) = new_tree.element(new).and_then(|e| e.id()) {
            if let Some(&old) = by_id.get(id) {
                if !used.contains(&old) {
                    matched = Some(old);
                }
            }
        }
        if matched.is_none() {
            if let Some(&old) = old_els.get(i) {
                let same_tag = live.tag(old) == new_tree.tag(new);
                let unkeyed = live.element(old).and_then(|e| e.id()).is_none();
                if same_tag && unkeyed && !used.contains(&old) {
                    matched = Some(old);
                }
            }
        }
        match matched {
            Some(old) => {
                used.insert(old);
                plan.push(PlanOp::Reuse { old, new });
            }
            None => plan.push(PlanOp::Insert { new }),
        }
    }

    // Apply: walk the plan, moving/cloning into position i.
    for (i, op) in plan.iter().enumerate() {
        let reference = live.child_elements(parent).get(i).copied();
        match *op {
            PlanOp::Reuse { old, new } => {
                if reference != Some(old) {
                    let _ = live.insert_before(parent, old, reference);
                }
                morph_node(live, old, new_tree, new);
            }
            PlanOp::Insert { new } => {
                if let Ok(copy) = live.adopt(new_tree, new) {
                    let _ = live.insert_before(parent, copy, reference);
                }
            }
        }
    }

    // Remove existing element children the plan never claimed.
    for old in old_els {
        if !used.contains(&old) {
            live.detach(old);
        }
    }
}

fn replace_content(live: &mut DomTree, parent: NodeId, new_tree: &DomTree, new_nodes: &[NodeId]) {
    // Only if actually different: serialized comparison keeps the
    // idempotent-morph case mutation-free.
    let current = hyp_dom::inner_html(live, parent);
    let incoming: String = new_nodes
        .iter()
        .map(|&n| hyp_dom::outer_html(new_tree, n))
        .collect();
    if current == incoming {
        return;
    }
    live.clear_children(parent);
    for &root in new_nodes {
        if let Ok(copy) = live.adopt(new_tree, root) {
            let _ = live.append_child(parent, copy);
        }
    }
}

/// Reconcile one matched pair of same-position elements
fn morph_node(live: &mut DomTree, old: NodeId, new_tree: &DomTree, new: NodeId) {
    if live.tag(old) != new_tree.tag(new) {
        // Different tags: substitute wholesale, no partial reconciliation.
        let parent = live.parent(old);
        if let Ok(copy) = live.adopt(new_tree, new) {
            let _ = live.insert_before(parent, copy, Some(old));
        }
        live.detach(old);
        return;
    }

    sync_attributes(live, old, new_tree, new);

    let tag = live.tag(old).unwrap_or("").to_string();
    if tag == "input" {
        // Never clobber a live value with emptiness; the server echoing a
        // blank field back must not erase in-progress input.
        if let Some(v) = new_tree.attr(new, "value") {
            if !v.is_empty() && live.value(old) != v {
                let v = v.to_string();
                live.set_value(old, &v);
            }
        }
        let incoming_checked = new_tree.has_attr(new, "checked");
        if live.checked(old) != incoming_checked {
            live.set_checked(old, incoming_checked);
        }
        return;
    }
    if tag == "textarea" {
        let v = new_tree.text_content(new);
        if !v.is_empty() && live.value(old) != v {
            live.set_value(old, &v);
        }
        return;
    }

    // Leaf fast path: neither side has element children, so only text needs
    // reconciling.
    if live.child_elements(old).is_empty() && new_tree.child_elements(new).is_empty() {
        let text = new_tree.text_content(new);
        live.set_text_content(old, &text);
        return;
    }

    morph_children(live, old, new_tree, new);
}

fn sync_attributes(live: &mut DomTree, old: NodeId, new_tree: &DomTree, new: NodeId) {
    let is_text_control = live
        .element(old)
        .map(|e| e.is_text_control())
        .unwrap_or(false);

    let stale: Vec<String> = live
        .element(old)
        .map(|e| {
            e.attrs
                .iter()
                .filter(|a| !new_tree.has_attr(new, &a.name))
                .map(|a| a.name.clone())
                .collect()
        })
        .unwrap_or_default();
    for name in stale {
        live.remove_attr(old, &name);
    }

    let incoming: Vec<(String, String)> = new_tree
        .element(new)
        .map(|e| {
            e.attrs
                .iter()
                .map(|a| (a.name.clone(), a.value.clone()))
                .collect()
        })
        .unwrap_or_default();
    for (name, value) in incoming {
        if is_text_control && name == "value" {
            continue;
        }
        live.set_attr(old, &name, &value);
    }
}
