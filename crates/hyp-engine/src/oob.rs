//! Out-of-band fragment processing
//!
//! A response body may carry fragments marked `h-oob` that update elements
//! elsewhere in the document, outside the request's target. Each marked
//! fragment is matched to a live element by id, applied according to its
//! mode, and removed from the body before the main swap runs.

use hyp_dom::{outer_html, Document, NodeId};
use tracing::{debug, warn};

use crate::attrs;
use crate::swap::{apply_swap, SwapStrategy};

/// Apply every `h-oob` fragment in `body` to `doc` and return the body with
/// those fragments removed.
pub fn process_oob(doc: &mut Document, body: &str) -> String {
    // Fast path: most responses carry no out-of-band content.
    if !body.contains(attrs::OOB) {
        return body.to_string();
    }

    let mut fragment = hyp_html::parse_fragment(body);
    let root = fragment.tree.root();

    let marked: Vec<NodeId> = fragment
        .tree
        .descendants(root)
        .into_iter()
        .filter(|&n| fragment.tree.has_attr(n, attrs::OOB))
        .collect();

    for node in marked {
        let mode = {
            let raw = fragment.tree.attr(node, attrs::OOB).unwrap_or("");
            if raw.is_empty() {
                "true".to_string()
            } else {
                raw.to_string()
            }
        };
        fragment.tree.remove_attr(node, attrs::OOB);

        let id = fragment
            .tree
            .element(node)
            .and_then(|e| e.id())
            .map(str::to_string);
        let target = id.as_deref().and_then(|id| doc.get_element_by_id(id));
        let Some(target) = target else {
            debug!(id = ?id, "out-of-band fragment has no matching element");
            fragment.tree.detach(node);
            continue;
        };

        // The value-oriented modes only make sense on a live text control;
        // anything else falls through to the swap branch.
        let is_control = doc
            .tree()
            .element(target)
            .map(|e| e.is_text_control())
            .unwrap_or(false);
        match mode.as_str() {
            "value" if is_control => apply_value(doc, target, &fragment, node),
            "replace" if is_control => apply_value_replace(doc, target, &fragment, node),
            "merge" if is_control => apply_value_merge(doc, target, &fragment, node),
            other => {
                let strategy = if other == "true" {
                    Some(SwapStrategy::Outer)
                } else {
                    other.parse().ok()
                };
                match strategy {
                    Some(strategy) => {
                        let html = outer_html(&fragment.tree, node);
                        if let Err(err) = apply_swap(doc, target, &html, strategy) {
                            warn!(%err, "out-of-band swap failed");
                        }
                    }
                    None => warn!(mode = other, "unknown out-of-band mode"),
                }
            }
        }

        fragment.tree.detach(node);
    }

    hyp_dom::inner_html(&fragment.tree, root)
}

/// `h-oob="value"`: push the fragment's value into a live form control.
fn apply_value(doc: &mut Document, target: NodeId, fragment: &hyp_html::Fragment, node: NodeId) {
    let value = match fragment.tree.attr(node, "value") {
        Some(v) => v.to_string(),
        None => fragment.tree.text_content(node),
    };
    doc.tree_mut().set_value(target, &value);
}

/// `h-oob="replace"`: find/replace inside the target control's live value.
fn apply_value_replace(
    doc: &mut Document,
    target: NodeId,
    fragment: &hyp_html::Fragment,
    node: NodeId,
) {
    let find = fragment
        .tree
        .attr(node, "data-find")
        .unwrap_or("")
        .to_string();
    if find.is_empty() {
        return;
    }
    let replacement = fragment
        .tree
        .attr(node, "data-replace")
        .unwrap_or("")
        .to_string();

    let current = doc.tree().value(target);
    let updated = if fragment.tree.has_attr(node, "data-all") {
        current.replace(&find, &replacement)
    } else if fragment.tree.has_attr(node, "data-first") {
        current.replacen(&find, &replacement, 1)
    } else {
        // Default replaces the last occurrence.
        match current.rfind(&find) {
            Some(pos) => {
                let mut out = String::with_capacity(current.len());
                out.push_str(&current[..pos]);
                out.push_str(&replacement);
                out.push_str(&current[pos + find.len()..]);
                out
            }
            None => current.clone(),
        }
    };
    doc.tree_mut().set_value(target, &updated);
}

/// `h-oob="merge"`: shallow JSON object merge into the target control's
/// live value. An empty control merges into `{}`.
fn apply_value_merge(
    doc: &mut Document,
    target: NodeId,
    fragment: &hyp_html::Fragment,
    node: NodeId,
) {
    let incoming_text = match fragment.tree.attr(node, "value") {
        Some(v) => v.to_string(),
        None => fragment.tree.text_content(node),
    };
    let current_text = doc.tree().value(target);
    let current_text = if current_text.trim().is_empty() {
        "{}"
    } else {
        current_text.trim()
    };

    let current: serde_json::Value = match serde_json::from_str(current_text) {
        Ok(v) => v,
        Err(_) => return,
    };
    let incoming: serde_json::Value = match serde_json::from_str(incoming_text.trim()) {
        Ok(v) => v,
        Err(_) => return,
    };
    let (serde_json::Value::Object(mut base), serde_json::Value::Object(overlay)) =
        (current, incoming)
    else {
        debug!("merge mode requires JSON objects on both sides");
        return;
    };
    for (k, v) in overlay {
        base.insert(k, v);
    }
    let merged = serde_json::Value::Object(base).to_string();
    doc.tree_mut().set_value(target, &merged);
}
