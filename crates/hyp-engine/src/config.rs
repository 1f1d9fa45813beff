//! Request configuration
//!
//! Builds the outgoing request for a dispatch: form field collection,
//! `h-include` extras, header assembly, and query-string encoding for GET.
//! Also the response-side helpers shared by dispatch, history replay and
//! polling: `<title>` extraction and `h-select` fragment selection.

use std::sync::LazyLock;

use hyp_dom::{Document, NodeId, Selector};
use regex::Regex;
use tracing::warn;

use crate::attrs;
use crate::swap::SwapStrategy;

/// The event that started a dispatch
#[derive(Debug, Clone)]
pub(crate) struct TriggerEvent {
    pub name: String,
    /// Submit button that fired a form submission, if any.
    pub submitter: Option<NodeId>,
}

/// Everything needed to execute one request
pub(crate) struct RequestConfig {
    pub action: String,
    pub method: hyp_net::Method,
    pub target: NodeId,
    pub swap: SwapStrategy,
    /// Urlencoded payload for mutating methods.
    pub body: Option<String>,
    pub headers: Vec<(String, String)>,
}

static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").unwrap());

/// If `html` carries a `<title>`, set it on the document and return the
/// body with the title element removed. Otherwise return `html` unchanged.
pub(crate) fn extract_title(doc: &mut Document, html: &str) -> String {
    let Some(caps) = TITLE_RE.captures(html) else {
        return html.to_string();
    };
    let title = caps.get(1).map(|m| m.as_str().trim()).unwrap_or("");
    doc.set_title(title);
    TITLE_RE.replace(html, "").into_owned()
}

/// Apply an `h-select` selector to a response body, returning the inner
/// content of the first match. An empty or unmatched selector returns the
/// body unchanged.
pub(crate) fn select_fragment(html: &str, selector: &str) -> String {
    if selector.is_empty() {
        return html.to_string();
    }
    let Some(sel) = Selector::parse(selector) else {
        warn!(selector, "ignoring malformed h-select selector");
        return html.to_string();
    };
    let fragment = hyp_html::parse_fragment(html);
    let root = fragment.tree.root();
    for node in fragment.tree.descendants(root) {
        if sel.matches(&fragment.tree, node) {
            return hyp_dom::inner_html(&fragment.tree, node);
        }
    }
    html.to_string()
}

/// Collect the submittable fields of a form, in document order. Matches
/// browser form serialization: unchecked checkboxes and radios are skipped,
/// buttons contribute nothing unless they are the submitter.
pub(crate) fn collect_form_fields(
    doc: &Document,
    form: NodeId,
    submitter: Option<NodeId>,
) -> Vec<(String, String)> {
    let tree = doc.tree();
    let mut fields = Vec::new();
    for node in tree.descendants(form) {
        let Some(el) = tree.element(node) else {
            continue;
        };
        if !el.is_form_control() {
            continue;
        }
        let Some(name) = el.attr("name").filter(|n| !n.is_empty()) else {
            continue;
        };
        let kind = el.attr("type").unwrap_or("");
        match el.tag.as_str() {
            "input" => match kind {
                "submit" | "button" | "image" | "reset" => continue,
                "checkbox" | "radio" => {
                    if tree.checked(node) {
                        let value = el.attr("value").unwrap_or("on");
                        fields.push((name.to_string(), value.to_string()));
                    }
                }
                _ => fields.push((name.to_string(), tree.value(node))),
            },
            "textarea" => fields.push((name.to_string(), tree.value(node))),
            "select" => {
                if let Some(value) = select_value(doc, node) {
                    fields.push((name.to_string(), value));
                }
            }
            _ => {}
        }
    }
    if let Some(button) = submitter {
        if let Some(el) = tree.element(button) {
            if let Some(name) = el.attr("name").filter(|n| !n.is_empty()) {
                fields.push((name.to_string(), el.attr("value").unwrap_or("").to_string()));
            }
        }
    }
    fields
}

/// Resolve a `<select>`'s value: live value if set, else the selected
/// option, else the first option.
fn select_value(doc: &Document, select: NodeId) -> Option<String> {
    let tree = doc.tree();
    let live = tree.value(select);
    if !live.is_empty() {
        return Some(live);
    }
    let options: Vec<NodeId> = tree
        .descendants(select)
        .into_iter()
        .filter(|&n| tree.tag(n) == Some("option"))
        .collect();
    let chosen = options
        .iter()
        .copied()
        .find(|&o| tree.has_attr(o, "selected"))
        .or_else(|| options.first().copied())?;
    Some(match tree.attr(chosen, "value") {
        Some(v) => v.to_string(),
        None => tree.text_content(chosen),
    })
}

/// Collect fields from every form control matched by an `h-include`
/// selector, appended after the originating form's own fields.
pub(crate) fn include_fields(doc: &Document, selector: &str) -> Vec<(String, String)> {
    let mut fields = Vec::new();
    for node in doc.query_selector_all(selector) {
        let Some(el) = doc.tree().element(node) else {
            continue;
        };
        if el.is_form_control() {
            if let Some(name) = el.attr("name").filter(|n| !n.is_empty()) {
                fields.push((name.to_string(), doc.tree().value(node)));
            }
        } else {
            // A container: include its controls.
            fields.extend(collect_form_fields(doc, node, None));
        }
    }
    fields
}

/// Assemble request headers: the engine marker, the target selector text
/// when one is configured, plus any `h-headers` JSON overlay. A malformed
/// overlay is logged and ignored rather than blocking the request.
pub(crate) fn build_headers(target_sel: Option<&str>, headers_attr: &str) -> Vec<(String, String)> {
    let mut headers = vec![(attrs::HDR_REQUEST.to_string(), "true".to_string())];
    if let Some(sel) = target_sel {
        headers.push((attrs::HDR_TARGET.to_string(), sel.to_string()));
    }
    if !headers_attr.is_empty() {
        match serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(headers_attr) {
            Ok(map) => {
                for (name, value) in map {
                    let value = match value {
                        serde_json::Value::String(s) => s,
                        other => other.to_string(),
                    };
                    headers.push((name, value));
                }
            }
            Err(err) => warn!(%err, "ignoring malformed h-headers value"),
        }
    }
    headers
}

/// Append URL-encoded fields to an action URL, respecting an existing
/// query string.
pub(crate) fn append_query(action: &str, fields: &[(String, String)]) -> String {
    if fields.is_empty() {
        return action.to_string();
    }
    let encoded: String = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(fields.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .finish();
    let sep = if action.contains('?') { '&' } else { '?' };
    format!("{action}{sep}{encoded}")
}
