//! Attribute vocabulary
//!
//! Every engine behavior is declared through `h-*` attributes. This module
//! centralizes the names and the small lookups the rest of the engine does
//! constantly.

use hyp_dom::{DomTree, NodeId};
use hyp_net::Method;

pub const GET: &str = "h-get";
pub const POST: &str = "h-post";
pub const PUT: &str = "h-put";
pub const PATCH: &str = "h-patch";
pub const DELETE: &str = "h-delete";

pub const TRIGGER: &str = "h-trigger";
pub const TARGET: &str = "h-target";
pub const SWAP: &str = "h-swap";
pub const SELECT: &str = "h-select";
pub const HEADERS: &str = "h-headers";
pub const INCLUDE: &str = "h-include";
pub const CONFIRM: &str = "h-confirm";
pub const SYNC: &str = "h-sync";
pub const DISABLED: &str = "h-disabled";
pub const NO_DISABLE: &str = "h-no-disable";
pub const INDICATOR: &str = "h-indicator";
pub const ERROR_TARGET: &str = "h-error-target";
pub const SCROLL: &str = "h-scroll";
pub const FOCUS: &str = "h-focus";
pub const PUSH_URL: &str = "h-push-url";
pub const REPLACE_URL: &str = "h-replace-url";
pub const IGNORE: &str = "h-ignore";
pub const SSE: &str = "h-sse";
pub const SSE_ON: &str = "h-sse-on";
pub const POLL: &str = "h-poll";
pub const PREFETCH: &str = "h-prefetch";
pub const OOB: &str = "h-oob";

/// Class applied to loading indicators
pub const LOADING_CLASS: &str = "h-loading";
/// Class applied to disabled anchors
pub const DISABLED_CLASS: &str = "h-disabled";

/// Marker header on every engine-originated request
pub const HDR_REQUEST: &str = "H-Request";
/// Header carrying the target selector, when one is set
pub const HDR_TARGET: &str = "H-Target";

/// Attribute value with a fallback for absent attributes
pub fn attr(tree: &DomTree, node: NodeId, name: &str) -> String {
    tree.attr(node, name).unwrap_or("").to_string()
}

/// Attribute presence
pub fn has(tree: &DomTree, node: NodeId, name: &str) -> bool {
    tree.has_attr(node, name)
}

/// Whether the element sits inside an explicitly ignored subtree
pub fn ignored(tree: &DomTree, node: NodeId) -> bool {
    tree.closest_with_attr(node, IGNORE).is_some()
}

/// Resolve the action-producing attribute pair on an element:
/// links carry `h-get` + `href`, forms carry a verb attribute + `action`.
pub fn find_action(tree: &DomTree, node: NodeId) -> Option<(Method, String)> {
    let tag = tree.tag(node)?;
    if has(tree, node, GET) {
        let url = match tag {
            "a" => tree.attr(node, "href"),
            "form" => tree.attr(node, "action"),
            _ => None,
        };
        return url
            .filter(|u| !u.is_empty())
            .map(|u| (Method::Get, u.to_string()));
    }
    if tag == "form" {
        let action = tree.attr(node, "action").filter(|a| !a.is_empty())?;
        let action = action.to_string();
        for (name, method) in [
            (POST, Method::Post),
            (PUT, Method::Put),
            (PATCH, Method::Patch),
            (DELETE, Method::Delete),
        ] {
            if has(tree, node, name) {
                return Some((method, action));
            }
        }
    }
    None
}
