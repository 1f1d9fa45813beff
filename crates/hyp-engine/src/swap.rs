//! Swap Executor
//!
//! Eight strategies for merging new markup into a target node. The strategy
//! set is a closed enum matched exhaustively; markup fragments are parsed
//! fresh on every call.

use std::str::FromStr;

use hyp_dom::{Document, DomResult, NodeId};
use serde::{Deserialize, Serialize};

use crate::morph;

/// How new markup is merged into a target node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwapStrategy {
    /// Replace the target's content
    Inner,
    /// Replace the target element itself
    Outer,
    /// Insert before the target, outside it
    Before,
    /// Insert after the target, outside it
    After,
    /// Insert inside the target, at the start
    Prepend,
    /// Insert inside the target, at the end
    Append,
    /// Reconcile the target's subtree against the markup
    Morph,
    /// No content change (side effects only)
    None,
}

impl SwapStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SwapStrategy::Inner => "inner",
            SwapStrategy::Outer => "outer",
            SwapStrategy::Before => "before",
            SwapStrategy::After => "after",
            SwapStrategy::Prepend => "prepend",
            SwapStrategy::Append => "append",
            SwapStrategy::Morph => "morph",
            SwapStrategy::None => "none",
        }
    }
}

/// Unrecognized swap strategy token
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown swap strategy: {0}")]
pub struct StrategyParseError(pub String);

impl FromStr for SwapStrategy {
    type Err = StrategyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inner" => Ok(SwapStrategy::Inner),
            "outer" => Ok(SwapStrategy::Outer),
            "before" => Ok(SwapStrategy::Before),
            "after" => Ok(SwapStrategy::After),
            "prepend" => Ok(SwapStrategy::Prepend),
            "append" => Ok(SwapStrategy::Append),
            "morph" => Ok(SwapStrategy::Morph),
            "none" => Ok(SwapStrategy::None),
            other => Err(StrategyParseError(other.to_string())),
        }
    }
}

/// Parse a strategy attribute value, falling back when absent or unknown
pub(crate) fn strategy_or(value: &str, fallback: SwapStrategy) -> SwapStrategy {
    if value.is_empty() {
        return fallback;
    }
    value.parse().unwrap_or_else(|e: StrategyParseError| {
        tracing::warn!("{e}, using {}", fallback.as_str());
        fallback
    })
}

/// Apply a swap strategy, merging `html` into `target`
pub fn apply_swap(
    doc: &mut Document,
    target: NodeId,
    html: &str,
    strategy: SwapStrategy,
) -> DomResult<()> {
    match strategy {
        SwapStrategy::Inner => {
            doc.tree_mut().clear_children(target);
            insert_fragment(doc, target, html, None)
        }
        SwapStrategy::Outer => {
            insert_fragment_beside(doc, target, html)?;
            doc.tree_mut().detach(target);
            Ok(())
        }
        SwapStrategy::Before => insert_fragment_beside(doc, target, html),
        SwapStrategy::After => {
            let parent = doc.tree().parent(target);
            let next = doc.tree().next_sibling(target);
            let reference = if next.is_valid() { Some(next) } else { Option::None };
            insert_fragment(doc, parent, html, reference)
        }
        SwapStrategy::Prepend => {
            let first = doc.tree().children(target).first().copied();
            insert_fragment(doc, target, html, first)
        }
        SwapStrategy::Append => insert_fragment(doc, target, html, None),
        SwapStrategy::Morph => {
            morph::morph(doc, target, html);
            Ok(())
        }
        SwapStrategy::None => Ok(()),
    }
}

/// Parse `html` and insert its roots into `parent` before `reference`
fn insert_fragment(
    doc: &mut Document,
    parent: NodeId,
    html: &str,
    reference: Option<NodeId>,
) -> DomResult<()> {
    let fragment = hyp_html::parse_fragment(html);
    let tree = doc.tree_mut();
    for root in fragment.roots() {
        let copy = tree.adopt(&fragment.tree, root)?;
        tree.insert_before(parent, copy, reference)?;
    }
    Ok(())
}

/// Insert the parsed roots into the target's parent, just before the target
fn insert_fragment_beside(doc: &mut Document, target: NodeId, html: &str) -> DomResult<()> {
    let parent = doc.tree().parent(target);
    insert_fragment(doc, parent, html, Some(target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyp_dom::inner_html;

    fn doc_with_list() -> (Document, NodeId) {
        let mut doc = hyp_html::parse_with_url(
            "<body><ul id=\"list\"><li>a</li></ul></body>",
            "about:blank",
        );
        let list = doc.get_element_by_id("list").unwrap();
        (doc, list)
    }

    #[test]
    fn test_inner_replaces_content() {
        let (mut doc, list) = doc_with_list();
        apply_swap(&mut doc, list, "<li>b</li>", SwapStrategy::Inner).unwrap();
        assert_eq!(inner_html(doc.tree(), list), "<li>b</li>");
    }

    #[test]
    fn test_outer_replaces_element() {
        let (mut doc, list) = doc_with_list();
        apply_swap(&mut doc, list, "<ol id=\"list\"></ol>", SwapStrategy::Outer).unwrap();
        assert!(!doc.contains(list));
        let replacement = doc.get_element_by_id("list").unwrap();
        assert_eq!(doc.tree().tag(replacement), Some("ol"));
    }

    #[test]
    fn test_adjacent_insertions() {
        let (mut doc, list) = doc_with_list();
        apply_swap(&mut doc, list, "<p>pre</p>", SwapStrategy::Before).unwrap();
        apply_swap(&mut doc, list, "<p>post</p>", SwapStrategy::After).unwrap();
        let body = doc.body().unwrap();
        let tags: Vec<_> = doc
            .tree()
            .child_elements(body)
            .into_iter()
            .map(|n| doc.tree().tag(n).unwrap().to_string())
            .collect();
        assert_eq!(tags, vec!["p", "ul", "p"]);
    }

    #[test]
    fn test_prepend_append() {
        let (mut doc, list) = doc_with_list();
        apply_swap(&mut doc, list, "<li>first</li>", SwapStrategy::Prepend).unwrap();
        apply_swap(&mut doc, list, "<li>last</li>", SwapStrategy::Append).unwrap();
        assert_eq!(
            inner_html(doc.tree(), list),
            "<li>first</li><li>a</li><li>last</li>"
        );
    }

    #[test]
    fn test_none_is_noop() {
        let (mut doc, list) = doc_with_list();
        let before = doc.tree().mutations();
        apply_swap(&mut doc, list, "<li>x</li>", SwapStrategy::None).unwrap();
        assert_eq!(doc.tree().mutations(), before);
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!("outer".parse(), Ok(SwapStrategy::Outer));
        assert!("sideways".parse::<SwapStrategy>().is_err());
        assert_eq!(strategy_or("", SwapStrategy::Morph), SwapStrategy::Morph);
        assert_eq!(strategy_or("bogus", SwapStrategy::Inner), SwapStrategy::Inner);
    }
}
