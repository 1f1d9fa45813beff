//! Minimal CSS selector engine
//!
//! Supports the selector shapes the attribute vocabulary produces:
//! comma-separated lists of compound selectors (`tag`, `#id`, `.class`,
//! `[attr]`, `[attr=value]`, `[attr="value"]`), with descendant combinators
//! between compounds. Anything unparseable matches nothing.

use crate::{DomTree, NodeId};

/// A parsed selector list
#[derive(Debug, Clone)]
pub struct Selector {
    alternatives: Vec<Vec<Compound>>,
}

/// One compound selector (all parts must match a single element)
#[derive(Debug, Clone, Default)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<(String, Option<String>)>,
}

impl Compound {
    fn is_empty(&self) -> bool {
        self.tag.is_none() && self.id.is_none() && self.classes.is_empty() && self.attrs.is_empty()
    }

    fn matches(&self, tree: &DomTree, node: NodeId) -> bool {
        let Some(el) = tree.element(node) else {
            return false;
        };
        if let Some(tag) = &self.tag {
            if el.tag != *tag {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if el.id() != Some(id.as_str()) {
                return false;
            }
        }
        for class in &self.classes {
            if !el.has_class(class) {
                return false;
            }
        }
        for (name, value) in &self.attrs {
            match value {
                None => {
                    if !el.has_attr(name) {
                        return false;
                    }
                }
                Some(v) => {
                    if el.attr(name) != Some(v.as_str()) {
                        return false;
                    }
                }
            }
        }
        true
    }
}

impl Selector {
    /// Parse a selector list; `None` when empty or malformed
    pub fn parse(input: &str) -> Option<Selector> {
        let mut alternatives = Vec::new();
        for part in input.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let mut chain = Vec::new();
            for word in part.split_ascii_whitespace() {
                match parse_compound(word) {
                    Some(c) => chain.push(c),
                    None => {
                        tracing::debug!(selector = input, "unparseable selector, matches nothing");
                        return None;
                    }
                }
            }
            if !chain.is_empty() {
                alternatives.push(chain);
            }
        }
        if alternatives.is_empty() {
            None
        } else {
            Some(Selector { alternatives })
        }
    }

    /// Whether the selector matches the given element
    pub fn matches(&self, tree: &DomTree, node: NodeId) -> bool {
        self.alternatives.iter().any(|chain| {
            let (last, ancestors) = chain.split_last().expect("chains are non-empty");
            if !last.matches(tree, node) {
                return false;
            }
            // Each earlier compound must match some strictly-higher ancestor,
            // right to left.
            let mut cur = tree.parent(node);
            for compound in ancestors.iter().rev() {
                loop {
                    if !cur.is_valid() {
                        return false;
                    }
                    if compound.matches(tree, cur) {
                        cur = tree.parent(cur);
                        break;
                    }
                    cur = tree.parent(cur);
                }
            }
            true
        })
    }
}

fn parse_compound(word: &str) -> Option<Compound> {
    let mut compound = Compound::default();
    let chars: Vec<char> = word.chars().collect();
    let mut i = 0;

    // Leading tag name
    let start = i;
    while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '-') {
        i += 1;
    }
    if i > start {
        compound.tag = Some(chars[start..i].iter().collect::<String>().to_ascii_lowercase());
    }

    while i < chars.len() {
        match chars[i] {
            '#' | '.' => {
                let marker = chars[i];
                i += 1;
                let start = i;
                while i < chars.len()
                    && (chars[i].is_ascii_alphanumeric() || chars[i] == '-' || chars[i] == '_')
                {
                    i += 1;
                }
                if i == start {
                    return None;
                }
                let name: String = chars[start..i].iter().collect();
                if marker == '#' {
                    compound.id = Some(name);
                } else {
                    compound.classes.push(name);
                }
            }
            '[' => {
                let end = chars[i..].iter().position(|&c| c == ']')? + i;
                let body: String = chars[i + 1..end].iter().collect();
                let (name, value) = match body.split_once('=') {
                    Some((n, v)) => {
                        let v = v.trim_matches('"').trim_matches('\'');
                        (n.trim().to_string(), Some(v.to_string()))
                    }
                    None => (body.trim().to_string(), None),
                };
                if name.is_empty() {
                    return None;
                }
                compound.attrs.push((name, value));
                i = end + 1;
            }
            '*' if compound.is_empty() => {
                // Universal selector: matches any element.
                i += 1;
            }
            _ => return None,
        }
    }

    if compound.is_empty() && !word.contains('*') {
        None
    } else {
        Some(compound)
    }
}
