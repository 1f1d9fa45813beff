//! HTML serialization
//!
//! Turns subtrees back into markup. Live form-control state is deliberately
//! not serialized; only attributes and children are.

use crate::{DomTree, NodeData, NodeId};

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Serialize a node's children
pub fn inner_html(tree: &DomTree, node: NodeId) -> String {
    let mut out = String::new();
    for child in tree.children(node) {
        write_node(tree, child, &mut out);
    }
    out
}

/// Serialize a node including itself
pub fn outer_html(tree: &DomTree, node: NodeId) -> String {
    let mut out = String::new();
    write_node(tree, node, &mut out);
    out
}

fn write_node(tree: &DomTree, node: NodeId, out: &mut String) {
    let Some(n) = tree.get(node) else {
        return;
    };
    match &n.data {
        NodeData::Document => {
            for child in tree.children(node) {
                write_node(tree, child, out);
            }
        }
        NodeData::Text(t) => out.push_str(&escape_text(t)),
        NodeData::Comment(c) => {
            out.push_str("<!--");
            out.push_str(c);
            out.push_str("-->");
        }
        NodeData::Element(el) => {
            out.push('<');
            out.push_str(&el.tag);
            for attr in &el.attrs {
                out.push(' ');
                out.push_str(&attr.name);
                if !attr.value.is_empty() {
                    out.push_str("=\"");
                    out.push_str(&escape_attr(&attr.value));
                    out.push('"');
                } else {
                    out.push_str("=\"\"");
                }
            }
            out.push('>');
            if VOID_ELEMENTS.contains(&el.tag.as_str()) {
                return;
            }
            for child in tree.children(node) {
                write_node(tree, child, out);
            }
            out.push_str("</");
            out.push_str(&el.tag);
            out.push('>');
        }
    }
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
}
