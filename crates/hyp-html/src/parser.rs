//! HTML5 Parser implementation
//!
//! Uses html5ever's built-in RcDom and converts to our DOM format.
//! This is simpler and more reliable than implementing TreeSink directly.
//!
//! `<template>` contents are flattened into the template's own children so
//! declarative route templates stay visible to tree walks.

use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use hyp_dom::{Document, DomTree, NodeId};
use markup5ever_rcdom::{Handle, NodeData as RcNodeData, RcDom};

/// HTML5 parser
pub struct HtmlParser;

/// A detached tree parsed from a markup fragment
#[derive(Debug)]
pub struct Fragment {
    pub tree: DomTree,
}

impl Fragment {
    /// Top-level nodes of the fragment, in order
    pub fn roots(&self) -> Vec<NodeId> {
        self.tree.children(self.tree.root())
    }
}

impl HtmlParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse HTML string into a Document
    pub fn parse(&self, html: &str) -> Document {
        self.parse_with_url(html, "about:blank")
    }

    /// Parse HTML with a base URL
    pub fn parse_with_url(&self, html: &str, url: &str) -> Document {
        tracing::debug!(url, "parsing HTML document");
        let mut tree = DomTree::new();
        let root = tree.root();
        convert_children(&rc_parse(html), &mut tree, root);
        let document = Document::from_tree(tree, url);
        tracing::debug!(nodes = document.tree().len(), "parsed document");
        document
    }

    /// Parse a markup fragment into a detached tree
    ///
    /// html5ever always builds a full document, so the fragment's nodes are
    /// lifted out of the synthesized `<body>`. Head-only content (title,
    /// meta) that html5ever relocates is dropped, which is what fragment
    /// consumers want anyway.
    pub fn parse_fragment(&self, html: &str) -> Fragment {
        let mut parsed = DomTree::new();
        let root = parsed.root();
        convert_children(&rc_parse(html), &mut parsed, root);

        let mut tree = DomTree::new();
        let target_root = tree.root();
        if let Some(body) = find_tag(&parsed, root, "body") {
            for child in parsed.children(body) {
                if let Ok(copy) = tree.adopt(&parsed, child) {
                    let _ = tree.append_child(target_root, copy);
                }
            }
        }
        Fragment { tree }
    }
}

impl Default for HtmlParser {
    fn default() -> Self {
        Self::new()
    }
}

fn rc_parse(html: &str) -> Handle {
    let dom = parse_document(RcDom::default(), Default::default())
        .from_utf8()
        .read_from(&mut html.as_bytes())
        .expect("reading from an in-memory slice cannot fail");
    dom.document
}

fn find_tag(tree: &DomTree, root: NodeId, tag: &str) -> Option<NodeId> {
    tree.descendants(root)
        .into_iter()
        .find(|&n| tree.tag(n) == Some(tag))
}

fn convert_children(handle: &Handle, tree: &mut DomTree, parent: NodeId) {
    for child in handle.children.borrow().iter() {
        convert_node(child, tree, parent);
    }
}

/// Convert an RcDom node to our DOM format
fn convert_node(handle: &Handle, tree: &mut DomTree, parent: NodeId) {
    match &handle.data {
        RcNodeData::Document => {
            convert_children(handle, tree, parent);
        }
        RcNodeData::Doctype { .. } => {
            // Doctype carries no information the engine uses.
        }
        RcNodeData::Text { contents } => {
            let text = contents.borrow().to_string();
            // Whitespace-only text nodes are structural noise; dropping them
            // keeps sibling walks element-shaped.
            if !text.trim().is_empty() {
                let id = tree.create_text(&text);
                let _ = tree.append_child(parent, id);
            }
        }
        RcNodeData::Comment { contents } => {
            let id = tree.create_comment(&contents.to_string());
            let _ = tree.append_child(parent, id);
        }
        RcNodeData::Element {
            name,
            attrs,
            template_contents,
            ..
        } => {
            let id = tree.create_element(&name.local);
            for attr in attrs.borrow().iter() {
                tree.set_attr(id, &attr.name.local, &attr.value);
            }
            let _ = tree.append_child(parent, id);

            if let Some(contents) = template_contents.borrow().as_ref() {
                convert_children(contents, tree, id);
            }
            convert_children(handle, tree, id);
        }
        RcNodeData::ProcessingInstruction { .. } => {
            // Ignored.
        }
    }
}
