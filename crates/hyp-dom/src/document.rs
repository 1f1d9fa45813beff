//! Document - High-level document API

use crate::{DomTree, NodeId, Selector};

/// HTML Document
#[derive(Debug)]
pub struct Document {
    /// The DOM tree
    tree: DomTree,
    /// Document URL
    url: String,
    /// Document title
    title: String,
    /// Currently focused element, if any
    focused: Option<NodeId>,
}

impl Document {
    /// Create a new document with the standard html/head/body skeleton
    pub fn new(url: &str) -> Self {
        let mut tree = DomTree::new();
        let html = tree.create_element("html");
        let head = tree.create_element("head");
        let body = tree.create_element("body");
        let _ = tree.append_child(tree.root(), html);
        let _ = tree.append_child(html, head);
        let _ = tree.append_child(html, body);
        Self {
            tree,
            url: url.to_string(),
            title: String::new(),
            focused: None,
        }
    }

    /// Wrap an already-built tree (used by the HTML parser)
    pub fn from_tree(tree: DomTree, url: &str) -> Self {
        let mut doc = Self {
            tree,
            url: url.to_string(),
            title: String::new(),
            focused: None,
        };
        if let Some(title_el) = doc.tree.descendants(NodeId::ROOT).into_iter().find(|&n| {
            doc.tree.tag(n) == Some("title")
        }) {
            doc.title = doc.tree.text_content(title_el).trim().to_string();
        }
        doc
    }

    /// Document URL
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn set_url(&mut self, url: &str) {
        self.url = url.to_string();
    }

    /// Document title
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
    }

    /// Access the DOM tree
    pub fn tree(&self) -> &DomTree {
        &self.tree
    }

    /// Access the DOM tree mutably
    pub fn tree_mut(&mut self) -> &mut DomTree {
        &mut self.tree
    }

    /// Get the `<html>` element
    pub fn document_element(&self) -> Option<NodeId> {
        self.tree
            .child_elements(NodeId::ROOT)
            .into_iter()
            .find(|&n| self.tree.tag(n) == Some("html"))
    }

    /// Get the `<body>` element
    pub fn body(&self) -> Option<NodeId> {
        let html = self.document_element()?;
        self.tree
            .child_elements(html)
            .into_iter()
            .find(|&n| self.tree.tag(n) == Some("body"))
    }

    /// Document-wide id lookup
    pub fn get_element_by_id(&self, id: &str) -> Option<NodeId> {
        self.tree.element_by_id(NodeId::ROOT, id)
    }

    /// First element matching a selector string, document order
    pub fn query_selector(&self, selector: &str) -> Option<NodeId> {
        let sel = Selector::parse(selector)?;
        self.tree
            .descendants(NodeId::ROOT)
            .into_iter()
            .find(|&n| sel.matches(&self.tree, n))
    }

    /// All elements matching a selector string, document order
    pub fn query_selector_all(&self, selector: &str) -> Vec<NodeId> {
        let Some(sel) = Selector::parse(selector) else {
            return Vec::new();
        };
        self.tree
            .descendants(NodeId::ROOT)
            .into_iter()
            .filter(|&n| sel.matches(&self.tree, n))
            .collect()
    }

    /// Whether the node is attached to this document
    pub fn contains(&self, node: NodeId) -> bool {
        self.tree.attached(node)
    }

    /// Focused element
    pub fn focused(&self) -> Option<NodeId> {
        self.focused
    }

    /// Move focus to an element
    pub fn focus(&mut self, node: NodeId) {
        self.focused = Some(node);
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new("about:blank")
    }
}
