//! DOM Tree (arena-based allocation)
//!
//! Nodes are never deallocated; "removal" unlinks a subtree from its parent.
//! A detached subtree keeps its NodeIds and can be re-inserted, which keeps
//! element identity stable across moves.

use crate::{DomError, DomResult, ElementData, Node, NodeData, NodeId};

/// Arena-based DOM tree
#[derive(Debug)]
pub struct DomTree {
    nodes: Vec<Node>,
    /// Count of structural/attribute/text mutations applied to the tree.
    /// Writes that change nothing do not count.
    mutations: u64,
}

impl DomTree {
    /// Create a tree holding only the document root
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::detached(NodeData::Document)],
            mutations: 0,
        }
    }

    /// Get a node by ID
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        if id.is_valid() {
            self.nodes.get(id.index())
        } else {
            None
        }
    }

    /// Get a mutable node by ID
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        if id.is_valid() {
            self.nodes.get_mut(id.index())
        } else {
            None
        }
    }

    /// Root (document) node
    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    /// Number of nodes ever allocated in the arena
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Total mutations applied so far
    pub fn mutations(&self) -> u64 {
        self.mutations
    }

    fn alloc(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node::detached(data));
        id
    }

    /// Create a detached element node
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.alloc(NodeData::Element(ElementData::new(tag)))
    }

    /// Create a detached text node
    pub fn create_text(&mut self, content: &str) -> NodeId {
        self.alloc(NodeData::Text(content.to_string()))
    }

    /// Create a detached comment node
    pub fn create_comment(&mut self, content: &str) -> NodeId {
        self.alloc(NodeData::Comment(content.to_string()))
    }

    // ---- structure ----------------------------------------------------

    /// Parent of a node
    pub fn parent(&self, id: NodeId) -> NodeId {
        self.get(id).map(|n| n.parent).unwrap_or(NodeId::NONE)
    }

    /// Next sibling of a node
    pub fn next_sibling(&self, id: NodeId) -> NodeId {
        self.get(id).map(|n| n.next_sibling).unwrap_or(NodeId::NONE)
    }

    /// All child node IDs, in order
    pub fn children(&self, parent: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut cur = self.get(parent).map(|n| n.first_child).unwrap_or(NodeId::NONE);
        while cur.is_valid() {
            out.push(cur);
            cur = self.nodes[cur.index()].next_sibling;
        }
        out
    }

    /// Child element IDs, in order
    pub fn child_elements(&self, parent: NodeId) -> Vec<NodeId> {
        self.children(parent)
            .into_iter()
            .filter(|&c| self.nodes[c.index()].is_element())
            .collect()
    }

    /// All descendants of a node, preorder (excluding the node itself)
    pub fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(root);
        stack.reverse();
        while let Some(id) = stack.pop() {
            out.push(id);
            let mut kids = self.children(id);
            kids.reverse();
            stack.extend(kids);
        }
        out
    }

    /// Whether `node` is reachable from the document root
    pub fn attached(&self, node: NodeId) -> bool {
        let mut cur = node;
        while cur.is_valid() {
            if cur == NodeId::ROOT {
                return true;
            }
            cur = self.parent(cur);
        }
        false
    }

    /// Whether `ancestor` contains `node` (inclusive)
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut cur = node;
        while cur.is_valid() {
            if cur == ancestor {
                return true;
            }
            cur = self.parent(cur);
        }
        false
    }

    /// Unlink a node from its parent. The subtree stays intact.
    pub fn detach(&mut self, id: NodeId) {
        let (parent, prev, next) = match self.get(id) {
            Some(n) => (n.parent, n.prev_sibling, n.next_sibling),
            None => return,
        };
        if !parent.is_valid() {
            return;
        }
        if prev.is_valid() {
            self.nodes[prev.index()].next_sibling = next;
        } else {
            self.nodes[parent.index()].first_child = next;
        }
        if next.is_valid() {
            self.nodes[next.index()].prev_sibling = prev;
        } else {
            self.nodes[parent.index()].last_child = prev;
        }
        let node = &mut self.nodes[id.index()];
        node.parent = NodeId::NONE;
        node.prev_sibling = NodeId::NONE;
        node.next_sibling = NodeId::NONE;
        self.mutations += 1;
    }

    /// Append a child node (detaching it from any previous parent)
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> DomResult<()> {
        self.insert_before(parent, child, None)
    }

    /// Insert `child` into `parent` before `reference` (append when `None`)
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> DomResult<()> {
        if self.get(parent).is_none() || self.get(child).is_none() {
            return Err(DomError::NotFound);
        }
        if self.contains(child, parent) {
            return Err(DomError::HierarchyRequest);
        }
        if let Some(r) = reference {
            if r == child {
                return Ok(());
            }
            if self.parent(r) != parent {
                return Err(DomError::NotAChild);
            }
        }
        if self.parent(child).is_valid() {
            self.detach(child);
        }
        match reference {
            Some(r) => {
                let prev = self.nodes[r.index()].prev_sibling;
                self.nodes[child.index()].prev_sibling = prev;
                self.nodes[child.index()].next_sibling = r;
                self.nodes[child.index()].parent = parent;
                self.nodes[r.index()].prev_sibling = child;
                if prev.is_valid() {
                    self.nodes[prev.index()].next_sibling = child;
                } else {
                    self.nodes[parent.index()].first_child = child;
                }
            }
            None => {
                let last = self.nodes[parent.index()].last_child;
                self.nodes[child.index()].prev_sibling = last;
                self.nodes[child.index()].next_sibling = NodeId::NONE;
                self.nodes[child.index()].parent = parent;
                if last.is_valid() {
                    self.nodes[last.index()].next_sibling = child;
                } else {
                    self.nodes[parent.index()].first_child = child;
                }
                self.nodes[parent.index()].last_child = child;
            }
        }
        self.mutations += 1;
        Ok(())
    }

    /// Detach every child of a node
    pub fn clear_children(&mut self, parent: NodeId) {
        for child in self.children(parent) {
            self.detach(child);
        }
    }

    /// Deep-copy a subtree from another tree into this one, detached
    pub fn adopt(&mut self, other: &DomTree, node: NodeId) -> DomResult<NodeId> {
        let data = other.get(node).ok_or(DomError::NotFound)?.data.clone();
        let copy = self.alloc(data);
        for child in other.children(node) {
            let child_copy = self.adopt(other, child)?;
            self.append_child(copy, child_copy)?;
        }
        Ok(copy)
    }

    // ---- element access ------------------------------------------------

    /// Element data of a node
    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        self.get(id).and_then(|n| n.as_element())
    }

    /// Mutable element data of a node
    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        self.get_mut(id).and_then(|n| n.as_element_mut())
    }

    /// Lowercase tag name of an element node
    pub fn tag(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|e| e.tag.as_str())
    }

    /// Attribute value on an element node
    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id).and_then(|e| e.attr(name))
    }

    /// Attribute presence on an element node
    pub fn has_attr(&self, id: NodeId, name: &str) -> bool {
        self.element(id).map(|e| e.has_attr(name)).unwrap_or(false)
    }

    /// Set an attribute, counting a mutation only when the value changed
    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) {
        if let Some(e) = self.element_mut(id) {
            if e.set_attr(name, value) {
                self.mutations += 1;
            }
        }
    }

    /// Remove an attribute, counting a mutation only when it was present
    pub fn remove_attr(&mut self, id: NodeId, name: &str) {
        if let Some(e) = self.element_mut(id) {
            if e.remove_attr(name) {
                self.mutations += 1;
            }
        }
    }

    /// Find the first element with the given non-empty id, searching `root`'s
    /// subtree in document order
    pub fn element_by_id(&self, root: NodeId, id: &str) -> Option<NodeId> {
        if id.is_empty() {
            return None;
        }
        self.descendants(root)
            .into_iter()
            .find(|&n| self.element(n).and_then(|e| e.id()) == Some(id))
    }

    /// Nearest ancestor (inclusive) carrying the given attribute
    pub fn closest_with_attr(&self, node: NodeId, name: &str) -> Option<NodeId> {
        let mut cur = node;
        while cur.is_valid() {
            if self.has_attr(cur, name) {
                return Some(cur);
            }
            cur = self.parent(cur);
        }
        None
    }

    // ---- text ----------------------------------------------------------

    /// Concatenated text of all descendant text nodes
    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        if let Some(t) = self.get(node).and_then(|n| n.as_text()) {
            out.push_str(t);
        }
        for d in self.descendants(node) {
            if let Some(t) = self.nodes[d.index()].as_text() {
                out.push_str(t);
            }
        }
        out
    }

    /// Replace a node's children with a single text node (only if different)
    pub fn set_text_content(&mut self, node: NodeId, text: &str) {
        if self.text_content(node) == text {
            return;
        }
        self.clear_children(node);
        if !text.is_empty() {
            let t = self.create_text(text);
            let _ = self.append_child(node, t);
        }
        self.mutations += 1;
    }

    // ---- form-control state --------------------------------------------

    /// Live value of an input/textarea (falls back to markup)
    pub fn value(&self, id: NodeId) -> String {
        let Some(e) = self.element(id) else {
            return String::new();
        };
        if let Some(v) = &e.live_value {
            return v.clone();
        }
        match e.tag.as_str() {
            "textarea" => self.text_content(id),
            _ => e.attr("value").unwrap_or("").to_string(),
        }
    }

    /// Set the live value of an input/textarea
    pub fn set_value(&mut self, id: NodeId, value: &str) {
        if let Some(e) = self.element_mut(id) {
            e.live_value = Some(value.to_string());
        }
    }

    /// Live checked state of an input (falls back to the attribute)
    pub fn checked(&self, id: NodeId) -> bool {
        self.element(id)
            .map(|e| e.live_checked.unwrap_or(e.has_attr("checked")))
            .unwrap_or(false)
    }

    /// Set the live checked state of an input
    pub fn set_checked(&mut self, id: NodeId, on: bool) {
        if let Some(e) = self.element_mut(id) {
            e.live_checked = Some(on);
        }
    }
}

impl Default for DomTree {
    fn default() -> Self {
        Self::new()
    }
}
