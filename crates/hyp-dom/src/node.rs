//! DOM Node
//!
//! Node layout mirrors a linked tree over arena indices: parent, first/last
//! child and sibling links are all `NodeId`s (4 bytes each) instead of
//! pointers.

use crate::NodeId;

/// DOM Node - core structure
#[derive(Debug, Clone)]
pub struct Node {
    /// Parent node (NONE if detached or root)
    pub parent: NodeId,
    /// First child
    pub first_child: NodeId,
    /// Last child (for O(1) append)
    pub last_child: NodeId,
    /// Previous sibling
    pub prev_sibling: NodeId,
    /// Next sibling
    pub next_sibling: NodeId,
    /// Node-specific data
    pub data: NodeData,
}

impl Node {
    pub(crate) fn detached(data: NodeData) -> Self {
        Self {
            parent: NodeId::NONE,
            first_child: NodeId::NONE,
            last_child: NodeId::NONE,
            prev_sibling: NodeId::NONE,
            next_sibling: NodeId::NONE,
            data,
        }
    }

    /// Check if this is an element
    #[inline]
    pub fn is_element(&self) -> bool {
        matches!(self.data, NodeData::Element(_))
    }

    /// Check if this is text
    #[inline]
    pub fn is_text(&self) -> bool {
        matches!(self.data, NodeData::Text(_))
    }

    /// Get element data if this is an element
    #[inline]
    pub fn as_element(&self) -> Option<&ElementData> {
        match &self.data {
            NodeData::Element(e) => Some(e),
            _ => None,
        }
    }

    /// Get mutable element data
    #[inline]
    pub fn as_element_mut(&mut self) -> Option<&mut ElementData> {
        match &mut self.data {
            NodeData::Element(e) => Some(e),
            _ => None,
        }
    }

    /// Get text content if this is a text node
    #[inline]
    pub fn as_text(&self) -> Option<&str> {
        match &self.data {
            NodeData::Text(t) => Some(t),
            _ => None,
        }
    }
}

/// Node-specific data
#[derive(Debug, Clone)]
pub enum NodeData {
    /// Document root
    Document,
    /// Element
    Element(ElementData),
    /// Text content
    Text(String),
    /// Comment
    Comment(String),
}

/// Attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

/// Element-specific data
///
/// Live form-control state (`live_value`, `live_checked`) is kept separate
/// from the attribute list so it never leaks into serialized markup; `None`
/// means "defer to the attribute".
#[derive(Debug, Clone)]
pub struct ElementData {
    /// Tag name, lowercase
    pub tag: String,
    /// Attributes, in document order
    pub attrs: Vec<Attribute>,
    /// Live value of an input/textarea, if it diverged from the attribute
    pub live_value: Option<String>,
    /// Live checked state of an input, if it diverged from the attribute
    pub live_checked: Option<bool>,
}

impl ElementData {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attrs: Vec::new(),
            live_value: None,
            live_checked: None,
        }
    }

    /// Get an attribute value
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Check attribute presence
    pub fn has_attr(&self, name: &str) -> bool {
        self.attrs.iter().any(|a| a.name == name)
    }

    /// Set an attribute, returning true if anything changed
    pub fn set_attr(&mut self, name: &str, value: &str) -> bool {
        for attr in self.attrs.iter_mut() {
            if attr.name == name {
                if attr.value == value {
                    return false;
                }
                attr.value = value.to_string();
                return true;
            }
        }
        self.attrs.push(Attribute {
            name: name.to_string(),
            value: value.to_string(),
        });
        true
    }

    /// Remove an attribute, returning true if it was present
    pub fn remove_attr(&mut self, name: &str) -> bool {
        let before = self.attrs.len();
        self.attrs.retain(|a| a.name != name);
        self.attrs.len() != before
    }

    /// The `id` attribute, if non-empty
    pub fn id(&self) -> Option<&str> {
        self.attr("id").filter(|id| !id.is_empty())
    }

    /// Check class-list membership
    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .map(|c| c.split_ascii_whitespace().any(|p| p == class))
            .unwrap_or(false)
    }

    /// Add a class (no-op if already present)
    pub fn add_class(&mut self, class: &str) {
        if self.has_class(class) {
            return;
        }
        let next = match self.attr("class") {
            Some(c) if !c.is_empty() => format!("{} {}", c, class),
            _ => class.to_string(),
        };
        self.set_attr("class", &next);
    }

    /// Remove a class (no-op if absent)
    pub fn remove_class(&mut self, class: &str) {
        if let Some(c) = self.attr("class") {
            let next = c
                .split_ascii_whitespace()
                .filter(|p| *p != class)
                .collect::<Vec<_>>()
                .join(" ");
            self.set_attr("class", &next);
        }
    }

    /// Whether this element carries a live text value (input or textarea)
    pub fn is_text_control(&self) -> bool {
        self.tag == "input" || self.tag == "textarea"
    }

    /// Whether this element contributes form fields
    pub fn is_form_control(&self) -> bool {
        matches!(self.tag.as_str(), "input" | "textarea" | "select")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attr_roundtrip() {
        let mut el = ElementData::new("DIV");
        assert_eq!(el.tag, "div");
        assert!(el.set_attr("id", "a"));
        assert!(!el.set_attr("id", "a"), "unchanged value is not a mutation");
        assert_eq!(el.attr("id"), Some("a"));
        assert!(el.remove_attr("id"));
        assert!(!el.remove_attr("id"));
    }

    #[test]
    fn test_class_list() {
        let mut el = ElementData::new("a");
        el.add_class("h-disabled");
        el.add_class("h-disabled");
        assert_eq!(el.attr("class"), Some("h-disabled"));
        el.add_class("other");
        el.remove_class("h-disabled");
        assert_eq!(el.attr("class"), Some("other"));
    }

    #[test]
    fn test_empty_id_is_none() {
        let mut el = ElementData::new("li");
        el.set_attr("id", "");
        assert_eq!(el.id(), None);
    }
}
