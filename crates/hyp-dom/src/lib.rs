//! hyp DOM - Document Object Model
//!
//! Memory-efficient arena-based DOM tree. Nodes live in a flat vector and
//! reference each other through `NodeId` indices, so an element's identity
//! is stable for the lifetime of the document even as it moves around the
//! tree (which is what the morph engine relies on).

mod document;
mod node;
mod selector;
mod serialize;
mod tree;

pub use document::Document;
pub use node::{Attribute, ElementData, Node, NodeData};
pub use selector::Selector;
pub use serialize::{inner_html, outer_html};
pub use tree::DomTree;

/// Node identifier (index into the arena)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Sentinel for "no node"
    pub const NONE: NodeId = NodeId(u32::MAX);

    /// Root (document) node ID
    pub const ROOT: NodeId = NodeId(0);

    /// Check whether this ID refers to a node at all
    #[inline]
    pub fn is_valid(self) -> bool {
        self != Self::NONE
    }

    /// Raw index value
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Result type for DOM operations
pub type DomResult<T> = Result<T, DomError>;

/// DOM operation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomError {
    #[error("node not found")]
    NotFound,

    #[error("node is not an element")]
    NotAnElement,

    #[error("node is not a child of the given parent")]
    NotAChild,

    #[error("operation would create a cycle")]
    HierarchyRequest,
}
