//! Tree ownership and structural mutation.
//!
//! [`Tree`] owns the node arena and keeps the intrusive parent/child/sibling
//! links consistent across insertions, removals, and replacements. It knows
//! nothing about observers or events; the [`crate::document::Document`]
//! handle layers notification on top of these operations.

use crate::arena::Arena;
use crate::node::{Attr, ElementData, Node, NodeData, NodeId};

/// The document tree.
pub struct Tree {
    nodes: Arena<Node>,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    pub fn new() -> Self {
        Self { nodes: Arena::new() }
    }

    // =======================================================================
    // Node creation
    // =======================================================================

    /// Create the document node.
    pub fn create_document(&mut self) -> NodeId {
        self.nodes.insert(Node::new(NodeData::Document))
    }

    /// Create an element with the given attributes; id/class caches are
    /// extracted automatically.
    pub fn create_element(&mut self, tag: &str, attrs: Vec<Attr>) -> NodeId {
        let data = NodeData::Element(ElementData::new(tag, attrs));
        self.nodes.insert(Node::new(data))
    }

    /// Create a text node.
    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.nodes.insert(Node::new(NodeData::Text {
            text: text.to_string(),
        }))
    }

    /// Create a comment node.
    pub fn create_comment(&mut self, text: &str) -> NodeId {
        self.nodes.insert(Node::new(NodeData::Comment {
            text: text.to_string(),
        }))
    }

    // =======================================================================
    // Node access
    // =======================================================================

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        self.nodes.get(id).and_then(|n| n.as_element())
    }

    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        self.nodes.get_mut(id).and_then(|n| n.as_element_mut())
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id).and_then(|n| n.parent)
    }

    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id).and_then(|n| n.prev_sibling)
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id).and_then(|n| n.next_sibling)
    }

    // =======================================================================
    // Structural mutation
    // =======================================================================

    /// Append `child` as the last child of `parent`, detaching it from any
    /// current position first.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        if self.parent(child).is_some() {
            self.detach(child);
        }

        let old_last = self.nodes.get(parent).and_then(|n| n.last_child);

        if let Some(old_last_id) = old_last {
            if let Some(node) = self.nodes.get_mut(old_last_id) {
                node.next_sibling = Some(child);
            }
        }
        if let Some(node) = self.nodes.get_mut(child) {
            node.parent = Some(parent);
            node.prev_sibling = old_last;
            node.next_sibling = None;
        }
        if let Some(node) = self.nodes.get_mut(parent) {
            if node.first_child.is_none() {
                node.first_child = Some(child);
            }
            node.last_child = Some(child);
        }
    }

    /// Insert `child` into `parent`'s child list immediately before
    /// `reference`; with no reference this is `append_child`.
    pub fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: Option<NodeId>) {
        let reference = match reference {
            Some(r) => r,
            None => return self.append_child(parent, child),
        };

        if self.parent(child).is_some() {
            self.detach(child);
        }

        let prev_of_ref = self.nodes.get(reference).and_then(|n| n.prev_sibling);

        if let Some(node) = self.nodes.get_mut(child) {
            node.parent = Some(parent);
            node.prev_sibling = prev_of_ref;
            node.next_sibling = Some(reference);
        }
        if let Some(node) = self.nodes.get_mut(reference) {
            node.prev_sibling = Some(child);
        }
        match prev_of_ref {
            Some(prev_id) => {
                if let Some(node) = self.nodes.get_mut(prev_id) {
                    node.next_sibling = Some(child);
                }
            }
            None => {
                if let Some(node) = self.nodes.get_mut(parent) {
                    node.first_child = Some(child);
                }
            }
        }
    }

    /// Insert `child` into `parent`'s child list immediately after
    /// `reference`.
    pub fn insert_after(&mut self, parent: NodeId, child: NodeId, reference: NodeId) {
        let next_of_ref = self.nodes.get(reference).and_then(|n| n.next_sibling);
        self.insert_before(parent, child, next_of_ref);
    }

    /// Detach `node` from its parent, leaving it (and its subtree) alive as
    /// a free-standing root. No-op on an already detached node.
    pub fn detach(&mut self, node_id: NodeId) {
        let (parent_id, prev, next) = match self.nodes.get(node_id) {
            Some(n) => (n.parent, n.prev_sibling, n.next_sibling),
            None => return,
        };

        if let Some(prev_id) = prev {
            if let Some(node) = self.nodes.get_mut(prev_id) {
                node.next_sibling = next;
            }
        }
        if let Some(next_id) = next {
            if let Some(node) = self.nodes.get_mut(next_id) {
                node.prev_sibling = prev;
            }
        }
        if let Some(pid) = parent_id {
            if let Some(node) = self.nodes.get_mut(pid) {
                if node.first_child == Some(node_id) {
                    node.first_child = next;
                }
                if node.last_child == Some(node_id) {
                    node.last_child = prev;
                }
            }
        }
        if let Some(node) = self.nodes.get_mut(node_id) {
            node.parent = None;
            node.prev_sibling = None;
            node.next_sibling = None;
        }
    }

    /// Swap `replacement` into `old`'s position; `old` becomes detached.
    /// No-op when `old` has no parent.
    pub fn replace_node(&mut self, old: NodeId, replacement: NodeId) {
        let Some(parent) = self.parent(old) else {
            return;
        };
        self.insert_before(parent, replacement, Some(old));
        self.detach(old);
    }

    // =======================================================================
    // Traversal
    // =======================================================================

    /// Immediate children of `parent`, in document order.
    pub fn children(&self, parent: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut cursor = self.nodes.get(parent).and_then(|n| n.first_child);
        while let Some(id) = cursor {
            out.push(id);
            cursor = self.nodes.get(id).and_then(|n| n.next_sibling);
        }
        out
    }

    /// Ancestor chain of `node`: direct parent first, root last.
    pub fn ancestors(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut cursor = self.parent(node);
        while let Some(id) = cursor {
            out.push(id);
            cursor = self.parent(id);
        }
        out
    }

    /// All descendants of `node` in pre-order, not including `node` itself.
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = Vec::new();
        for &child in self.children(node).iter().rev() {
            stack.push(child);
        }
        while let Some(id) = stack.pop() {
            out.push(id);
            for &child in self.children(id).iter().rev() {
                stack.push(child);
            }
        }
        out
    }

    /// Descendant elements of `root` in document order.
    pub fn elements_under(&self, root: NodeId) -> Vec<NodeId> {
        self.descendants(root)
            .into_iter()
            .filter(|&id| self.nodes.get(id).is_some_and(|n| n.is_element()))
            .collect()
    }

    /// Is `node` inside the subtree rooted at `root` (or `root` itself)?
    pub fn subtree_contains(&self, root: NodeId, node: NodeId) -> bool {
        node == root || self.ancestors(node).contains(&root)
    }

    // =======================================================================
    // Attributes and properties
    // =======================================================================

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.element(node).and_then(|e| e.attr(name)).map(String::from)
    }

    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        if let Some(elem) = self.element_mut(node) {
            elem.set_attr(name, value);
        }
    }

    pub fn property(&self, node: NodeId, name: &str) -> Option<String> {
        self.element(node).and_then(|e| e.prop(name)).map(String::from)
    }

    pub fn set_property(&mut self, node: NodeId, name: &str, value: &str) {
        if let Some(elem) = self.element_mut(node) {
            elem.set_prop(name, value);
        }
    }

    /// Tag name of an element node.
    pub fn tag(&self, node: NodeId) -> Option<String> {
        self.element(node).map(|e| e.tag.clone())
    }
}

// ===========================================================================
// Tests
// ===========================================================================
