//! Document node model.
//!
//! Nodes live in an `Arena<Node>` and are referenced by [`NodeId`]. Tree
//! structure is encoded through parent/child/sibling links stored on each
//! node; the links themselves are maintained by [`crate::tree::Tree`].

use crate::arena::Handle;

/// Handle uniquely identifying a node in the document tree.
pub type NodeId = Handle;

// ---------------------------------------------------------------------------
// Attribute
// ---------------------------------------------------------------------------

/// One name/value pair. Used for both attributes and element properties.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attr {
    pub name: String,
    pub value: String,
}

impl Attr {
    pub fn new(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Element data
// ---------------------------------------------------------------------------

/// Data specific to element nodes.
///
/// `id` and `classes` mirror the corresponding attributes and are kept in
/// sync by the attribute setters so selector matching never re-splits the
/// `class` string.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct ElementData {
    pub tag: String,
    pub attrs: Vec<Attr>,
    /// Cached `id` attribute value.
    pub id: Option<String>,
    /// Cached class list, split from the `class` attribute.
    pub classes: Vec<String>,
    /// Element properties. A separate namespace from attributes, matching
    /// the attribute/property split of a live DOM.
    pub props: Vec<Attr>,
}

impl ElementData {
    pub fn new(tag: &str, attrs: Vec<Attr>) -> Self {
        let mut data = Self {
            tag: tag.to_string(),
            ..Self::default()
        };
        for attr in attrs {
            data.set_attr(&attr.name, &attr.value);
        }
        data
    }

    /// Attribute value by name, if present.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Set (or overwrite) an attribute, refreshing the id/class caches.
    pub fn set_attr(&mut self, name: &str, value: &str) {
        match self.attrs.iter_mut().find(|a| a.name == name) {
            Some(attr) => attr.value = value.to_string(),
            None => self.attrs.push(Attr::new(name, value)),
        }
        match name {
            "id" => self.id = Some(value.to_string()),
            "class" => {
                self.classes = value.split_whitespace().map(String::from).collect();
            }
            _ => {}
        }
    }

    /// Property value by name, if present.
    pub fn prop(&self, name: &str) -> Option<&str> {
        self.props
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value.as_str())
    }

    /// Set (or overwrite) a property.
    pub fn set_prop(&mut self, name: &str, value: &str) {
        match self.props.iter_mut().find(|p| p.name == name) {
            Some(prop) => prop.value = value.to_string(),
            None => self.props.push(Attr::new(name, value)),
        }
    }
}

// ---------------------------------------------------------------------------
// Node data (variant per node type)
// ---------------------------------------------------------------------------

/// Payload distinguishing the kinds of nodes a document can hold.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeData {
    Document,
    Element(ElementData),
    Text { text: String },
    Comment { text: String },
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// A single node: payload plus intrusive tree links.
///
/// The links form a doubly-linked child list so structural mutation is O(1).
#[derive(Clone, Debug)]
pub struct Node {
    pub data: NodeData,

    pub parent: Option<NodeId>,
    pub first_child: Option<NodeId>,
    pub last_child: Option<NodeId>,
    pub prev_sibling: Option<NodeId>,
    pub next_sibling: Option<NodeId>,
}

impl Node {
    /// A detached node with no links.
    pub fn new(data: NodeData) -> Self {
        Self {
            data,
            parent: None,
            first_child: None,
            last_child: None,
            prev_sibling: None,
            next_sibling: None,
        }
    }

    pub fn is_element(&self) -> bool {
        matches!(self.data, NodeData::Element(_))
    }

    pub fn is_text(&self) -> bool {
        matches!(self.data, NodeData::Text { .. })
    }

    pub fn is_document(&self) -> bool {
        matches!(self.data, NodeData::Document)
    }

    pub fn as_element(&self) -> Option<&ElementData> {
        match &self.data {
            NodeData::Element(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut ElementData> {
        match &mut self.data {
            NodeData::Element(e) => Some(e),
            _ => None,
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_data_caches_id_and_classes() {
        let data = ElementData::new(
            "div",
            vec![Attr::new("id", "main"), Attr::new("class", "a b  c")],
        );
        assert_eq!(data.id.as_deref(), Some("main"));
        assert_eq!(data.classes, vec!["a", "b", "c"]);
        assert_eq!(data.attr("id"), Some("main"));
        assert_eq!(data.attr("missing"), None);
    }

    #[test]
    fn set_attr_refreshes_caches() {
        let mut data = ElementData::new("p", vec![]);
        data.set_attr("class", "one");
        assert_eq!(data.classes, vec!["one"]);

        data.set_attr("class", "two three");
        assert_eq!(data.classes, vec!["two", "three"]);
        assert_eq!(data.attrs.len(), 1);

        data.set_attr("id", "x");
        assert_eq!(data.id.as_deref(), Some("x"));
    }

    #[test]
    fn props_are_independent_of_attrs() {
        let mut data = ElementData::new("input", vec![Attr::new("value", "attr")]);
        data.set_prop("value", "prop");
        assert_eq!(data.attr("value"), Some("attr"));
        assert_eq!(data.prop("value"), Some("prop"));

        data.set_prop("value", "updated");
        assert_eq!(data.prop("value"), Some("updated"));
        assert_eq!(data.props.len(), 1);
    }

    #[test]
    fn node_kind_predicates() {
        let el = Node::new(NodeData::Element(ElementData::new("div", vec![])));
        let text = Node::new(NodeData::Text { text: "hi".into() });
        let doc = Node::new(NodeData::Document);

        assert!(el.is_element() && !el.is_text());
        assert!(text.is_text() && !text.is_element());
        assert!(doc.is_document());
        assert!(el.as_element().is_some());
        assert!(text.as_element().is_none());
    }
}
