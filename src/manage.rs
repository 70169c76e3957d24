//! Element manager.
//!
//! A chainable builder that resolves to exactly one working element — found,
//! freshly created, adopted, or replacing another — and then applies
//! structural and attribute mutations to it:
//!
//! ```no_run
//! # use lookout::{Document, find, Anchor};
//! # let doc = Document::new();
//! find(&doc, "#status")?
//!     .or()
//!     .create("div")
//!     .set_attrs(&[("id", "status"), ("class", "panel")])
//!     .on(Anchor::Body)
//!     .then()
//!     .set_attrs(&[("class__$", " ready")]);
//! # Ok::<(), lookout::SelectorError>(())
//! ```
//!
//! The `or()`/`then()` pair expresses "find, or else build": `or()` starts
//! skipping calls when the find already succeeded, `then()` resumes
//! unconditionally. While skipping (`bypass`), every mutating method returns
//! the builder untouched so the chain never breaks. An unresolved element
//! likewise turns mutations into no-ops rather than failures.

use std::rc::Rc;

use tracing::warn;

use crate::document::Document;
use crate::error::SelectorError;
use crate::event::Event;
use crate::node::NodeId;

/// Inline-style marker appended by [`Manager::hide`]. Un-hiding removes this
/// exact text, so the constant is load-bearing: changing it strands every
/// element hidden under the old marker.
pub const HIDDEN_STYLE: &str = "; display: none !important;";

// ─────────────────────────────────────────────────────────────────────────────
// Merge modes
// ─────────────────────────────────────────────────────────────────────────────

/// How a written value combines with the current one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MergeMode {
    Overwrite,
    Prepend,
    Append,
}

/// Split a `set` key into its merge mode and bare name: `$__key` prepends,
/// `key__$` appends, anything else overwrites.
pub fn merge_key(key: &str) -> (MergeMode, &str) {
    if let Some(name) = key.strip_prefix("$__") {
        (MergeMode::Prepend, name)
    } else if let Some(name) = key.strip_suffix("__$") {
        (MergeMode::Append, name)
    } else {
        (MergeMode::Overwrite, key)
    }
}

fn merge_value(mode: MergeMode, current: &str, value: &str) -> String {
    match mode {
        MergeMode::Overwrite => value.to_string(),
        MergeMode::Prepend => format!("{value}{current}"),
        MergeMode::Append => format!("{current}{value}"),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Content values
// ─────────────────────────────────────────────────────────────────────────────

/// A property value for [`Manager::set`]: either plain text (merged per the
/// key's sigil) or an updater receiving the current value.
#[derive(Clone)]
pub enum PropValue {
    Value(String),
    Update(Rc<dyn Fn(&str) -> String>),
}

impl PropValue {
    pub fn value(value: &str) -> Self {
        Self::Value(value.to_string())
    }

    pub fn update(update: impl Fn(&str) -> String + 'static) -> Self {
        Self::Update(Rc::new(update))
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        Self::value(value)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Anchors
// ─────────────────────────────────────────────────────────────────────────────

/// Where [`Manager::on`] mounts an element.
#[derive(Clone, Debug)]
pub enum Anchor {
    Body,
    Selector(String),
    Node(NodeId),
}

impl From<&str> for Anchor {
    fn from(selector: &str) -> Self {
        Self::Selector(selector.to_string())
    }
}

impl From<NodeId> for Anchor {
    fn from(node: NodeId) -> Self {
        Self::Node(node)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Entry points
// ─────────────────────────────────────────────────────────────────────────────

/// Start a chain from the first element matching `selector` (or from
/// nothing, if no element matches).
pub fn find(doc: &Document, selector: &str) -> Result<Manager, SelectorError> {
    Manager::new(doc).find(selector)
}

/// Start a chain from a freshly created, detached element.
pub fn create(doc: &Document, tag: &str) -> Manager {
    Manager::new(doc).create(tag)
}

/// Start a chain that will replace the first element matching `selector`
/// once [`Manager::with`] supplies the replacement.
pub fn replace(doc: &Document, selector: &str) -> Result<Manager, SelectorError> {
    Manager::new(doc).replace(selector)
}

/// Start a chain from a caller-supplied element.
pub fn adopt(doc: &Document, node: NodeId) -> Manager {
    Manager::new(doc).adopt(node)
}

// ─────────────────────────────────────────────────────────────────────────────
// Manager
// ─────────────────────────────────────────────────────────────────────────────

/// Fluent element builder. See the module docs for the chain shapes.
pub struct Manager {
    doc: Document,
    element: Option<NodeId>,
    found: bool,
    bypass: bool,
    replaced: Option<NodeId>,
}

impl Manager {
    fn new(doc: &Document) -> Self {
        Self {
            doc: doc.clone(),
            element: None,
            found: false,
            bypass: false,
            replaced: None,
        }
    }

    /// The current working element, if resolved.
    pub fn node(&self) -> Option<NodeId> {
        self.element
    }

    /// Did `find` locate an existing element?
    pub fn was_found(&self) -> bool {
        self.found
    }

    // -- resolving the working element ---------------------------------------

    /// Resolve to the first match of `selector`; records whether one existed.
    pub fn find(mut self, selector: &str) -> Result<Self, SelectorError> {
        if self.bypass {
            return Ok(self);
        }
        self.element = self.doc.query_first(selector)?;
        self.found = self.element.is_some();
        Ok(self)
    }

    /// Resolve to a new, detached element of `tag`.
    pub fn create(mut self, tag: &str) -> Self {
        if self.bypass {
            return self;
        }
        self.element = Some(self.doc.create_element(tag));
        self
    }

    /// Record the first match of `selector` for replacement by
    /// [`Manager::with`]. Nothing is mutated yet.
    pub fn replace(mut self, selector: &str) -> Result<Self, SelectorError> {
        if self.bypass {
            return Ok(self);
        }
        self.replaced = self.doc.query_first(selector)?;
        Ok(self)
    }

    /// Resolve to a caller-supplied element.
    pub fn adopt(mut self, node: NodeId) -> Self {
        if self.bypass {
            return self;
        }
        self.element = Some(node);
        self
    }

    // -- branch control -------------------------------------------------------

    /// Enter the alternate path: if `find` already succeeded, every call up
    /// to [`Manager::then`] is skipped.
    pub fn or(mut self) -> Self {
        self.bypass = self.found;
        self
    }

    /// Resume normal operation regardless of which branch ran.
    pub fn then(mut self) -> Self {
        self.bypass = false;
        self
    }

    // -- placement ------------------------------------------------------------

    /// Append the element to the resolved parent unless it is already
    /// attached to the document. An anchor selector that resolves to nothing
    /// leaves the element where it is.
    pub fn on(self, anchor: impl Into<Anchor>) -> Self {
        if self.bypass {
            return self;
        }
        let Some(element) = self.element else {
            return self;
        };
        if self.doc.is_connected(element) {
            return self;
        }

        let parent = match anchor.into() {
            Anchor::Body => Some(self.doc.body()),
            Anchor::Node(node) => Some(node),
            Anchor::Selector(selector) => match self.doc.query_first(&selector) {
                Ok(Some(parent)) => Some(parent),
                Ok(None) => {
                    warn!(%selector, "anchor matched nothing; element left detached");
                    None
                }
                Err(err) => {
                    warn!(%selector, %err, "anchor selector failed; element left detached");
                    None
                }
            },
        };
        if let Some(parent) = parent {
            self.doc.append(parent, element);
        }
        self
    }

    /// Swap the element recorded by [`Manager::replace`] for `other`'s
    /// element, in the document. Returns the *other* manager — the chain
    /// continues on the new element.
    pub fn with(self, other: Manager) -> Manager {
        if self.bypass {
            return other;
        }
        if let (Some(target), Some(replacement)) = (self.replaced, other.element) {
            self.doc.replace_node(target, replacement);
        }
        other
    }

    // -- attributes and properties --------------------------------------------

    /// Apply attribute pairs and property content to the element. Keys carry
    /// their merge direction via the `$__key` / `key__$` sigils (see
    /// [`merge_key`]); updater content receives the current property value.
    pub fn set(self, attributes: &[(&str, &str)], content: &[(&str, PropValue)]) -> Self {
        if self.bypass {
            return self;
        }
        let Some(element) = self.element else {
            return self;
        };

        for (key, value) in attributes {
            let (mode, name) = merge_key(key);
            let current = self.doc.attribute(element, name).unwrap_or_default();
            self.doc
                .set_attribute(element, name, &merge_value(mode, &current, value));
        }
        for (key, value) in content {
            let (mode, name) = merge_key(key);
            let current = self.doc.property(element, name).unwrap_or_default();
            let next = match value {
                PropValue::Update(update) => update(&current),
                PropValue::Value(value) => merge_value(mode, &current, value),
            };
            self.doc.set_property(element, name, &next);
        }
        self
    }

    /// [`Manager::set`] with attributes only.
    pub fn set_attrs(self, attributes: &[(&str, &str)]) -> Self {
        self.set(attributes, &[])
    }

    // -- structural moves -----------------------------------------------------

    /// Overloaded structural move: `"in"`, `"out"`, `"up"`, and `"down"`
    /// step by `amount`; any other string is a selector whose first match
    /// becomes the element's new parent.
    pub fn shift(self, direction_or_selector: &str, amount: usize) -> Self {
        match direction_or_selector {
            "in" => self.nest(amount),
            "out" => self.out(amount),
            "up" => self.up(amount),
            "down" => self.down(amount),
            selector => {
                if self.bypass {
                    return self;
                }
                let Some(element) = self.element else {
                    return self;
                };
                match self.doc.query_first(selector) {
                    Ok(Some(parent)) => self.doc.append(parent, element),
                    Ok(None) => {}
                    Err(err) => warn!(selector, %err, "move target failed"),
                }
                self
            }
        }
    }

    /// Move the element earlier among its siblings, up to `amount` steps,
    /// stopping when no previous sibling remains.
    pub fn up(self, amount: usize) -> Self {
        if self.bypass {
            return self;
        }
        let Some(element) = self.element else {
            return self;
        };
        for _ in 0..amount {
            let Some(prev) = self.doc.prev_sibling(element) else {
                break;
            };
            let Some(parent) = self.doc.parent(element) else {
                break;
            };
            self.doc.insert_before(parent, element, Some(prev));
        }
        self
    }

    /// Move the element later among its siblings, up to `amount` steps,
    /// stopping when no next sibling remains.
    pub fn down(self, amount: usize) -> Self {
        if self.bypass {
            return self;
        }
        let Some(element) = self.element else {
            return self;
        };
        for _ in 0..amount {
            let Some(next) = self.doc.next_sibling(element) else {
                break;
            };
            let Some(parent) = self.doc.parent(element) else {
                break;
            };
            self.doc.insert_after(parent, element, next);
        }
        self
    }

    /// Nest the element inside its previous sibling, up to `amount` levels
    /// deep, stopping when no previous sibling exists.
    pub fn nest(self, amount: usize) -> Self {
        if self.bypass {
            return self;
        }
        let Some(element) = self.element else {
            return self;
        };
        for _ in 0..amount {
            let Some(prev) = self.doc.prev_sibling(element) else {
                break;
            };
            self.doc.append(prev, element);
        }
        self
    }

    /// Un-nest the element, making it a sibling of its parent, up to
    /// `amount` times, stopping at the document body or when no grandparent
    /// exists.
    pub fn out(self, amount: usize) -> Self {
        if self.bypass {
            return self;
        }
        let Some(element) = self.element else {
            return self;
        };
        for _ in 0..amount {
            let Some(parent) = self.doc.parent(element) else {
                break;
            };
            if parent == self.doc.body() {
                break;
            }
            let Some(grandparent) = self.doc.parent(parent) else {
                break;
            };
            self.doc.insert_after(grandparent, element, parent);
        }
        self
    }

    // -- visibility and removal -----------------------------------------------

    /// Toggle visibility by appending (or removing) the [`HIDDEN_STYLE`]
    /// marker on the inline style. Idempotent in both directions;
    /// `hide(true)` then `hide(false)` restores the style string exactly.
    pub fn hide(self, hidden: bool) -> Self {
        if self.bypass {
            return self;
        }
        let Some(element) = self.element else {
            return self;
        };
        let style = self.doc.attribute(element, "style").unwrap_or_default();
        if hidden {
            if !style.contains(HIDDEN_STYLE) {
                self.doc
                    .set_attribute(element, "style", &format!("{style}{HIDDEN_STYLE}"));
            }
        } else if style.contains(HIDDEN_STYLE) {
            self.doc
                .set_attribute(element, "style", &style.replacen(HIDDEN_STYLE, "", 1));
        }
        self
    }

    /// Detach the element from the document, if attached.
    pub fn remove(self) -> Self {
        if self.bypass {
            return self;
        }
        let Some(element) = self.element else {
            return self;
        };
        self.doc.remove(element);
        self
    }

    // -- events ---------------------------------------------------------------

    /// Attach a listener to the element.
    pub fn listen(
        self,
        event: &str,
        callback: impl Fn(&Document, NodeId, &Event) + 'static,
    ) -> Self {
        if self.bypass {
            return self;
        }
        let Some(element) = self.element else {
            return self;
        };
        self.doc
            .add_listener(element, event, move |doc, evt| callback(doc, element, evt));
        self
    }

    /// Dispatch a synthetic bubbling event on the element.
    pub fn trigger(self, event: &str) -> Self {
        if self.bypass {
            return self;
        }
        let Some(element) = self.element else {
            return self;
        };
        self.doc.emit(element, event);
        self
    }
}

// ═════════════════════════════════════════════════════════════════════════════
// Tests
// ═════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn doc_with(markup: &[(&str, &[(&str, &str)])]) -> Document {
        let doc = Document::new();
        for (tag, attrs) in markup {
            let el = doc.create_element_with(tag, attrs);
            doc.append(doc.body(), el);
        }
        doc
    }

    // -- find / create / or / then -------------------------------------------

    #[test]
    fn find_or_create_keeps_existing_element() {
        let doc = doc_with(&[("div", &[("id", "panel")])]);
        let existing = doc.query_first("#panel").unwrap().unwrap();
        let before = doc.query_all("div").unwrap().len();

        let manager = find(&doc, "#panel").unwrap().or().create("div");
        assert_eq!(manager.node(), Some(existing));
        assert!(manager.was_found());
        assert_eq!(doc.query_all("div").unwrap().len(), before);
    }

    #[test]
    fn find_or_create_builds_when_missing() {
        let doc = Document::new();
        let manager = find(&doc, "#panel")
            .unwrap()
            .or()
            .create("div")
            .set_attrs(&[("id", "panel")])
            .on(Anchor::Body);

        assert!(!manager.was_found());
        assert!(doc.query_first("#panel").unwrap().is_some());
    }

    #[test]
    fn bypass_skips_until_then() {
        let doc = doc_with(&[("div", &[("id", "panel")])]);
        let existing = doc.query_first("#panel").unwrap().unwrap();

        let manager = find(&doc, "#panel")
            .unwrap()
            .or()
            .create("span")
            .set_attrs(&[("class", "ignored")])
            .then()
            .set_attrs(&[("data-ready", "yes")]);

        // The bypassed branch neither replaced the element nor wrote attrs.
        assert_eq!(manager.node(), Some(existing));
        assert_eq!(doc.attribute(existing, "class"), None);
        assert_eq!(doc.attribute(existing, "data-ready").as_deref(), Some("yes"));
    }

    #[test]
    fn unresolved_element_makes_mutations_noops() {
        let doc = Document::new();
        let manager = find(&doc, "#missing")
            .unwrap()
            .set_attrs(&[("class", "x")])
            .hide(true)
            .up(2)
            .remove()
            .trigger("click");
        assert_eq!(manager.node(), None);
    }

    #[test]
    fn adopt_uses_supplied_element() {
        let doc = Document::new();
        let el = doc.create_element("section");
        let manager = adopt(&doc, el).on(Anchor::Body);
        assert_eq!(manager.node(), Some(el));
        assert!(doc.is_connected(el));
    }

    // -- set ------------------------------------------------------------------

    #[test]
    fn set_attribute_merge_sigils() {
        let doc = doc_with(&[("div", &[("class", "a")])]);
        let div = doc.query_first("div").unwrap().unwrap();

        adopt(&doc, div).set_attrs(&[("class__$", "x")]);
        assert_eq!(doc.attribute(div, "class").as_deref(), Some("ax"));

        adopt(&doc, div).set_attrs(&[("$__class", "x")]);
        assert_eq!(doc.attribute(div, "class").as_deref(), Some("xax"));

        adopt(&doc, div).set_attrs(&[("class", "x")]);
        assert_eq!(doc.attribute(div, "class").as_deref(), Some("x"));
    }

    #[test]
    fn set_merges_against_absent_attribute() {
        let doc = doc_with(&[("div", &[])]);
        let div = doc.query_first("div").unwrap().unwrap();

        adopt(&doc, div).set_attrs(&[("data-log__$", "entry;")]);
        assert_eq!(doc.attribute(div, "data-log").as_deref(), Some("entry;"));
    }

    #[test]
    fn set_content_values_and_updaters() {
        let doc = doc_with(&[("input", &[])]);
        let input = doc.query_first("input").unwrap().unwrap();

        adopt(&doc, input).set(
            &[],
            &[
                ("value", "start".into()),
                ("value__$", PropValue::value("-end")),
            ],
        );
        assert_eq!(doc.property(input, "value").as_deref(), Some("start-end"));

        adopt(&doc, input).set(
            &[],
            &[("value", PropValue::update(|current| current.to_uppercase()))],
        );
        assert_eq!(doc.property(input, "value").as_deref(), Some("START-END"));
    }

    #[test]
    fn merge_key_parsing() {
        assert_eq!(merge_key("class"), (MergeMode::Overwrite, "class"));
        assert_eq!(merge_key("$__class"), (MergeMode::Prepend, "class"));
        assert_eq!(merge_key("class__$"), (MergeMode::Append, "class"));
    }

    // -- placement ------------------------------------------------------------

    #[test]
    fn on_defaults_to_body_and_skips_when_attached() {
        let doc = Document::new();
        let manager = create(&doc, "div").on(Anchor::Body);
        let el = manager.node().unwrap();
        assert_eq!(doc.parent(el), Some(doc.body()));

        // Already attached: a second mount is a no-op.
        let aside = doc.create_element("aside");
        doc.append(doc.body(), aside);
        adopt(&doc, el).on(aside);
        assert_eq!(doc.parent(el), Some(doc.body()));
    }

    #[test]
    fn on_with_selector_anchor() {
        let doc = doc_with(&[("main", &[("id", "content")])]);
        let manager = create(&doc, "p").on("#content");
        let el = manager.node().unwrap();
        assert_eq!(doc.parent(el), doc.query_first("#content").unwrap());
    }

    #[test]
    fn on_with_missing_anchor_leaves_detached() {
        let doc = Document::new();
        let manager = create(&doc, "p").on("#nowhere");
        assert!(!doc.is_connected(manager.node().unwrap()));
    }

    #[test]
    fn with_replaces_and_returns_other_manager() {
        let doc = doc_with(&[("div", &[("id", "old")])]);
        let old = doc.query_first("#old").unwrap().unwrap();

        let manager = replace(&doc, "#old")
            .unwrap()
            .with(create(&doc, "section").set_attrs(&[("id", "new")]))
            .set_attrs(&[("data-swapped", "yes")]);

        // The chain continued on the replacement.
        let fresh = doc.query_first("#new").unwrap().unwrap();
        assert_eq!(manager.node(), Some(fresh));
        assert!(doc.is_connected(fresh));
        assert!(!doc.is_connected(old));
        assert_eq!(doc.attribute(fresh, "data-swapped").as_deref(), Some("yes"));
    }

    // -- structural moves -----------------------------------------------------

    fn list_doc() -> (Document, NodeId, NodeId, NodeId, NodeId) {
        let doc = Document::new();
        let ul = doc.create_element("ul");
        let a = doc.create_element_with("li", &[("id", "a")]);
        let b = doc.create_element_with("li", &[("id", "b")]);
        let c = doc.create_element_with("li", &[("id", "c")]);
        doc.append(doc.body(), ul);
        doc.append(ul, a);
        doc.append(ul, b);
        doc.append(ul, c);
        (doc, ul, a, b, c)
    }

    #[test]
    fn up_stops_at_first_position() {
        let (doc, ul, a, b, c) = list_doc();
        // b has one previous sibling; asking for two steps moves it once.
        adopt(&doc, b).shift("up", 2);
        assert_eq!(doc.children(ul), vec![b, a, c]);
    }

    #[test]
    fn down_moves_by_steps() {
        let (doc, ul, a, b, c) = list_doc();
        adopt(&doc, a).down(1);
        assert_eq!(doc.children(ul), vec![b, a, c]);

        adopt(&doc, b).shift("down", 5);
        assert_eq!(doc.children(ul), vec![a, c, b]);
    }

    #[test]
    fn nest_moves_into_previous_sibling() {
        let (doc, ul, a, b, c) = list_doc();
        adopt(&doc, b).nest(1);
        assert_eq!(doc.children(ul), vec![a, c]);
        assert_eq!(doc.parent(b), Some(a));
    }

    #[test]
    fn nest_without_previous_sibling_is_noop() {
        let (doc, ul, a, b, c) = list_doc();
        adopt(&doc, a).shift("in", 3);
        assert_eq!(doc.children(ul), vec![a, b, c]);
    }

    #[test]
    fn out_unnests_and_stops_at_body() {
        let (doc, ul, a, ..) = list_doc();
        // One step out: a becomes ul's sibling under body.
        adopt(&doc, a).out(1);
        assert_eq!(doc.parent(a), Some(doc.body()));

        // Further steps stop at the body.
        adopt(&doc, a).shift("out", 4);
        assert_eq!(doc.parent(a), Some(doc.body()));
        assert_eq!(doc.children(doc.body()), vec![ul, a]);
    }

    #[test]
    fn shift_with_selector_reparents() {
        let (doc, _, a, ..) = list_doc();
        let target = doc.create_element_with("div", &[("id", "bin")]);
        doc.append(doc.body(), target);

        adopt(&doc, a).shift("#bin", 0);
        assert_eq!(doc.parent(a), Some(target));
    }

    // -- hide / remove --------------------------------------------------------

    #[test]
    fn hide_is_idempotent_and_roundtrips() {
        let doc = doc_with(&[("div", &[("style", "color: red")])]);
        let div = doc.query_first("div").unwrap().unwrap();

        adopt(&doc, div).hide(true);
        let hidden = doc.attribute(div, "style").unwrap();
        assert_eq!(hidden, format!("color: red{HIDDEN_STYLE}"));

        // Hiding again changes nothing.
        adopt(&doc, div).hide(true);
        assert_eq!(doc.attribute(div, "style").unwrap(), hidden);

        // Un-hiding restores the original exactly; doing it twice is safe.
        adopt(&doc, div).hide(false);
        assert_eq!(doc.attribute(div, "style").as_deref(), Some("color: red"));
        adopt(&doc, div).hide(false);
        assert_eq!(doc.attribute(div, "style").as_deref(), Some("color: red"));
    }

    #[test]
    fn remove_detaches_from_document() {
        let (doc, ul, a, b, c) = list_doc();
        adopt(&doc, b).remove();
        assert_eq!(doc.children(ul), vec![a, c]);
        assert!(!doc.is_connected(b));
    }

    // -- events ---------------------------------------------------------------

    #[test]
    fn listen_and_trigger() {
        let doc = doc_with(&[("button", &[])]);
        let button = doc.query_first("button").unwrap().unwrap();

        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();
        adopt(&doc, button)
            .listen("refresh", move |_, element, event| {
                s.borrow_mut().push((element, event.name.clone()));
            })
            .trigger("refresh");

        assert_eq!(*seen.borrow(), vec![(button, "refresh".to_string())]);
    }
}
