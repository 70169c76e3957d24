//! Events and listeners.
//!
//! Events bubble from the target up its ancestor chain; there is no capture
//! phase because nothing in this library registers capture listeners. The
//! dispatch walk itself lives on [`crate::document::Document`], which can
//! invoke callbacks without holding its interior borrow; this module owns
//! the data: the event value, listener entries, and the per-node listener
//! map.

use std::collections::HashMap;
use std::rc::Rc;

use crate::document::Document;
use crate::node::NodeId;

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// An event travelling through the tree.
#[derive(Clone, Debug)]
pub struct Event {
    /// Event type name (e.g. `"click"`).
    pub name: String,

    /// The node the event was dispatched on.
    pub target: Option<NodeId>,

    /// The node whose listeners are currently being invoked.
    pub current_target: Option<NodeId>,

    /// Whether the event walks up the ancestor chain after the target.
    pub bubbles: bool,

    /// Whether the default action can be prevented.
    pub cancelable: bool,

    /// Set once `prevent_default()` is called.
    pub default_prevented: bool,

    /// Set once `stop_propagation()` is called.
    pub propagation_stopped: bool,
}

impl Event {
    pub fn new(name: &str, bubbles: bool, cancelable: bool) -> Self {
        Self {
            name: name.to_string(),
            target: None,
            current_target: None,
            bubbles,
            cancelable,
            default_prevented: false,
            propagation_stopped: false,
        }
    }

    /// A bubbling, cancelable event — the shape synthetic dispatch uses.
    pub fn synthetic(name: &str) -> Self {
        Self::new(name, true, true)
    }

    pub fn prevent_default(&mut self) {
        if self.cancelable {
            self.default_prevented = true;
        }
    }

    /// Let the current node's remaining listeners finish, then stop walking.
    pub fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }
}

// ---------------------------------------------------------------------------
// Listener
// ---------------------------------------------------------------------------

/// Handle for removing a registered listener.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(pub(crate) u64);

/// Type-erased listener callback. `Rc` so the map can hand out snapshots
/// that outlive its borrow during dispatch.
pub(crate) type ListenerFn = Rc<dyn Fn(&Document, &mut Event)>;

/// One listener attached to a node.
#[derive(Clone)]
pub(crate) struct EventListener {
    pub(crate) id: ListenerId,
    pub(crate) name: String,
    /// Remove after the first invocation.
    pub(crate) once: bool,
    pub(crate) callback: ListenerFn,
}

impl std::fmt::Debug for EventListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventListener")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("once", &self.once)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Listener map
// ---------------------------------------------------------------------------

/// Listener storage for every node that has at least one.
#[derive(Debug, Default)]
pub(crate) struct ListenerMap {
    listeners: HashMap<NodeId, Vec<EventListener>>,
    next_id: u64,
}

impl ListenerMap {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register a listener on `node`; returns its removal handle.
    pub(crate) fn add(
        &mut self,
        node: NodeId,
        name: &str,
        once: bool,
        callback: ListenerFn,
    ) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.entry(node).or_default().push(EventListener {
            id,
            name: name.to_string(),
            once,
            callback,
        });
        id
    }

    /// Remove one listener from `node` by id.
    pub(crate) fn remove(&mut self, node: NodeId, id: ListenerId) {
        if let Some(list) = self.listeners.get_mut(&node) {
            list.retain(|l| l.id != id);
            if list.is_empty() {
                self.listeners.remove(&node);
            }
        }
    }

    /// Snapshot of `node`'s listeners matching the event name. Listeners
    /// flagged `once` are removed from the map as part of taking the
    /// snapshot, so they can never fire twice.
    pub(crate) fn take_matching(&mut self, node: NodeId, name: &str) -> Vec<EventListener> {
        let Some(list) = self.listeners.get_mut(&node) else {
            return Vec::new();
        };
        let snapshot: Vec<EventListener> =
            list.iter().filter(|l| l.name == name).cloned().collect();
        list.retain(|l| !(l.once && l.name == name));
        if list.is_empty() {
            self.listeners.remove(&node);
        }
        snapshot
    }

    /// Number of listeners currently attached to `node` for `name`.
    pub(crate) fn count(&self, node: NodeId, name: &str) -> usize {
        self.listeners
            .get(&node)
            .map(|list| list.iter().filter(|l| l.name == name).count())
            .unwrap_or(0)
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Tree;

    fn some_node() -> NodeId {
        let mut tree = Tree::new();
        tree.create_element("div", vec![])
    }

    fn noop() -> ListenerFn {
        Rc::new(|_, _| {})
    }

    #[test]
    fn event_flags() {
        let mut event = Event::synthetic("click");
        assert!(event.bubbles && event.cancelable);
        assert!(!event.default_prevented);

        event.prevent_default();
        assert!(event.default_prevented);

        event.stop_propagation();
        assert!(event.propagation_stopped);
    }

    #[test]
    fn prevent_default_on_non_cancelable_is_noop() {
        let mut event = Event::new("scroll", true, false);
        event.prevent_default();
        assert!(!event.default_prevented);
    }

    #[test]
    fn add_and_count() {
        let node = some_node();
        let mut map = ListenerMap::new();
        map.add(node, "click", false, noop());
        map.add(node, "click", false, noop());
        map.add(node, "keydown", false, noop());

        assert_eq!(map.count(node, "click"), 2);
        assert_eq!(map.count(node, "keydown"), 1);
        assert_eq!(map.count(node, "focus"), 0);
    }

    #[test]
    fn remove_by_id() {
        let node = some_node();
        let mut map = ListenerMap::new();
        let a = map.add(node, "click", false, noop());
        let b = map.add(node, "click", false, noop());

        map.remove(node, a);
        assert_eq!(map.count(node, "click"), 1);
        let snapshot = map.take_matching(node, "click");
        assert_eq!(snapshot[0].id, b);
    }

    #[test]
    fn take_matching_consumes_once_listeners() {
        let node = some_node();
        let mut map = ListenerMap::new();
        map.add(node, "click", true, noop());
        map.add(node, "click", false, noop());

        let snapshot = map.take_matching(node, "click");
        assert_eq!(snapshot.len(), 2);

        // The once-listener is gone; the persistent one remains.
        assert_eq!(map.count(node, "click"), 1);
        let snapshot = map.take_matching(node, "click");
        assert_eq!(snapshot.len(), 1);
        assert!(!snapshot[0].once);
    }

    #[test]
    fn take_matching_leaves_other_events_alone() {
        let node = some_node();
        let mut map = ListenerMap::new();
        map.add(node, "click", true, noop());
        map.add(node, "keydown", true, noop());

        map.take_matching(node, "click");
        assert_eq!(map.count(node, "keydown"), 1);
    }

    #[test]
    fn unknown_node_is_empty() {
        let node = some_node();
        let mut map = ListenerMap::new();
        assert!(map.take_matching(node, "click").is_empty());
        map.remove(node, ListenerId(7));
    }
}
