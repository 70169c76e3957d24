//! The live document handle.
//!
//! [`Document`] owns the tree plus every runtime registry (listeners,
//! mutation observers, timers) behind a cheaply cloneable handle, and is the
//! single-threaded "page" all builders operate on. It supplies the four
//! primitives the builders consume:
//!
//! - **query** — selector resolution against the current tree,
//! - **mutation notification** — child-list changes inside the body subtree
//!   run every observer after the mutation completes,
//! - **timers** — one-shot callbacks drained by [`Document::tick`],
//! - **events** — bubbling dispatch with listener snapshots taken per node,
//!   so callbacks run without any interior borrow held and are free to
//!   mutate the document.
//!
//! Mutations performed *from inside* an observer callback do not recurse:
//! they flag a follow-up round, which the outer delivery loop runs once the
//! current round finishes.

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::{Duration, Instant};

use tracing::trace;

use crate::error::SelectorError;
use crate::event::{Event, ListenerFn, ListenerId, ListenerMap};
use crate::node::{Attr, NodeId};
use crate::observe::{ObserverId, ObserverRegistry};
use crate::selector::{self, SelectorList};
use crate::timer::{TimerId, TimerQueue};
use crate::tree::Tree;

type HostFn = Rc<dyn Fn(&Document)>;

struct DocumentInner {
    tree: Tree,
    root: NodeId,
    body: NodeId,
    listeners: ListenerMap,
    observers: ObserverRegistry<HostFn>,
    timers: TimerQueue<HostFn>,
    delivering: bool,
    mutations_pending: bool,
}

impl DocumentInner {
    /// Is `node` inside the observed subtree (the body)?
    fn observed(&self, node: NodeId) -> bool {
        self.tree.subtree_contains(self.body, node)
    }
}

/// Cloneable handle to one live document.
#[derive(Clone)]
pub struct Document {
    inner: Rc<RefCell<DocumentInner>>,
}

/// Non-owning document handle for long-lived subscriptions.
#[derive(Clone)]
pub struct WeakDocument {
    inner: Weak<RefCell<DocumentInner>>,
}

impl WeakDocument {
    pub fn upgrade(&self) -> Option<Document> {
        self.inner.upgrade().map(|inner| Document { inner })
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// An empty page: document root, `<html>`, `<body>`.
    pub fn new() -> Self {
        let mut tree = Tree::new();
        let root = tree.create_document();
        let html = tree.create_element("html", vec![]);
        let body = tree.create_element("body", vec![]);
        tree.append_child(root, html);
        tree.append_child(html, body);

        Self {
            inner: Rc::new(RefCell::new(DocumentInner {
                tree,
                root,
                body,
                listeners: ListenerMap::new(),
                observers: ObserverRegistry::new(),
                timers: TimerQueue::new(),
                delivering: false,
                mutations_pending: false,
            })),
        }
    }

    pub fn downgrade(&self) -> WeakDocument {
        WeakDocument {
            inner: Rc::downgrade(&self.inner),
        }
    }

    pub fn root(&self) -> NodeId {
        self.inner.borrow().root
    }

    pub fn body(&self) -> NodeId {
        self.inner.borrow().body
    }

    // =======================================================================
    // Node creation
    // =======================================================================

    /// Create a detached element.
    pub fn create_element(&self, tag: &str) -> NodeId {
        self.inner.borrow_mut().tree.create_element(tag, vec![])
    }

    /// Create a detached element with attributes.
    pub fn create_element_with(&self, tag: &str, attrs: &[(&str, &str)]) -> NodeId {
        let attrs = attrs.iter().map(|(n, v)| Attr::new(n, v)).collect();
        self.inner.borrow_mut().tree.create_element(tag, attrs)
    }

    /// Create a detached text node.
    pub fn create_text(&self, text: &str) -> NodeId {
        self.inner.borrow_mut().tree.create_text(text)
    }

    // =======================================================================
    // Structural mutation (notifying)
    // =======================================================================

    /// Append `child` as the last child of `parent`.
    pub fn append(&self, parent: NodeId, child: NodeId) {
        let changed = {
            let mut inner = self.inner.borrow_mut();
            let was_observed = inner.observed(child);
            inner.tree.append_child(parent, child);
            was_observed || inner.observed(child)
        };
        if changed {
            self.notify_mutation();
        }
    }

    /// Insert `child` under `parent` immediately before `reference` (append
    /// when `reference` is `None`).
    pub fn insert_before(&self, parent: NodeId, child: NodeId, reference: Option<NodeId>) {
        let changed = {
            let mut inner = self.inner.borrow_mut();
            let was_observed = inner.observed(child);
            inner.tree.insert_before(parent, child, reference);
            was_observed || inner.observed(child)
        };
        if changed {
            self.notify_mutation();
        }
    }

    /// Insert `child` under `parent` immediately after `reference`.
    pub fn insert_after(&self, parent: NodeId, child: NodeId, reference: NodeId) {
        let changed = {
            let mut inner = self.inner.borrow_mut();
            let was_observed = inner.observed(child);
            inner.tree.insert_after(parent, child, reference);
            was_observed || inner.observed(child)
        };
        if changed {
            self.notify_mutation();
        }
    }

    /// Detach `node` from its parent.
    pub fn remove(&self, node: NodeId) {
        let changed = {
            let mut inner = self.inner.borrow_mut();
            let was_observed = inner.observed(node);
            inner.tree.detach(node);
            was_observed
        };
        if changed {
            self.notify_mutation();
        }
    }

    /// Swap `replacement` into `old`'s position as a single mutation:
    /// observers see one notification round, not an insert plus a removal.
    pub fn replace_node(&self, old: NodeId, replacement: NodeId) {
        let changed = {
            let mut inner = self.inner.borrow_mut();
            let was_observed = inner.observed(old) || inner.observed(replacement);
            inner.tree.replace_node(old, replacement);
            was_observed || inner.observed(replacement)
        };
        if changed {
            self.notify_mutation();
        }
    }

    /// Is `node` attached to this document?
    pub fn is_connected(&self, node: NodeId) -> bool {
        let inner = self.inner.borrow();
        inner.tree.subtree_contains(inner.root, node)
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.inner.borrow().tree.parent(node)
    }

    pub fn prev_sibling(&self, node: NodeId) -> Option<NodeId> {
        self.inner.borrow().tree.prev_sibling(node)
    }

    pub fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        self.inner.borrow().tree.next_sibling(node)
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.inner.borrow().tree.children(node)
    }

    // =======================================================================
    // Attributes and properties (non-notifying: only child-list changes
    // are observed)
    // =======================================================================

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.inner.borrow().tree.attribute(node, name)
    }

    pub fn set_attribute(&self, node: NodeId, name: &str, value: &str) {
        self.inner.borrow_mut().tree.set_attribute(node, name, value);
    }

    pub fn property(&self, node: NodeId, name: &str) -> Option<String> {
        self.inner.borrow().tree.property(node, name)
    }

    pub fn set_property(&self, node: NodeId, name: &str, value: &str) {
        self.inner.borrow_mut().tree.set_property(node, name, value);
    }

    pub fn tag(&self, node: NodeId) -> Option<String> {
        self.inner.borrow().tree.tag(node)
    }

    // =======================================================================
    // Queries
    // =======================================================================

    /// All elements matching `selector`, in document order.
    pub fn query_all(&self, selector: &str) -> Result<Vec<NodeId>, SelectorError> {
        let list = SelectorList::parse(selector)?;
        Ok(self.query_all_with(&list))
    }

    /// First element matching `selector`, in document order.
    pub fn query_first(&self, selector: &str) -> Result<Option<NodeId>, SelectorError> {
        let list = SelectorList::parse(selector)?;
        let inner = self.inner.borrow();
        Ok(selector::query_first(&inner.tree, inner.root, &list))
    }

    /// Query with an already parsed selector list.
    pub fn query_all_with(&self, selectors: &SelectorList) -> Vec<NodeId> {
        let inner = self.inner.borrow();
        selector::query_all(&inner.tree, inner.root, selectors)
    }

    // =======================================================================
    // Events
    // =======================================================================

    /// Attach a listener to `node`.
    pub fn add_listener(
        &self,
        node: NodeId,
        name: &str,
        callback: impl Fn(&Document, &mut Event) + 'static,
    ) -> ListenerId {
        self.add_listener_impl(node, name, false, Rc::new(callback))
    }

    /// Attach a listener that detaches itself after its first invocation.
    pub fn add_listener_once(
        &self,
        node: NodeId,
        name: &str,
        callback: impl Fn(&Document, &mut Event) + 'static,
    ) -> ListenerId {
        self.add_listener_impl(node, name, true, Rc::new(callback))
    }

    pub(crate) fn add_listener_impl(
        &self,
        node: NodeId,
        name: &str,
        once: bool,
        callback: ListenerFn,
    ) -> ListenerId {
        self.inner
            .borrow_mut()
            .listeners
            .add(node, name, once, callback)
    }

    pub fn remove_listener(&self, node: NodeId, id: ListenerId) {
        self.inner.borrow_mut().listeners.remove(node, id);
    }

    /// Listeners currently attached to `node` for `name`.
    pub fn listener_count(&self, node: NodeId, name: &str) -> usize {
        self.inner.borrow().listeners.count(node, name)
    }

    /// Dispatch `event` at `target`: the target's listeners run first, then
    /// each ancestor's while the event keeps bubbling. Listener snapshots
    /// are taken per node with the interior borrow released before any
    /// callback runs, and `once` listeners leave the map as part of the
    /// snapshot. Returns `true` unless a listener prevented the default.
    pub fn dispatch(&self, target: NodeId, event: &mut Event) -> bool {
        event.target = Some(target);

        let path: Vec<NodeId> = {
            let inner = self.inner.borrow();
            let mut path = vec![target];
            if event.bubbles {
                path.extend(inner.tree.ancestors(target));
            }
            path
        };

        for node in path {
            if event.propagation_stopped {
                break;
            }
            let listeners = self
                .inner
                .borrow_mut()
                .listeners
                .take_matching(node, &event.name);
            event.current_target = Some(node);
            for listener in &listeners {
                (listener.callback)(self, event);
            }
        }

        event.current_target = None;
        !event.default_prevented
    }

    /// Dispatch a synthetic bubbling event of the given name at `target`.
    pub fn emit(&self, target: NodeId, name: &str) -> bool {
        let mut event = Event::synthetic(name);
        self.dispatch(target, &mut event)
    }

    // =======================================================================
    // Mutation observers
    // =======================================================================

    /// Subscribe to child-list changes inside the body subtree. The callback
    /// runs after every such mutation, for the lifetime of the document or
    /// until [`Document::disconnect`].
    pub fn observe(&self, callback: impl Fn(&Document) + 'static) -> ObserverId {
        self.inner.borrow_mut().observers.observe(Rc::new(callback))
    }

    /// Drop a subscription. Safe to call from inside a delivery round.
    pub fn disconnect(&self, id: ObserverId) -> bool {
        self.inner.borrow_mut().observers.disconnect(id)
    }

    pub fn observer_count(&self) -> usize {
        self.inner.borrow().observers.len()
    }

    fn notify_mutation(&self) {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.delivering {
                // Already inside a delivery round; queue a follow-up instead
                // of recursing into the registry.
                inner.mutations_pending = true;
                return;
            }
            inner.delivering = true;
        }

        loop {
            let snapshot = self.inner.borrow().observers.snapshot();
            trace!(observers = snapshot.len(), "mutation delivery round");
            for (id, callback) in snapshot {
                // A callback earlier in the round may have disconnected this
                // subscription.
                if self.inner.borrow().observers.contains(id) {
                    callback(self);
                }
            }

            let mut inner = self.inner.borrow_mut();
            if inner.mutations_pending {
                inner.mutations_pending = false;
            } else {
                inner.delivering = false;
                break;
            }
        }
    }

    // =======================================================================
    // Timers
    // =======================================================================

    /// Schedule a one-shot callback `delay_ms` from now.
    pub fn schedule_timeout(
        &self,
        delay_ms: u64,
        callback: impl Fn(&Document) + 'static,
    ) -> TimerId {
        self.schedule_timeout_at(Instant::now() + Duration::from_millis(delay_ms), callback)
    }

    /// Schedule a one-shot callback for a specific instant.
    pub fn schedule_timeout_at(
        &self,
        fire_at: Instant,
        callback: impl Fn(&Document) + 'static,
    ) -> TimerId {
        self.inner
            .borrow_mut()
            .timers
            .schedule_at(fire_at, Rc::new(callback))
    }

    pub fn cancel_timeout(&self, id: TimerId) {
        self.inner.borrow_mut().timers.cancel(id);
    }

    /// Run every timer due at `now`, in deadline order. Returns how many
    /// fired.
    pub fn tick(&self, now: Instant) -> usize {
        let due = self.inner.borrow_mut().timers.take_due(now);
        let count = due.len();
        for callback in due {
            callback(self);
        }
        count
    }

    pub fn pending_timers(&self) -> usize {
        self.inner.borrow().timers.len()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.inner.borrow().timers.next_deadline()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
