//! Watcher engine.
//!
//! Declaratively attaches event listeners or existence callbacks to elements
//! identified by selectors, re-resolving every time the document changes.
//! A watcher is built fluently from one of the factory functions:
//!
//! ```no_run
//! # use lookout::{Document, always, once};
//! # let doc = Document::new();
//! always(&doc)
//!     .when(&["button.save"])
//!     .gets("click")
//!     .then(|_, element, _| println!("save clicked: {element:?}"))?;
//!
//! once(&doc).any(&["#toast"]).exists(|_, found| {
//!     println!("toast appeared: {found:?}");
//! })?;
//! # Ok::<(), lookout::SelectorError>(())
//! ```
//!
//! Every triggering call (`after`, `then`, `exists`, `on`) runs one
//! synchronous evaluation pass immediately, then keeps re-running it on each
//! subtree mutation until the subscription is torn down. Passes re-query the
//! whole document rather than diffing; with typical page sizes the
//! simplicity is worth the repeated walks.
//!
//! Binding passes re-attach listeners without deduplicating, so an element
//! that survives several passes accumulates one listener per chain entry per
//! pass and its callback fires that many times per event. Deliberately
//! preserved; track bound elements before relying on exactly-once delivery.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, trace, warn};

use crate::document::Document;
use crate::error::SelectorError;
use crate::event::Event;
use crate::node::NodeId;
use crate::observe::ObserverId;
use crate::selector::SelectorList;

// ─────────────────────────────────────────────────────────────────────────────
// Callback types
// ─────────────────────────────────────────────────────────────────────────────

/// Predicate gating whether a matched element is processed at all.
pub type Condition = Rc<dyn Fn(&Document, NodeId) -> bool>;

/// Callback bound to an event chain entry: `(document, element, event)`.
pub type BindingCallback = Rc<dyn Fn(&Document, NodeId, &Event)>;

/// Existence callback: `(document, matched elements)`. In `unless` mode the
/// slice is empty — the nothing-matched case carries no elements.
pub type ExistsCallback = Rc<dyn Fn(&Document, &[NodeId])>;

// ─────────────────────────────────────────────────────────────────────────────
// Mode and quorum
// ─────────────────────────────────────────────────────────────────────────────

/// Lifecycle policy, fixed at construction by the factory used.
#[derive(Clone)]
pub enum Mode {
    /// Re-evaluate forever.
    Always,
    /// Listeners fire once each; an existence subscription is torn down
    /// after the first mutation-triggered pass that fired its callback (the
    /// immediate synchronous pass never counts).
    Once,
    /// Watch until satisfied: torn down after the first pass that matched,
    /// including the immediate synchronous one.
    Until,
    /// Like `Always`, but elements must pass the predicate.
    Only(Condition),
    /// Existence inverts: the callback fires when nothing matches.
    Unless,
}

impl std::fmt::Debug for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Mode::Always => "Always",
            Mode::Once => "Once",
            Mode::Until => "Until",
            Mode::Only(_) => "Only",
            Mode::Unless => "Unless",
        };
        f.write_str(name)
    }
}

/// How many selectors need matches before an existence condition holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Quorum {
    /// A non-empty union suffices.
    Any,
    /// Every selector needs at least one match.
    All,
}

// ─────────────────────────────────────────────────────────────────────────────
// Watch state
// ─────────────────────────────────────────────────────────────────────────────

struct EventBinding {
    event: String,
    delay_ms: Option<u64>,
    callback: Option<BindingCallback>,
}

struct WatchState {
    mode: Mode,
    quorum: Quorum,
    selectors: Vec<String>,
    chain: Vec<EventBinding>,
    exists: Option<ExistsCallback>,
    relay_event: Option<String>,
    relay_target: Option<String>,
    observer: Option<ObserverId>,
    done: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Factories
// ─────────────────────────────────────────────────────────────────────────────

/// Watch indefinitely.
pub fn always(doc: &Document) -> Watcher {
    Watcher::new(doc, Mode::Always)
}

/// Watch with fire-once listeners / one-shot existence.
pub fn once(doc: &Document) -> Watcher {
    Watcher::new(doc, Mode::Once)
}

/// Watch until the selectors are satisfied, then stop.
pub fn until(doc: &Document) -> Watcher {
    Watcher::new(doc, Mode::Until)
}

/// Watch, processing only elements the predicate accepts.
pub fn only(doc: &Document, condition: impl Fn(&Document, NodeId) -> bool + 'static) -> Watcher {
    Watcher::new(doc, Mode::Only(Rc::new(condition)))
}

/// Watch for the *absence* of matches.
pub fn unless(doc: &Document) -> Watcher {
    Watcher::new(doc, Mode::Unless)
}

// ─────────────────────────────────────────────────────────────────────────────
// Watcher
// ─────────────────────────────────────────────────────────────────────────────

/// Fluent watch builder. See the module docs for the call shapes.
pub struct Watcher {
    doc: Document,
    state: Rc<RefCell<WatchState>>,
}

impl Watcher {
    fn new(doc: &Document, mode: Mode) -> Self {
        Self {
            doc: doc.clone(),
            state: Rc::new(RefCell::new(WatchState {
                mode,
                quorum: Quorum::Any,
                selectors: Vec::new(),
                chain: Vec::new(),
                exists: None,
                relay_event: None,
                relay_target: None,
                observer: None,
                done: false,
            })),
        }
    }

    /// Set the selectors used for event binding. An empty list matches
    /// nothing and never errors.
    pub fn when(self, selectors: &[&str]) -> Self {
        self.state.borrow_mut().selectors = selectors.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Append a new, empty entry for `event` to the binding chain.
    pub fn gets(self, event: &str) -> Self {
        self.state.borrow_mut().chain.push(EventBinding {
            event: event.to_string(),
            delay_ms: None,
            callback: None,
        });
        self
    }

    /// Readability no-op.
    pub fn and(self) -> Self {
        self
    }

    /// Set the selectors and require every one of them to match
    /// (intersection quorum) for existence.
    pub fn all(self, selectors: &[&str]) -> Self {
        {
            let mut state = self.state.borrow_mut();
            state.selectors = selectors.iter().map(|s| s.to_string()).collect();
            state.quorum = Quorum::All;
        }
        self
    }

    /// Set the selectors and let any single match satisfy existence
    /// (union quorum).
    pub fn any(self, selectors: &[&str]) -> Self {
        {
            let mut state = self.state.borrow_mut();
            state.selectors = selectors.iter().map(|s| s.to_string()).collect();
            state.quorum = Quorum::Any;
        }
        self
    }

    /// Set a delayed callback on the chain's most recent entry, then run a
    /// binding pass. With an empty chain the callback has no binding target
    /// and the call is silent.
    pub fn after(
        self,
        delay_ms: u64,
        callback: impl Fn(&Document, NodeId, &Event) + 'static,
    ) -> Result<Self, SelectorError> {
        {
            let mut state = self.state.borrow_mut();
            if let Some(last) = state.chain.last_mut() {
                last.delay_ms = Some(delay_ms);
                last.callback = Some(Rc::new(callback));
            }
        }
        self.arm_binding()
    }

    /// Set an immediate callback on the chain's most recent entry, then run
    /// a binding pass. Equivalent to [`Watcher::after`] without the delay.
    pub fn then(
        self,
        callback: impl Fn(&Document, NodeId, &Event) + 'static,
    ) -> Result<Self, SelectorError> {
        {
            let mut state = self.state.borrow_mut();
            if let Some(last) = state.chain.last_mut() {
                last.delay_ms = None;
                last.callback = Some(Rc::new(callback));
            }
        }
        self.arm_binding()
    }

    /// Set the existence callback and run an existence pass.
    pub fn exists(
        self,
        callback: impl Fn(&Document, &[NodeId]) + 'static,
    ) -> Result<Self, SelectorError> {
        self.state.borrow_mut().exists = Some(Rc::new(callback));
        self.validate_selectors()?;
        evaluate_existence(&self.doc, &self.state, false);
        ensure_subscribed(&self.doc, &self.state);
        Ok(self)
    }

    /// Declare a secondary event to dispatch when a bound event fires.
    /// Takes effect once [`Watcher::on`] names the target.
    pub fn trigger(self, event: &str) -> Self {
        self.state.borrow_mut().relay_event = Some(event.to_string());
        self
    }

    /// Name the secondary dispatch target (resolved at fire time, not bind
    /// time), then run a binding pass.
    pub fn on(self, target_selector: &str) -> Result<Self, SelectorError> {
        SelectorList::parse(target_selector)?;
        self.state.borrow_mut().relay_target = Some(target_selector.to_string());
        self.arm_binding()
    }

    /// Tear down the mutation subscription. Listeners already attached stay
    /// attached.
    pub fn disconnect(self) {
        teardown(&self.doc, &self.state);
    }

    /// Is the mutation subscription still registered?
    pub fn is_active(&self) -> bool {
        let state = self.state.borrow();
        state.observer.is_some() && !state.done
    }

    fn arm_binding(self) -> Result<Self, SelectorError> {
        self.validate_selectors()?;
        evaluate_binding(&self.doc, &self.state, false);
        ensure_subscribed(&self.doc, &self.state);
        Ok(self)
    }

    /// Surface malformed selectors on the synchronous triggering call — the
    /// single hard-failure point of the builder.
    fn validate_selectors(&self) -> Result<(), SelectorError> {
        for selector in &self.state.borrow().selectors {
            SelectorList::parse(selector)?;
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Evaluation passes
// ─────────────────────────────────────────────────────────────────────────────

fn ensure_subscribed(doc: &Document, state: &Rc<RefCell<WatchState>>) {
    {
        let state = state.borrow();
        if state.done || state.observer.is_some() {
            return;
        }
    }
    let state_in_cb = state.clone();
    let id = doc.observe(move |doc| {
        let (bind, exist) = {
            let state = state_in_cb.borrow();
            if state.done {
                return;
            }
            (!state.chain.is_empty(), state.exists.is_some())
        };
        if bind {
            evaluate_binding(doc, &state_in_cb, true);
        }
        if exist {
            evaluate_existence(doc, &state_in_cb, true);
        }
    });
    state.borrow_mut().observer = Some(id);
    debug!(observer = ?id, "watch subscription registered");
}

fn teardown(doc: &Document, state: &Rc<RefCell<WatchState>>) {
    let observer = {
        let mut state = state.borrow_mut();
        state.done = true;
        state.observer.take()
    };
    if let Some(id) = observer {
        doc.disconnect(id);
        debug!(observer = ?id, "watch subscription torn down");
    }
}

/// Resolve one selector. On mutation-triggered passes there is no caller to
/// propagate into, so parse failures degrade to "matches nothing".
fn resolve(doc: &Document, selector: &str, from_mutation: bool) -> Vec<NodeId> {
    match doc.query_all(selector) {
        Ok(matches) => matches,
        Err(err) => {
            if from_mutation {
                warn!(selector, %err, "selector failed during mutation pass");
            }
            Vec::new()
        }
    }
}

/// One binding pass: attach the chain's listeners to every current match.
fn evaluate_binding(doc: &Document, state: &Rc<RefCell<WatchState>>, from_mutation: bool) {
    struct ChainEntry {
        event: String,
        delay_ms: Option<u64>,
        callback: Option<BindingCallback>,
    }

    let (selectors, chain, relay, fire_once, condition, until_mode) = {
        let state = state.borrow();
        if state.done {
            return;
        }
        let relay = match (&state.relay_event, &state.relay_target) {
            (Some(event), Some(target)) => Some((event.clone(), target.clone())),
            _ => None,
        };
        (
            state.selectors.clone(),
            state
                .chain
                .iter()
                .map(|b| ChainEntry {
                    event: b.event.clone(),
                    delay_ms: b.delay_ms,
                    callback: b.callback.clone(),
                })
                .collect::<Vec<_>>(),
            relay,
            matches!(state.mode, Mode::Once),
            match &state.mode {
                Mode::Only(cond) => Some(cond.clone()),
                _ => None,
            },
            matches!(state.mode, Mode::Until),
        )
    };

    let mut bound = 0usize;
    for selector in &selectors {
        for element in resolve(doc, selector, from_mutation) {
            if let Some(condition) = &condition {
                if !condition(doc, element) {
                    continue;
                }
            }
            bound += 1;
            for entry in &chain {
                let callback = entry.callback.clone();
                let delay_ms = entry.delay_ms;
                doc.add_listener_impl(
                    element,
                    &entry.event,
                    fire_once,
                    Rc::new(move |doc: &Document, event: &mut Event| {
                        let Some(callback) = &callback else {
                            return;
                        };
                        match delay_ms {
                            Some(ms) => {
                                let callback = callback.clone();
                                let snapshot = event.clone();
                                doc.schedule_timeout(ms, move |doc| {
                                    callback(doc, element, &snapshot);
                                });
                            }
                            None => callback(doc, element, event),
                        }
                    }),
                );

                if let Some((relay_event, relay_target)) = &relay {
                    let relay_event = relay_event.clone();
                    let relay_target = relay_target.clone();
                    doc.add_listener_impl(
                        element,
                        &entry.event,
                        fire_once,
                        Rc::new(move |doc: &Document, _event: &mut Event| {
                            match doc.query_first(&relay_target) {
                                Ok(Some(target)) => {
                                    doc.emit(target, &relay_event);
                                }
                                Ok(None) => {}
                                Err(err) => {
                                    warn!(selector = %relay_target, %err, "relay target failed");
                                }
                            }
                        }),
                    );
                }
            }
        }
    }
    trace!(selectors = selectors.len(), bound, from_mutation, "binding pass");

    if until_mode && bound > 0 {
        teardown(doc, state);
    }
}

/// One existence pass: check the quorum and fire the callback if satisfied.
fn evaluate_existence(doc: &Document, state: &Rc<RefCell<WatchState>>, from_mutation: bool) {
    let (selectors, quorum, exists, condition, mode) = {
        let state = state.borrow();
        if state.done {
            return;
        }
        (
            state.selectors.clone(),
            state.quorum,
            state.exists.clone(),
            match &state.mode {
                Mode::Only(cond) => Some(cond.clone()),
                _ => None,
            },
            state.mode.clone(),
        )
    };
    // Never fired, never an error, when no callback was set.
    let Some(exists) = exists else {
        return;
    };

    let per_selector: Vec<Vec<NodeId>> = selectors
        .iter()
        .map(|selector| {
            let mut matches = resolve(doc, selector, from_mutation);
            if let Some(condition) = &condition {
                matches.retain(|&element| condition(doc, element));
            }
            matches
        })
        .collect();

    let matched_selectors = per_selector.iter().filter(|m| !m.is_empty()).count();
    // Flattened union; an element matching two selectors appears twice.
    let union: Vec<NodeId> = per_selector.concat();

    let fired = if matches!(mode, Mode::Unless) {
        if union.is_empty() {
            exists(doc, &[]);
            true
        } else {
            false
        }
    } else {
        let satisfied = match quorum {
            Quorum::All => !selectors.is_empty() && matched_selectors == selectors.len(),
            Quorum::Any => !union.is_empty(),
        };
        if satisfied {
            exists(doc, &union);
        }
        satisfied
    };
    trace!(
        selectors = selectors.len(),
        matched_selectors,
        fired,
        from_mutation,
        "existence pass"
    );

    match mode {
        // The immediate synchronous pass never counts toward once-teardown;
        // only a mutation-triggered pass that fired does.
        Mode::Once if fired && from_mutation => teardown(doc, state),
        Mode::Until if fired => teardown(doc, state),
        _ => {}
    }
}

// ═════════════════════════════════════════════════════════════════════════════
// Tests
// ═════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn counter() -> (Rc<RefCell<usize>>, impl Fn(&Document, NodeId, &Event) + 'static) {
        let hits = Rc::new(RefCell::new(0usize));
        let h = hits.clone();
        (hits, move |_: &Document, _: NodeId, _: &Event| {
            *h.borrow_mut() += 1;
        })
    }

    // -- binding mode --------------------------------------------------------

    #[test]
    fn click_callback_for_present_and_future_elements() {
        let doc = Document::new();
        let button = doc.create_element("button");
        doc.append(doc.body(), button);

        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();
        let _watch = always(&doc)
            .when(&["button"])
            .gets("click")
            .then(move |_, element, _| s.borrow_mut().push(element))
            .unwrap();

        doc.emit(button, "click");
        assert_eq!(*seen.borrow(), vec![button]);

        // A button added later is picked up by the mutation pass.
        let late = doc.create_element("button");
        doc.append(doc.body(), late);
        doc.emit(late, "click");
        assert!(seen.borrow().contains(&late));
    }

    #[test]
    fn repeated_passes_accumulate_duplicate_listeners() {
        let doc = Document::new();
        let button = doc.create_element("button");
        doc.append(doc.body(), button);

        let (hits, callback) = counter();
        let _watch = always(&doc)
            .when(&["button"])
            .gets("click")
            .then(callback)
            .unwrap();
        assert_eq!(doc.listener_count(button, "click"), 1);

        // An unrelated mutation re-runs the pass and re-attaches.
        let div = doc.create_element("div");
        doc.append(doc.body(), div);
        assert_eq!(doc.listener_count(button, "click"), 2);

        doc.emit(button, "click");
        assert_eq!(*hits.borrow(), 2);
    }

    #[test]
    fn once_mode_listeners_fire_once() {
        let doc = Document::new();
        let button = doc.create_element("button");
        doc.append(doc.body(), button);

        let (hits, callback) = counter();
        let _watch = once(&doc)
            .when(&["button"])
            .gets("click")
            .then(callback)
            .unwrap();

        doc.emit(button, "click");
        doc.emit(button, "click");
        assert_eq!(*hits.borrow(), 1);
    }

    #[test]
    fn callback_lands_on_last_chain_entry_only() {
        let doc = Document::new();
        let field = doc.create_element("input");
        doc.append(doc.body(), field);

        let (hits, callback) = counter();
        let _watch = always(&doc)
            .when(&["input"])
            .gets("focus")
            .and()
            .gets("change")
            .then(callback)
            .unwrap();

        // Both entries got listeners, but only the last entry carries the
        // callback.
        assert_eq!(doc.listener_count(field, "focus"), 1);
        assert_eq!(doc.listener_count(field, "change"), 1);

        doc.emit(field, "focus");
        assert_eq!(*hits.borrow(), 0);
        doc.emit(field, "change");
        assert_eq!(*hits.borrow(), 1);
    }

    #[test]
    fn after_defers_through_the_timer_queue() {
        let doc = Document::new();
        let button = doc.create_element("button");
        doc.append(doc.body(), button);

        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();
        let _watch = always(&doc)
            .when(&["button"])
            .gets("click")
            .after(30, move |_, element, event: &Event| {
                s.borrow_mut().push((element, event.name.clone()));
            })
            .unwrap();

        doc.emit(button, "click");
        assert!(seen.borrow().is_empty());
        assert_eq!(doc.pending_timers(), 1);

        doc.tick(Instant::now() + Duration::from_millis(40));
        assert_eq!(*seen.borrow(), vec![(button, "click".to_string())]);
    }

    #[test]
    fn empty_chain_and_empty_selectors_are_silent() {
        let doc = Document::new();
        let (hits, callback) = counter();

        // then() with no gets(): nothing to bind to, but no error either.
        let _watch = always(&doc).when(&["button"]).then(callback).unwrap();

        // when() with an empty list matches nothing.
        let (exists_hits, _) = counter();
        let eh = exists_hits.clone();
        let _watch = always(&doc)
            .when(&[])
            .exists(move |_, _| *eh.borrow_mut() += 1)
            .unwrap();

        let button = doc.create_element("button");
        doc.append(doc.body(), button);
        doc.emit(button, "click");
        assert_eq!(*hits.borrow(), 0);
        assert_eq!(*exists_hits.borrow(), 0);
    }

    #[test]
    fn only_condition_gates_elements() {
        let doc = Document::new();
        let plain = doc.create_element("button");
        let marked = doc.create_element_with("button", &[("data-live", "yes")]);
        doc.append(doc.body(), plain);
        doc.append(doc.body(), marked);

        let (hits, callback) = counter();
        let _watch = only(&doc, |doc, element| {
            doc.attribute(element, "data-live").is_some()
        })
        .when(&["button"])
        .gets("click")
        .then(callback)
        .unwrap();

        doc.emit(plain, "click");
        assert_eq!(*hits.borrow(), 0);
        doc.emit(marked, "click");
        assert_eq!(*hits.borrow(), 1);
    }

    #[test]
    fn malformed_selector_surfaces_on_trigger_call() {
        let doc = Document::new();
        let result = always(&doc)
            .when(&["]["])
            .gets("click")
            .then(|_, _, _| {});
        assert!(result.is_err());
    }

    // -- secondary trigger ---------------------------------------------------

    #[test]
    fn relay_dispatches_on_target_resolved_at_fire_time() {
        let doc = Document::new();
        let button = doc.create_element("button");
        doc.append(doc.body(), button);

        let (_hits, callback) = counter();
        let _watch = always(&doc)
            .when(&["button"])
            .gets("click")
            .then(callback)
            .unwrap()
            .trigger("refresh")
            .on("#list")
            .unwrap();

        // No #list yet: the relay quietly finds nothing.
        doc.emit(button, "click");

        let list = doc.create_element_with("ul", &[("id", "list")]);
        doc.append(doc.body(), list);
        let refreshed = Rc::new(RefCell::new(0));
        let r = refreshed.clone();
        doc.add_listener(list, "refresh", move |_, _| *r.borrow_mut() += 1);

        doc.emit(button, "click");
        assert!(*refreshed.borrow() >= 1);
    }

    #[test]
    fn trigger_without_target_is_inert() {
        let doc = Document::new();
        let button = doc.create_element("button");
        doc.append(doc.body(), button);

        let (hits, callback) = counter();
        let _watch = always(&doc)
            .when(&["button"])
            .gets("click")
            .then(callback)
            .unwrap()
            .trigger("refresh");

        doc.emit(button, "click");
        assert_eq!(*hits.borrow(), 1);
    }

    // -- existence mode ------------------------------------------------------

    #[test]
    fn any_quorum_fires_on_nonempty_union() {
        let doc = Document::new();
        let found = Rc::new(RefCell::new(Vec::<Vec<NodeId>>::new()));
        let f = found.clone();
        let _watch = always(&doc)
            .any(&["p", "span"])
            .exists(move |_, union| f.borrow_mut().push(union.to_vec()))
            .unwrap();
        assert!(found.borrow().is_empty());

        let p = doc.create_element("p");
        doc.append(doc.body(), p);
        assert_eq!(found.borrow().len(), 1);
        assert_eq!(found.borrow()[0], vec![p]);
    }

    #[test]
    fn all_quorum_needs_every_selector() {
        let doc = Document::new();
        let (hits, _) = counter();
        let h = hits.clone();
        let _watch = always(&doc)
            .all(&["p", "span"])
            .exists(move |_, _| *h.borrow_mut() += 1)
            .unwrap();

        let p = doc.create_element("p");
        doc.append(doc.body(), p);
        assert_eq!(*hits.borrow(), 0);

        let span = doc.create_element("span");
        doc.append(doc.body(), span);
        assert_eq!(*hits.borrow(), 1);
    }

    #[test]
    fn union_preserves_per_selector_duplicates() {
        let doc = Document::new();
        let note = doc.create_element_with("p", &[("class", "note")]);
        doc.append(doc.body(), note);

        let union = Rc::new(RefCell::new(Vec::new()));
        let u = union.clone();
        let _watch = always(&doc)
            .any(&["p", ".note"])
            .exists(move |_, found| *u.borrow_mut() = found.to_vec())
            .unwrap();

        // The element matches both selectors and is reported twice.
        assert_eq!(*union.borrow(), vec![note, note]);
    }

    #[test]
    fn unless_fires_when_union_is_empty() {
        let doc = Document::new();
        let (hits, _) = counter();
        let h = hits.clone();
        let _watch = unless(&doc)
            .any(&[".missing"])
            .exists(move |_, found| {
                assert!(found.is_empty());
                *h.borrow_mut() += 1;
            })
            .unwrap();
        assert_eq!(*hits.borrow(), 1);

        // Still empty after an unrelated mutation: fires again.
        let div = doc.create_element("div");
        doc.append(doc.body(), div);
        assert_eq!(*hits.borrow(), 2);

        // Once a match exists, it goes quiet.
        let hit = doc.create_element_with("div", &[("class", "missing")]);
        doc.append(doc.body(), hit);
        assert_eq!(*hits.borrow(), 2);
    }

    #[test]
    fn once_exists_tears_down_after_qualifying_mutation() {
        let doc = Document::new();
        let (hits, _) = counter();
        let h = hits.clone();
        let watch = once(&doc)
            .any(&["#toast"])
            .exists(move |_, _| *h.borrow_mut() += 1)
            .unwrap();
        assert_eq!(*hits.borrow(), 0);
        assert!(watch.is_active());

        let toast = doc.create_element_with("div", &[("id", "toast")]);
        doc.append(doc.body(), toast);
        assert_eq!(*hits.borrow(), 1);
        assert!(!watch.is_active());
        assert_eq!(doc.observer_count(), 0);

        // A second qualifying mutation does not fire again.
        let second = doc.create_element_with("div", &[("id", "toast")]);
        doc.append(doc.body(), second);
        assert_eq!(*hits.borrow(), 1);
    }

    #[test]
    fn once_exists_immediate_pass_does_not_tear_down() {
        let doc = Document::new();
        let toast = doc.create_element_with("div", &[("id", "toast")]);
        doc.append(doc.body(), toast);

        let (hits, _) = counter();
        let h = hits.clone();
        let watch = once(&doc)
            .any(&["#toast"])
            .exists(move |_, _| *h.borrow_mut() += 1)
            .unwrap();

        // Fired synchronously, but the subscription survives: only a
        // mutation-triggered firing tears it down.
        assert_eq!(*hits.borrow(), 1);
        assert!(watch.is_active());

        let div = doc.create_element("div");
        doc.append(doc.body(), div);
        assert_eq!(*hits.borrow(), 2);
        assert!(!watch.is_active());
    }

    #[test]
    fn until_counts_the_immediate_pass() {
        let doc = Document::new();
        let p = doc.create_element("p");
        doc.append(doc.body(), p);

        let (hits, _) = counter();
        let h = hits.clone();
        let watch = until(&doc)
            .any(&["p"])
            .exists(move |_, _| *h.borrow_mut() += 1)
            .unwrap();

        assert_eq!(*hits.borrow(), 1);
        assert!(!watch.is_active());
        assert_eq!(doc.observer_count(), 0);
    }

    #[test]
    fn until_keeps_watching_while_unsatisfied() {
        let doc = Document::new();
        let (hits, _) = counter();
        let h = hits.clone();
        let watch = until(&doc)
            .any(&["#banner"])
            .exists(move |_, _| *h.borrow_mut() += 1)
            .unwrap();
        assert!(watch.is_active());

        let noise = doc.create_element("div");
        doc.append(doc.body(), noise);
        assert_eq!(*hits.borrow(), 0);
        assert!(watch.is_active());

        let banner = doc.create_element_with("div", &[("id", "banner")]);
        doc.append(doc.body(), banner);
        assert_eq!(*hits.borrow(), 1);
        assert!(!watch.is_active());
    }

    #[test]
    fn explicit_disconnect_stops_reevaluation() {
        let doc = Document::new();
        let (hits, callback) = counter();
        let watch = always(&doc)
            .when(&["button"])
            .gets("click")
            .then(callback)
            .unwrap();
        assert_eq!(doc.observer_count(), 1);

        watch.disconnect();
        assert_eq!(doc.observer_count(), 0);

        let button = doc.create_element("button");
        doc.append(doc.body(), button);
        doc.emit(button, "click");
        assert_eq!(*hits.borrow(), 0);
    }
}
