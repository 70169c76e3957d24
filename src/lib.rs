//! # lookout — declarative DOM watching and element building
//!
//! Two cooperating fluent builders over a live, in-memory document tree:
//!
//! - the **watcher engine** ([`watch`]) binds events or existence callbacks
//!   to elements matched by CSS selectors, re-resolving the selectors every
//!   time the document mutates — elements that appear later are picked up
//!   automatically;
//! - the **element manager** ([`manage`]) resolves one working element
//!   (found, created, adopted, or replacing another), branches on whether a
//!   find succeeded (`or`/`then`), and applies chainable attribute,
//!   property, and structural mutations.
//!
//! Both run against a [`Document`]: an arena-backed tree with selector
//! queries, bubbling events, one-shot timers, and subtree mutation
//! observers. Everything is single-threaded and cooperative; nothing
//! blocks.
//!
//! ```no_run
//! use lookout::{Document, always, find, Anchor};
//!
//! let doc = Document::new();
//!
//! // React to every current and future matching element.
//! always(&doc)
//!     .when(&["button.save"])
//!     .gets("click")
//!     .then(|_, element, _| println!("saving via {element:?}"))?;
//!
//! // Find-or-build an element, then configure it either way.
//! find(&doc, "#status")?
//!     .or()
//!     .create("div")
//!     .set_attrs(&[("id", "status")])
//!     .on(Anchor::Body)
//!     .then()
//!     .set_attrs(&[("class__$", " ready")]);
//! # Ok::<(), lookout::SelectorError>(())
//! ```

#![forbid(unsafe_code)]

pub mod arena;
pub mod document;
pub mod error;
pub mod event;
pub mod manage;
pub mod node;
pub mod observe;
pub mod selector;
pub mod timer;
pub mod tree;
pub mod watch;

pub use document::{Document, WeakDocument};
pub use error::SelectorError;
pub use event::{Event, ListenerId};
pub use manage::{
    Anchor, HIDDEN_STYLE, Manager, MergeMode, PropValue, adopt, create, find, merge_key, replace,
};
pub use node::{Attr, NodeId};
pub use observe::ObserverId;
pub use selector::SelectorList;
pub use timer::TimerId;
pub use tree::Tree;
pub use watch::{Mode, Quorum, Watcher, always, once, only, unless, until};
