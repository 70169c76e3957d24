//! Library error types.

use thiserror::Error;

/// Raised when a selector string cannot be understood.
///
/// Selector parsing is the only operation in this library that fails hard.
/// Every other degraded situation (no match, unresolved element, missing
/// callback) is a silent no-op.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SelectorError {
    /// The input contained no parseable selector at all.
    #[error("unintelligible selector: {0:?}")]
    Unintelligible(String),

    /// A selector parsed, but unconsumed input remained after it.
    #[error("trailing input after selector: {0:?}")]
    Trailing(String),
}
