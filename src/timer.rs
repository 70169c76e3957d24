//! One-shot timer queue.
//!
//! Deadline-ordered callbacks, drained cooperatively by the host calling
//! [`crate::document::Document::tick`]. The queue is generic over its
//! payload so it stays a plain data structure; the document stores closures
//! in it and unit tests store plain ids.

use std::time::Instant;

/// Handle for cancelling a scheduled timer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimerId(pub(crate) u64);

struct TimerEntry<T> {
    id: TimerId,
    fire_at: Instant,
    payload: T,
}

/// Pending one-shot timers.
pub(crate) struct TimerQueue<T> {
    entries: Vec<TimerEntry<T>>,
    next_id: u64,
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TimerQueue<T> {
    pub(crate) fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 1,
        }
    }

    /// Schedule `payload` to come due at `fire_at`.
    pub(crate) fn schedule_at(&mut self, fire_at: Instant, payload: T) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.entries.push(TimerEntry { id, fire_at, payload });
        id
    }

    /// Cancel a pending timer. No-op for unknown or already-fired ids.
    pub(crate) fn cancel(&mut self, id: TimerId) {
        self.entries.retain(|t| t.id != id);
    }

    /// Remove and return every payload due at `now`, in deadline order.
    pub(crate) fn take_due(&mut self, now: Instant) -> Vec<T> {
        let mut due: Vec<TimerEntry<T>> = Vec::new();
        let mut kept: Vec<TimerEntry<T>> = Vec::new();
        for entry in self.entries.drain(..) {
            if entry.fire_at <= now {
                due.push(entry);
            } else {
                kept.push(entry);
            }
        }
        self.entries = kept;
        due.sort_by_key(|t| t.fire_at);
        due.into_iter().map(|t| t.payload).collect()
    }

    /// Earliest pending deadline, if any.
    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        self.entries.iter().map(|t| t.fire_at).min()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
