//! Undo/redo history
//!
//! An ordered log of applied data changes plus a cursor (`event_index`)
//! pointing at the most recently applied entry.
//!
//! ```text
//! push(e1) push(e2) push(e3)    [e1, e2, e3]  index 2
//! undo x2                       [e1, e2, e3]  index 0
//! push(e4)  <-- drops redo tail [e1, e4]      index 1
//! ```
//!
//! Undo and redo are two-phase: `pending_*` yields the event to feed back
//! into the change reducer, `step_*` moves the cursor once it was applied.
//! Replayed events are never re-recorded.

use crate::event::DataChangeEvent;
use std::collections::VecDeque;
use tabling_rows::{ModelId, PlaceholderId};

/// Default maximum number of recorded events
pub const DEFAULT_HISTORY_DEPTH: usize = 100;

/// Change log with cursor
#[derive(Debug, Clone, PartialEq)]
pub struct History {
    entries: VecDeque<DataChangeEvent>,
    /// Index of the most recently applied entry; `None` is before the first
    index: Option<usize>,
    max_depth: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_DEPTH)
    }
}

impl History {
    /// Create history keeping at most `max_depth` entries (at least 1)
    #[must_use]
    pub fn new(max_depth: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            index: None,
            max_depth: max_depth.max(1),
        }
    }

    /// Record an applied event
    ///
    /// Entries after the cursor are dropped; the oldest entry is evicted
    /// when the log is full. Empty events are ignored.
    pub fn push(&mut self, event: DataChangeEvent) {
        if event.is_empty() {
            return;
        }
        let keep = self.index.map_or(0, |i| i + 1);
        self.entries.truncate(keep);
        self.entries.push_back(event);
        while self.entries.len() > self.max_depth {
            self.entries.pop_front();
        }
        self.index = Some(self.entries.len() - 1);
    }

    /// Event undoing the entry at the cursor
    #[must_use]
    pub fn pending_undo(&self) -> Option<DataChangeEvent> {
        self.index
            .and_then(|i| self.entries.get(i))
            .map(DataChangeEvent::inverse)
    }

    /// Move the cursor back one entry
    pub fn step_back(&mut self) {
        self.index = match self.index {
            Some(0) | None => None,
            Some(i) => Some(i - 1),
        };
    }

    /// Event redoing the entry after the cursor
    #[must_use]
    pub fn pending_redo(&self) -> Option<DataChangeEvent> {
        let next = self.index.map_or(0, |i| i + 1);
        self.entries.get(next).cloned()
    }

    /// Move the cursor forward one entry
    pub fn step_forward(&mut self) {
        let next = self.index.map_or(0, |i| i + 1);
        if next < self.entries.len() {
            self.index = Some(next);
        }
    }

    /// Cursor position, `-1` before the first entry
    #[must_use]
    pub fn event_index(&self) -> isize {
        self.index
            .and_then(|i| isize::try_from(i).ok())
            .unwrap_or(-1)
    }

    /// Check for an entry to undo
    #[inline]
    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.index.is_some()
    }

    /// Check for an entry to redo
    #[inline]
    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.index.map_or(0, |i| i + 1) < self.entries.len()
    }

    /// Number of recorded entries
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Maximum number of entries kept
    #[inline]
    #[must_use]
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Check for an empty log
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forget everything
    pub fn clear(&mut self) {
        self.entries.clear();
        self.index = None;
    }

    /// Point recorded edits of a placeholder at its persisted model
    pub fn rename(&mut self, placeholder: PlaceholderId, model: ModelId) {
        for entry in &mut self.entries {
            entry.rename(placeholder, model);
        }
    }
}
