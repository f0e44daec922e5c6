//! Bounded undo/redo stacks of labelled snapshots.
//!
//! The timeline is `past` (oldest to newest, the last entry being the
//! current state) followed by `future` (redo candidates). `past` always holds
//! at least one snapshot and never more than the configured limit; pushing
//! past the limit slides the window and discards the oldest entries.
//!
//! [`History`] is pure bookkeeping. Restoring the scene for a transition is
//! the session's job: it peeks the target with [`History::undo_target`] and
//! friends, restores it, and only then applies the transition, so a failed
//! restore leaves both stacks untouched.

use std::collections::VecDeque;

use crate::codec::Snapshot;

/// One row of the history panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    /// Absolute index in the combined timeline.
    pub index: usize,
    /// Action label.
    pub label: String,
    /// Whether this entry is the current state.
    pub is_current: bool,
}

/// Snapshot history with a sliding window.
#[derive(Debug, Clone)]
pub struct History {
    /// Entries before the current one, oldest first.
    earlier: VecDeque<Snapshot>,
    current: Snapshot,
    /// Redo candidates, next first.
    future: VecDeque<Snapshot>,
    limit: usize,
}

impl History {
    /// Start a history whose only entry is `initial`.
    ///
    /// A `limit` of zero is treated as one.
    #[must_use]
    pub fn new(initial: Snapshot, limit: usize) -> Self {
        Self {
            earlier: VecDeque::new(),
            current: initial,
            future: VecDeque::new(),
            limit: limit.max(1),
        }
    }

    /// Drop everything and start over from `initial`.
    pub fn reset(&mut self, initial: Snapshot) {
        self.earlier.clear();
        self.future.clear();
        self.current = initial;
    }

    /// Append a snapshot as the new current state and clear `future`.
    pub fn push(&mut self, snapshot: Snapshot) {
        let previous = std::mem::replace(&mut self.current, snapshot);
        self.earlier.push_back(previous);
        self.future.clear();
        self.evict();
        tracing::debug!(
            "History push {:?} (past={})",
            self.current.label(),
            self.past_len()
        );
    }

    fn evict(&mut self) {
        while self.earlier.len() + 1 > self.limit {
            if let Some(dropped) = self.earlier.pop_front() {
                tracing::debug!("History window full, discarding {:?}", dropped.label());
            }
        }
    }

    /// The current state (last entry of `past`).
    #[must_use]
    pub fn current(&self) -> &Snapshot {
        &self.current
    }

    /// Number of entries in `past`, including the current one.
    #[must_use]
    pub fn past_len(&self) -> usize {
        self.earlier.len() + 1
    }

    /// Number of redo candidates.
    #[must_use]
    pub fn future_len(&self) -> usize {
        self.future.len()
    }

    /// Total entries in the combined timeline.
    #[must_use]
    pub fn len(&self) -> usize {
        self.past_len() + self.future.len()
    }

    /// Always `false`: the timeline holds at least the current state.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Maximum length of `past`.
    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Index of the current state in the combined timeline.
    #[must_use]
    pub fn current_index(&self) -> usize {
        self.earlier.len()
    }

    /// `past`, oldest first, ending with the current state.
    pub fn past(&self) -> impl Iterator<Item = &Snapshot> {
        self.earlier.iter().chain(std::iter::once(&self.current))
    }

    /// `future`, next redo first.
    pub fn future(&self) -> impl Iterator<Item = &Snapshot> {
        self.future.iter()
    }

    /// Whether undo is available (`past` has more than one entry).
    #[must_use]
    pub fn can_undo(&self) -> bool {
        !self.earlier.is_empty()
    }

    /// Whether redo is available.
    #[must_use]
    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    /// Snapshot that an undo would restore.
    #[must_use]
    pub fn undo_target(&self) -> Option<&Snapshot> {
        self.earlier.back()
    }

    /// Snapshot that a redo would restore.
    #[must_use]
    pub fn redo_target(&self) -> Option<&Snapshot> {
        self.future.front()
    }

    /// Snapshot at an absolute timeline index.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Snapshot> {
        let current = self.current_index();
        match index.cmp(&current) {
            std::cmp::Ordering::Less => self.earlier.get(index),
            std::cmp::Ordering::Equal => Some(&self.current),
            std::cmp::Ordering::Greater => self.future.get(index - current - 1),
        }
    }

    /// Move the current state into `future` and step back one entry.
    /// Returns `false` if there is nothing to undo.
    pub fn apply_undo(&mut self) -> bool {
        let Some(previous) = self.earlier.pop_back() else {
            return false;
        };
        let undone = std::mem::replace(&mut self.current, previous);
        self.future.push_front(undone);
        true
    }

    /// Take the next `future` entry as the current state.
    /// Returns `false` if there is nothing to redo.
    pub fn apply_redo(&mut self) -> bool {
        let Some(next) = self.future.pop_front() else {
            return false;
        };
        let previous = std::mem::replace(&mut self.current, next);
        self.earlier.push_back(previous);
        self.evict();
        true
    }

    /// Split the timeline at `index`, making that entry current.
    /// Returns `false` if the index is out of range.
    pub fn apply_jump(&mut self, index: usize) -> bool {
        let current = self.current_index();
        if index >= self.len() {
            return false;
        }
        match index.cmp(&current) {
            std::cmp::Ordering::Equal => {}
            std::cmp::Ordering::Less => {
                // index < current == earlier.len(), so the split is non-empty
                let mut moved: VecDeque<Snapshot> = self.earlier.split_off(index);
                let Some(target) = moved.pop_front() else {
                    return false;
                };
                moved.push_back(std::mem::replace(&mut self.current, target));
                moved.append(&mut self.future);
                self.future = moved;
            }
            std::cmp::Ordering::Greater => {
                let steps = index - current;
                for _ in 0..steps {
                    if let Some(next) = self.future.pop_front() {
                        let previous = std::mem::replace(&mut self.current, next);
                        self.earlier.push_back(previous);
                    }
                }
                self.evict();
            }
        }
        true
    }

    /// Rows for a history panel, oldest first.
    #[must_use]
    pub fn entries(&self) -> Vec<HistoryEntry> {
        let current = self.current_index();
        self.past()
            .chain(self.future())
            .enumerate()
            .map(|(index, snapshot)| HistoryEntry {
                index,
                label: snapshot.label().to_string(),
                is_current: index == current,
            })
            .collect()
    }
}
