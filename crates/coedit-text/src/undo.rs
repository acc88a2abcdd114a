//! Undo/Redo System - grouped undo scoped by a capture window.
//!
//! Provides:
//! - Local undo/redo (only the local replica's own edits are captured)
//! - Coalescing of edits made within the capture window into one step
//! - Id-based reverts, so undo keeps working after concurrent remote edits
//!
//! A step records the ids it inserted and the ids it deleted. Reverting
//! deletes the former and re-inserts copies of the latter right after their
//! tombstones; the revert itself becomes the opposite stack's step.

use crate::rga_text::{RGAText, TextId};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use ulid::Ulid;

/// Default coalescing window.
pub const DEFAULT_CAPTURE_TIMEOUT: Duration = Duration::from_millis(200);

/// Unique identifier for an undo step.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupId(String);

impl GroupId {
    pub fn new() -> Self {
        Self(Ulid::new().to_string())
    }
}

impl Default for GroupId {
    fn default() -> Self {
        Self::new()
    }
}

/// One undoable step.
#[derive(Clone, Debug)]
struct StackItem {
    id: GroupId,
    inserted: Vec<TextId>,
    deleted: Vec<TextId>,
}

impl StackItem {
    fn new() -> Self {
        Self {
            id: GroupId::new(),
            inserted: Vec::new(),
            deleted: Vec::new(),
        }
    }

    /// Fold a change into this step. Deleting a character this same step
    /// inserted cancels out instead of being remembered.
    fn absorb(&mut self, inserted: Vec<TextId>, deleted: Vec<TextId>) {
        for id in deleted {
            match self.inserted.iter().position(|i| *i == id) {
                Some(pos) => {
                    self.inserted.remove(pos);
                }
                None => self.deleted.push(id),
            }
        }
        self.inserted.extend(inserted);
    }

    fn is_empty(&self) -> bool {
        self.inserted.is_empty() && self.deleted.is_empty()
    }
}

/// An undo manager for a single text.
#[derive(Clone, Debug)]
pub struct UndoManager {
    undo_stack: Vec<StackItem>,
    redo_stack: Vec<StackItem>,
    capture_timeout: Duration,
    /// When the last captured change happened; `None` closes the group.
    last_change: Option<Instant>,
    max_history: usize,
}

impl UndoManager {
    /// Create a new undo manager with the given coalescing window.
    pub fn new(capture_timeout: Duration) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            capture_timeout,
            last_change: None,
            max_history: 1000,
        }
    }

    pub fn capture_timeout(&self) -> Duration {
        self.capture_timeout
    }

    /// Set the maximum number of undo steps kept.
    pub fn set_max_history(&mut self, max: usize) {
        self.max_history = max;
        self.trim_history();
    }

    /// Record a local change now.
    pub fn record(&mut self, inserted: Vec<TextId>, deleted: Vec<TextId>) {
        self.record_at(inserted, deleted, Instant::now());
    }

    /// Record a local change made at `now`.
    ///
    /// Joins the previous step if it was captured less than the capture
    /// timeout ago, otherwise opens a new step. Clears the redo stack.
    pub fn record_at(&mut self, inserted: Vec<TextId>, deleted: Vec<TextId>, now: Instant) {
        if inserted.is_empty() && deleted.is_empty() {
            return;
        }
        self.redo_stack.clear();

        let within_window = self
            .last_change
            .is_some_and(|last| now.saturating_duration_since(last) < self.capture_timeout);

        match self.undo_stack.last_mut() {
            Some(item) if within_window => item.absorb(inserted, deleted),
            _ => {
                let mut item = StackItem::new();
                item.absorb(inserted, deleted);
                tracing::trace!(group = ?item.id, "opened undo step");
                self.undo_stack.push(item);
            }
        }

        self.last_change = Some(now);
        self.trim_history();
    }

    /// Close the current group; the next change opens a new step.
    pub fn stop_capturing(&mut self) {
        self.last_change = None;
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Undo the most recent step that still has an effect.
    pub fn undo(&mut self, text: &mut RGAText) -> bool {
        self.stop_capturing();
        Self::pop_and_revert(&mut self.undo_stack, &mut self.redo_stack, text)
    }

    /// Redo the most recently undone step.
    pub fn redo(&mut self, text: &mut RGAText) -> bool {
        self.stop_capturing();
        Self::pop_and_revert(&mut self.redo_stack, &mut self.undo_stack, text)
    }

    fn pop_and_revert(from: &mut Vec<StackItem>, to: &mut Vec<StackItem>, text: &mut RGAText) -> bool {
        // Steps whose characters were all removed by someone else are skipped
        while let Some(item) = from.pop() {
            let reverted = revert(&item, text);
            if !reverted.is_empty() {
                to.push(reverted);
                return true;
            }
            tracing::trace!(group = ?item.id, "skipped undo step with no remaining effect");
        }
        false
    }

    pub fn undo_stack_size(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_stack_size(&self) -> usize {
        self.redo_stack.len()
    }

    /// Clear all history.
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.last_change = None;
    }

    fn trim_history(&mut self) {
        if self.undo_stack.len() > self.max_history {
            let excess = self.undo_stack.len() - self.max_history;
            self.undo_stack.drain(..excess);
        }
    }
}

impl Default for UndoManager {
    fn default() -> Self {
        Self::new(DEFAULT_CAPTURE_TIMEOUT)
    }
}

fn revert(item: &StackItem, text: &mut RGAText) -> StackItem {
    let mut result = StackItem::new();

    for id in &item.inserted {
        if text.delete_by_id(id) {
            result.deleted.push(id.clone());
        }
    }

    for id in &item.deleted {
        if let Some(ch) = text.tombstone(id) {
            let restored = text.insert_after(id, &ch.to_string());
            result.inserted.extend(restored);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn typed(text: &mut RGAText, undo: &mut UndoManager, pos: usize, s: &str, at: Instant) {
        let ids = text.insert(pos, s);
        undo.record_at(ids, Vec::new(), at);
    }

    #[test]
    fn test_basic_undo() {
        let mut text = RGAText::new("r1");
        let mut undo = UndoManager::default();

        typed(&mut text, &mut undo, 0, "Hello", Instant::now());
        assert!(undo.can_undo());
        assert!(!undo.can_redo());

        assert!(undo.undo(&mut text));
        assert_eq!(text.to_string(), "");
        assert!(!undo.can_undo());
        assert!(undo.can_redo());
    }

    #[test]
    fn test_redo() {
        let mut text = RGAText::new("r1");
        let mut undo = UndoManager::default();

        typed(&mut text, &mut undo, 0, "Hello", Instant::now());
        undo.undo(&mut text);
        assert!(undo.redo(&mut text));

        assert_eq!(text.to_string(), "Hello");
        assert!(undo.can_undo());
    }

    #[test]
    fn test_edits_within_window_are_grouped() {
        let mut text = RGAText::new("r1");
        let mut undo = UndoManager::default();
        let t0 = Instant::now();

        typed(&mut text, &mut undo, 0, "a", t0);
        typed(&mut text, &mut undo, 1, "b", t0 + Duration::from_millis(50));
        typed(&mut text, &mut undo, 2, "c", t0 + Duration::from_millis(100));

        assert_eq!(undo.undo_stack_size(), 1);
        undo.undo(&mut text);
        assert_eq!(text.to_string(), "");
    }

    #[test]
    fn test_edits_outside_window_are_separate() {
        let mut text = RGAText::new("r1");
        let mut undo = UndoManager::default();
        let t0 = Instant::now();

        typed(&mut text, &mut undo, 0, "a", t0);
        typed(&mut text, &mut undo, 1, "b", t0 + Duration::from_millis(500));

        assert_eq!(undo.undo_stack_size(), 2);
        undo.undo(&mut text);
        assert_eq!(text.to_string(), "a");
    }

    #[test]
    fn test_undo_delete_restores_text() {
        let mut text = RGAText::new("r1");
        let mut undo = UndoManager::default();
        let t0 = Instant::now();

        typed(&mut text, &mut undo, 0, "Hello World", t0);
        undo.stop_capturing();

        let removed = text.delete(5, 6);
        undo.record_at(Vec::new(), removed, t0 + Duration::from_secs(1));
        assert_eq!(text.to_string(), "Hello");

        undo.undo(&mut text);
        assert_eq!(text.to_string(), "Hello World");

        undo.redo(&mut text);
        assert_eq!(text.to_string(), "Hello");
    }

    #[test]
    fn test_typing_then_backspace_cancels_out() {
        let mut text = RGAText::new("r1");
        let mut undo = UndoManager::default();
        let t0 = Instant::now();

        typed(&mut text, &mut undo, 0, "x", t0);
        typed(&mut text, &mut undo, 1, "ab", t0);
        let removed = text.delete(2, 1);
        undo.record_at(Vec::new(), removed, t0);

        undo.undo(&mut text);
        assert_eq!(text.to_string(), "");
        assert!(!undo.can_undo());
    }

    #[test]
    fn test_new_edit_clears_redo() {
        let mut text = RGAText::new("r1");
        let mut undo = UndoManager::default();
        let t0 = Instant::now();

        typed(&mut text, &mut undo, 0, "A", t0);
        undo.undo(&mut text);
        assert!(undo.can_redo());

        typed(&mut text, &mut undo, 0, "B", t0 + Duration::from_secs(1));
        assert!(!undo.can_redo());
    }

    #[test]
    fn test_undo_survives_remote_insert() {
        let mut local = RGAText::new("local");
        let mut remote = RGAText::new("remote");
        let mut undo = UndoManager::default();

        typed(&mut local, &mut undo, 0, "world", Instant::now());
        remote.apply_delta(&local.take_delta().unwrap());

        remote.insert(0, "hello ");
        local.apply_delta(&remote.take_delta().unwrap());
        assert_eq!(local.to_string(), "hello world");

        undo.undo(&mut local);
        assert_eq!(local.to_string(), "hello ");
    }

    #[test]
    fn test_step_removed_remotely_is_skipped() {
        let mut local = RGAText::new("local");
        let mut remote = RGAText::new("remote");
        let mut undo = UndoManager::default();
        let t0 = Instant::now();

        typed(&mut local, &mut undo, 0, "keep", t0);
        typed(&mut local, &mut undo, 4, "gone", t0 + Duration::from_secs(1));
        remote.apply_delta(&local.take_delta().unwrap());

        remote.delete(4, 4);
        local.apply_delta(&remote.take_delta().unwrap());

        assert!(undo.undo(&mut local));
        assert_eq!(local.to_string(), "");
    }

    #[test]
    fn test_max_history() {
        let mut text = RGAText::new("r1");
        let mut undo = UndoManager::default();
        undo.set_max_history(5);
        let t0 = Instant::now();

        for i in 0..10 {
            typed(&mut text, &mut undo, i, "x", t0 + Duration::from_secs(i as u64));
        }

        assert_eq!(undo.undo_stack_size(), 5);
    }
}
