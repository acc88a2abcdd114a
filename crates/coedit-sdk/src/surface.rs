//! The host editing surface.

use coedit_text::delta::{self, DeltaOp};

/// What the editing core needs from a text input.
///
/// Offsets are in chars. A selection is `(start, end)` with `start <= end`.
pub trait EditSurface {
    fn value(&self) -> String;

    fn selection(&self) -> (usize, usize);

    fn set_value(&mut self, value: &str);

    fn set_selection_range(&mut self, start: usize, end: usize);
}

/// A local edit as reported by the host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LocalDelta {
    /// Typed, pasted or deleted text.
    Edit(Vec<DeltaOp>),
    Undo,
    Redo,
}

/// In-memory surface that behaves like a plain textarea.
///
/// Writing a different value moves the caret to the end, the way browsers
/// do when a script replaces a textarea's contents.
#[derive(Clone, Debug, Default)]
pub struct MemorySurface {
    value: String,
    selection: (usize, usize),
    writes: usize,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many times `set_value` actually replaced the text.
    pub fn write_count(&self) -> usize {
        self.writes
    }

    fn char_len(&self) -> usize {
        self.value.chars().count()
    }

    /// Simulate typing `text` over the current selection. The surface is
    /// updated immediately, and the edit to hand to the reconciler is
    /// returned.
    pub fn replace_selection(&mut self, text: &str) -> LocalDelta {
        let (start, end) = self.selection;
        let old = self.value.clone();

        let mut new: String = old.chars().take(start).collect();
        new.push_str(text);
        new.extend(old.chars().skip(end));

        self.value = new;
        let caret = start + text.chars().count();
        self.selection = (caret, caret);

        LocalDelta::Edit(delta::diff(&old, &self.value))
    }

    /// Simulate a backspace: remove the selection, or the char before a
    /// collapsed caret.
    pub fn backspace(&mut self) -> Option<LocalDelta> {
        let (start, end) = self.selection;
        if start == end {
            if start == 0 {
                return None;
            }
            self.selection = (start - 1, end);
        }
        Some(self.replace_selection(""))
    }

    /// Simulate a caret move or selection change.
    pub fn move_selection(&mut self, start: usize, end: usize) {
        self.set_selection_range(start, end);
    }
}

impl EditSurface for MemorySurface {
    fn value(&self) -> String {
        self.value.clone()
    }

    fn selection(&self) -> (usize, usize) {
        self.selection
    }

    fn set_value(&mut self, value: &str) {
        if self.value == value {
            return;
        }
        self.value = value.to_string();
        let end = self.char_len();
        self.selection = (end, end);
        self.writes += 1;
    }

    fn set_selection_range(&mut self, start: usize, end: usize) {
        let len = self.char_len();
        let (start, end) = (start.min(len), end.min(len));
        self.selection = (start.min(end), start.max(end));
    }
}
