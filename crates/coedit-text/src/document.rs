//! Replicated text document.
//!
//! [`ReplicatedText`] is the capability the editing core consumes; the
//! [`TextDocument`] here implements it on top of [`RGAText`], adding change
//! notifications, grouped undo and encoded updates for a transport.

use crate::delta::{self, DeltaOp};
use crate::error::Result;
use crate::events::{ChangeEvent, ListenerRegistry, Origin, Subscription};
use crate::lattice::Lattice;
use crate::position::{DocumentId, RelativePosition};
use crate::rga_text::{RGAText, RGATextDelta};
use crate::undo::UndoManager;
use std::time::Duration;

/// What the editing core needs from a replicated text.
pub trait ReplicatedText {
    /// The current text.
    fn snapshot_text(&self) -> String;

    /// Apply a linear delta on behalf of `origin`.
    fn apply_delta(&mut self, ops: &[DeltaOp], origin: Origin) -> Result<()>;

    /// Subscribe to change notifications.
    fn observe(&self) -> Subscription<ChangeEvent>;

    /// Anchor the gap before the character at `index`. Out-of-range indexes
    /// clamp to the end of the text.
    fn index_to_anchor(&self, index: usize) -> RelativePosition;

    /// Resolve an anchor, or `None` if it no longer points anywhere.
    fn anchor_to_index(&self, position: &RelativePosition) -> Option<usize>;

    /// Undo the latest local step. Returns whether anything changed.
    fn undo(&mut self) -> bool;

    /// Redo the latest undone step. Returns whether anything changed.
    fn redo(&mut self) -> bool;
}

/// A collaborative plain text document.
pub struct TextDocument {
    id: DocumentId,
    text: RGAText,
    undo: UndoManager,
    listeners: ListenerRegistry<ChangeEvent>,
    /// Local changes not yet handed to the transport.
    outgoing: RGATextDelta,
}

impl TextDocument {
    /// Create a new text document. Every replica of one document must share
    /// `id`; `replica_id` must be unique per replica.
    pub fn new(id: impl Into<String>, replica_id: impl Into<String>) -> Self {
        Self {
            id: DocumentId::new(id),
            text: RGAText::new(replica_id),
            undo: UndoManager::default(),
            listeners: ListenerRegistry::new(),
            outgoing: RGATextDelta::new(),
        }
    }

    /// Use a different undo coalescing window.
    pub fn with_capture_timeout(mut self, capture_timeout: Duration) -> Self {
        self.undo = UndoManager::new(capture_timeout);
        self
    }

    pub fn id(&self) -> &DocumentId {
        &self.id
    }

    pub fn replica_id(&self) -> &str {
        self.text.replica_id()
    }

    /// The underlying CRDT.
    pub fn text(&self) -> &RGAText {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Insert text at a position as a local edit.
    pub fn insert(&mut self, position: usize, text: &str) -> Result<()> {
        self.apply_delta(
            &[DeltaOp::Retain(position), DeltaOp::Insert(text.to_string())],
            Origin::Local,
        )
    }

    /// Delete text at a position as a local edit.
    pub fn delete(&mut self, position: usize, length: usize) -> Result<()> {
        self.apply_delta(
            &[DeltaOp::Retain(position), DeltaOp::Delete(length)],
            Origin::Local,
        )
    }

    pub fn can_undo(&self) -> bool {
        self.undo.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.undo.can_redo()
    }

    /// Close the current undo group.
    pub fn stop_capturing(&mut self) {
        self.undo.stop_capturing();
    }

    /// Encode local changes made since the last call, if any.
    pub fn take_update(&mut self) -> Result<Option<Vec<u8>>> {
        if self.outgoing.is_empty() {
            return Ok(None);
        }
        let update = std::mem::take(&mut self.outgoing);
        Ok(Some(serde_json::to_vec(&update)?))
    }

    /// Apply an encoded update produced by another replica.
    pub fn apply_update(&mut self, update: &[u8], origin: Origin) -> Result<bool> {
        let delta: RGATextDelta = serde_json::from_slice(update)?;
        Ok(self.transact(Some(origin), |text, _| text.apply_delta(&delta)))
    }

    /// Encode the complete state, for peers that join late and for the
    /// durable cache.
    pub fn encode_state(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.text.state_delta())?)
    }

    /// Merge a full replica state. The resulting notification is untagged.
    pub fn merge(&mut self, other: &RGAText) -> bool {
        self.transact(None, |text, _| {
            let before = text.clone();
            text.join_assign(other);
            before.state_delta() != text.state_delta()
        })
    }

    /// Release every listener and forget undo history.
    pub fn destroy(&mut self) {
        self.listeners.clear();
        self.undo.clear();
        self.outgoing = RGATextDelta::new();
    }

    /// Run a mutation, queue its local ops for the transport and notify
    /// listeners if it changed anything.
    fn transact<F>(&mut self, origin: Option<Origin>, f: F) -> bool
    where
        F: FnOnce(&mut RGAText, &mut UndoManager) -> bool,
    {
        let before = self.text.to_string();
        let changed = f(&mut self.text, &mut self.undo);

        if let Some(local) = self.text.take_delta() {
            self.outgoing.extend(local);
        }

        if changed {
            let after = self.text.to_string();
            tracing::trace!(document = %self.id, ?origin, "document changed");
            self.listeners.emit(ChangeEvent {
                origin,
                delta: delta::diff(&before, &after),
            });
        }
        changed
    }
}

impl ReplicatedText for TextDocument {
    fn snapshot_text(&self) -> String {
        self.text.to_string()
    }

    fn apply_delta(&mut self, ops: &[DeltaOp], origin: Origin) -> Result<()> {
        delta::validate(ops, self.text.len())?;
        let capture = origin == Origin::Local;

        self.transact(Some(origin), |text, undo| {
            let mut pos = 0;
            let mut inserted = Vec::new();
            let mut deleted = Vec::new();

            for op in ops {
                match op {
                    DeltaOp::Retain(n) => pos += n,
                    DeltaOp::Insert(s) => {
                        let ids = text.insert(pos, s);
                        pos += ids.len();
                        inserted.extend(ids);
                    }
                    DeltaOp::Delete(n) => deleted.extend(text.delete(pos, *n)),
                }
            }

            let changed = !inserted.is_empty() || !deleted.is_empty();
            if capture {
                undo.record(inserted, deleted);
            }
            changed
        });
        Ok(())
    }

    fn observe(&self) -> Subscription<ChangeEvent> {
        self.listeners.subscribe()
    }

    fn index_to_anchor(&self, index: usize) -> RelativePosition {
        RelativePosition::new(self.id.clone(), self.text.anchor_at(index))
    }

    fn anchor_to_index(&self, position: &RelativePosition) -> Option<usize> {
        if !position.is_for(&self.id) {
            return None;
        }
        self.text.resolve(position.anchor())
    }

    fn undo(&mut self) -> bool {
        self.transact(Some(Origin::Undo), |text, undo| undo.undo(text))
    }

    fn redo(&mut self) -> bool {
        self.transact(Some(Origin::Undo), |text, undo| undo.redo(text))
    }
}
