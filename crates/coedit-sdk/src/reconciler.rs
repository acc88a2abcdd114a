//! Keeps a host editing surface and a replicated document in step.
//!
//! Local input is turned into document deltas; document changes made by
//! anyone else are written back into the surface, with the local selection
//! carried across through anchored positions.
//!
//! All handling is run-to-completion on the embedder's thread: notifications
//! from the document and the awareness broadcast queue up in subscriptions
//! and are handled by [`Reconciler::pump`].

use crate::awareness::{Awareness, AwarenessBroadcast};
use crate::error::{Result, SdkError};
use crate::layout::MeasureSurface;
use crate::mirror::{AwarenessMirror, CursorState, ParticipantInfo};
use crate::overlay::{Indicator, OverlayRenderer};
use crate::surface::{EditSurface, LocalDelta};
use crate::translator::{resolve_cursor, to_relative};
use coedit_text::delta;
use coedit_text::{ChangeEvent, Origin, ReplicatedText, Subscription, TextDocument};
use parking_lot::RwLock;
use std::sync::Arc;

/// Lifecycle of a reconciler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncState {
    /// No document bound.
    Detached,
    /// Bound, waiting for the durable cache to load.
    Syncing,
    /// Accepting local edits.
    Live,
}

struct DocBinding<D, A> {
    doc: Arc<RwLock<D>>,
    awareness: Arc<RwLock<A>>,
    changes: Subscription<ChangeEvent>,
}

/// Edit reconciler for one surface.
pub struct Reconciler<S, D = TextDocument, A = Awareness> {
    surface: S,
    state: SyncState,
    binding: Option<DocBinding<D, A>>,
    mirror: AwarenessMirror<A>,
}

impl<S, D, A> Reconciler<S, D, A>
where
    S: EditSurface,
    D: ReplicatedText,
    A: AwarenessBroadcast,
{
    pub fn new(surface: S) -> Self {
        Self {
            surface,
            state: SyncState::Detached,
            binding: None,
            mirror: AwarenessMirror::new(),
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Direct access to the host surface. Edits made through it must still
    /// be reported with [`apply_local_delta`](Self::apply_local_delta).
    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn document(&self) -> Option<&Arc<RwLock<D>>> {
        self.binding.as_ref().map(|b| &b.doc)
    }

    pub fn mirror(&self) -> &AwarenessMirror<A> {
        &self.mirror
    }

    pub fn participants(&self) -> &[ParticipantInfo] {
        self.mirror.participants()
    }

    /// Bind a document and its awareness broadcast. Any previous binding is
    /// torn down first. Local edits are refused until
    /// [`mark_synced`](Self::mark_synced).
    pub fn attach(&mut self, doc: Arc<RwLock<D>>, awareness: Arc<RwLock<A>>) {
        self.detach();
        let changes = doc.read().observe();
        self.binding = Some(DocBinding {
            doc,
            awareness,
            changes,
        });
        self.state = SyncState::Syncing;
        tracing::debug!("reconciler attached");
    }

    /// The durable cache finished loading: go live, bind the awareness
    /// mirror and show the document.
    pub fn mark_synced(&mut self) -> Result<()> {
        let Some(binding) = self.binding.as_mut() else {
            return Err(SdkError::NotLive);
        };
        if self.state == SyncState::Live {
            return Ok(());
        }

        // Everything queued while syncing is covered by the resync below
        let skipped = binding.changes.drain().len();
        let awareness = binding.awareness.clone();

        self.state = SyncState::Live;
        self.mirror.bind(awareness);
        tracing::debug!(skipped, "reconciler live");
        self.resync();
        Ok(())
    }

    /// Release every subscription and forget the document.
    pub fn detach(&mut self) {
        if self.binding.take().is_some() {
            tracing::debug!("reconciler detached");
        }
        self.mirror.unbind();
        self.state = SyncState::Detached;
    }

    /// Apply an edit reported by the host.
    ///
    /// The edit was made on the text the surface showed, so document changes
    /// still queued are folded into it first. A delta the document rejects is
    /// logged and the surface is still refreshed from the document.
    pub fn apply_local_delta(&mut self, change: LocalDelta) -> Result<()> {
        if self.state != SyncState::Live {
            tracing::trace!(state = ?self.state, "ignoring local edit");
            return Err(SdkError::NotLive);
        }
        let Some(binding) = self.binding.as_mut() else {
            return Err(SdkError::NotLive);
        };
        let doc = binding.doc.clone();

        // Every queued change happened after the surface was last written
        let pending = binding.changes.drain();
        let change = match change {
            LocalDelta::Edit(ops) if !pending.is_empty() => {
                tracing::trace!(pending = pending.len(), "rebasing local edit");
                LocalDelta::Edit(
                    pending
                        .iter()
                        .fold(ops, |ops, event| delta::transform(&ops, &event.delta)),
                )
            }
            other => other,
        };
        let previous = self.surface.selection();

        let outcome = match &change {
            LocalDelta::Edit(ops) => doc.write().apply_delta(ops, Origin::Local),
            LocalDelta::Undo => {
                doc.write().undo();
                Ok(())
            }
            LocalDelta::Redo => {
                doc.write().redo();
                Ok(())
            }
        };
        if let Err(e) = &outcome {
            tracing::warn!(error = %e, "local edit rejected");
        }

        let snapshot = doc.read().snapshot_text();
        match &change {
            LocalDelta::Edit(ops) if outcome.is_ok() => {
                if self.surface.value() != snapshot {
                    self.surface.set_value(&snapshot);
                    let caret = delta::caret_after(ops).min(snapshot.chars().count());
                    self.surface.set_selection_range(caret, caret);
                }
            }
            _ => {
                self.surface.set_value(&snapshot);
                self.restore_selection(previous, &snapshot);
            }
        }
        self.publish_local_cursor();

        // Our own notifications are now no-ops
        self.pump();
        outcome.map_err(SdkError::from)
    }

    /// React to a document change with the given origin tag.
    ///
    /// Resyncs when the change came from someone else, or when the surface
    /// no longer shows the document text. Returns whether a resync ran.
    pub fn on_document_change(&mut self, origin: Option<&Origin>) -> bool {
        if self.state != SyncState::Live {
            return false;
        }
        let Some(binding) = &self.binding else {
            return false;
        };

        let foreign = origin.is_some_and(|o| !o.is_self());
        let differs = self.surface.value() != binding.doc.read().snapshot_text();
        if foreign || differs {
            tracing::trace!(?origin, differs, "resyncing surface");
            self.resync();
            return true;
        }
        false
    }

    /// The host moved the caret without editing.
    pub fn on_selection_change(&mut self) {
        if self.state == SyncState::Live {
            self.publish_local_cursor();
        }
    }

    /// Handle queued document and awareness notifications. Returns how many
    /// document notifications were handled.
    pub fn pump(&mut self) -> usize {
        if self.state != SyncState::Live {
            return 0;
        }
        let events = match self.binding.as_mut() {
            Some(binding) => binding.changes.drain(),
            None => Vec::new(),
        };
        for event in &events {
            self.on_document_change(event.origin.as_ref());
        }
        self.mirror.poll();
        events.len()
    }

    /// Overlay indicators for every remote participant.
    pub fn indicators<M>(&self, renderer: &OverlayRenderer, layout: Option<&M>) -> Vec<Indicator>
    where
        M: MeasureSurface + ?Sized,
    {
        let Some(binding) = &self.binding else {
            return Vec::new();
        };
        let doc = binding.doc.read();
        renderer.render(self.mirror.participants(), Some(&*doc), layout)
    }

    /// Write the document text into the surface if it differs and restore
    /// the local selection.
    fn resync(&mut self) {
        let Some(binding) = self.binding.as_mut() else {
            return;
        };
        // The surface is about to show every change still queued
        binding.changes.drain();
        let snapshot = binding.doc.read().snapshot_text();
        let previous = self.surface.selection();

        if self.surface.value() != snapshot {
            tracing::debug!(chars = snapshot.chars().count(), "writing document into surface");
            self.surface.set_value(&snapshot);
        }
        self.restore_selection(previous, &snapshot);
        self.publish_local_cursor();
    }

    /// Put the selection back where the last published cursor points.
    /// Falls back to `previous`, clamped, if either end no longer resolves.
    fn restore_selection(&mut self, previous: (usize, usize), snapshot: &str) {
        let resolved = match (&self.binding, self.mirror.local_cursor()) {
            (Some(binding), Some(cursor)) => resolve_cursor(&cursor, &*binding.doc.read()),
            _ => None,
        };

        match resolved {
            Some((anchor, focus)) => {
                self.surface
                    .set_selection_range(anchor.min(focus), anchor.max(focus));
            }
            None => {
                let len = snapshot.chars().count();
                self.surface
                    .set_selection_range(previous.0.min(len), previous.1.min(len));
            }
        }
    }

    fn publish_local_cursor(&self) {
        let Some(binding) = &self.binding else {
            return;
        };
        let (start, end) = self.surface.selection();
        let cursor = {
            let doc = binding.doc.read();
            CursorState {
                anchor: to_relative(Some(start), Some(&*doc)),
                focus: to_relative(Some(end), Some(&*doc)),
            }
        };
        self.mirror.publish_cursor(&cursor);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::awareness::ClientId;
    use crate::surface::MemorySurface;
    use coedit_text::DeltaOp;

    type Shared<T> = Arc<RwLock<T>>;

    fn pair(replica: &str) -> (Shared<TextDocument>, Shared<Awareness>) {
        (
            Arc::new(RwLock::new(TextDocument::new("doc", replica))),
            Arc::new(RwLock::new(Awareness::new(ClientId::new(replica)))),
        )
    }

    fn live(replica: &str) -> (Reconciler<MemorySurface>, Shared<TextDocument>) {
        let (doc, awareness) = pair(replica);
        let mut reconciler = Reconciler::new(MemorySurface::new());
        reconciler.attach(doc.clone(), awareness);
        reconciler.mark_synced().unwrap();
        (reconciler, doc)
    }

    fn type_text(reconciler: &mut Reconciler<MemorySurface>, text: &str) {
        let change = reconciler.surface_mut().replace_selection(text);
        reconciler.apply_local_delta(change).unwrap();
    }

    /// A second replica that has seen everything `doc` has.
    fn replica_of(doc: &Shared<TextDocument>) -> TextDocument {
        let mut remote = TextDocument::new("doc", "remote");
        if let Some(update) = doc.write().take_update().unwrap() {
            remote.apply_update(&update, Origin::Remote("local".into())).unwrap();
        }
        remote
    }

    fn deliver(remote: &mut TextDocument, doc: &Shared<TextDocument>) {
        let update = remote.take_update().unwrap().unwrap();
        doc.write()
            .apply_update(&update, Origin::Remote("remote".into()))
            .unwrap();
    }

    #[test]
    fn test_lifecycle() {
        let (doc, awareness) = pair("local");
        let mut reconciler: Reconciler<MemorySurface> = Reconciler::new(MemorySurface::new());
        assert_eq!(reconciler.state(), SyncState::Detached);
        assert!(reconciler.mark_synced().is_err());

        reconciler.attach(doc, awareness);
        assert_eq!(reconciler.state(), SyncState::Syncing);
        assert!(reconciler
            .apply_local_delta(LocalDelta::Edit(vec![DeltaOp::Insert("x".into())]))
            .is_err());

        reconciler.mark_synced().unwrap();
        assert_eq!(reconciler.state(), SyncState::Live);
        assert_eq!(reconciler.participants().len(), 1);

        reconciler.detach();
        assert_eq!(reconciler.state(), SyncState::Detached);
        assert!(reconciler.participants().is_empty());
    }

    #[test]
    fn test_mark_synced_shows_loaded_text() {
        let (doc, awareness) = pair("local");
        let mut reconciler = Reconciler::new(MemorySurface::new());
        reconciler.attach(doc.clone(), awareness);

        doc.write().apply_delta(&[DeltaOp::Insert("cached".into())], Origin::Load).unwrap();
        assert_eq!(reconciler.pump(), 0);
        assert_eq!(reconciler.surface().value(), "");

        reconciler.mark_synced().unwrap();
        assert_eq!(reconciler.surface().value(), "cached");
    }

    #[test]
    fn test_typing_reaches_document() {
        let (mut reconciler, doc) = live("local");
        type_text(&mut reconciler, "hello");

        assert_eq!(doc.read().snapshot_text(), "hello");
        assert_eq!(reconciler.surface().selection(), (5, 5));
        // The surface already showed the edit, so it was never rewritten
        assert_eq!(reconciler.surface().write_count(), 0);
    }

    #[test]
    fn test_local_edit_not_shown_by_host() {
        let (mut reconciler, doc) = live("local");
        reconciler
            .apply_local_delta(LocalDelta::Edit(vec![DeltaOp::Insert("abc".into())]))
            .unwrap();

        assert_eq!(reconciler.surface().value(), "abc");
        assert_eq!(reconciler.surface().selection(), (3, 3));
        assert_eq!(doc.read().snapshot_text(), "abc");
    }

    #[test]
    fn test_rejected_delta_refreshes_surface() {
        let (mut reconciler, doc) = live("local");
        type_text(&mut reconciler, "abc");

        let bad = LocalDelta::Edit(vec![DeltaOp::Retain(2), DeltaOp::Delete(10)]);
        assert!(reconciler.apply_local_delta(bad).is_err());
        assert_eq!(reconciler.surface().value(), "abc");
        assert_eq!(doc.read().snapshot_text(), "abc");
    }

    #[test]
    fn test_remote_change_preserves_caret() {
        let (mut reconciler, doc) = live("local");
        type_text(&mut reconciler, "hello");

        let mut remote = TextDocument::new("doc", "remote");
        let update = doc.write().take_update().unwrap().unwrap();
        remote.apply_update(&update, Origin::Remote("local".into())).unwrap();
        remote.insert(0, "X").unwrap();

        let update = remote.take_update().unwrap().unwrap();
        doc.write()
            .apply_update(&update, Origin::Remote("remote".into()))
            .unwrap();
        assert_eq!(reconciler.pump(), 1);

        assert_eq!(reconciler.surface().value(), "Xhello");
        assert_eq!(reconciler.surface().selection(), (6, 6));
    }

    #[test]
    fn test_local_edit_rebased_over_queued_remote_change() {
        let (mut reconciler, doc) = live("local");
        type_text(&mut reconciler, "hello");

        let mut remote = replica_of(&doc);
        remote.insert(0, "X").unwrap();
        deliver(&mut remote, &doc);

        // The host still shows "hello" when the user types at the end
        assert_eq!(reconciler.surface().value(), "hello");
        type_text(&mut reconciler, "!");

        assert_eq!(doc.read().snapshot_text(), "Xhello!");
        assert_eq!(reconciler.surface().value(), "Xhello!");
        assert_eq!(reconciler.surface().selection(), (7, 7));
        assert_eq!(reconciler.pump(), 0);
    }

    #[test]
    fn test_local_delete_rebased_over_queued_remote_change() {
        let (mut reconciler, doc) = live("local");
        type_text(&mut reconciler, "abcdef");

        let mut remote = replica_of(&doc);
        remote.insert(3, "XY").unwrap();
        deliver(&mut remote, &doc);

        reconciler.surface_mut().move_selection(4, 6);
        let change = reconciler.surface_mut().backspace().unwrap();
        reconciler.apply_local_delta(change).unwrap();

        assert_eq!(doc.read().snapshot_text(), "abcXYd");
        assert_eq!(reconciler.surface().value(), "abcXYd");
    }

    #[test]
    fn test_deleted_caret_anchor_keeps_clamped_position() {
        let (mut reconciler, doc) = live("local");
        type_text(&mut reconciler, "hello");
        reconciler.surface_mut().move_selection(3, 4);
        reconciler.on_selection_change();

        let mut remote = replica_of(&doc);
        remote.delete(3, 2).unwrap();
        deliver(&mut remote, &doc);
        assert_eq!(reconciler.pump(), 1);

        assert_eq!(reconciler.surface().value(), "hel");
        // Neither end resolves any more; the caret stays put instead of
        // jumping to the start
        assert_eq!(reconciler.surface().selection(), (3, 3));

        let cursor = reconciler.mirror().local_cursor().unwrap();
        assert_eq!(resolve_cursor(&cursor, &*doc.read()), Some((3, 3)));
    }

    #[test]
    fn test_own_notification_is_ignored() {
        let (mut reconciler, _doc) = live("local");
        type_text(&mut reconciler, "abc");
        let writes = reconciler.surface().write_count();

        assert!(!reconciler.on_document_change(Some(&Origin::Local)));
        assert!(reconciler.on_document_change(Some(&Origin::Remote("x".into()))));
        assert_eq!(reconciler.surface().write_count(), writes);
    }

    #[test]
    fn test_undo_restores_text() {
        let (mut reconciler, doc) = live("local");
        type_text(&mut reconciler, "abc");

        reconciler.apply_local_delta(LocalDelta::Undo).unwrap();
        assert_eq!(doc.read().snapshot_text(), "");
        assert_eq!(reconciler.surface().value(), "");
        assert_eq!(reconciler.surface().selection(), (0, 0));

        reconciler.apply_local_delta(LocalDelta::Redo).unwrap();
        assert_eq!(reconciler.surface().value(), "abc");
        assert_eq!(reconciler.surface().selection(), (3, 3));
    }

    #[test]
    fn test_selection_change_is_published() {
        let (mut reconciler, doc) = live("local");
        type_text(&mut reconciler, "hello");

        reconciler.surface_mut().move_selection(1, 3);
        reconciler.on_selection_change();

        let cursor = reconciler.mirror().local_cursor().unwrap();
        assert_eq!(resolve_cursor(&cursor, &*doc.read()), Some((1, 3)));
    }

    #[test]
    fn test_attach_replaces_binding() {
        let (mut reconciler, old_doc) = live("local");
        let (doc, awareness) = pair("local");
        reconciler.attach(doc, awareness);

        old_doc.write().insert(0, "stale").unwrap();
        reconciler.mark_synced().unwrap();
        assert_eq!(reconciler.pump(), 0);
        assert_eq!(reconciler.surface().value(), "");
    }
}
