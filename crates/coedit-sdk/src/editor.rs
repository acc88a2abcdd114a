//! The collaborative editor: one surface, one room at a time.

use crate::config::EditorConfig;
use crate::error::Result;
use crate::layout::MeasureSurface;
use crate::overlay::{Indicator, OverlayRenderer};
use crate::persistence::Persistence;
use crate::reconciler::Reconciler;
use crate::session::{Room, Session};
use crate::surface::{EditSurface, LocalDelta};
use std::sync::Arc;

/// Binds a host surface to whichever room it currently shows.
pub struct CollaborativeEditor<S: EditSurface> {
    config: EditorConfig,
    reconciler: Reconciler<S>,
    overlay: OverlayRenderer,
    session: Option<Session>,
    persistence: Arc<dyn Persistence>,
}

impl<S: EditSurface> CollaborativeEditor<S> {
    pub fn new(surface: S, config: EditorConfig, persistence: Arc<dyn Persistence>) -> Self {
        Self {
            config,
            reconciler: Reconciler::new(surface),
            overlay: OverlayRenderer::new(),
            session: None,
            persistence,
        }
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn reconciler(&self) -> &Reconciler<S> {
        &self.reconciler
    }

    pub fn reconciler_mut(&mut self) -> &mut Reconciler<S> {
        &mut self.reconciler
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn surface(&self) -> &S {
        self.reconciler.surface()
    }

    pub fn surface_mut(&mut self) -> &mut S {
        self.reconciler.surface_mut()
    }

    /// Switch to `room`. The previous room is torn down first, whether or
    /// not it finished loading, then the new one is attached, loaded from
    /// the cache and put live.
    pub async fn join(&mut self, room: Room) -> Result<&Session> {
        self.leave();

        let session = Session::open(room, &self.config);
        self.reconciler
            .attach(session.document().clone(), session.awareness().clone());

        if let Err(e) = session.load(self.persistence.as_ref()).await {
            // Start from an empty document rather than refusing the room
            tracing::warn!(error = %e, room = %session.room().id, "failed to load cached state");
        }
        self.reconciler.mark_synced()?;

        let session = self.session.insert(session);
        Ok(&*session)
    }

    /// Tear down the current room, if any.
    pub fn leave(&mut self) {
        self.reconciler.detach();
        if let Some(session) = self.session.take() {
            session.close();
        }
    }

    /// Store the current room's document in the cache.
    pub async fn save(&self) -> Result<()> {
        match &self.session {
            Some(session) => session.save(self.persistence.as_ref()).await,
            None => Ok(()),
        }
    }

    pub fn apply_local_delta(&mut self, change: LocalDelta) -> Result<()> {
        self.reconciler.apply_local_delta(change)
    }

    pub fn on_selection_change(&mut self) {
        self.reconciler.on_selection_change();
    }

    pub fn pump(&mut self) -> usize {
        self.reconciler.pump()
    }

    /// Follow the surface's scroll position.
    pub fn sync_scroll(&mut self, left: f64, top: f64) {
        self.overlay.sync_scroll(left, top);
    }

    pub fn indicators<M: MeasureSurface + ?Sized>(&self, layout: Option<&M>) -> Vec<Indicator> {
        self.reconciler.indicators(&self.overlay, layout)
    }
}

impl<S: EditSurface> Drop for CollaborativeEditor<S> {
    fn drop(&mut self) {
        self.leave();
    }
}
