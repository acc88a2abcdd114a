//! Local mirror of the awareness broadcast.
//!
//! The mirror keeps a participant list rebuilt from the broadcast's full
//! snapshot whenever any change is reported, and writes the local cursor
//! back into the broadcast.

use crate::awareness::{AwarenessBroadcast, AwarenessChange, ClientId, StateFields};
use crate::color::PALETTE;
use coedit_text::{RelativePosition, Subscription};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Awareness field holding `{ name, color }`.
pub const USER_FIELD: &str = "user";
/// Awareness field holding the serialized [`CursorState`].
pub const CURSOR_FIELD: &str = "cursor";

/// A participant's selection, anchored to document history.
///
/// `None` endpoints mean no selection is known yet.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorState {
    pub anchor: Option<RelativePosition>,
    pub focus: Option<RelativePosition>,
}

/// A participant as seen by this client.
#[derive(Clone, Debug, PartialEq)]
pub struct ParticipantInfo {
    pub id: ClientId,
    pub color: String,
    pub name: Option<String>,
    pub cursor: Option<CursorState>,
    pub is_self: bool,
}

impl ParticipantInfo {
    fn from_state(id: ClientId, state: &StateFields, is_self: bool) -> Self {
        let user = state.get(USER_FIELD);
        let color = user
            .and_then(|u| u.get("color"))
            .and_then(|c| c.as_str())
            .unwrap_or(PALETTE[0])
            .to_string();
        let name = user
            .and_then(|u| u.get("name"))
            .and_then(|n| n.as_str())
            .map(str::to_string);
        let cursor = state
            .get(CURSOR_FIELD)
            .and_then(|c| serde_json::from_value(c.clone()).ok());

        Self {
            id,
            color,
            name,
            cursor,
            is_self,
        }
    }

    /// Text for the cursor label.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(self.id.as_str())
    }
}

struct Binding<A> {
    broadcast: Arc<RwLock<A>>,
    changes: Subscription<AwarenessChange>,
}

/// Participant list kept in step with an awareness broadcast.
pub struct AwarenessMirror<A> {
    binding: Option<Binding<A>>,
    participants: Vec<ParticipantInfo>,
}

impl<A: AwarenessBroadcast> AwarenessMirror<A> {
    pub fn new() -> Self {
        Self {
            binding: None,
            participants: Vec::new(),
        }
    }

    /// Subscribe to `broadcast` and rebuild immediately. Any previous
    /// binding is released first.
    pub fn bind(&mut self, broadcast: Arc<RwLock<A>>) {
        let changes = broadcast.read().observe();
        self.binding = Some(Binding { broadcast, changes });
        self.rebuild();
    }

    /// Release the subscription and forget every participant.
    pub fn unbind(&mut self) {
        self.binding = None;
        self.participants.clear();
    }

    pub fn is_bound(&self) -> bool {
        self.binding.is_some()
    }

    /// Handle queued change notifications. Returns how many were handled.
    pub fn poll(&mut self) -> usize {
        let Some(binding) = self.binding.as_mut() else {
            return 0;
        };
        let handled = binding.changes.drain().len();
        if handled > 0 {
            self.rebuild();
        }
        handled
    }

    /// Participants sorted by id. Exactly one entry is marked `is_self`
    /// while bound and the local state exists.
    pub fn participants(&self) -> &[ParticipantInfo] {
        &self.participants
    }

    /// Participants other than this one.
    pub fn remote_participants(&self) -> impl Iterator<Item = &ParticipantInfo> + '_ {
        self.participants.iter().filter(|p| !p.is_self)
    }

    /// Publish the local cursor. No-op while unbound.
    pub fn publish_cursor(&self, cursor: &CursorState) {
        let Some(binding) = &self.binding else {
            return;
        };
        match serde_json::to_value(cursor) {
            Ok(value) => binding.broadcast.write().set_local_field(CURSOR_FIELD, value),
            Err(e) => tracing::warn!(error = %e, "failed to encode local cursor"),
        }
    }

    /// The cursor this participant last published.
    pub fn local_cursor(&self) -> Option<CursorState> {
        let binding = self.binding.as_ref()?;
        let value = binding.broadcast.read().local_field(CURSOR_FIELD)?;
        serde_json::from_value(value).ok()
    }

    fn rebuild(&mut self) {
        let Some(binding) = &self.binding else {
            return;
        };
        let broadcast = binding.broadcast.read();
        let local = broadcast.local_client_id().clone();

        let mut participants: Vec<ParticipantInfo> = broadcast
            .get_all_states()
            .into_iter()
            .map(|(id, state)| {
                let is_self = id == local;
                ParticipantInfo::from_state(id, &state, is_self)
            })
            .collect();
        participants.sort_by(|a, b| a.id.cmp(&b.id));

        tracing::trace!(count = participants.len(), "rebuilt participant list");
        drop(broadcast);
        self.participants = participants;
    }
}

impl<A: AwarenessBroadcast> Default for AwarenessMirror<A> {
    fn default() -> Self {
        Self::new()
    }
}
