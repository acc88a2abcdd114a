//! Rooms and the document/awareness pair that backs one.

use crate::awareness::{Awareness, AwarenessBroadcast, AwarenessChange, ClientId};
use crate::color::pick_color;
use crate::config::EditorConfig;
use crate::error::Result;
use crate::mirror::USER_FIELD;
use crate::persistence::Persistence;
use coedit_text::{Origin, TextDocument};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use ulid::Ulid;

/// A shared editing room.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Room {
    pub id: String,
    pub password: String,
}

impl Room {
    pub fn new(id: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            password: password.into(),
        }
    }

    /// A room with a fresh, globally unique id.
    pub fn generate(password: impl Into<String>) -> Self {
        Self::new(Ulid::new().to_string(), password)
    }

    /// Key of this room's state in the durable cache.
    pub fn cache_key(&self) -> String {
        format!("{}-{}", self.id, self.password)
    }
}

/// One participant's view of a room.
pub struct Session {
    room: Room,
    session_id: String,
    color: String,
    document: Arc<RwLock<TextDocument>>,
    awareness: Arc<RwLock<Awareness>>,
}

impl Session {
    /// Open a room. The session id doubles as replica id and awareness
    /// client id, so it is fresh for every session.
    pub fn open(room: Room, config: &EditorConfig) -> Self {
        let session_id = Ulid::new().to_string();
        let color = config
            .color
            .clone()
            .unwrap_or_else(|| pick_color(&config.palette, &mut rand::thread_rng()));

        let document = TextDocument::new(room.id.clone(), session_id.clone())
            .with_capture_timeout(config.capture_timeout());
        let mut awareness = Awareness::new(ClientId::new(session_id.clone()))
            .with_timeout(config.awareness_timeout());

        let name = config.user_name.clone().unwrap_or_else(|| session_id.clone());
        awareness.set_local_field(USER_FIELD, json!({ "name": name, "color": color }));

        tracing::debug!(room = %room.id, session = %session_id, "opened session");
        Self {
            room,
            session_id,
            color,
            document: Arc::new(RwLock::new(document)),
            awareness: Arc::new(RwLock::new(awareness)),
        }
    }

    pub fn room(&self) -> &Room {
        &self.room
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn color(&self) -> &str {
        &self.color
    }

    pub fn document(&self) -> &Arc<RwLock<TextDocument>> {
        &self.document
    }

    pub fn awareness(&self) -> &Arc<RwLock<Awareness>> {
        &self.awareness
    }

    /// Apply the cached state for this room, if any. Returns whether the
    /// document changed.
    pub async fn load(&self, persistence: &dyn Persistence) -> Result<bool> {
        let Some(state) = persistence.load(&self.room.cache_key()).await? else {
            return Ok(false);
        };
        let changed = self.document.write().apply_update(&state, Origin::Load)?;
        tracing::debug!(room = %self.room.id, changed, "loaded cached state");
        Ok(changed)
    }

    /// Store the full document state in the cache.
    pub async fn save(&self, persistence: &dyn Persistence) -> Result<()> {
        let state = self.document.read().encode_state()?;
        persistence.store(&self.room.cache_key(), &state).await
    }

    /// Local document changes to send to peers.
    pub fn outgoing_update(&self) -> Result<Option<Vec<u8>>> {
        Ok(self.document.write().take_update()?)
    }

    /// Apply a document update received from `peer`.
    pub fn receive_update(&self, peer: &str, update: &[u8]) -> Result<bool> {
        Ok(self
            .document
            .write()
            .apply_update(update, Origin::Remote(peer.to_string()))?)
    }

    /// Full document state, for a peer that just joined.
    pub fn encode_state(&self) -> Result<Vec<u8>> {
        Ok(self.document.read().encode_state()?)
    }

    /// Local awareness changes to send to peers.
    pub fn outgoing_awareness(&self) -> Result<Option<Vec<u8>>> {
        self.awareness.write().take_update()
    }

    pub fn receive_awareness(&self, update: &[u8]) -> Result<AwarenessChange> {
        self.awareness.write().apply_update(update)
    }

    /// Keep the local awareness state alive and drop silent peers.
    pub fn heartbeat(&self) -> AwarenessChange {
        let mut awareness = self.awareness.write();
        awareness.renew_local();
        awareness.remove_outdated()
    }

    /// Destroy the document and awareness state. A final awareness update
    /// announcing the departure is left in [`outgoing_awareness`](Self::outgoing_awareness).
    pub fn close(&self) {
        self.document.write().destroy();
        self.awareness.write().destroy();
        tracing::debug!(room = %self.room.id, session = %self.session_id, "closed session");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EditorConfigBuilder;
    use crate::persistence::MemoryPersistence;
    use coedit_text::ReplicatedText;

    #[test]
    fn test_room_key() {
        let room = Room::new("abc", "secret");
        assert_eq!(room.cache_key(), "abc-secret");
        assert_ne!(Room::generate("x").id, Room::generate("x").id);
    }

    #[test]
    fn test_open_sets_user_field() {
        let config = EditorConfigBuilder::new()
            .user_name("Alice")
            .color("#8acb88")
            .build();
        let session = Session::open(Room::new("r", "p"), &config);

        let user = session.awareness().read().local_field(USER_FIELD).unwrap();
        assert_eq!(user, json!({ "name": "Alice", "color": "#8acb88" }));
        assert_eq!(session.color(), "#8acb88");
    }

    #[test]
    fn test_random_color_comes_from_palette() {
        let config = EditorConfig::default();
        let session = Session::open(Room::new("r", "p"), &config);
        assert!(config.palette.iter().any(|c| c == session.color()));
    }

    #[test]
    fn test_sessions_in_one_room_share_document_id() {
        let config = EditorConfig::default();
        let a = Session::open(Room::new("r", "p"), &config);
        let b = Session::open(Room::new("r", "p"), &config);

        a.document().write().insert(0, "hi").unwrap();
        let caret = a.document().read().index_to_anchor(1);
        b.receive_update(a.session_id(), &a.outgoing_update().unwrap().unwrap())
            .unwrap();
        assert_eq!(b.document().read().anchor_to_index(&caret), Some(1));
    }

    #[test]
    fn test_save_and_load() {
        let store = MemoryPersistence::new();
        let config = EditorConfig::default();
        let room = Room::new("r", "p");

        tokio_test::block_on(async {
            let first = Session::open(room.clone(), &config);
            first.document().write().insert(0, "persisted").unwrap();
            first.save(&store).await.unwrap();
            first.close();

            let second = Session::open(room, &config);
            assert!(second.load(&store).await.unwrap());
            assert_eq!(second.document().read().snapshot_text(), "persisted");
            assert!(!second.document().read().can_undo());
        });
    }

    #[test]
    fn test_close_announces_departure() {
        let config = EditorConfig::default();
        let a = Session::open(Room::new("r", "p"), &config);
        let b = Session::open(Room::new("r", "p"), &config);
        b.receive_awareness(&a.outgoing_awareness().unwrap().unwrap())
            .unwrap();
        assert_eq!(b.awareness().read().client_count(), 2);

        a.close();
        let change = b
            .receive_awareness(&a.outgoing_awareness().unwrap().unwrap())
            .unwrap();
        assert_eq!(change.removed.len(), 1);
    }
}
