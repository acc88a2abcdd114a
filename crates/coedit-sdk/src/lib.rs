//! coedit SDK - keep a plain text input in sync with a replicated document
//!
//! This SDK binds an editing surface (a textarea or anything shaped like
//! one) to a shared document and an awareness broadcast, so several people
//! can type into the same text and see each other's cursors.
//!
//! # Quick Start
//!
//! ```rust
//! use coedit_sdk::prelude::*;
//! use coedit_text::{Origin, ReplicatedText, TextDocument};
//! use parking_lot::RwLock;
//! use std::sync::Arc;
//!
//! let doc = Arc::new(RwLock::new(TextDocument::new("notes", "alice")));
//! let awareness = Arc::new(RwLock::new(Awareness::new(ClientId::new("alice"))));
//!
//! let mut editor = Reconciler::new(MemorySurface::new());
//! editor.attach(doc.clone(), awareness);
//! editor.mark_synced().unwrap();
//!
//! // The user types; the host reports the edit
//! let change = editor.surface_mut().replace_selection("hello");
//! editor.apply_local_delta(change).unwrap();
//!
//! // A peer inserts at the start; the caret follows its text
//! doc.write()
//!     .apply_delta(&[coedit_text::DeltaOp::Insert("X".into())], Origin::Remote("bob".into()))
//!     .unwrap();
//! editor.pump();
//!
//! assert_eq!(editor.surface().value(), "Xhello");
//! assert_eq!(editor.surface().selection(), (6, 6));
//! ```
//!
//! # Architecture
//!
//! - [`translator`] - Absolute offsets to anchored positions and back
//! - [`awareness`] - Presence broadcast with per-client clocks
//! - [`mirror`] - Participant list mirrored from the broadcast
//! - [`reconciler`] - Edit reconciliation between surface and document
//! - [`overlay`] - Remote cursor and selection rectangles
//! - [`layout`] - Text measurement
//! - [`surface`] - Host editing surface
//! - [`session`] - Rooms, sessions and the transport bridge
//! - [`persistence`] - Durable cache
//! - [`editor`] - One surface switching between rooms
//! - [`config`] - Editor configuration
//! - [`error`] - Error types

pub mod awareness;
pub mod color;
pub mod config;
pub mod editor;
pub mod error;
pub mod layout;
pub mod mirror;
pub mod overlay;
pub mod persistence;
pub mod reconciler;
pub mod session;
pub mod surface;
pub mod translator;

// Re-exports for convenience
pub use awareness::{
    Awareness, AwarenessBroadcast, AwarenessChange, ClientId, StateFields,
    DEFAULT_AWARENESS_TIMEOUT,
};
pub use color::{pick_color, selection_css, PALETTE};
pub use config::{EditorConfig, EditorConfigBuilder};
pub use editor::CollaborativeEditor;
pub use error::{Result, SdkError};
pub use layout::{MeasureSurface, MonospaceLayout, Rect};
pub use mirror::{AwarenessMirror, CursorState, ParticipantInfo};
pub use overlay::{Indicator, OverlayRenderer};
pub use persistence::{FilePersistence, MemoryPersistence, Persistence};
pub use reconciler::{Reconciler, SyncState};
pub use session::{Room, Session};
pub use surface::{EditSurface, LocalDelta, MemorySurface};
pub use translator::{resolve_cursor, to_absolute, to_relative, UNRESOLVED};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::awareness::{Awareness, AwarenessBroadcast, ClientId};
    pub use crate::config::{EditorConfig, EditorConfigBuilder};
    pub use crate::editor::CollaborativeEditor;
    pub use crate::error::SdkError;
    pub use crate::layout::{MeasureSurface, MonospaceLayout};
    pub use crate::overlay::OverlayRenderer;
    pub use crate::persistence::{MemoryPersistence, Persistence};
    pub use crate::reconciler::{Reconciler, SyncState};
    pub use crate::session::{Room, Session};
    pub use crate::surface::{EditSurface, LocalDelta, MemorySurface};
}
