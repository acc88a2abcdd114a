//! # coedit-text
//!
//! Replicated text for the coedit collaborative editor.
//!
//! This crate provides:
//! - An RGA text CRDT with tombstones and Lamport-ordered ids
//! - Anchored positions that survive concurrent edits
//! - Linear retain/insert/delete deltas
//! - Change notifications tagged with their origin
//! - Grouped undo/redo scoped by a capture window
//!
//! ## Example
//!
//! ```rust
//! use coedit_text::{Origin, ReplicatedText, TextDocument};
//!
//! let mut alice = TextDocument::new("notes", "alice");
//! let mut bob = TextDocument::new("notes", "bob");
//!
//! alice.insert(0, "hello").unwrap();
//! let caret = alice.index_to_anchor(5);
//!
//! let update = alice.take_update().unwrap().unwrap();
//! bob.apply_update(&update, Origin::Remote("alice".into())).unwrap();
//! bob.insert(0, "X").unwrap();
//!
//! let update = bob.take_update().unwrap().unwrap();
//! alice.apply_update(&update, Origin::Remote("bob".into())).unwrap();
//!
//! assert_eq!(alice.snapshot_text(), "Xhello");
//! assert_eq!(alice.anchor_to_index(&caret), Some(6));
//! ```

pub mod delta;
pub mod document;
pub mod error;
pub mod events;
pub mod lattice;
pub mod position;
pub mod rga_text;
pub mod undo;

pub use delta::DeltaOp;
pub use document::{ReplicatedText, TextDocument};
pub use error::{Result, TextError};
pub use events::{ChangeEvent, ListenerRegistry, Origin, Subscription};
pub use lattice::Lattice;
pub use position::{DocumentId, RelativePosition};
pub use rga_text::{Anchor, RGAText, RGATextDelta, TextId};
pub use undo::{GroupId, UndoManager, DEFAULT_CAPTURE_TIMEOUT};
