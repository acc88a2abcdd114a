//! Positions anchored to document history instead of numeric offsets.

use crate::rga_text::Anchor;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Identity shared by every replica of one document.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId(pub String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// A fresh, globally unique document id.
    pub fn generate() -> Self {
        Self(Ulid::new().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A position that survives concurrent edits.
///
/// Only meaningful for the document it was created from; resolving it
/// against any other document fails.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelativePosition {
    document: DocumentId,
    anchor: Anchor,
}

impl RelativePosition {
    pub fn new(document: DocumentId, anchor: Anchor) -> Self {
        Self { document, anchor }
    }

    pub fn document(&self) -> &DocumentId {
        &self.document
    }

    pub fn anchor(&self) -> &Anchor {
        &self.anchor
    }

    /// Whether this position belongs to `document`.
    pub fn is_for(&self, document: &DocumentId) -> bool {
        &self.document == document
    }
}
