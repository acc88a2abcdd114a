//! Conversion between absolute character offsets and anchored positions.
//!
//! Absolute offsets are only valid for one snapshot of the text. Anything
//! that has to survive concurrent edits (carets published to other
//! participants, the local selection across a resync) is stored as a
//! [`RelativePosition`] and resolved against the current text on use.

use crate::mirror::CursorState;
use coedit_text::{RelativePosition, ReplicatedText};

/// Returned by [`to_absolute`] when a position cannot be resolved.
///
/// Callers must treat it as "do not place a caret or selection here", never
/// as offset 0.
pub const UNRESOLVED: isize = -1;

/// Anchor an absolute offset in `doc`.
///
/// Returns `None` when either the offset or the document is missing.
/// Offsets past the end of the text anchor to the end.
pub fn to_relative<D>(index: Option<usize>, doc: Option<&D>) -> Option<RelativePosition>
where
    D: ReplicatedText + ?Sized,
{
    let (index, doc) = (index?, doc?);
    Some(doc.index_to_anchor(index))
}

/// Resolve an anchored position against the current text of `doc`.
///
/// Returns [`UNRESOLVED`] when either argument is missing, when the position
/// belongs to another document, or when the character it was anchored to has
/// since been deleted.
pub fn to_absolute<D>(position: Option<&RelativePosition>, doc: Option<&D>) -> isize
where
    D: ReplicatedText + ?Sized,
{
    let (Some(position), Some(doc)) = (position, doc) else {
        return UNRESOLVED;
    };
    match doc.anchor_to_index(position) {
        Some(index) => isize::try_from(index).unwrap_or(UNRESOLVED),
        None => UNRESOLVED,
    }
}

/// Resolve both ends of a cursor. Returns `None` unless both resolve.
///
/// The pair is returned as `(anchor, focus)`; it is not sorted.
pub fn resolve_cursor<D>(cursor: &CursorState, doc: &D) -> Option<(usize, usize)>
where
    D: ReplicatedText + ?Sized,
{
    let anchor = to_absolute(cursor.anchor.as_ref(), Some(doc));
    let focus = to_absolute(cursor.focus.as_ref(), Some(doc));
    if anchor == UNRESOLVED || focus == UNRESOLVED {
        return None;
    }
    Some((anchor as usize, focus as usize))
}
