//! Linear edit deltas.
//!
//! A delta describes the change from one buffer string to the next as a
//! sequence of retain/insert/delete operations. Lengths count `char`s, not
//! bytes, so they line up with caret offsets reported by the editing surface.

use crate::error::{Result, TextError};
use serde::{Deserialize, Serialize};

/// A single delta operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeltaOp {
    /// Keep the next `n` characters.
    Retain(usize),
    /// Insert text at the current position.
    Insert(String),
    /// Remove the next `n` characters.
    Delete(usize),
}

impl DeltaOp {
    /// Number of characters this op covers.
    pub fn len(&self) -> usize {
        match self {
            DeltaOp::Retain(n) | DeltaOp::Delete(n) => *n,
            DeltaOp::Insert(text) => text.chars().count(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Compute the delta turning `old` into `new`.
///
/// Trims the common prefix and suffix and describes the middle as one
/// delete followed by one insert, which is what a single keystroke, paste or
/// cut on a textarea produces.
pub fn diff(old: &str, new: &str) -> Vec<DeltaOp> {
    let old: Vec<char> = old.chars().collect();
    let new: Vec<char> = new.chars().collect();

    let prefix = old
        .iter()
        .zip(new.iter())
        .take_while(|(a, b)| a == b)
        .count();
    let max_suffix = old.len().min(new.len()) - prefix;
    let suffix = old
        .iter()
        .rev()
        .zip(new.iter().rev())
        .take(max_suffix)
        .take_while(|(a, b)| a == b)
        .count();

    let mut ops = Vec::new();
    if prefix > 0 {
        ops.push(DeltaOp::Retain(prefix));
    }
    let removed = old.len() - prefix - suffix;
    if removed > 0 {
        ops.push(DeltaOp::Delete(removed));
    }
    let inserted: String = new[prefix..new.len() - suffix].iter().collect();
    if !inserted.is_empty() {
        ops.push(DeltaOp::Insert(inserted));
    }
    ops
}

/// Apply a delta to a plain string.
pub fn apply(text: &str, ops: &[DeltaOp]) -> Result<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut pos = 0;

    for op in ops {
        match op {
            DeltaOp::Retain(n) => {
                let end = checked_end(pos, *n, chars.len())?;
                out.extend(&chars[pos..end]);
                pos = end;
            }
            DeltaOp::Delete(n) => {
                pos = checked_end(pos, *n, chars.len())?;
            }
            DeltaOp::Insert(s) => out.push_str(s),
        }
    }
    out.extend(&chars[pos..]);
    Ok(out)
}

/// Check that `ops` only touches characters that exist in a text of `length`.
pub fn validate(ops: &[DeltaOp], length: usize) -> Result<()> {
    let mut pos = 0;
    for op in ops {
        match op {
            DeltaOp::Retain(n) | DeltaOp::Delete(n) => pos = checked_end(pos, *n, length)?,
            DeltaOp::Insert(_) => {}
        }
    }
    Ok(())
}

/// Caret offset just after the last op that changed the text.
///
/// For a delta with no insert or delete this is the end of the retained
/// prefix.
pub fn caret_after(ops: &[DeltaOp]) -> usize {
    let mut pos = 0;
    let mut caret = None;
    for op in ops {
        match op {
            DeltaOp::Retain(n) => pos += n,
            DeltaOp::Insert(s) => {
                pos += s.chars().count();
                caret = Some(pos);
            }
            DeltaOp::Delete(_) => caret = Some(pos),
        }
    }
    caret.unwrap_or(pos)
}

/// Rebase `ops` over `against`, where both were made on the same text.
///
/// The result applies to the text `against` produced. Text the other side
/// deleted is dropped from `ops`; when both insert at one offset, the other
/// side's text comes first.
pub fn transform(ops: &[DeltaOp], against: &[DeltaOp]) -> Vec<DeltaOp> {
    let mut mine = OpCursor::new(ops);
    let mut theirs = OpCursor::new(against);
    let mut out = Vec::new();

    loop {
        match (mine.peek(), theirs.peek()) {
            (None, _) => break,
            (_, Some(DeltaOp::Insert(s))) => {
                push(&mut out, DeltaOp::Retain(s.chars().count()));
                theirs.skip_op();
            }
            (Some(DeltaOp::Insert(s)), _) => {
                push(&mut out, DeltaOp::Insert(s.clone()));
                mine.skip_op();
            }
            (Some(op), other) => {
                let n = mine.remaining().min(theirs.remaining());
                // Characters the other side removed are no longer there
                if !matches!(other, Some(DeltaOp::Delete(_))) {
                    match op {
                        DeltaOp::Retain(_) => push(&mut out, DeltaOp::Retain(n)),
                        DeltaOp::Delete(_) => push(&mut out, DeltaOp::Delete(n)),
                        DeltaOp::Insert(_) => {}
                    }
                }
                mine.advance(n);
                theirs.advance(n);
            }
        }
    }
    out
}

/// Walks a delta, splitting retains and deletes as needed. Past the last op
/// the text is implicitly retained.
struct OpCursor<'a> {
    ops: &'a [DeltaOp],
    index: usize,
    offset: usize,
}

impl<'a> OpCursor<'a> {
    fn new(ops: &'a [DeltaOp]) -> Self {
        Self {
            ops,
            index: 0,
            offset: 0,
        }
    }

    fn peek(&self) -> Option<&'a DeltaOp> {
        self.ops.get(self.index)
    }

    fn remaining(&self) -> usize {
        self.peek().map_or(usize::MAX, |op| op.len() - self.offset)
    }

    fn advance(&mut self, n: usize) {
        let Some(op) = self.peek() else {
            return;
        };
        self.offset += n;
        if self.offset >= op.len() {
            self.skip_op();
        }
    }

    fn skip_op(&mut self) {
        self.index += 1;
        self.offset = 0;
    }
}

/// Append `op`, merging it into the last op when they are the same kind.
fn push(out: &mut Vec<DeltaOp>, op: DeltaOp) {
    if op.is_empty() {
        return;
    }
    if let Some(last) = out.last_mut() {
        match (last, &op) {
            (DeltaOp::Retain(a), DeltaOp::Retain(b)) | (DeltaOp::Delete(a), DeltaOp::Delete(b)) => {
                *a += b;
                return;
            }
            (DeltaOp::Insert(a), DeltaOp::Insert(b)) => {
                a.push_str(b);
                return;
            }
            _ => {}
        }
    }
    out.push(op);
}

fn checked_end(pos: usize, n: usize, length: usize) -> Result<usize> {
    match pos.checked_add(n) {
        Some(end) if end <= length => Ok(end),
        Some(end) => Err(TextError::IndexOutOfBounds { index: end, length }),
        None => Err(TextError::IndexOutOfBounds {
            index: usize::MAX,
            length,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diff_insert() {
        assert_eq!(
            diff("hello", "hel!lo"),
            vec![DeltaOp::Retain(3), DeltaOp::Insert("!".to_string())]
        );
    }

    #[test]
    fn test_diff_delete() {
        assert_eq!(
            diff("hello", "helo"),
            vec![DeltaOp::Retain(2), DeltaOp::Delete(1)]
        );
    }

    #[test]
    fn test_diff_replace_selection() {
        assert_eq!(
            diff("hello world", "hello rust"),
            vec![
                DeltaOp::Retain(6),
                DeltaOp::Delete(5),
                DeltaOp::Insert("rust".to_string())
            ]
        );
    }

    #[test]
    fn test_diff_identical_is_empty() {
        assert!(diff("same", "same").is_empty());
    }

    #[test]
    fn test_diff_repeated_chars() {
        // Prefix and suffix must not overlap on runs of the same character
        let ops = diff("aaa", "aaaa");
        assert_eq!(apply("aaa", &ops).unwrap(), "aaaa");
    }

    #[test]
    fn test_diff_counts_chars_not_bytes() {
        let ops = diff("héllo", "héllo!");
        assert_eq!(ops, vec![DeltaOp::Retain(5), DeltaOp::Insert("!".to_string())]);
    }

    #[test]
    fn test_apply_out_of_bounds() {
        let err = apply("abc", &[DeltaOp::Retain(2), DeltaOp::Delete(5)]).unwrap_err();
        assert_eq!(err, TextError::IndexOutOfBounds { index: 7, length: 3 });
    }

    #[test]
    fn test_overflowing_retain_is_rejected() {
        let ops = [DeltaOp::Retain(1), DeltaOp::Retain(usize::MAX)];
        assert!(validate(&ops, 3).is_err());
        assert!(apply("abc", &ops).is_err());
    }

    #[test]
    fn test_transform_over_earlier_insert() {
        let mine = diff("hello", "hello!");
        let theirs = diff("hello", "Xhello");
        let rebased = transform(&mine, &theirs);
        assert_eq!(rebased, vec![DeltaOp::Retain(6), DeltaOp::Insert("!".to_string())]);
        assert_eq!(apply("Xhello", &rebased).unwrap(), "Xhello!");
    }

    #[test]
    fn test_transform_skips_text_removed_by_other_side() {
        // Both remove "ll"; only the "o" deletion is left to do
        let mine = vec![DeltaOp::Retain(2), DeltaOp::Delete(3)];
        let theirs = vec![DeltaOp::Retain(2), DeltaOp::Delete(2)];
        let rebased = transform(&mine, &theirs);
        assert_eq!(apply("heo", &rebased).unwrap(), "he");
    }

    #[test]
    fn test_transform_same_offset_puts_other_side_first() {
        let mine = vec![DeltaOp::Retain(2), DeltaOp::Insert("a".to_string())];
        let theirs = vec![DeltaOp::Retain(2), DeltaOp::Insert("b".to_string())];
        let rebased = transform(&mine, &theirs);
        assert_eq!(apply("xybz", &rebased).unwrap(), "xybaz");
    }

    #[test]
    fn test_transform_keeps_text_inserted_inside_deleted_range() {
        let mine = vec![DeltaOp::Retain(1), DeltaOp::Delete(3)];
        let theirs = vec![DeltaOp::Retain(2), DeltaOp::Insert("Z".to_string())];
        let rebased = transform(&mine, &theirs);
        assert_eq!(apply("abZcde", &rebased).unwrap(), "aZe");
    }

    #[test]
    fn test_caret_after() {
        assert_eq!(caret_after(&diff("hello", "heXllo")), 3);
        assert_eq!(caret_after(&diff("hello", "hllo")), 1);
        assert_eq!(caret_after(&[DeltaOp::Retain(4)]), 4);
    }
}
