//! RGA Text - Collaborative text CRDT based on Replicated Growable Array.
//!
//! Provides character-level collaborative text editing with:
//! - Insert at any position
//! - Delete ranges
//! - Stable anchors that survive concurrent edits
//!
//! Every character keeps its id forever; deleted characters stay behind as
//! tombstones so anchors and late-arriving inserts can still refer to them.

use crate::lattice::Lattice;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Unique identifier for a character in the text.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextId {
    /// The replica that created this character.
    pub replica: String,
    /// Lamport timestamp of the insertion.
    pub seq: u64,
}

impl TextId {
    pub fn new(replica: impl Into<String>, seq: u64) -> Self {
        Self {
            replica: replica.into(),
            seq,
        }
    }

    /// The virtual start of the text.
    pub fn genesis() -> Self {
        Self {
            replica: "".to_string(),
            seq: 0,
        }
    }
}

impl PartialOrd for TextId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TextId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Higher sequence = later in causal order
        // Tie-break on replica ID for determinism
        self.seq
            .cmp(&other.seq)
            .then_with(|| self.replica.cmp(&other.replica))
    }
}

/// A stable reference to a place in the text.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Anchor {
    /// Just before the character with this id.
    Char(TextId),
    /// After the last character, wherever that ends up.
    End,
}

/// A character node in the RGA text.
#[derive(Clone, Debug, PartialEq, Eq)]
struct TextNode {
    id: TextId,
    ch: char,
    /// The ID of the character this was inserted after.
    origin: TextId,
    deleted: bool,
}

impl TextNode {
    fn new(id: TextId, ch: char, origin: TextId) -> Self {
        Self {
            id,
            ch,
            origin,
            deleted: false,
        }
    }
}

/// Delta for text operations.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RGATextDelta {
    /// Characters to insert.
    pub inserts: Vec<(TextId, char, TextId)>, // (id, char, origin)
    /// IDs of characters to delete.
    pub deletes: Vec<TextId>,
}

impl RGATextDelta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.deletes.is_empty()
    }

    /// Append another delta after this one.
    pub fn extend(&mut self, other: RGATextDelta) {
        self.inserts.extend(other.inserts);
        self.deletes.extend(other.deletes);
    }
}

/// Collaborative text CRDT using RGA algorithm.
#[derive(Clone, Debug)]
pub struct RGAText {
    /// All nodes indexed by their ID.
    nodes: HashMap<TextId, TextNode>,
    /// Children of each node, sorted descending by ID.
    children: HashMap<TextId, Vec<TextId>>,
    replica_id: String,
    /// Lamport clock; always at least the highest seq seen.
    clock: u64,
    pending_delta: Option<RGATextDelta>,
}

impl RGAText {
    /// Create a new empty text.
    pub fn new(replica_id: impl Into<String>) -> Self {
        let mut text = Self {
            nodes: HashMap::new(),
            children: HashMap::new(),
            replica_id: replica_id.into(),
            clock: 0,
            pending_delta: None,
        };
        text.children.insert(TextId::genesis(), Vec::new());
        text
    }

    /// Get the replica ID.
    pub fn replica_id(&self) -> &str {
        &self.replica_id
    }

    fn next_id(&mut self) -> TextId {
        self.clock += 1;
        TextId::new(&self.replica_id, self.clock)
    }

    /// Insert a string at the given position. Positions past the end append.
    pub fn insert(&mut self, position: usize, text: &str) -> Vec<TextId> {
        let origin = if position == 0 {
            TextId::genesis()
        } else {
            self.id_at_index(position - 1)
                .or_else(|| self.visible_ids().last().cloned())
                .unwrap_or_else(TextId::genesis)
        };
        self.insert_after(&origin, text)
    }

    /// Insert a string directly after the character `origin`, which may be a
    /// tombstone.
    pub fn insert_after(&mut self, origin: &TextId, text: &str) -> Vec<TextId> {
        let mut origin = origin.clone();
        let mut ids = Vec::with_capacity(text.len());

        for ch in text.chars() {
            let id = self.next_id();
            self.integrate_node(TextNode::new(id.clone(), ch, origin.clone()));

            let delta = self.pending_delta.get_or_insert_with(RGATextDelta::new);
            delta.inserts.push((id.clone(), ch, origin));

            ids.push(id.clone());
            origin = id;
        }
        ids
    }

    /// Delete characters from start to start+length. Returns the removed ids.
    pub fn delete(&mut self, start: usize, length: usize) -> Vec<TextId> {
        let ids: Vec<_> = self
            .visible_ids()
            .skip(start)
            .take(length)
            .cloned()
            .collect();

        ids.into_iter().filter(|id| self.delete_by_id(id)).collect()
    }

    /// Delete a character by its ID. Returns false if it was already gone.
    pub fn delete_by_id(&mut self, id: &TextId) -> bool {
        match self.nodes.get_mut(id) {
            Some(node) if !node.deleted => {
                node.deleted = true;
                let delta = self.pending_delta.get_or_insert_with(RGATextDelta::new);
                delta.deletes.push(id.clone());
                true
            }
            _ => false,
        }
    }

    /// Get the text as a String.
    pub fn to_string(&self) -> String {
        self.iter().collect()
    }

    /// Get the length (number of visible characters).
    pub fn len(&self) -> usize {
        self.visible_ids().count()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.visible_ids().next().is_none()
    }

    /// Get character at position.
    pub fn char_at(&self, position: usize) -> Option<char> {
        self.iter().nth(position)
    }

    /// Get a substring.
    pub fn slice(&self, start: usize, end: usize) -> String {
        self.iter().skip(start).take(end.saturating_sub(start)).collect()
    }

    /// Iterate over visible characters.
    pub fn iter(&self) -> impl Iterator<Item = char> + '_ {
        self.iter_nodes().filter(|n| !n.deleted).map(|n| n.ch)
    }

    fn id_at_index(&self, index: usize) -> Option<TextId> {
        self.visible_ids().nth(index).cloned()
    }

    fn visible_ids(&self) -> impl Iterator<Item = &TextId> + '_ {
        self.iter_nodes().filter(|n| !n.deleted).map(|n| &n.id)
    }

    /// Convert a TextId to a visible position.
    pub fn id_to_position(&self, id: &TextId) -> Option<usize> {
        self.visible_ids().position(|i| i == id)
    }

    /// Convert a visible position to a TextId.
    pub fn position_to_id(&self, position: usize) -> Option<TextId> {
        self.id_at_index(position)
    }

    /// Whether a character with this id is known and not deleted.
    pub fn is_visible(&self, id: &TextId) -> bool {
        self.nodes.get(id).is_some_and(|n| !n.deleted)
    }

    /// The character behind a tombstone, if `id` is a deleted character.
    pub fn tombstone(&self, id: &TextId) -> Option<char> {
        self.nodes.get(id).filter(|n| n.deleted).map(|n| n.ch)
    }

    /// Anchor the gap before the character at `index`. Indexes at or past
    /// the end anchor to the end of the text.
    pub fn anchor_at(&self, index: usize) -> Anchor {
        match self.id_at_index(index) {
            Some(id) => Anchor::Char(id),
            None => Anchor::End,
        }
    }

    /// Resolve an anchor against the current text.
    ///
    /// Returns `None` when the anchoring character was deleted or has never
    /// been seen by this replica.
    pub fn resolve(&self, anchor: &Anchor) -> Option<usize> {
        match anchor {
            Anchor::End => Some(self.len()),
            Anchor::Char(id) if self.is_visible(id) => self.id_to_position(id),
            Anchor::Char(_) => None,
        }
    }

    /// Iterate over all nodes in order.
    fn iter_nodes(&self) -> impl Iterator<Item = &TextNode> + '_ {
        TextIterator {
            text: self,
            stack: vec![TextId::genesis()],
            visited: HashSet::new(),
        }
    }

    /// Integrate a node into the text.
    fn integrate_node(&mut self, node: TextNode) {
        let id = node.id.clone();
        let origin = node.origin.clone();
        self.clock = self.clock.max(id.seq);

        self.nodes.insert(id.clone(), node);

        // Add to children of origin, maintaining sort order (descending by ID for RGA)
        let children = self.children.entry(origin).or_default();
        let pos = children
            .iter()
            .position(|c| c < &id)
            .unwrap_or(children.len());
        children.insert(pos, id.clone());

        self.children.entry(id).or_default();
    }

    /// Take the pending delta.
    pub fn take_delta(&mut self) -> Option<RGATextDelta> {
        self.pending_delta.take()
    }

    /// Apply a delta from another replica. Returns whether anything changed.
    pub fn apply_delta(&mut self, delta: &RGATextDelta) -> bool {
        let mut changed = false;

        for (id, ch, origin) in &delta.inserts {
            if !self.nodes.contains_key(id) {
                self.integrate_node(TextNode::new(id.clone(), *ch, origin.clone()));
                changed = true;
            }
        }

        for id in &delta.deletes {
            if let Some(node) = self.nodes.get_mut(id) {
                if !node.deleted {
                    node.deleted = true;
                    changed = true;
                }
            }
        }

        changed
    }

    /// The whole state as a delta, inserts in causal order.
    pub fn state_delta(&self) -> RGATextDelta {
        let mut delta = RGATextDelta::new();
        for node in self.iter_nodes() {
            delta
                .inserts
                .push((node.id.clone(), node.ch, node.origin.clone()));
            if node.deleted {
                delta.deletes.push(node.id.clone());
            }
        }
        delta
    }
}

/// Iterator for traversing text nodes in order.
struct TextIterator<'a> {
    text: &'a RGAText,
    stack: Vec<TextId>,
    visited: HashSet<TextId>,
}

impl<'a> Iterator for TextIterator<'a> {
    type Item = &'a TextNode;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(id) = self.stack.pop() {
            if !self.visited.insert(id.clone()) {
                continue;
            }

            // Push children in reverse order
            if let Some(children) = self.text.children.get(&id) {
                for child in children.iter().rev() {
                    if !self.visited.contains(child) {
                        self.stack.push(child.clone());
                    }
                }
            }

            if id != TextId::genesis() {
                if let Some(node) = self.text.nodes.get(&id) {
                    return Some(node);
                }
            }
        }
        None
    }
}

impl std::fmt::Display for RGAText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for ch in self.iter() {
            write!(f, "{}", ch)?;
        }
        Ok(())
    }
}

impl PartialEq for RGAText {
    fn eq(&self, other: &Self) -> bool {
        self.iter().eq(other.iter())
    }
}

impl Eq for RGAText {}

impl Lattice for RGAText {
    fn bottom() -> Self {
        Self::new("")
    }

    fn join(&self, other: &Self) -> Self {
        let mut result = self.clone();

        for (id, node) in &other.nodes {
            if let Some(existing) = result.nodes.get_mut(id) {
                if node.deleted {
                    existing.deleted = true;
                }
            } else {
                result.integrate_node(node.clone());
            }
        }

        result
    }
}

impl Default for RGAText {
    fn default() -> Self {
        Self::new("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_insert() {
        let mut text = RGAText::new("r1");
        text.insert(0, "Hello");
        assert_eq!(text.to_string(), "Hello");
        assert_eq!(text.len(), 5);
    }

    #[test]
    fn test_insert_at_position() {
        let mut text = RGAText::new("r1");
        text.insert(0, "Hello");
        text.insert(5, " World");
        assert_eq!(text.to_string(), "Hello World");
    }

    #[test]
    fn test_insert_in_middle() {
        let mut text = RGAText::new("r1");
        text.insert(0, "Helo");
        text.insert(2, "l");
        assert_eq!(text.to_string(), "Hello");
    }

    #[test]
    fn test_insert_at_start() {
        let mut text = RGAText::new("r1");
        text.insert(0, "hello");
        text.insert(0, "X");
        assert_eq!(text.to_string(), "Xhello");
    }

    #[test]
    fn test_insert_past_end_appends() {
        let mut text = RGAText::new("r1");
        text.insert(0, "ab");
        text.insert(10, "c");
        assert_eq!(text.to_string(), "abc");
    }

    #[test]
    fn test_delete() {
        let mut text = RGAText::new("r1");
        text.insert(0, "Hello World");
        let removed = text.delete(5, 6);
        assert_eq!(text.to_string(), "Hello");
        assert_eq!(removed.len(), 6);
    }

    #[test]
    fn test_concurrent_inserts() {
        let mut text1 = RGAText::new("r1");
        let mut text2 = RGAText::new("r2");

        text1.insert(0, "Hello");
        text2.apply_delta(&text1.take_delta().unwrap());

        // Concurrent inserts at the end
        text1.insert(5, " World");
        text2.insert(5, " Rust");

        let delta1 = text1.take_delta().unwrap();
        let delta2 = text2.take_delta().unwrap();

        text1.apply_delta(&delta2);
        text2.apply_delta(&delta1);

        assert_eq!(text1.to_string(), text2.to_string());
        assert!(text1.to_string().contains("World"));
        assert!(text1.to_string().contains("Rust"));
    }

    #[test]
    fn test_remote_insert_at_start_after_sync() {
        let mut text1 = RGAText::new("a");
        let mut text2 = RGAText::new("b");

        text1.insert(0, "hello");
        text2.apply_delta(&text1.take_delta().unwrap());

        text2.insert(0, "X");
        text1.apply_delta(&text2.take_delta().unwrap());

        assert_eq!(text1.to_string(), "Xhello");
        assert_eq!(text2.to_string(), "Xhello");
    }

    #[test]
    fn test_concurrent_insert_delete() {
        let mut text1 = RGAText::new("r1");
        let mut text2 = RGAText::new("r2");

        text1.insert(0, "Hello");
        text2.apply_delta(&text1.take_delta().unwrap());

        // r1 deletes "llo", r2 inserts "x" after "He"
        text1.delete(2, 3);
        text2.insert(2, "x");

        let delta1 = text1.take_delta().unwrap();
        let delta2 = text2.take_delta().unwrap();

        text1.apply_delta(&delta2);
        text2.apply_delta(&delta1);

        assert_eq!(text1.to_string(), text2.to_string());
        assert_eq!(text1.to_string(), "Hex");
    }

    #[test]
    fn test_char_at_and_slice() {
        let mut text = RGAText::new("r1");
        text.insert(0, "Hello World");

        assert_eq!(text.char_at(0), Some('H'));
        assert_eq!(text.char_at(11), None);
        assert_eq!(text.slice(6, 11), "World");
    }

    #[test]
    fn test_position_id_conversion() {
        let mut text = RGAText::new("r1");
        text.insert(0, "Hello");

        let id = text.position_to_id(2).unwrap();
        assert_eq!(text.id_to_position(&id), Some(2));
    }

    #[test]
    fn test_anchor_follows_preceding_insert() {
        let mut text = RGAText::new("r1");
        text.insert(0, "hello");

        let anchor = text.anchor_at(3);
        text.insert(0, "abc");

        assert_eq!(text.resolve(&anchor), Some(6));
    }

    #[test]
    fn test_end_anchor_tracks_length() {
        let mut text = RGAText::new("r1");
        text.insert(0, "hello");

        let anchor = text.anchor_at(5);
        assert_eq!(anchor, Anchor::End);
        text.insert(0, "X");

        assert_eq!(text.resolve(&anchor), Some(6));
    }

    #[test]
    fn test_deleted_anchor_is_unresolved() {
        let mut text = RGAText::new("r1");
        text.insert(0, "hello");

        let anchor = text.anchor_at(1);
        text.delete(1, 2);

        assert_eq!(text.resolve(&anchor), None);
    }

    #[test]
    fn test_unknown_anchor_is_unresolved() {
        let text = RGAText::new("r1");
        let anchor = Anchor::Char(TextId::new("elsewhere", 3));
        assert_eq!(text.resolve(&anchor), None);
    }

    #[test]
    fn test_insert_after_tombstone() {
        let mut text = RGAText::new("r1");
        let ids = text.insert(0, "abc");
        text.delete(1, 1);
        assert_eq!(text.tombstone(&ids[1]), Some('b'));

        text.insert_after(&ids[1], "B");
        assert_eq!(text.to_string(), "aBc");
    }

    #[test]
    fn test_state_delta_rebuilds_text() {
        let mut text = RGAText::new("r1");
        text.insert(0, "Hello World");
        text.delete(0, 6);

        let mut copy = RGAText::new("r2");
        copy.apply_delta(&text.state_delta());

        assert_eq!(copy.to_string(), "World");
    }

    #[test]
    fn test_lattice_join() {
        let mut text1 = RGAText::new("r1");
        let mut text2 = RGAText::new("r2");

        text1.insert(0, "Hello");
        text2.insert(0, "World");

        let merged = text1.join(&text2);
        assert_eq!(merged.len(), 10);
        assert_eq!(merged, text2.join(&text1));
    }
}
