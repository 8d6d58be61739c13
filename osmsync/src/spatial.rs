//! Spatial index of cached notes.
//!
//! Backed by an [`rstar::RTree`] of point entries. Entries are keyed by note
//! id: removal matches on id, never on coordinates, because coincident notes
//! are nudged apart on insert and their stored location may differ from the
//! one the server reported.

use rstar::{RTree, RTreeObject, AABB};
use serde::{Deserialize, Serialize};

use crate::model::NoteId;
use crate::tile::Extent;

/// Offset, in degrees, applied to both coordinates of a coincident note.
pub const JITTER_EPSILON: f64 = 0.00001;

/// A note's position in the index.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IndexedNote {
    pub id: NoteId,
    pub loc: [f64; 2],
}

impl PartialEq for IndexedNote {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl RTreeObject for IndexedNote {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.loc)
    }
}

/// R-tree of note locations.
#[derive(Debug, Clone, Default)]
pub struct NoteIndex {
    tree: RTree<IndexedNote>,
}

impl NoteIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds an index from saved entries.
    pub fn from_entries(entries: Vec<IndexedNote>) -> Self {
        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    /// Number of indexed notes.
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// True if any entry sits exactly at `loc`.
    pub fn is_occupied(&self, loc: [f64; 2]) -> bool {
        self.tree
            .locate_in_envelope_intersecting(&AABB::from_point(loc))
            .next()
            .is_some()
    }

    /// Returns `loc` nudged by [`JITTER_EPSILON`] until it no longer collides
    /// with an existing entry.
    pub fn free_location(&self, mut loc: [f64; 2]) -> [f64; 2] {
        while self.is_occupied(loc) {
            loc = [loc[0] + JITTER_EPSILON, loc[1] + JITTER_EPSILON];
        }
        loc
    }

    /// Inserts an entry at `loc`.
    pub fn insert(&mut self, id: NoteId, loc: [f64; 2]) {
        self.tree.insert(IndexedNote { id, loc });
    }

    /// Ids of every note inside `extent`.
    pub fn search(&self, extent: &Extent) -> Vec<NoteId> {
        let envelope = AABB::from_corners(extent.min, extent.max);
        self.tree
            .locate_in_envelope_intersecting(&envelope)
            .map(|entry| entry.id)
            .collect()
    }

    /// Removes the entry for `id`.
    ///
    /// `hint` is where the caller believes the note sits; if no entry with
    /// that id is found there the whole tree is scanned.
    pub fn remove(&mut self, id: NoteId, hint: [f64; 2]) -> Option<IndexedNote> {
        if let Some(removed) = self.tree.remove(&IndexedNote { id, loc: hint }) {
            return Some(removed);
        }
        let actual = self.tree.iter().find(|entry| entry.id == id).copied()?;
        self.tree.remove(&actual)
    }

    /// All entries, in no particular order.
    pub fn entries(&self) -> Vec<IndexedNote> {
        self.tree.iter().copied().collect()
    }
}
