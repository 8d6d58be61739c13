//! Session caches and in-flight request bookkeeping.
//!
//! Three caches live for the duration of a connection epoch:
//!
//! - [`EntityCache`]: loaded/in-flight map tiles and the "seen" entity set
//! - [`NoteCache`]: loaded/in-flight note tiles, per-note mutation requests,
//!   the notes themselves and their spatial index
//! - [`UserCache`]: user records and ids waiting to be loaded
//!
//! [`CacheSnapshot`] is a deep copy of all three without any in-flight state,
//! used for session save/restore.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::epoch::Epoch;
use crate::model::{EntityId, Note, NoteId, User, UserId};
use crate::spatial::{IndexedNote, NoteIndex};

static NEXT_SERIAL: AtomicU64 = AtomicU64::new(1);

/// Cancelable handle to an outstanding request.
///
/// Each handle has a unique serial so a late completion can tell whether the
/// bookkeeping entry it would clear still belongs to it.
#[derive(Debug, Clone)]
pub struct RequestHandle {
    serial: u64,
    epoch: Epoch,
    token: CancellationToken,
}

impl RequestHandle {
    /// Creates a handle for a request issued under `epoch`.
    pub fn new(epoch: Epoch) -> Self {
        Self {
            serial: NEXT_SERIAL.fetch_add(1, Ordering::Relaxed),
            epoch,
            token: CancellationToken::new(),
        }
    }

    pub fn serial(&self) -> u64 {
        self.serial
    }

    /// Epoch the request was issued under.
    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    /// Token the request task watches for cancellation.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Asks the request to stop.
    pub fn abort(&self) {
        self.token.cancel();
    }

    pub fn is_aborted(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Removes `key` from `inflight` only if it still holds the request with
/// `serial`. Returns whether it did.
pub(crate) fn clear_inflight<K>(
    inflight: &mut HashMap<K, RequestHandle>,
    key: &K,
    serial: u64,
) -> bool
where
    K: std::hash::Hash + Eq,
{
    match inflight.get(key) {
        Some(handle) if handle.serial() == serial => {
            inflight.remove(key);
            true
        }
        _ => false,
    }
}

/// Map tile cache.
#[derive(Debug, Default)]
pub struct EntityCache {
    pub loaded: HashSet<String>,
    pub inflight: HashMap<String, RequestHandle>,
    pub seen: HashSet<EntityId>,
}

/// Note tile cache, notes and their spatial index.
#[derive(Debug, Default)]
pub struct NoteCache {
    pub loaded: HashSet<String>,
    pub inflight: HashMap<String, RequestHandle>,
    pub inflight_post: HashMap<NoteId, RequestHandle>,
    pub notes: HashMap<NoteId, Note>,
    pub index: NoteIndex,
}

impl NoteCache {
    /// Stores a note, placing it at a free index location.
    ///
    /// Returns the note as stored (with its possibly nudged location).
    pub fn insert(&mut self, mut note: Note) -> Note {
        note.loc = self.index.free_location(note.loc);
        self.index.insert(note.id, note.loc);
        self.notes.insert(note.id, note.clone());
        note
    }

    /// Removes a note from the map and the index.
    pub fn remove(&mut self, id: NoteId) -> Option<Note> {
        let note = self.notes.remove(&id)?;
        self.index.remove(id, note.loc);
        Some(note)
    }
}

/// User records.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct UserCache {
    pub to_load: BTreeSet<UserId>,
    pub users: HashMap<UserId, User>,
}

/// All session caches.
#[derive(Debug, Default)]
pub struct Caches {
    pub tile: EntityCache,
    pub note: NoteCache,
    pub user: UserCache,
}

impl Caches {
    /// Aborts every outstanding tile fetch and note post.
    pub fn abort_all(&self) {
        self.tile.inflight.values().for_each(RequestHandle::abort);
        self.note.inflight.values().for_each(RequestHandle::abort);
        self.note.inflight_post.values().for_each(RequestHandle::abort);
    }

    /// Deep copy of cache contents without in-flight state.
    pub fn snapshot(&self) -> CacheSnapshot {
        CacheSnapshot {
            tile: EntitySnapshot {
                loaded: self.tile.loaded.iter().cloned().collect(),
                seen: self.tile.seen.iter().copied().collect(),
            },
            note: NoteSnapshot {
                loaded: self.note.loaded.iter().cloned().collect(),
                notes: self.note.notes.values().cloned().collect(),
                index: self.note.index.entries(),
            },
            user: self.user.clone(),
        }
    }

    /// Replaces cache contents from a snapshot. In-flight bookkeeping is
    /// always emptied; outstanding requests are never restored.
    pub fn restore(&mut self, snapshot: CacheSnapshot) {
        self.abort_all();
        self.tile = EntityCache {
            loaded: snapshot.tile.loaded.into_iter().collect(),
            inflight: HashMap::new(),
            seen: snapshot.tile.seen.into_iter().collect(),
        };
        self.note = NoteCache {
            loaded: snapshot.note.loaded.into_iter().collect(),
            inflight: HashMap::new(),
            inflight_post: HashMap::new(),
            notes: snapshot
                .note
                .notes
                .into_iter()
                .map(|n| (n.id, n))
                .collect(),
            index: NoteIndex::from_entries(snapshot.note.index),
        };
        self.user = snapshot.user;
    }
}

/// Saved [`EntityCache`] contents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub loaded: BTreeSet<String>,
    pub seen: BTreeSet<EntityId>,
}

/// Saved [`NoteCache`] contents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NoteSnapshot {
    pub loaded: BTreeSet<String>,
    pub notes: Vec<Note>,
    pub index: Vec<IndexedNote>,
}

/// Deep copy of all session caches.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheSnapshot {
    pub tile: EntitySnapshot,
    pub note: NoteSnapshot,
    pub user: UserCache,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_have_unique_serials() {
        let a = RequestHandle::new(Epoch(1));
        let b = RequestHandle::new(Epoch(1));
        assert_ne!(a.serial(), b.serial());
        assert_eq!(a.epoch(), Epoch(1));
    }

    #[test]
    fn test_abort_cancels_token() {
        let handle = RequestHandle::new(Epoch(1));
        let token = handle.token();
        assert!(!token.is_cancelled());
        handle.abort();
        assert!(token.is_cancelled());
        assert!(handle.is_aborted());
    }

    #[test]
    fn test_clear_inflight_ignores_replaced_entry() {
        let mut inflight = HashMap::new();
        let old = RequestHandle::new(Epoch(1));
        let new = RequestHandle::new(Epoch(1));
        inflight.insert("1,1,16".to_string(), new.clone());

        assert!(!clear_inflight(&mut inflight, &"1,1,16".to_string(), old.serial()));
        assert!(inflight.contains_key("1,1,16"));
        assert!(clear_inflight(&mut inflight, &"1,1,16".to_string(), new.serial()));
        assert!(inflight.is_empty());
    }

    #[test]
    fn test_note_cache_keeps_map_and_index_in_step() {
        let mut cache = NoteCache::default();
        let first = cache.insert(Note::new(1, [3.0, 4.0]));
        let second = cache.insert(Note::new(2, [3.0, 4.0]));
        assert_eq!(first.loc, [3.0, 4.0]);
        assert_ne!(second.loc, first.loc);
        assert_eq!(cache.index.len(), 2);
        assert_eq!(cache.notes[&2].loc, second.loc);

        cache.remove(2);
        assert_eq!(cache.index.len(), 1);
        assert!(!cache.notes.contains_key(&2));
        assert!(cache.remove(2).is_none());
    }

    #[test]
    fn test_snapshot_restore_drops_inflight() {
        let mut caches = Caches::default();
        caches.tile.loaded.insert("1,2,16".into());
        caches.tile.seen.insert(EntityId::node(5));
        let pending = RequestHandle::new(Epoch(1));
        caches
            .tile
            .inflight
            .insert("9,9,16".into(), pending.clone());
        caches.note.insert(Note::new(4, [1.0, 1.0]));
        caches.user.to_load.insert(12);

        let snapshot = caches.snapshot();
        assert!(snapshot.tile.loaded.contains("1,2,16"));

        let mut restored = Caches::default();
        restored.restore(snapshot);
        assert!(restored.tile.inflight.is_empty());
        assert!(restored.note.inflight.is_empty());
        assert!(restored.note.inflight_post.is_empty());
        assert!(restored.tile.seen.contains(&EntityId::node(5)));
        assert_eq!(restored.note.index.len(), 1);
        assert!(restored.note.notes.contains_key(&4));
        assert!(restored.user.to_load.contains(&12));
        assert!(!pending.is_aborted());
    }

    #[test]
    fn test_snapshot_is_serializable() {
        let mut caches = Caches::default();
        caches.note.insert(Note::new(4, [1.0, 1.0]));
        let json = serde_json::to_string(&caches.snapshot()).unwrap();
        let back: CacheSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back.note.notes.len(), 1);
    }
}
