//! Tile cache engine.
//!
//! A viewport sync computes the tiles covering the extent, cancels in-flight
//! requests for tiles that left the view, and fetches every tile that is
//! neither loaded nor in flight, one task per tile.
//!
//! ```text
//!  extent ──► tiles_covering ──► cancel out-of-view ──► spawn fetch per new tile
//!                                                           │
//!                       ┌───────────────────────────────────┘
//!                       ▼
//!            fetch ─► parse into caches ─► clear inflight ─► mark loaded ─► callback
//! ```
//!
//! Entity syncs publish [`ServiceEvent::Loading`] when the first request
//! goes out and [`ServiceEvent::Loaded`] when the last one finishes. Note
//! syncs publish [`ServiceEvent::LoadedNotes`] per tile and schedule a
//! debounced load of the comment authors they discovered.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, trace};

use super::{OsmService, ServiceEvent};
use crate::cache::{clear_inflight, Caches, RequestHandle};
use crate::config::{DEFAULT_NOTE_CLOSED_DAYS, DEFAULT_NOTE_LIMIT};
use crate::error::OsmError;
use crate::parser::{OsmObject, ParseOptions};
use crate::tile::{tiles_covering, Extent, Tile, TileError};
use crate::transport::{ApiRequest, AuthSession, Transport};

/// Called once per completed entity tile.
pub type TileCallback = Arc<dyn Fn(Result<TilePayload, OsmError>) + Send + Sync>;

/// A completed tile and the objects parsed from it.
#[derive(Debug, Clone)]
pub struct TilePayload {
    pub tile: Tile,
    pub data: Vec<OsmObject>,
}

/// Query parameters of note tile requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteOptions {
    /// Maximum notes per tile.
    pub limit: u32,
    /// Closed notes older than this many days are omitted.
    pub closed_days: u32,
}

impl Default for NoteOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_NOTE_LIMIT,
            closed_days: DEFAULT_NOTE_CLOSED_DAYS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TileKind {
    Entities,
    Notes(NoteOptions),
}

impl TileKind {
    fn is_entities(self) -> bool {
        matches!(self, TileKind::Entities)
    }
}

fn tile_state(
    caches: &mut Caches,
    kind: TileKind,
) -> (&mut HashSet<String>, &mut HashMap<String, RequestHandle>) {
    match kind {
        TileKind::Entities => (&mut caches.tile.loaded, &mut caches.tile.inflight),
        TileKind::Notes(_) => (&mut caches.note.loaded, &mut caches.note.inflight),
    }
}

/// How a finished tile request relates to the current session.
enum Completion {
    /// The epoch moved on while the request was outstanding.
    Switched,
    /// The request still owned its inflight entry.
    Done { idle: bool },
    /// The entry was cancelled while the response was being parsed.
    Superseded,
}

impl<T, A> OsmService<T, A>
where
    T: Transport,
    A: AuthSession,
{
    /// Syncs map entity tiles for `extent` at the session tile zoom.
    ///
    /// `callback` fires once per completed tile. Returns the number of
    /// requests issued. Must be called within a tokio runtime.
    pub fn load_tiles(
        &self,
        extent: &Extent,
        callback: Option<TileCallback>,
    ) -> Result<usize, TileError> {
        self.sync_tiles(extent, TileKind::Entities, callback)
    }

    /// Syncs note tiles for `extent` at the note zoom with the configured
    /// limit and closed-days window.
    pub fn load_notes(&self, extent: &Extent) -> Result<usize, TileError> {
        let options = NoteOptions {
            limit: self.inner.config.note_limit(),
            closed_days: self.inner.config.note_closed_days(),
        };
        self.load_notes_with(extent, options)
    }

    /// Syncs note tiles with explicit query parameters.
    pub fn load_notes_with(&self, extent: &Extent, options: NoteOptions) -> Result<usize, TileError> {
        self.sync_tiles(extent, TileKind::Notes(options), None)
    }

    fn sync_tiles(
        &self,
        extent: &Extent,
        kind: TileKind,
        callback: Option<TileCallback>,
    ) -> Result<usize, TileError> {
        let mut events = Vec::new();
        let mut issued = Vec::new();
        {
            let mut state = self.lock();
            if state.off {
                debug!("Service is off, not loading tiles");
                return Ok(0);
            }

            let zoom = match kind {
                TileKind::Entities => state.tile_zoom,
                TileKind::Notes(_) => self.inner.config.note_zoom(),
            };
            let tiles = tiles_covering(extent, zoom)?;
            let wanted: HashSet<String> = tiles.iter().map(|t| t.id.clone()).collect();
            let epoch = self.inner.epoch.current();
            let (loaded, inflight) = tile_state(&mut state.caches, kind);

            let had_requests = !inflight.is_empty();
            inflight.retain(|id, handle| {
                let keep = wanted.contains(id);
                if !keep {
                    debug!(tile = %id, "Cancelling request for tile out of view");
                    handle.abort();
                }
                keep
            });
            if had_requests && kind.is_entities() && inflight.is_empty() {
                events.push(ServiceEvent::Loaded);
            }

            for tile in tiles {
                if loaded.contains(&tile.id) || inflight.contains_key(&tile.id) {
                    continue;
                }
                if kind.is_entities() && inflight.is_empty() {
                    events.push(ServiceEvent::Loading);
                }
                let handle = RequestHandle::new(epoch);
                inflight.insert(tile.id.clone(), handle.clone());
                issued.push((tile, handle));
            }
        }

        for event in events {
            self.emit(event);
        }

        let count = issued.len();
        for (tile, handle) in issued {
            trace!(tile = %tile.id, "Issuing tile request");
            let service = self.clone();
            let callback = callback.clone();
            tokio::spawn(async move { service.fetch_tile(tile, handle, kind, callback).await });
        }
        Ok(count)
    }

    fn tile_path(&self, tile: &Tile, kind: TileKind) -> String {
        let bbox = tile.extent.to_param();
        match kind {
            TileKind::Entities => self.api_path(&format!("map?bbox={}", bbox)),
            TileKind::Notes(options) => self.api_path(&format!(
                "notes?limit={}&closed={}&bbox={}",
                options.limit, options.closed_days, bbox
            )),
        }
    }

    async fn fetch_tile(
        self,
        tile: Tile,
        handle: RequestHandle,
        kind: TileKind,
        callback: Option<TileCallback>,
    ) {
        let epoch = handle.epoch();
        let token = handle.token();
        let request = ApiRequest::get(self.tile_path(&tile, kind));

        let fetched = tokio::select! {
            biased;
            _ = token.cancelled() => None,
            doc = self.fetch_document(request, epoch) => Some(doc),
        };
        let Some(fetched) = fetched else {
            debug!(tile = %tile.id, "Tile request cancelled");
            // Out of view: dropped silently. Reset: the caller hears about it.
            if kind.is_entities() && !self.inner.epoch.is_current(epoch) {
                if let Some(cb) = &callback {
                    cb(Err(OsmError::ConnectionSwitched));
                }
            }
            return;
        };

        let options = ParseOptions {
            skip_seen: kind.is_entities(),
        };
        let result = match fetched {
            Ok(doc) => self.parse_objects(&doc, options, epoch).await,
            Err(err) => Err(err),
        };

        let completion = {
            let mut state = self.lock();
            if !self.inner.epoch.is_current(epoch) {
                Completion::Switched
            } else {
                let (loaded, inflight) = tile_state(&mut state.caches, kind);
                if clear_inflight(inflight, &tile.id, handle.serial()) {
                    if result.is_ok() {
                        loaded.insert(tile.id.clone());
                    }
                    Completion::Done {
                        idle: inflight.is_empty(),
                    }
                } else {
                    Completion::Superseded
                }
            }
        };

        match kind {
            TileKind::Notes(_) => {
                if let Completion::Switched = completion {
                    return;
                }
                if let Err(err) = &result {
                    debug!(tile = %tile.id, error = %err, "Note tile failed");
                }
                self.schedule_user_load();
                self.emit(ServiceEvent::LoadedNotes);
            }
            TileKind::Entities => {
                let payload = |data| TilePayload {
                    tile: tile.clone(),
                    data,
                };
                match completion {
                    Completion::Switched => {
                        if let Some(cb) = &callback {
                            cb(Err(OsmError::ConnectionSwitched));
                        }
                    }
                    Completion::Done { idle } => {
                        if let Some(cb) = &callback {
                            cb(result.map(payload));
                        }
                        if idle {
                            self.emit(ServiceEvent::Loaded);
                        }
                    }
                    // Parsed entities are already marked seen; hand them over.
                    Completion::Superseded => {
                        if let (Some(cb), Ok(data)) = (&callback, result) {
                            cb(Ok(payload(data)));
                        }
                    }
                }
            }
        }
    }

    /// Schedules a debounced load of the users queued by note comments.
    fn schedule_user_load(&self) {
        let epoch = {
            let mut state = self.lock();
            if state.user_load_scheduled {
                return;
            }
            state.user_load_scheduled = true;
            self.inner.epoch.current()
        };

        let service = self.clone();
        let debounce = self.inner.config.user_load_debounce();
        tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            let uids: Vec<_> = {
                let mut state = service.lock();
                if !service.inner.epoch.is_current(epoch) {
                    return;
                }
                state.user_load_scheduled = false;
                state.caches.user.to_load.iter().copied().collect()
            };
            if uids.is_empty() {
                return;
            }
            debug!(count = uids.len(), "Loading note comment authors");
            if let Err(err) = service.load_users(&uids).await {
                debug!(error = %err, "Eager user load failed");
            }
        });
    }
}
