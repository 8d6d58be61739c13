//! Note queries and mutations.

use tracing::{debug, info};
use url::form_urlencoded;

use super::OsmService;
use crate::cache::{clear_inflight, RequestHandle};
use crate::error::OsmError;
use crate::model::{Note, NoteId, NoteStatus};
use crate::parser::{OsmObject, ParseOptions};
use crate::tile::Extent;
use crate::transport::{ApiRequest, AuthSession, Transport};

/// API action for moving a note from its current status to `new_status`.
fn note_action(current: Option<NoteStatus>, new_status: NoteStatus) -> &'static str {
    match new_status {
        NoteStatus::Closed if current != Some(NoteStatus::Closed) => "close",
        NoteStatus::Open if current != Some(NoteStatus::Open) => "reopen",
        _ => "comment",
    }
}

impl<T, A> OsmService<T, A>
where
    T: Transport,
    A: AuthSession,
{
    /// Cached notes inside `extent`.
    pub fn notes_in(&self, extent: &Extent) -> Vec<Note> {
        let state = self.lock();
        let cache = &state.caches.note;
        cache
            .index
            .search(extent)
            .into_iter()
            .filter_map(|id| cache.notes.get(&id).cloned())
            .collect()
    }

    /// A cached note by id.
    pub fn get_note(&self, id: NoteId) -> Option<Note> {
        self.lock().caches.note.notes.get(&id).cloned()
    }

    /// Replaces a cached note (e.g. after a local edit), moving its index
    /// entry to the note's location.
    pub fn replace_note(&self, note: Note) -> Note {
        let mut state = self.lock();
        let cache = &mut state.caches.note;
        if let Some(old) = cache.notes.get(&note.id) {
            let hint = old.loc;
            cache.index.remove(note.id, hint);
        }
        cache.index.insert(note.id, note.loc);
        cache.notes.insert(note.id, note.clone());
        note
    }

    /// Comments on, closes or reopens a note.
    ///
    /// The action follows from the note's current status and `new_status`;
    /// the note's pending comment, if any, is sent as `text`. Returns the
    /// note as the server now reports it.
    pub async fn post_note_update(&self, note: &Note, new_status: NoteStatus) -> Result<Note, OsmError> {
        let action = note_action(note.status(), new_status);
        let mut path = self.api_path(&format!("notes/{}/{}", note.id, action));
        if let Some(text) = note.new_comment.as_deref() {
            path.push('?');
            path.push_str(&form_urlencoded::Serializer::new(String::new()).append_pair("text", text).finish());
        }
        debug!(note = note.id, action, "Posting note update");
        self.post_note(note, path).await
    }

    /// Creates a note on the server from a local placeholder.
    ///
    /// The placeholder (keyed by its local id) is removed from the cache and
    /// the server's note is returned.
    pub async fn post_note_create(&self, note: &Note) -> Result<Note, OsmError> {
        let mut query = form_urlencoded::Serializer::new(String::new());
        query
            .append_pair("lat", &note.loc[1].to_string())
            .append_pair("lon", &note.loc[0].to_string());
        if let Some(text) = note.new_comment.as_deref() {
            query.append_pair("text", text);
        }
        let path = self.api_path(&format!("notes?{}", query.finish()));
        debug!(note = note.id, "Posting new note");
        self.post_note(note, path).await
    }

    async fn post_note(&self, note: &Note, path: String) -> Result<Note, OsmError> {
        if !self.authenticated() {
            return Err(OsmError::NotAuthenticated);
        }

        let handle = {
            let mut state = self.lock();
            let posts = &mut state.caches.note.inflight_post;
            if posts.contains_key(&note.id) {
                return Err(OsmError::NoteUpdateInflight);
            }
            let handle = RequestHandle::new(self.inner.epoch.current());
            posts.insert(note.id, handle.clone());
            handle
        };
        let epoch = handle.epoch();
        let token = handle.token();

        let fetched = tokio::select! {
            biased;
            _ = token.cancelled() => Err(OsmError::ConnectionSwitched),
            doc = self.fetch_document(ApiRequest::post(path), epoch) => doc,
        };

        {
            let mut state = self.lock();
            if !self.inner.epoch.is_current(epoch) {
                return Err(OsmError::ConnectionSwitched);
            }
            clear_inflight(&mut state.caches.note.inflight_post, &note.id, handle.serial());
            if fetched.is_ok() {
                state.caches.note.remove(note.id);
            }
        }
        let doc = fetched?;

        let parsed = self.parse_objects(&doc, ParseOptions::reparse(), epoch).await?;
        let updated = parsed
            .into_iter()
            .find_map(|o| match o {
                OsmObject::Note(n) => Some(n),
                _ => None,
            })
            .ok_or(OsmError::NoData)?;
        info!(note = updated.id, status = ?updated.status(), "Note updated");
        Ok(updated)
    }
}
