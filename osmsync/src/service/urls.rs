//! Links into the website served from the API root.

use super::OsmService;
use crate::model::{ChangesetId, EntityId, NoteId};
use crate::transport::{AuthSession, Transport};

impl<T, A> OsmService<T, A>
where
    T: Transport,
    A: AuthSession,
{
    pub fn changeset_url(&self, id: ChangesetId) -> String {
        format!("{}/changeset/{}", self.url_root(), id)
    }

    /// History page centred on `center` (`[lon, lat]`) at `zoom`.
    ///
    /// Coordinates get more decimals the deeper the zoom.
    pub fn changesets_url(&self, center: [f64; 2], zoom: f64) -> String {
        let precision = zoom.log2().ceil().max(0.0) as usize;
        format!(
            "{}/history#map={}/{:.*}/{:.*}",
            self.url_root(),
            zoom.floor() as i64,
            precision,
            center[1],
            precision,
            center[0]
        )
    }

    pub fn entity_url(&self, id: EntityId) -> String {
        format!("{}/{}/{}", self.url_root(), id.kind, id.osm_id)
    }

    pub fn history_url(&self, id: EntityId) -> String {
        format!("{}/{}/{}/history", self.url_root(), id.kind, id.osm_id)
    }

    pub fn user_url(&self, username: &str) -> String {
        format!("{}/user/{}", self.url_root(), username)
    }

    pub fn note_url(&self, id: NoteId) -> String {
        format!("{}/note/{}", self.url_root(), id)
    }
}
