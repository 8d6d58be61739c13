//! Session lifecycle: reset, switch, authentication, status and cache
//! save/restore.

use tracing::{debug, info};

use super::{ChangesetState, OsmService, ServiceEvent};
use crate::cache::{CacheSnapshot, Caches};
use crate::epoch::Epoch;
use crate::error::OsmError;
use crate::model::ApiStatus;
use crate::tile::{TileError, MAX_ZOOM};
use crate::transport::{AuthSession, Transport};

/// Options for [`OsmService::switch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchOptions {
    /// New API root (scheme and host).
    pub url_root: String,
}

impl SwitchOptions {
    pub fn new(url_root: impl Into<String>) -> Self {
        Self {
            url_root: url_root.into().trim_end_matches('/').to_string(),
        }
    }
}

impl<T, A> OsmService<T, A>
where
    T: Transport,
    A: AuthSession,
{
    /// The live connection epoch.
    pub fn connection_id(&self) -> Epoch {
        self.inner.epoch.current()
    }

    /// Starts a new connection epoch.
    ///
    /// Aborts every outstanding tile fetch, note post and changeset step,
    /// empties all caches and drops the user memos and rate-limit flag.
    /// Responses to requests issued before the reset surface as
    /// [`OsmError::ConnectionSwitched`].
    pub fn reset(&self) -> Epoch {
        let epoch = {
            let mut state = self.lock();
            let epoch = self.inner.epoch.advance();

            state.caches.abort_all();
            state.caches = Caches::default();
            if let Some(handle) = state.changeset.inflight.take() {
                handle.abort();
            }
            state.changeset = ChangesetState::default();
            state.user_details = None;
            state.user_changesets = None;
            state.rate_limit = None;
            state.user_load_scheduled = false;
            epoch
        };
        self.inner.user_loads.abort_all(OsmError::ConnectionSwitched);

        info!(epoch = %epoch, "Session reset");
        epoch
    }

    /// Points the session at another server and resets it.
    pub fn switch(&self, options: SwitchOptions) {
        info!(url_root = %options.url_root, "Switching server");
        self.lock().url_root = options.url_root.clone();
        self.inner.auth.set_url_root(&options.url_root);
        self.reset();
        self.preload_user_changesets();
        self.emit(ServiceEvent::Change);
    }

    /// Turns tile loading on or off. Cached and in-flight state is kept.
    pub fn toggle(&self, on: bool) {
        self.lock().off = !on;
    }

    /// True while tile loading is enabled.
    pub fn is_on(&self) -> bool {
        !self.lock().off
    }

    /// The API root requests currently go to.
    pub fn url_root(&self) -> String {
        self.lock().url_root.clone()
    }

    pub fn authenticated(&self) -> bool {
        self.inner.auth.authenticated()
    }

    /// Signs in.
    ///
    /// Clears the user memos and, on success, the rate-limit flag. Fails with
    /// [`OsmError::ConnectionSwitched`] if the session was reset meanwhile.
    pub async fn authenticate(&self) -> Result<(), OsmError> {
        let epoch = self.connection_id();
        self.clear_user_memos();

        self.emit(ServiceEvent::AuthLoading);
        let result = self.inner.auth.authenticate().await;
        self.emit(ServiceEvent::AuthDone);
        result?;

        if !self.inner.epoch.is_current(epoch) {
            return Err(OsmError::ConnectionSwitched);
        }
        self.lock().rate_limit = None;
        info!("Authenticated");
        self.emit(ServiceEvent::Change);
        self.preload_user_changesets();
        Ok(())
    }

    /// Signs out and drops the user memos.
    pub fn logout(&self) {
        self.clear_user_memos();
        self.inner.auth.logout();
        debug!("Logged out");
        self.emit(ServiceEvent::Change);
    }

    fn clear_user_memos(&self) {
        let mut state = self.lock();
        state.user_details = None;
        state.user_changesets = None;
    }

    /// Loads the user's details and changesets in the background.
    fn preload_user_changesets(&self) {
        if !self.authenticated() {
            return;
        }
        let service = self.clone();
        tokio::spawn(async move {
            if let Err(err) = service.user_changesets().await {
                debug!(error = %err, "Eager changeset load failed");
            }
        });
    }

    /// Zoom of the entity tile grid.
    pub fn tile_zoom(&self) -> u8 {
        self.lock().tile_zoom
    }

    pub fn set_tile_zoom(&self, zoom: u8) -> Result<(), TileError> {
        if zoom > MAX_ZOOM {
            return Err(TileError::InvalidZoom(zoom));
        }
        self.lock().tile_zoom = zoom;
        Ok(())
    }

    /// Deep copy of all caches, without in-flight state.
    pub fn caches(&self) -> CacheSnapshot {
        self.lock().caches.snapshot()
    }

    /// Replaces cache contents. In-flight bookkeeping is always emptied.
    pub fn restore_caches(&self, snapshot: CacheSnapshot) {
        self.lock().caches.restore(snapshot);
    }

    /// Direct access to the live caches.
    pub fn with_caches<R>(&self, f: impl FnOnce(&mut Caches) -> R) -> R {
        f(&mut self.lock().caches)
    }

    /// Imagery URL patterns the server disallows.
    pub fn imagery_blacklists(&self) -> Vec<String> {
        self.lock().blacklists.clone()
    }

    /// Queries the server status.
    ///
    /// Refreshes the imagery blacklists when the server lists any. A recorded
    /// rate-limit error takes precedence over the reported status.
    pub async fn status(&self) -> Result<ApiStatus, OsmError> {
        let epoch = self.connection_id();
        let url = format!("{}/api/capabilities", self.url_root());
        let body = self.inner.transport.fetch(&url).await;
        if !self.inner.epoch.is_current(epoch) {
            return Err(OsmError::ConnectionSwitched);
        }
        let doc = crate::dom::Document::parse(&body?)?;
        let root = doc.root().ok_or(OsmError::NoData)?;

        let regexes: Vec<String> = root
            .descendants("blacklist")
            .into_iter()
            .filter_map(|el| el.attr("regex"))
            .filter(|r| !r.is_empty())
            .map(str::to_string)
            .collect();

        let mut state = self.lock();
        if !regexes.is_empty() {
            state.blacklists = regexes;
        }
        if let Some(err) = state.rate_limit.clone() {
            return Err(err);
        }

        root.descendants("status")
            .first()
            .and_then(|el| el.attr("api"))
            .map(ApiStatus::from)
            .ok_or(OsmError::NoData)
    }
}
