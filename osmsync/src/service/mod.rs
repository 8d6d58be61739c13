//! The sync service: one client session against the API.
//!
//! [`OsmService`] owns every piece of session state (caches, the changeset
//! upload state, user memos, the rate-limit flag) and the connection epoch
//! that guards it. The handle is cheap to clone; clones share the session.
//!
//! Operations are grouped by concern:
//!
//! - `request`: auth/retry policy, rate limiting, epoch check, `load_from_api`
//! - `entities`: single, versioned and batched entity loads
//! - `tiles`: the tile cache engine for entities and notes
//! - `changeset`: the create → upload → close state machine
//! - `notes`: note queries and mutations
//! - `users`: user records and the signed-in user's changesets
//! - `session`: reset, switch, authentication, status, cache save/restore
//! - `urls`: links into the website
//!
//! # Example
//!
//! ```ignore
//! use osmsync::config::ServiceConfig;
//! use osmsync::service::OsmService;
//! use osmsync::tile::Extent;
//! use osmsync::transport::{ReqwestTransport, TokenSession};
//!
//! let config = ServiceConfig::default();
//! let auth = TokenSession::new(config.url_root(), config.request_timeout_secs())?;
//! let service = OsmService::new(ReqwestTransport::new()?, auth, config);
//!
//! let mut events = service.subscribe();
//! service.load_tiles(&Extent::new([-0.13, 51.50], [-0.12, 51.51]), None)?;
//! ```

mod changeset;
mod entities;
mod notes;
mod request;
mod session;
mod tiles;
mod urls;
mod users;


pub use changeset::ChangesetUploadError;
pub use session::SwitchOptions;
pub use tiles::{NoteOptions, TileCallback, TilePayload};

use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use tokio::sync::broadcast;

use crate::cache::{Caches, RequestHandle};
use crate::coalesce::RequestCoalescer;
use crate::config::{ServiceConfig, DEFAULT_IMAGERY_BLACKLIST};
use crate::epoch::{ConnectionEpoch, Epoch};
use crate::error::OsmError;
use crate::model::{ChangesetId, ChangesetSummary, User, UserId};
use crate::parser::CacheAccess;
use crate::transport::{AuthSession, Transport};

/// Capacity of the lifecycle event channel.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Lifecycle signals published to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceEvent {
    /// `authenticate` started.
    AuthLoading,
    /// `authenticate` finished, successfully or not.
    AuthDone,
    /// Session state changed (auth, rate limit, server switch).
    Change,
    /// The first entity tile request of a batch went out.
    Loading,
    /// The last outstanding entity tile request finished.
    Loaded,
    /// A note tile finished.
    LoadedNotes,
}

/// Client session against the API.
pub struct OsmService<T, A> {
    inner: Arc<Inner<T, A>>,
}

impl<T, A> Clone for OsmService<T, A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<T, A> {
    transport: T,
    auth: A,
    config: ServiceConfig,
    epoch: ConnectionEpoch,
    state: Mutex<ServiceState>,
    events: broadcast::Sender<ServiceEvent>,
    user_loads: RequestCoalescer<UserId, Option<User>>,
}

/// Upload session bookkeeping.
#[derive(Debug, Default)]
struct ChangesetState {
    inflight: Option<RequestHandle>,
    open: Option<ChangesetId>,
}

/// Mutable session state, guarded by one lock.
struct ServiceState {
    caches: Caches,
    changeset: ChangesetState,
    rate_limit: Option<OsmError>,
    user_details: Option<User>,
    user_changesets: Option<Vec<ChangesetSummary>>,
    blacklists: Vec<String>,
    off: bool,
    url_root: String,
    tile_zoom: u8,
    user_load_scheduled: bool,
}

impl<T, A> OsmService<T, A>
where
    T: Transport,
    A: AuthSession,
{
    /// Creates a session in the initial epoch with empty caches.
    pub fn new(transport: T, auth: A, config: ServiceConfig) -> Self {
        auth.set_url_root(config.url_root());
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let state = ServiceState {
            caches: Caches::default(),
            changeset: ChangesetState::default(),
            rate_limit: None,
            user_details: None,
            user_changesets: None,
            blacklists: vec![DEFAULT_IMAGERY_BLACKLIST.to_string()],
            off: false,
            url_root: config.url_root().to_string(),
            tile_zoom: config.tile_zoom(),
            user_load_scheduled: false,
        };

        Self {
            inner: Arc::new(Inner {
                transport,
                auth,
                config,
                epoch: ConnectionEpoch::new(),
                state: Mutex::new(state),
                events,
                user_loads: RequestCoalescer::new(),
            }),
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.inner.config
    }

    /// Subscribes to lifecycle signals.
    pub fn subscribe(&self) -> broadcast::Receiver<ServiceEvent> {
        self.inner.events.subscribe()
    }

    fn emit(&self, event: ServiceEvent) {
        // No subscribers is fine.
        let _ = self.inner.events.send(event);
    }

    fn lock(&self) -> MutexGuard<'_, ServiceState> {
        self.inner.state.lock()
    }

    /// Path of an API call under the configured version.
    fn api_path(&self, rest: &str) -> String {
        format!("/api/{}/{}", self.inner.config.api_version(), rest)
    }

    /// Cache access that refuses once `epoch` is no longer live.
    fn guarded(&self, epoch: Epoch) -> EpochGuard<'_> {
        EpochGuard {
            state: &self.inner.state,
            counter: &self.inner.epoch,
            epoch,
        }
    }
}

/// Cache access bound to the epoch a request was issued under.
///
/// The epoch is compared while the state lock is held, and `reset` advances
/// it under the same lock, so a stale parse can never touch fresh caches.
struct EpochGuard<'a> {
    state: &'a Mutex<ServiceState>,
    counter: &'a ConnectionEpoch,
    epoch: Epoch,
}

impl CacheAccess for EpochGuard<'_> {
    fn with_caches<R>(&self, f: impl FnOnce(&mut Caches) -> R) -> Result<R, OsmError> {
        let mut state = self.state.lock();
        if !self.counter.is_current(self.epoch) {
            return Err(OsmError::ConnectionSwitched);
        }
        Ok(f(&mut state.caches))
    }
}
