//! Changeset upload state machine.
//!
//! ```text
//!          put_changeset
//!  idle ──────────────────► creating ──► uploading ──► idle
//!    │   (open changeset)                   ▲     │
//!    └──────────────────────────────────────┘     └──► close (fire-and-forget)
//! ```
//!
//! One step is in flight per connection at most; a second call fails with
//! [`OsmError::ChangesetInflight`] instead of queuing. An open changeset is
//! reused by the next call until an upload succeeds.

use thiserror::Error;
use tracing::{debug, info, warn};

use super::OsmService;
use crate::cache::RequestHandle;
use crate::epoch::Epoch;
use crate::error::OsmError;
use crate::model::{ChangesetId, Changes, Changeset};
use crate::transport::{ApiRequest, AuthSession, Transport};

/// A failed upload, carrying the changeset as it was passed in.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Changeset upload failed: {source}")]
pub struct ChangesetUploadError {
    #[source]
    pub source: OsmError,
    pub changeset: Changeset,
}

impl<T, A> OsmService<T, A>
where
    T: Transport,
    A: AuthSession,
{
    /// Creates (or reuses) a changeset, uploads `changes` into it and closes
    /// it.
    ///
    /// Success is reported after the configured upload delay; the returned
    /// changeset carries the server-assigned id. The close request's outcome
    /// is ignored.
    pub async fn put_changeset(
        &self,
        changeset: Changeset,
        changes: &Changes,
    ) -> Result<Changeset, ChangesetUploadError> {
        let fail = |source: OsmError, changeset: Changeset| ChangesetUploadError { source, changeset };

        let (handle, open) = {
            let mut state = self.lock();
            if state.changeset.inflight.is_some() {
                return Err(fail(OsmError::ChangesetInflight, changeset));
            }
            let handle = RequestHandle::new(self.inner.epoch.current());
            state.changeset.inflight = Some(handle.clone());
            (handle, state.changeset.open)
        };
        let epoch = handle.epoch();

        let id = match open {
            Some(id) => {
                debug!(changeset = id, "Reusing open changeset");
                id
            }
            None => {
                let request = ApiRequest::put(self.api_path("changeset/create"))
                    .with_xml(changeset.to_document().to_xml());
                let created = self
                    .changeset_step(&handle, request)
                    .await
                    .and_then(|body| parse_changeset_id(&body));
                match created {
                    Ok(id) => {
                        self.with_changeset_step(&handle, |state| state.open = Some(id));
                        info!(changeset = id, "Changeset created");
                        id
                    }
                    Err(err) => {
                        self.finish_changeset_step(&handle);
                        return Err(fail(err, changeset));
                    }
                }
            }
        };

        let uploaded = changeset.with_id(id);
        let request = ApiRequest::post(self.api_path(&format!("changeset/{}/upload", id)))
            .with_xml(uploaded.osm_change(changes).to_xml());
        let result = self.changeset_step(&handle, request).await;
        self.finish_changeset_step(&handle);
        if let Err(err) = result {
            return Err(fail(err, changeset));
        }

        self.with_changeset_step(&handle, |state| state.open = None);
        info!(changeset = id, "Changeset uploaded");

        if self.inner.epoch.is_current(epoch) {
            self.close_changeset(id, epoch);
        }

        // Masks replication lag on the server.
        tokio::time::sleep(self.inner.config.upload_delay()).await;
        Ok(uploaded)
    }

    /// Runs one step, failing early if the handle is aborted.
    async fn changeset_step(
        &self,
        handle: &RequestHandle,
        request: ApiRequest,
    ) -> Result<Vec<u8>, OsmError> {
        let token = handle.token();
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                if self.inner.epoch.is_current(handle.epoch()) {
                    Err(OsmError::Cancelled)
                } else {
                    Err(OsmError::ConnectionSwitched)
                }
            }
            result = self.send(request, handle.epoch()) => result,
        }
    }

    /// Applies `f` to the upload state if `handle` still owns it.
    fn with_changeset_step(&self, handle: &RequestHandle, f: impl FnOnce(&mut super::ChangesetState)) {
        let mut state = self.lock();
        if !self.inner.epoch.is_current(handle.epoch()) {
            return;
        }
        f(&mut state.changeset);
    }

    /// Clears the in-flight marker if it still belongs to `handle`.
    fn finish_changeset_step(&self, handle: &RequestHandle) {
        self.with_changeset_step(handle, |changeset| {
            if changeset
                .inflight
                .as_ref()
                .is_some_and(|h| h.serial() == handle.serial())
            {
                changeset.inflight = None;
            }
        });
    }

    /// Closes `id` in the background.
    ///
    /// Goes straight to the session instead of [`OsmService::send`], so a
    /// failed close is only logged and never signs the user out.
    fn close_changeset(&self, id: ChangesetId, epoch: Epoch) {
        if !self.inner.auth.authenticated() {
            debug!(changeset = id, "Signed out, skipping changeset close");
            return;
        }
        let service = self.clone();
        let request = ApiRequest::put(self.api_path(&format!("changeset/{}/close", id)));
        tokio::spawn(async move {
            match service.inner.auth.xhr(request).await {
                Ok(_) => debug!(changeset = id, epoch = %epoch, "Changeset closed"),
                Err(err) => {
                    debug!(changeset = id, error = %err, "Ignoring changeset close failure")
                }
            }
        });
    }
}

fn parse_changeset_id(body: &[u8]) -> Result<ChangesetId, OsmError> {
    let text = String::from_utf8_lossy(body);
    text.trim().parse().map_err(|_| {
        warn!(body = %text.trim(), "Unexpected changeset create response");
        OsmError::MalformedDocument(format!("expected changeset id, got '{}'", text.trim()))
    })
}
