//! Request policy shared by every API call.
//!
//! All requests go through [`OsmService::send`], which applies, in order:
//!
//! 1. routing: the credentialed session while signed in, otherwise the
//!    unauthenticated transport (reads only)
//! 2. the epoch check: a response for a stale epoch is `ConnectionSwitched`
//! 3. the authorization retry: a 400/401/403 while signed in logs out and
//!    reissues the request once
//! 4. rate-limit tracking: a 429/509 while signed out is recorded and
//!    announced with [`ServiceEvent::Change`]

use tracing::{debug, warn};

use super::{OsmService, ServiceEvent};
use crate::dom::Document;
use crate::epoch::Epoch;
use crate::error::OsmError;
use crate::parser::{parse_document, OsmObject, ParseOptions};
use crate::transport::{ApiRequest, AuthSession, Transport};

impl<T, A> OsmService<T, A>
where
    T: Transport,
    A: AuthSession,
{
    /// Sends `request` on behalf of an operation issued under `epoch`.
    pub(crate) async fn send(&self, request: ApiRequest, epoch: Epoch) -> Result<Vec<u8>, OsmError> {
        let mut retried = false;

        loop {
            let authenticated = self.inner.auth.authenticated();
            debug!(
                method = %request.method,
                path = %request.path,
                authenticated,
                epoch = %epoch,
                "API request"
            );

            let result = if authenticated {
                self.inner.auth.xhr(request.clone()).await
            } else if request.is_read() {
                let url = format!("{}{}", self.lock().url_root, request.path);
                self.inner.transport.fetch(&url).await
            } else {
                Err(OsmError::NotAuthenticated)
            };

            if !self.inner.epoch.is_current(epoch) {
                debug!(path = %request.path, epoch = %epoch, "Discarding response for stale epoch");
                return Err(OsmError::ConnectionSwitched);
            }

            let err = match result {
                Ok(body) => return Ok(body),
                Err(err) => err,
            };

            if authenticated && err.is_authorization() && !retried {
                warn!(
                    path = %request.path,
                    status = err.status(),
                    "Authorization failed, logging out"
                );
                self.logout();
                retried = true;
                if request.is_read() {
                    continue;
                }
                // Writes cannot fall back to the unauthenticated transport.
                return Err(err);
            }

            if !authenticated && err.is_rate_limited() {
                self.record_rate_limit(&err);
            }
            return Err(err);
        }
    }

    fn record_rate_limit(&self, err: &OsmError) {
        let recorded = {
            let mut state = self.lock();
            if state.rate_limit.is_none() {
                state.rate_limit = Some(err.clone());
                true
            } else {
                false
            }
        };

        if recorded {
            warn!(status = err.status(), "API rate limit reached");
            self.emit(ServiceEvent::Change);
        }
    }

    /// The recorded rate-limit error, if any.
    pub fn rate_limit_error(&self) -> Option<OsmError> {
        self.lock().rate_limit.clone()
    }

    /// Sends `request` and decodes the response body.
    pub(crate) async fn fetch_document(
        &self,
        request: ApiRequest,
        epoch: Epoch,
    ) -> Result<Document, OsmError> {
        let body = self.send(request, epoch).await?;
        Document::parse(&body)
    }

    /// Parses a document into the caches of `epoch`.
    pub(crate) async fn parse_objects(
        &self,
        doc: &Document,
        options: ParseOptions,
        epoch: Epoch,
    ) -> Result<Vec<OsmObject>, OsmError> {
        let guard = self.guarded(epoch);
        parse_document(doc, options, self.inner.config.parse_batch_size(), &guard).await
    }

    /// Loads an API path (relative to the API root) and parses the result.
    pub async fn load_from_api(
        &self,
        path: &str,
        options: ParseOptions,
    ) -> Result<Vec<OsmObject>, OsmError> {
        let epoch = self.connection_id();
        self.load_from_api_at(path, options, epoch).await
    }

    pub(crate) async fn load_from_api_at(
        &self,
        path: &str,
        options: ParseOptions,
        epoch: Epoch,
    ) -> Result<Vec<OsmObject>, OsmError> {
        let doc = self.fetch_document(ApiRequest::get(path), epoch).await?;
        self.parse_objects(&doc, options, epoch).await
    }
}
