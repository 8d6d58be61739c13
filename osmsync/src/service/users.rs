//! User records and the signed-in user's metadata.

use std::collections::BTreeSet;

use futures::future::join_all;
use tracing::debug;

use super::OsmService;
use crate::coalesce::CoalesceResult;
use crate::error::OsmError;
use crate::model::{ChangesetSummary, User, UserId};
use crate::parser::{get_tags, OsmObject, ParseOptions};
use crate::transport::{ApiRequest, AuthSession, Transport};

fn users(objects: Vec<OsmObject>) -> impl Iterator<Item = User> {
    objects.into_iter().filter_map(|o| match o {
        OsmObject::User(u) => Some(u),
        _ => None,
    })
}

impl<T, A> OsmService<T, A>
where
    T: Transport,
    A: AuthSession,
{
    /// Loads user records, serving cached ones without a request.
    ///
    /// Uncached ids are requested in batches (signed in only); signed out,
    /// only cached records are returned.
    pub async fn load_users(&self, uids: &[UserId]) -> Result<Vec<User>, OsmError> {
        let unique: BTreeSet<UserId> = uids.iter().copied().collect();
        let mut found = Vec::new();
        let mut missing = Vec::new();
        {
            let mut state = self.lock();
            let cache = &mut state.caches.user;
            for uid in unique {
                match cache.users.get(&uid) {
                    Some(user) => {
                        cache.to_load.remove(&uid);
                        found.push(user.clone());
                    }
                    None => missing.push(uid),
                }
            }
        }

        if missing.is_empty() || !self.authenticated() {
            return Ok(found);
        }

        let epoch = self.connection_id();
        let paths: Vec<String> = missing
            .chunks(self.inner.config.batch_size())
            .map(|chunk| {
                let list = chunk
                    .iter()
                    .map(UserId::to_string)
                    .collect::<Vec<_>>()
                    .join(",");
                self.api_path(&format!("users?users={}", list))
            })
            .collect();
        debug!(users = missing.len(), requests = paths.len(), "Loading users");

        let results = join_all(
            paths
                .iter()
                .map(|path| self.load_from_api_at(path, ParseOptions::default(), epoch)),
        )
        .await;
        for result in results {
            found.extend(users(result?));
        }
        Ok(found)
    }

    /// Loads one user record.
    ///
    /// Concurrent loads of the same id share one request. Signed out, only
    /// a cached record is returned.
    pub async fn load_user(&self, uid: UserId) -> Result<Option<User>, OsmError> {
        {
            let mut state = self.lock();
            let cache = &mut state.caches.user;
            let cached = cache.users.get(&uid).cloned();
            if cached.is_some() || !self.inner.auth.authenticated() {
                cache.to_load.remove(&uid);
                return Ok(cached);
            }
        }

        match self.inner.user_loads.register(uid) {
            CoalesceResult::Waiter(waiter) => waiter.wait().await,
            CoalesceResult::Leader(leader) => {
                let path = self.api_path(&format!("user/{}", uid));
                let result = self
                    .load_from_api(&path, ParseOptions::default())
                    .await
                    .map(|objects| {
                        // A concurrent parse may have cached it first.
                        users(objects)
                            .next()
                            .or_else(|| self.lock().caches.user.users.get(&uid).cloned())
                    });
                leader.complete(result.clone());
                result
            }
        }
    }

    /// The signed-in user's record, memoized until the session changes.
    pub async fn user_details(&self) -> Result<User, OsmError> {
        let memo = self.lock().user_details.clone();
        if let Some(user) = memo {
            return Ok(user);
        }
        if !self.authenticated() {
            return Err(OsmError::NotAuthenticated);
        }

        let epoch = self.connection_id();
        let objects = self
            .load_from_api_at(&self.api_path("user/details"), ParseOptions::reparse(), epoch)
            .await?;
        let user = users(objects).next().ok_or(OsmError::NoData)?;

        let mut state = self.lock();
        if self.inner.epoch.is_current(epoch) {
            state.user_details = Some(user.clone());
        }
        Ok(user)
    }

    /// The signed-in user's changesets that carry a non-empty comment,
    /// memoized until the session changes.
    pub async fn user_changesets(&self) -> Result<Vec<ChangesetSummary>, OsmError> {
        let memo = self.lock().user_changesets.clone();
        if let Some(changesets) = memo {
            return Ok(changesets);
        }

        let epoch = self.connection_id();
        let user = self.user_details().await?;
        let request = ApiRequest::get(self.api_path(&format!("changesets?user={}", user.id)));
        let doc = self.fetch_document(request, epoch).await?;
        let root = doc.root().ok_or(OsmError::NoData)?;

        let changesets: Vec<ChangesetSummary> = root
            .descendants("changeset")
            .into_iter()
            .map(|el| ChangesetSummary {
                id: el.attr("id").and_then(|id| id.parse().ok()),
                tags: get_tags(el),
            })
            .filter(|c| c.comment().is_some())
            .collect();

        let mut state = self.lock();
        if !self.inner.epoch.is_current(epoch) {
            return Err(OsmError::ConnectionSwitched);
        }
        state.user_changesets = Some(changesets.clone());
        Ok(changesets)
    }
}
