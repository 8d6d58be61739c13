//! Entity loaders outside the tile grid.

use std::collections::BTreeMap;

use futures::future::join_all;

use super::OsmService;
use crate::error::OsmError;
use crate::model::{Entity, EntityId, EntityKind};
use crate::parser::{OsmObject, ParseOptions};
use crate::transport::{AuthSession, Transport};

fn entities(objects: Vec<OsmObject>) -> Vec<Entity> {
    objects
        .into_iter()
        .filter_map(|o| match o {
            OsmObject::Entity(e) => Some(e),
            _ => None,
        })
        .collect()
}

impl<T, A> OsmService<T, A>
where
    T: Transport,
    A: AuthSession,
{
    /// Loads one entity. Ways and relations come with their members
    /// (`/full`). Already-seen entities are returned again.
    pub async fn load_entity(&self, id: EntityId) -> Result<Vec<Entity>, OsmError> {
        let suffix = if id.kind == EntityKind::Node { "" } else { "/full" };
        let path = self.api_path(&format!("{}/{}{}", id.kind, id.osm_id, suffix));
        let objects = self.load_from_api(&path, ParseOptions::reparse()).await?;
        Ok(entities(objects))
    }

    /// Loads a specific version of an entity.
    pub async fn load_entity_version(
        &self,
        id: EntityId,
        version: u64,
    ) -> Result<Vec<Entity>, OsmError> {
        let path = self.api_path(&format!("{}/{}/{}", id.kind, id.osm_id, version));
        let objects = self.load_from_api(&path, ParseOptions::reparse()).await?;
        Ok(entities(objects))
    }

    /// Loads many entities with batched requests.
    ///
    /// Ids are deduplicated and grouped by kind; each kind is requested in
    /// chunks of the configured batch size. Returns one result per chunk,
    /// in kind order (nodes, ways, relations).
    pub async fn load_multiple(&self, ids: &[EntityId]) -> Vec<Result<Vec<Entity>, OsmError>> {
        let mut by_kind: BTreeMap<EntityKind, Vec<i64>> = BTreeMap::new();
        for id in ids {
            let group = by_kind.entry(id.kind).or_default();
            if !group.contains(&id.osm_id) {
                group.push(id.osm_id);
            }
        }

        let epoch = self.connection_id();
        let batch_size = self.inner.config.batch_size();
        let paths: Vec<String> = by_kind
            .iter()
            .flat_map(|(kind, osm_ids)| {
                osm_ids.chunks(batch_size).map(move |chunk| {
                    let list = chunk
                        .iter()
                        .map(i64::to_string)
                        .collect::<Vec<_>>()
                        .join(",");
                    format!("{plural}?{plural}={list}", plural = kind.plural())
                })
            })
            .map(|rest| self.api_path(&rest))
            .collect();

        join_all(paths.iter().map(|path| async move {
            self.load_from_api_at(path, ParseOptions::reparse(), epoch)
                .await
                .map(entities)
        }))
        .await
    }
}
