//! Entity tile sync for a bounding box.

use std::sync::Arc;

use osmsync::model::{Entity, EntityKind};
use osmsync::service::TileCallback;
use osmsync::tile::Extent;
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::common::Session;
use super::entity::describe;
use crate::error::CliError;

pub async fn run(session: &Session, bbox: &Extent, zoom: Option<u8>, json: bool) -> Result<(), CliError> {
    let service = &session.service;
    if let Some(zoom) = zoom {
        service.set_tile_zoom(zoom)?;
    }
    session.sign_in().await?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let callback: TileCallback = Arc::new(move |result| {
        let _ = tx.send(result);
    });
    let issued = service.load_tiles(bbox, Some(callback))?;
    info!(tiles = issued, zoom = service.tile_zoom(), "Syncing tiles");

    let mut entities: Vec<Entity> = Vec::new();
    let mut failed = 0;
    // The channel closes once every tile task has finished.
    while let Some(result) = rx.recv().await {
        match result {
            Ok(payload) => {
                let before = entities.len();
                entities.extend(payload.data.iter().filter_map(|o| o.as_entity()).cloned());
                info!(tile = %payload.tile.id, entities = entities.len() - before, "Tile loaded");
            }
            Err(e) => {
                warn!(error = %e, "Tile failed");
                failed += 1;
            }
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&entities)?);
        return Ok(());
    }

    for entity in entities.iter().filter(|e| !e.tags.is_empty()) {
        println!("{}", describe(entity));
    }
    let count = |kind| entities.iter().filter(|e| e.kind() == kind).count();
    println!();
    println!(
        "{} tiles ({} failed): {} nodes, {} ways, {} relations",
        issued,
        failed,
        count(EntityKind::Node),
        count(EntityKind::Way),
        count(EntityKind::Relation)
    );
    Ok(())
}
