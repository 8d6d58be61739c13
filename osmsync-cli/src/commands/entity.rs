//! Single entity load.

use osmsync::model::{Entity, EntityId};

use super::common::Session;
use crate::error::CliError;

pub async fn run(session: &Session, id: &str, version: Option<u64>, json: bool) -> Result<(), CliError> {
    let id: EntityId = id
        .parse()
        .map_err(|e| CliError::Config(format!("{}", e)))?;

    let entities = match version {
        Some(v) => session.service.load_entity_version(id, v).await?,
        None => session.service.load_entity(id).await?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&entities)?);
    } else {
        for entity in &entities {
            println!("{}", describe(entity));
        }
    }
    Ok(())
}

/// One-line summary: id, version and tags.
pub fn describe(entity: &Entity) -> String {
    let mut line = entity.id.to_string();
    if let Some(version) = entity.version {
        line.push_str(&format!(" v{}", version));
    }
    if !entity.visible {
        line.push_str(" (deleted)");
    }
    for (k, v) in &entity.tags {
        line.push_str(&format!(" {}={}", k, v));
    }
    line
}
