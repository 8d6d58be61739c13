//! Integration tests for a full client session.
//!
//! These tests drive the public API against a scripted server:
//! - Viewport sync, cache save and restore into a fresh session
//! - Signed-in editing: changeset upload and the user's changeset list
//! - A config file feeding the service configuration

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use osmsync::cache::CacheSnapshot;
use osmsync::config::ConfigFile;
use osmsync::model::{Changes, Changeset, Entity, EntityData, EntityId, Tags};
use osmsync::service::{OsmService, ServiceEvent, TileCallback};
use osmsync::tile::Extent;
use osmsync::transport::{ApiRequest, AuthSession, Method, Transport};
use osmsync::OsmError;
use parking_lot::Mutex;
use tokio::sync::mpsc;

// =============================================================================
// Test Helpers
// =============================================================================

const ROOT: &str = "https://osm.example";

/// Answers requests by longest matching path prefix.
#[derive(Default)]
struct Scripted {
    routes: Mutex<HashMap<(Method, String), String>>,
    log: Mutex<Vec<(bool, Method, String)>>,
    authenticated: AtomicBool,
}

impl Scripted {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn route(&self, method: Method, prefix: &str, body: &str) {
        self.routes
            .lock()
            .insert((method, prefix.to_string()), body.to_string());
    }

    fn log(&self) -> Vec<(bool, Method, String)> {
        self.log.lock().clone()
    }

    fn answer(&self, authed: bool, method: Method, target: &str) -> Result<Vec<u8>, OsmError> {
        self.log.lock().push((authed, method, target.to_string()));
        let path = target.strip_prefix(ROOT).unwrap_or(target);
        self.routes
            .lock()
            .iter()
            .filter(|((m, prefix), _)| *m == method && path.starts_with(prefix.as_str()))
            .max_by_key(|((_, prefix), _)| prefix.len())
            .map(|(_, body)| body.clone().into_bytes())
            .ok_or_else(|| OsmError::transport(404, "not found"))
    }
}

struct ScriptedTransport(Arc<Scripted>);

impl Transport for ScriptedTransport {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, OsmError> {
        self.0.answer(false, Method::Get, url)
    }
}

struct ScriptedAuth(Arc<Scripted>);

impl AuthSession for ScriptedAuth {
    fn authenticated(&self) -> bool {
        self.0.authenticated.load(Ordering::SeqCst)
    }

    async fn xhr(&self, request: ApiRequest) -> Result<Vec<u8>, OsmError> {
        self.0.answer(true, request.method, &request.path)
    }

    async fn authenticate(&self) -> Result<(), OsmError> {
        self.0.authenticated.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn logout(&self) {
        self.0.authenticated.store(false, Ordering::SeqCst);
    }

    fn set_url_root(&self, _url_root: &str) {}
}

type Service = OsmService<ScriptedTransport, ScriptedAuth>;

fn session(server: &Arc<Scripted>, config: osmsync::config::ServiceConfig) -> Service {
    OsmService::new(
        ScriptedTransport(server.clone()),
        ScriptedAuth(server.clone()),
        config,
    )
}

fn default_session(server: &Arc<Scripted>) -> Service {
    let config = ConfigFile::default()
        .to_service_config()
        .with_url_root(ROOT)
        .with_upload_delay(Duration::from_millis(100));
    session(server, config)
}

const MAP: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<osm version="0.6">
  <node id="1" lat="51.5007" lon="-0.1246" version="3" user="alice" uid="5"/>
  <node id="2" lat="51.5008" lon="-0.1247" version="1">
    <tag k="amenity" v="bench"/>
  </node>
  <way id="10" version="2">
    <nd ref="1"/>
    <nd ref="2"/>
    <tag k="highway" v="footway"/>
  </way>
</osm>"#;

// =============================================================================
// Viewport sync
// =============================================================================

#[tokio::test]
async fn test_viewport_sync_survives_cache_restore() {
    let server = Scripted::new();
    server.route(Method::Get, "/api/0.6/map?bbox=", MAP);
    let service = default_session(&server);
    let mut events = service.subscribe();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let callback: TileCallback = Arc::new(move |result| {
        let _ = tx.send(result);
    });

    let view = Extent::from_point([-0.1246, 51.5007]);
    assert_eq!(service.load_tiles(&view, Some(callback)).unwrap(), 1);

    let payload = rx.recv().await.unwrap().unwrap();
    let ids: Vec<EntityId> = payload
        .data
        .iter()
        .filter_map(|o| o.as_entity().map(|e| e.id))
        .collect();
    assert_eq!(
        ids,
        vec![EntityId::node(1), EntityId::node(2), EntityId::way(10)]
    );
    assert_eq!(events.recv().await.unwrap(), ServiceEvent::Loading);
    assert_eq!(events.recv().await.unwrap(), ServiceEvent::Loaded);

    // Save, serialize and restore into a new session.
    let json = serde_json::to_string(&service.caches()).unwrap();
    let snapshot: CacheSnapshot = serde_json::from_str(&json).unwrap();

    let other = Scripted::new();
    let restored = default_session(&other);
    restored.restore_caches(snapshot);

    assert_eq!(restored.load_tiles(&view, None).unwrap(), 0);
    assert!(other.log().is_empty());
    assert!(restored.with_caches(|c| c.tile.seen.contains(&EntityId::way(10))));
}

#[tokio::test]
async fn test_single_entity_load_uses_full_path() {
    let server = Scripted::new();
    server.route(Method::Get, "/api/0.6/way/10/full", MAP);
    let service = default_session(&server);

    let entities = service.load_entity(EntityId::way(10)).await.unwrap();
    assert_eq!(entities.len(), 3);
    let way = entities.iter().find(|e| e.id == EntityId::way(10)).unwrap();
    assert_eq!(way.tags.get("highway").map(String::as_str), Some("footway"));
    match &way.data {
        EntityData::Way { nodes } => assert_eq!(nodes.len(), 2),
        other => panic!("unexpected data: {:?}", other),
    }

    let log = server.log();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].2, format!("{}/api/0.6/way/10/full", ROOT));
}

// =============================================================================
// Signed-in editing
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_signed_in_upload_flow() {
    let server = Scripted::new();
    server.route(Method::Put, "/api/0.6/changeset/create", "10");
    server.route(Method::Post, "/api/0.6/changeset/10/upload", "<diffResult/>");
    server.route(Method::Put, "/api/0.6/changeset/10/close", "");
    server.route(
        Method::Get,
        "/api/0.6/user/details",
        r#"<osm><user id="5" display_name="alice" account_created="2020-01-01T00:00:00Z"/></osm>"#,
    );
    server.route(
        Method::Get,
        "/api/0.6/changesets?user=5",
        r#"<osm><changeset id="10"><tag k="comment" v="Add bench"/></changeset></osm>"#,
    );
    let service = default_session(&server);

    service.authenticate().await.unwrap();
    assert!(service.authenticated());

    let mut bench = Entity::new(EntityId::node(-1), EntityData::Node { loc: [-0.1, 51.5] });
    bench.tags.insert("amenity".into(), "bench".into());
    let changes = Changes {
        created: vec![bench],
        ..Changes::default()
    };
    let mut tags = Tags::new();
    tags.insert("comment".into(), "Add bench".into());

    let uploaded = service
        .put_changeset(Changeset::new(tags), &changes)
        .await
        .unwrap();
    assert_eq!(uploaded.id, Some(10));

    let paths: Vec<String> = server
        .log()
        .into_iter()
        .filter(|(authed, method, _)| *authed && *method != Method::Get)
        .map(|(_, _, path)| path)
        .collect();
    assert_eq!(
        paths,
        vec![
            "/api/0.6/changeset/create".to_string(),
            "/api/0.6/changeset/10/upload".to_string(),
            "/api/0.6/changeset/10/close".to_string(),
        ]
    );

    let user = service.user_details().await.unwrap();
    assert_eq!(user.display_name.as_deref(), Some("alice"));
    let changesets = service.user_changesets().await.unwrap();
    assert_eq!(changesets.len(), 1);
    assert_eq!(changesets[0].comment(), Some("Add bench"));
}

// =============================================================================
// Configuration
// =============================================================================

#[tokio::test]
async fn test_config_file_drives_service() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.ini");
    std::fs::write(
        &path,
        "[api]\nurl_root = https://osm.example/\n\n[tiles]\nzoom = 15\n\n[notes]\nlimit = 50\n",
    )
    .unwrap();

    let file = ConfigFile::load_from(&path).unwrap();
    let config = file.to_service_config();
    assert_eq!(config.url_root(), ROOT);
    assert_eq!(config.note_limit(), 50);

    let server = Scripted::new();
    server.route(
        Method::Get,
        "/api/capabilities",
        r#"<osm><api><status api="online"/></api></osm>"#,
    );
    let service = session(&server, config);
    assert_eq!(service.tile_zoom(), 15);

    service.status().await.unwrap();
    assert_eq!(server.log()[0].2, format!("{}/api/capabilities", ROOT));
}
