//! osmsync - tile-based sync client for the OpenStreetMap API
//!
//! This library keeps a local, incrementally loaded view of map data and
//! notes for whatever region the caller is looking at, and pushes edits back
//! as changesets.
//!
//! # High-Level API
//!
//! [`service::OsmService`] is the entry point. It is generic over the two
//! network seams in [`transport`] so tests can script the server:
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
//! let entities = service.load_entity(osmsync::model::EntityId::way(42)).await?;
//! service.load_tiles(&Extent::new([-0.13, 51.50], [-0.12, 51.51]), None)?;
//! ```

pub mod cache;
pub mod coalesce;
pub mod config;
pub mod dom;
pub mod epoch;
pub mod error;
pub mod idle;
pub mod logging;
pub mod model;
pub mod parser;
pub mod service;
pub mod spatial;
pub mod tile;
pub mod transport;

pub use error::OsmError;
pub use service::{OsmService, ServiceEvent};

/// Version of the osmsync library and CLI.
///
/// Synchronized across the workspace; injected from `Cargo.toml`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
