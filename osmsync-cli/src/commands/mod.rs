//! CLI command implementations.
//!
//! Each subcommand has its own module with its handler.
//!
//! # Command Modules
//!
//! - [`config`] - Configuration file helpers (path, show, init)
//! - [`entity`] - Single entity load
//! - [`notes`] - Note sync for a bounding box
//! - [`status`] - Server status and imagery blacklist
//! - [`tiles`] - Entity tile sync for a bounding box
//! - [`user`] - User lookups

pub mod common;
pub mod config;
pub mod entity;
pub mod notes;
pub mod status;
pub mod tiles;
pub mod user;
