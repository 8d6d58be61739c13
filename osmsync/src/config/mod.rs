//! Configuration for the sync service.
//!
//! - [`ServiceConfig`]: builder-style runtime configuration of the service
//! - [`ConfigFile`]: user settings loaded from `~/.osmsync/config.ini`
//!
//! # Example
//!
//! ```
//! use osmsync::config::{ConfigFile, ServiceConfig};
//!
//! let file = ConfigFile::default();
//! let config: ServiceConfig = file.to_service_config();
//! assert_eq!(config.note_zoom(), 12);
//! ```

mod defaults;
mod file;
mod parser;
mod service;
mod settings;
mod writer;

pub use defaults::*;
pub use file::{config_directory, config_file_path, ensure_config_directory, ConfigFileError};
pub use service::ServiceConfig;
pub use settings::{
    ApiSettings, AuthSettings, ConfigFile, NoteSettings, TileSettings, UploadSettings,
};
