//! Configuration file handling for ~/.osmsync/config.ini.
//!
//! Settings structs live in [`super::settings`] and parsing in
//! [`super::parser`].

use std::path::{Path, PathBuf};

use ini::Ini;
use thiserror::Error;

use super::settings::ConfigFile;

/// Errors from locating, reading or validating `config.ini`.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// The file exists but could not be read or is not valid INI
    #[error("Cannot read config.ini: {0}")]
    ReadError(#[from] ini::Error),

    /// A key holds a value the service cannot use
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    /// `config.ini` could not be written
    #[error("Cannot write config.ini: {0}")]
    WriteError(String),

    /// `~/.osmsync` could not be created
    #[error("Cannot create config directory: {0}")]
    DirectoryError(std::io::Error),
}

impl ConfigFile {
    /// Loads `~/.osmsync/config.ini`, or defaults when it is absent.
    pub fn load() -> Result<Self, ConfigFileError> {
        Self::load_from(&config_file_path())
    }

    /// Loads the INI file at `path`. A missing file yields defaults; any
    /// section or key left out keeps its default.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path)?;
        super::parser::parse_ini(&ini)
    }

    /// Writes the settings to `path` as commented INI, creating the parent
    /// directory if needed.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigFileError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigFileError::DirectoryError)?;
        }
        let content = super::writer::to_config_string(self);
        std::fs::write(path, content).map_err(|e| ConfigFileError::WriteError(e.to_string()))
    }
}

/// `~/.osmsync`, or `./.osmsync` when no home directory is known.
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".osmsync")
}

/// `config.ini` inside [`config_directory`].
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}

/// Create the config directory if needed and return it.
pub fn ensure_config_directory() -> Result<PathBuf, ConfigFileError> {
    let dir = config_directory();
    std::fs::create_dir_all(&dir).map_err(ConfigFileError::DirectoryError)?;
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::defaults::*;

    #[test]
    fn test_default_config() {
        let config = ConfigFile::default();
        assert_eq!(config.api.url_root, DEFAULT_URL_ROOT);
        assert_eq!(config.api.timeout, DEFAULT_REQUEST_TIMEOUT_SECS);
        assert_eq!(config.tiles.zoom, DEFAULT_TILE_ZOOM);
        assert_eq!(config.notes.limit, DEFAULT_NOTE_LIMIT);
        assert!(config.auth.access_token.is_none());
    }

    #[test]
    fn test_load_nonexistent_returns_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.ini");
        assert_eq!(ConfigFile::load_from(&missing).unwrap(), ConfigFile::default());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.ini");
        std::fs::write(&path, "[tiles]\nzoom = 14\n[upload]\ndelay_ms = 0\n").unwrap();

        let config = ConfigFile::load_from(&path).unwrap();
        assert_eq!(config.tiles.zoom, 14);

        let service = config.to_service_config();
        assert_eq!(service.tile_zoom(), 14);
        assert_eq!(service.upload_delay(), std::time::Duration::ZERO);
        assert_eq!(service.url_root(), DEFAULT_URL_ROOT);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.ini");

        let mut config = ConfigFile::default();
        config.api.url_root = "https://api06.dev.openstreetmap.org".to_string();
        config.notes.closed_days = 30;
        config.auth.access_token = Some("secret".to_string());
        config.save_to(&path).unwrap();

        assert_eq!(ConfigFile::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_saved_defaults_reload_as_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.ini");
        ConfigFile::default().save_to(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("access_token = \n"));
        assert_eq!(ConfigFile::load_from(&path).unwrap(), ConfigFile::default());
    }

    #[test]
    fn test_config_paths() {
        let path = config_file_path();
        assert!(path.ends_with(".osmsync/config.ini"));
    }
}
