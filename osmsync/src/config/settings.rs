//! Settings structs mirroring the sections of `config.ini`.

use std::time::Duration;

use super::defaults::*;
use super::service::ServiceConfig;

/// User configuration loaded from `~/.osmsync/config.ini`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    pub api: ApiSettings,
    pub tiles: TileSettings,
    pub notes: NoteSettings,
    pub upload: UploadSettings,
    pub auth: AuthSettings,
}

/// `[api]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiSettings {
    pub url_root: String,
    pub version: String,
    /// Request timeout in seconds.
    pub timeout: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            url_root: DEFAULT_URL_ROOT.to_string(),
            version: DEFAULT_API_VERSION.to_string(),
            timeout: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

/// `[tiles]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileSettings {
    pub zoom: u8,
}

impl Default for TileSettings {
    fn default() -> Self {
        Self {
            zoom: DEFAULT_TILE_ZOOM,
        }
    }
}

/// `[notes]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteSettings {
    pub zoom: u8,
    pub limit: u32,
    pub closed_days: u32,
}

impl Default for NoteSettings {
    fn default() -> Self {
        Self {
            zoom: DEFAULT_NOTE_ZOOM,
            limit: DEFAULT_NOTE_LIMIT,
            closed_days: DEFAULT_NOTE_CLOSED_DAYS,
        }
    }
}

/// `[upload]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSettings {
    pub delay_ms: u64,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            delay_ms: DEFAULT_UPLOAD_DELAY_MS,
        }
    }
}

/// `[auth]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthSettings {
    pub access_token: Option<String>,
}

impl ConfigFile {
    /// Service configuration described by this file.
    pub fn to_service_config(&self) -> ServiceConfig {
        ServiceConfig::new()
            .with_url_root(self.api.url_root.as_str())
            .with_api_version(self.api.version.as_str())
            .with_request_timeout_secs(self.api.timeout)
            .with_tile_zoom(self.tiles.zoom)
            .with_note_zoom(self.notes.zoom)
            .with_note_limit(self.notes.limit)
            .with_note_closed_days(self.notes.closed_days)
            .with_upload_delay(Duration::from_millis(self.upload.delay_ms))
    }
}
