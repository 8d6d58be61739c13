//! Renders a `ConfigFile` as the commented INI text saved to `config.ini`.

use super::settings::ConfigFile;

pub(super) fn to_config_string(config: &ConfigFile) -> String {
    let access_token = config.auth.access_token.as_deref().unwrap_or("");

    format!(
        r#"[api]
; API root (scheme and host). Use https://master.apis.dev.openstreetmap.org for testing.
url_root = {}
version = {}
; Request timeout in seconds
timeout = {}

[tiles]
; Zoom of the entity tile grid
zoom = {}

[notes]
; Zoom of the note tile grid
zoom = {}
; Maximum notes per tile
limit = {}
; Omit notes closed more than this many days ago
closed_days = {}

[upload]
; Wait after a successful upload before reporting it (milliseconds)
delay_ms = {}

[auth]
; OAuth2 access token. Leave empty to stay signed out.
access_token = {}
"#,
        config.api.url_root,
        config.api.version,
        config.api.timeout,
        config.tiles.zoom,
        config.notes.zoom,
        config.notes.limit,
        config.notes.closed_days,
        config.upload.delay_ms,
        access_token,
    )
}
