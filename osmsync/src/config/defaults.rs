//! Default configuration values.

use std::time::Duration;

/// Default API root.
pub const DEFAULT_URL_ROOT: &str = "https://www.openstreetmap.org";

/// Default API version segment of request paths.
pub const DEFAULT_API_VERSION: &str = "0.6";

/// Zoom of the map entity tile grid.
pub const DEFAULT_TILE_ZOOM: u8 = 16;

/// Zoom of the note tile grid.
pub const DEFAULT_NOTE_ZOOM: u8 = 12;

/// Maximum notes per note tile request.
pub const DEFAULT_NOTE_LIMIT: u32 = 10_000;

/// Closed notes older than this many days are not returned.
pub const DEFAULT_NOTE_CLOSED_DAYS: u32 = 7;

/// Ids per batched entity or user request.
pub const DEFAULT_BATCH_SIZE: usize = 150;

/// Delay before an upload reports success (milliseconds).
pub const DEFAULT_UPLOAD_DELAY_MS: u64 = 2500;

/// Debounce window of the eager user load after note tiles (milliseconds).
pub const DEFAULT_USER_LOAD_DEBOUNCE_MS: u64 = 750;

/// Elements converted per idle slice while parsing.
pub const DEFAULT_PARSE_BATCH_SIZE: usize = 64;

/// HTTP request timeout (seconds).
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Imagery blacklist used until the server provides one.
pub const DEFAULT_IMAGERY_BLACKLIST: &str = r".*\.google(apis)?\..*/(vt|kh)[\?/].*([xyz]=.*){3}.*";

pub(crate) fn default_upload_delay() -> Duration {
    Duration::from_millis(DEFAULT_UPLOAD_DELAY_MS)
}

pub(crate) fn default_user_load_debounce() -> Duration {
    Duration::from_millis(DEFAULT_USER_LOAD_DEBOUNCE_MS)
}
