//! Service configuration.

use std::time::Duration;

use super::defaults::*;

/// Configuration for [`OsmService`](crate::service::OsmService).
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use osmsync::config::ServiceConfig;
///
/// let config = ServiceConfig::default();
/// assert_eq!(config.tile_zoom(), 16);
/// assert_eq!(config.batch_size(), 150);
///
/// let config = ServiceConfig::new()
///     .with_url_root("https://api06.dev.openstreetmap.org")
///     .with_upload_delay(Duration::ZERO);
/// assert_eq!(config.upload_delay(), Duration::ZERO);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    url_root: String,
    api_version: String,
    tile_zoom: u8,
    note_zoom: u8,
    note_limit: u32,
    note_closed_days: u32,
    batch_size: usize,
    upload_delay: Duration,
    user_load_debounce: Duration,
    parse_batch_size: usize,
    request_timeout_secs: u64,
}

impl ServiceConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the API root (scheme and host, no trailing slash).
    pub fn with_url_root(mut self, url_root: impl Into<String>) -> Self {
        self.url_root = url_root.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the API version path segment. Default: `0.6`.
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    /// Set the entity tile zoom. Default: 16.
    pub fn with_tile_zoom(mut self, zoom: u8) -> Self {
        self.tile_zoom = zoom;
        self
    }

    /// Set the note tile zoom. Default: 12.
    pub fn with_note_zoom(mut self, zoom: u8) -> Self {
        self.note_zoom = zoom;
        self
    }

    /// Set the per-tile note limit. Default: 10000.
    pub fn with_note_limit(mut self, limit: u32) -> Self {
        self.note_limit = limit;
        self
    }

    /// Set how many days closed notes stay visible. Default: 7.
    pub fn with_note_closed_days(mut self, days: u32) -> Self {
        self.note_closed_days = days;
        self
    }

    /// Set the number of ids per batched request. Default and maximum: 150.
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.clamp(1, DEFAULT_BATCH_SIZE);
        self
    }

    /// Set the delay between upload success and its report. Default: 2.5s.
    pub fn with_upload_delay(mut self, delay: Duration) -> Self {
        self.upload_delay = delay;
        self
    }

    /// Set the debounce of the eager note-author load. Default: 750ms.
    pub fn with_user_load_debounce(mut self, debounce: Duration) -> Self {
        self.user_load_debounce = debounce;
        self
    }

    /// Set the number of elements parsed per idle slice. Default: 64.
    pub fn with_parse_batch_size(mut self, size: usize) -> Self {
        self.parse_batch_size = size.max(1);
        self
    }

    /// Set the HTTP timeout in seconds. Default: 30.
    pub fn with_request_timeout_secs(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    pub fn url_root(&self) -> &str {
        &self.url_root
    }

    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    pub fn tile_zoom(&self) -> u8 {
        self.tile_zoom
    }

    pub fn note_zoom(&self) -> u8 {
        self.note_zoom
    }

    pub fn note_limit(&self) -> u32 {
        self.note_limit
    }

    pub fn note_closed_days(&self) -> u32 {
        self.note_closed_days
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn upload_delay(&self) -> Duration {
        self.upload_delay
    }

    pub fn user_load_debounce(&self) -> Duration {
        self.user_load_debounce
    }

    pub fn parse_batch_size(&self) -> usize {
        self.parse_batch_size
    }

    pub fn request_timeout_secs(&self) -> u64 {
        self.request_timeout_secs
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            url_root: DEFAULT_URL_ROOT.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            tile_zoom: DEFAULT_TILE_ZOOM,
            note_zoom: DEFAULT_NOTE_ZOOM,
            note_limit: DEFAULT_NOTE_LIMIT,
            note_closed_days: DEFAULT_NOTE_CLOSED_DAYS,
            batch_size: DEFAULT_BATCH_SIZE,
            upload_delay: default_upload_delay(),
            user_load_debounce: default_user_load_debounce(),
            parse_batch_size: DEFAULT_PARSE_BATCH_SIZE,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServiceConfig::default();
        assert_eq!(config.url_root(), DEFAULT_URL_ROOT);
        assert_eq!(config.api_version(), "0.6");
        assert_eq!(config.tile_zoom(), 16);
        assert_eq!(config.note_zoom(), 12);
        assert_eq!(config.note_limit(), 10_000);
        assert_eq!(config.note_closed_days(), 7);
        assert_eq!(config.upload_delay(), Duration::from_millis(2500));
        assert_eq!(config.user_load_debounce(), Duration::from_millis(750));
    }

    #[test]
    fn test_new_equals_default() {
        assert_eq!(ServiceConfig::new(), ServiceConfig::default());
    }

    #[test]
    fn test_builder_pattern() {
        let config = ServiceConfig::new()
            .with_url_root("https://example.org/")
            .with_tile_zoom(15)
            .with_batch_size(0)
            .with_parse_batch_size(8);
        assert_eq!(config.url_root(), "https://example.org");
        assert_eq!(config.tile_zoom(), 15);
        assert_eq!(config.batch_size(), 1);
        assert_eq!(config.parse_batch_size(), 8);
    }

    #[test]
    fn test_batch_size_is_capped() {
        let config = ServiceConfig::new().with_batch_size(500);
        assert_eq!(config.batch_size(), DEFAULT_BATCH_SIZE);
    }
}
