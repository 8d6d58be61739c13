//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! This is the single place where INI key names are mapped to struct fields.

use std::str::FromStr;

use ini::{Ini, Properties};

use super::file::ConfigFileError;
use super::settings::ConfigFile;
use crate::tile::MAX_ZOOM;

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [api] section
    if let Some(section) = ini.section(Some("api")) {
        if let Some(v) = section.get("url_root") {
            let v = v.trim();
            if !v.starts_with("http://") && !v.starts_with("https://") {
                return Err(invalid("api", "url_root", v, "must start with http:// or https://"));
            }
            config.api.url_root = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = section.get("version") {
            let v = v.trim();
            if v.is_empty() {
                return Err(invalid("api", "version", v, "must not be empty"));
            }
            config.api.version = v.to_string();
        }
        if let Some(timeout) =
            parse_number::<u64>(section, "api", "timeout", "must be a positive integer (seconds)")?
        {
            if timeout == 0 {
                return Err(invalid("api", "timeout", "0", "must be a positive integer (seconds)"));
            }
            config.api.timeout = timeout;
        }
    }

    // [tiles] section
    if let Some(section) = ini.section(Some("tiles")) {
        if let Some(zoom) = parse_zoom(section, "tiles")? {
            config.tiles.zoom = zoom;
        }
    }

    // [notes] section
    if let Some(section) = ini.section(Some("notes")) {
        if let Some(zoom) = parse_zoom(section, "notes")? {
            config.notes.zoom = zoom;
        }
        if let Some(limit) =
            parse_number(section, "notes", "limit", "must be a non-negative integer")?
        {
            config.notes.limit = limit;
        }
        if let Some(days) =
            parse_number(section, "notes", "closed_days", "must be a non-negative integer")?
        {
            config.notes.closed_days = days;
        }
    }

    // [upload] section
    if let Some(section) = ini.section(Some("upload")) {
        if let Some(delay) = parse_number(
            section,
            "upload",
            "delay_ms",
            "must be a non-negative integer (milliseconds)",
        )? {
            config.upload.delay_ms = delay;
        }
    }

    // [auth] section
    if let Some(section) = ini.section(Some("auth")) {
        if let Some(v) = section.get("access_token") {
            let v = v.trim();
            if !v.is_empty() {
                config.auth.access_token = Some(v.to_string());
            }
        }
    }

    Ok(config)
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_number<T: FromStr>(
    section: &Properties,
    section_name: &str,
    key: &str,
    reason: &str,
) -> Result<Option<T>, ConfigFileError> {
    match section.get(key) {
        Some(v) => v
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| invalid(section_name, key, v, reason)),
        None => Ok(None),
    }
}

fn parse_zoom(section: &Properties, section_name: &str) -> Result<Option<u8>, ConfigFileError> {
    let reason = format!("must be an integer between 0 and {}", MAX_ZOOM);
    match parse_number::<u8>(section, section_name, "zoom", &reason)? {
        Some(zoom) if zoom > MAX_ZOOM => {
            Err(invalid(section_name, "zoom", &zoom.to_string(), &reason))
        }
        other => Ok(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> Result<ConfigFile, ConfigFileError> {
        let ini = Ini::load_from_str(content).unwrap();
        parse_ini(&ini)
    }

    #[test]
    fn test_empty_ini_gives_defaults() {
        assert_eq!(parse("").unwrap(), ConfigFile::default());
    }

    #[test]
    fn test_overlay_values() {
        let config = parse(
            r#"
[api]
url_root = https://api06.dev.openstreetmap.org/
version = 0.6
timeout = 10

[tiles]
zoom = 15

[notes]
zoom = 11
limit = 500
closed_days = 0

[upload]
delay_ms = 100

[auth]
access_token = abc123
"#,
        )
        .unwrap();

        assert_eq!(config.api.url_root, "https://api06.dev.openstreetmap.org");
        assert_eq!(config.api.timeout, 10);
        assert_eq!(config.tiles.zoom, 15);
        assert_eq!(config.notes.zoom, 11);
        assert_eq!(config.notes.limit, 500);
        assert_eq!(config.notes.closed_days, 0);
        assert_eq!(config.upload.delay_ms, 100);
        assert_eq!(config.auth.access_token.as_deref(), Some("abc123"));
    }

    #[test]
    fn test_blank_token_is_none() {
        let config = parse("[auth]\naccess_token =   \n").unwrap();
        assert!(config.auth.access_token.is_none());
    }

    #[test]
    fn test_invalid_zoom() {
        let err = parse("[tiles]\nzoom = 40\n").unwrap_err();
        match err {
            ConfigFileError::InvalidValue { section, key, .. } => {
                assert_eq!(section, "tiles");
                assert_eq!(key, "zoom");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_invalid_number() {
        assert!(matches!(
            parse("[upload]\ndelay_ms = soon\n"),
            Err(ConfigFileError::InvalidValue { .. })
        ));
        assert!(matches!(
            parse("[api]\ntimeout = 0\n"),
            Err(ConfigFileError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_invalid_url_root() {
        assert!(matches!(
            parse("[api]\nurl_root = ftp://example.org\n"),
            Err(ConfigFileError::InvalidValue { .. })
        ));
    }
}
