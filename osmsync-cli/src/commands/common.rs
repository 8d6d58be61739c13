//! Common types and utilities shared across CLI commands.

use std::path::Path;

use osmsync::config::ConfigFile;
use osmsync::tile::Extent;
use osmsync::transport::{ReqwestTransport, TokenSession};
use osmsync::OsmService;
use tracing::debug;

use crate::error::CliError;

/// Service type the CLI runs against.
pub type Service = OsmService<ReqwestTransport, TokenSession>;

/// A configured service plus whether credentials are available.
pub struct Session {
    pub service: Service,
    has_token: bool,
}

impl Session {
    /// Builds the service from the config file and CLI overrides.
    pub fn open(config_path: Option<&Path>, url: Option<&str>) -> Result<Self, CliError> {
        let file = load_config(config_path)?;

        let mut config = file.to_service_config();
        if let Some(url) = url {
            config = config.with_url_root(url);
        }

        let transport = ReqwestTransport::with_timeout(config.request_timeout_secs())?;
        let mut auth = TokenSession::new(config.url_root(), config.request_timeout_secs())?;
        let has_token = file.auth.access_token.is_some();
        if let Some(token) = file.auth.access_token {
            auth = auth.with_token(token);
        }

        debug!(url_root = config.url_root(), has_token, "Session configured");
        Ok(Self {
            service: OsmService::new(transport, auth, config),
            has_token,
        })
    }

    /// Signs in when a token is configured. Returns whether the session is
    /// now authenticated.
    pub async fn sign_in(&self) -> Result<bool, CliError> {
        if !self.has_token {
            return Ok(false);
        }
        self.service.authenticate().await?;
        Ok(true)
    }

    /// Signs in or fails with [`osmsync::OsmError::NotAuthenticated`].
    pub async fn require_sign_in(&self) -> Result<(), CliError> {
        if self.sign_in().await? {
            Ok(())
        } else {
            Err(osmsync::OsmError::NotAuthenticated.into())
        }
    }
}

/// Loads the config file at `path`, or the default one.
pub fn load_config(path: Option<&Path>) -> Result<ConfigFile, CliError> {
    let file = match path {
        Some(path) => ConfigFile::load_from(path)?,
        None => ConfigFile::load()?,
    };
    Ok(file)
}

/// Parses `min_lon,min_lat,max_lon,max_lat`.
pub fn parse_bbox(s: &str) -> Result<Extent, String> {
    let values: Vec<f64> = s
        .split(',')
        .map(|v| v.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|e| format!("invalid coordinate: {}", e))?;

    match values.as_slice() {
        [min_lon, min_lat, max_lon, max_lat] => {
            Ok(Extent::new([*min_lon, *min_lat], [*max_lon, *max_lat]))
        }
        _ => Err(format!(
            "expected 4 comma-separated values, got {}",
            values.len()
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bbox() {
        let extent = parse_bbox("-0.13,51.50,-0.12,51.51").unwrap();
        assert_eq!(extent.min, [-0.13, 51.50]);
        assert_eq!(extent.max, [-0.12, 51.51]);
    }

    #[test]
    fn test_parse_bbox_rejects_bad_input() {
        assert!(parse_bbox("1,2,3").is_err());
        assert!(parse_bbox("1,2,3,x").is_err());
    }
}
