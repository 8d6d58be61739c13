//! CLI error handling with user-friendly messages.
//!
//! Every command returns a [`CliError`]; `main` prints it with any
//! applicable hints and exits non-zero.

use std::process;

use osmsync::config::ConfigFileError;
use osmsync::tile::TileError;
use osmsync::OsmError;
use thiserror::Error;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// Failed to initialize logging
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(#[source] std::io::Error),

    /// Configuration file could not be used
    #[error("Configuration error: {0}")]
    ConfigFile(#[from] ConfigFileError),

    /// Invalid argument or configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// An API call failed
    #[error("API error: {0}")]
    Api(#[from] OsmError),

    /// The requested extent could not be tiled
    #[error("Invalid extent: {0}")]
    Tile(#[from] TileError),

    /// Failed to render output
    #[error("Failed to write output: {0}")]
    Output(#[from] serde_json::Error),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::Api(OsmError::NotAuthenticated) => {
                eprintln!();
                eprintln!("This command needs a signed-in session:");
                eprintln!("  1. Create an OAuth2 access token on the website");
                eprintln!("  2. Set access_token in the [auth] section of config.ini");
            }
            CliError::Api(err) if err.is_rate_limited() => {
                eprintln!();
                eprintln!("The server is throttling requests. Wait a while or sign in.");
            }
            _ => {}
        }

        process::exit(1)
    }
}
