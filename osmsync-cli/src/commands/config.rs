//! Configuration file CLI commands.

use std::path::Path;

use clap::Subcommand;
use osmsync::config::{config_file_path, ensure_config_directory, ConfigFile};

use super::common::load_config;
use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Show the configuration file path
    Path,

    /// Show the effective settings
    Show,

    /// Write a config file with default settings
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands, config_path: Option<&Path>) -> Result<(), CliError> {
    match command {
        ConfigCommands::Path => {
            let path = config_path
                .map(Path::to_path_buf)
                .unwrap_or_else(config_file_path);
            println!("{}", path.display());
            Ok(())
        }
        ConfigCommands::Show => {
            let file = load_config(config_path)?;
            println!("[api]");
            println!("url_root = {}", file.api.url_root);
            println!("version = {}", file.api.version);
            println!("timeout = {}", file.api.timeout);
            println!();
            println!("[tiles]");
            println!("zoom = {}", file.tiles.zoom);
            println!();
            println!("[notes]");
            println!("zoom = {}", file.notes.zoom);
            println!("limit = {}", file.notes.limit);
            println!("closed_days = {}", file.notes.closed_days);
            println!();
            println!("[upload]");
            println!("delay_ms = {}", file.upload.delay_ms);
            println!();
            println!("[auth]");
            let token = if file.auth.access_token.is_some() {
                "(set)"
            } else {
                "(not set)"
            };
            println!("access_token = {}", token);
            Ok(())
        }
        ConfigCommands::Init { force } => run_init(config_path, force),
    }
}

fn run_init(config_path: Option<&Path>, force: bool) -> Result<(), CliError> {
    let path = match config_path {
        Some(path) => path.to_path_buf(),
        None => ensure_config_directory()?.join("config.ini"),
    };

    if path.exists() && !force {
        return Err(CliError::Config(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }

    ConfigFile::default().save_to(&path)?;
    println!("Wrote {}", path.display());
    Ok(())
}
