//! osmsync CLI - Command-line interface
//!
//! Thin front end over the osmsync library: fetch entities, sync tiles and
//! notes for a bounding box, look up users and query the server status.

mod commands;
mod error;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use osmsync::logging::{default_log_dir, init_logging, DEFAULT_LOG_FILE};

use commands::common::{parse_bbox, Session};
use commands::config::ConfigCommands;
use error::CliError;
use osmsync::tile::Extent;

#[derive(Parser)]
#[command(name = "osmsync")]
#[command(version = osmsync::VERSION)]
#[command(about = "Sync map data and notes with an OpenStreetMap API server", long_about = None)]
struct Cli {
    /// Config file (defaults to ~/.osmsync/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// API root overriding the configured one (e.g. https://master.apis.dev.openstreetmap.org)
    #[arg(long, global = true)]
    url: Option<String>,

    /// Directory for the log file
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load one entity (with its members for ways and relations)
    Entity {
        /// Entity id such as n123, w42 or r7
        id: String,

        /// Load this historical version instead of the current one
        #[arg(long)]
        version: Option<u64>,

        /// Print entities as JSON
        #[arg(long)]
        json: bool,
    },

    /// Sync entity tiles covering a bounding box
    Tiles {
        /// min_lon,min_lat,max_lon,max_lat
        #[arg(long, value_parser = parse_bbox, allow_hyphen_values = true)]
        bbox: Extent,

        /// Tile zoom (defaults to the configured zoom)
        #[arg(long)]
        zoom: Option<u8>,

        /// Print entities as JSON
        #[arg(long)]
        json: bool,
    },

    /// Sync notes covering a bounding box
    Notes {
        /// min_lon,min_lat,max_lon,max_lat
        #[arg(long, value_parser = parse_bbox, allow_hyphen_values = true)]
        bbox: Extent,

        /// Print notes as JSON
        #[arg(long)]
        json: bool,
    },

    /// Look up users by id, or the signed-in user with --me
    User {
        /// User ids
        ids: Vec<u64>,

        /// Show the signed-in user and their recent changesets
        #[arg(long)]
        me: bool,
    },

    /// Show the server status and imagery blacklist
    Status,

    /// Configuration file helpers
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        e.exit();
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    if let Commands::Config(command) = cli.command {
        return commands::config::run(command, cli.config.as_deref());
    }

    let log_dir = cli.log_dir.unwrap_or_else(default_log_dir);
    let _logging_guard = init_logging(&log_dir, DEFAULT_LOG_FILE).map_err(CliError::LoggingInit)?;

    let session = Session::open(cli.config.as_deref(), cli.url.as_deref())?;

    match cli.command {
        Commands::Entity { id, version, json } => {
            commands::entity::run(&session, &id, version, json).await
        }
        Commands::Tiles { bbox, zoom, json } => {
            commands::tiles::run(&session, &bbox, zoom, json).await
        }
        Commands::Notes { bbox, json } => commands::notes::run(&session, &bbox, json).await,
        Commands::User { ids, me } => commands::user::run(&session, &ids, me).await,
        Commands::Status => commands::status::run(&session).await,
        Commands::Config(_) => Ok(()),
    }
}
