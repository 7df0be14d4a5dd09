//! Command-line interface for running and exercising the vicinity score
//! service.
//!
//! Three subcommands are available:
//!
//! - `serve` exposes the batch endpoint over HTTP, backed by a SQLite POI
//!   database and an optional SQLite L2 cache;
//! - `import` loads POIs from a JSON file into a SQLite POI database;
//! - `prefetch` runs one progressive viewport fetch against a server and
//!   prints a JSON summary.
//!
//! Every option can also come from a configuration file or a `VICINITY_*`
//! environment variable.
#![forbid(unsafe_code)]

use clap::{Parser, Subcommand};

mod error;
mod import;
mod prefetch;
mod serve;

pub use error::CliError;

use import::ImportArgs;
use prefetch::PrefetchArgs;
use serve::ServeArgs;

const ARG_LISTEN: &str = "listen";
const ARG_POIS_DB: &str = "pois-db";
const ARG_FALLBACK_DB: &str = "fallback-db";
const ARG_CACHE_DB: &str = "cache-db";
const ARG_CACHE_TTL: &str = "cache-ttl-secs";
const ARG_MAX_REQUEST_TILES: &str = "max-request-tiles";
const ARG_IMPORT_INPUT: &str = "input";
const ARG_SERVER: &str = "server";
const ARG_SCORING: &str = "scoring";
const ARG_NORTH: &str = "north";
const ARG_SOUTH: &str = "south";
const ARG_EAST: &str = "east";
const ARG_WEST: &str = "west";
const ARG_RADIUS: &str = "radius";
const ARG_DATA_SOURCE: &str = "data-source";
const ARG_MODE: &str = "mode";
const ARG_TIMEOUT: &str = "timeout-secs";

const ENV_SERVE_POIS_DB: &str = "VICINITY_CMDS_SERVE_POIS_DB";
const ENV_IMPORT_INPUT: &str = "VICINITY_CMDS_IMPORT_INPUT";
const ENV_PREFETCH_SCORING: &str = "VICINITY_CMDS_PREFETCH_SCORING";
const ENV_PREFETCH_NORTH: &str = "VICINITY_CMDS_PREFETCH_NORTH";
const ENV_PREFETCH_SOUTH: &str = "VICINITY_CMDS_PREFETCH_SOUTH";
const ENV_PREFETCH_EAST: &str = "VICINITY_CMDS_PREFETCH_EAST";
const ENV_PREFETCH_WEST: &str = "VICINITY_CMDS_PREFETCH_WEST";

/// Run the CLI with the current process arguments and environment.
///
/// # Errors
/// Returns [`CliError`] when arguments or configuration are invalid or the
/// selected command fails.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    let mut stdout = std::io::stdout().lock();
    match cli.command {
        Command::Serve(args) => serve::run_serve(args),
        Command::Import(args) => import::run_import(args, &mut stdout),
        Command::Prefetch(args) => prefetch::run_prefetch(args, &mut stdout),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "vicinity",
    about = "Serve, import and prefetch tiled proximity scores",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the batch tile endpoint over HTTP.
    Serve(ServeArgs),
    /// Load POIs from JSON into a SQLite database.
    Import(ImportArgs),
    /// Fetch the scores around a viewport from a running server.
    Prefetch(PrefetchArgs),
}

/// Map a file probe onto the CLI's missing-input errors.
fn require_existing(path: &camino::Utf8Path, field: &'static str) -> Result<(), CliError> {
    match vicinity_fs::file_is_file(path) {
        Ok(true) => Ok(()),
        Ok(false) => Err(CliError::SourcePathNotFile {
            field,
            path: path.to_path_buf(),
        }),
        Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
            Err(CliError::MissingSourceFile {
                field,
                path: path.to_path_buf(),
            })
        }
        Err(source) => Err(CliError::InspectSourcePath {
            field,
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests;
