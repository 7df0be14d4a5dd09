//! Error types emitted by the vicinity CLI.
//!
//! Keep this error type reasonably small, as many CLI helpers return
//! `Result<_, CliError>` and the workspace enables `clippy::result_large_err`.

use std::sync::Arc;

use camino::Utf8PathBuf;
use thiserror::Error;
use vicinity_cache::SharedStoreError;
use vicinity_core::{BoundsError, PoiStoreError, ScoringConfigError, SqlitePoiStoreError};
use vicinity_prefetch::{ClientBuildError, PrefetchError};

/// Errors emitted by the vicinity CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        field: &'static str,
        env: &'static str,
    },
    /// An option holds a value outside its accepted set.
    #[error("invalid {field} {value:?}; expected one of {expected}")]
    InvalidChoice {
        field: &'static str,
        value: String,
        expected: &'static str,
    },
    /// A numeric option exceeds its supported maximum.
    #[error("{field} {value} exceeds the maximum of {max}")]
    OutOfRange {
        field: &'static str,
        value: u64,
        max: u64,
    },
    /// A referenced input path does not exist on disk.
    #[error("{field} path {path:?} does not exist")]
    MissingSourceFile {
        field: &'static str,
        path: Utf8PathBuf,
    },
    /// A referenced input path exists but is not a file.
    #[error("{field} path {path:?} exists but is not a file")]
    SourcePathNotFile {
        field: &'static str,
        path: Utf8PathBuf,
    },
    /// A referenced input path could not be inspected.
    #[error("failed to inspect {field} path {path:?}: {source}")]
    InspectSourcePath {
        field: &'static str,
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Reading an input file failed.
    #[error("failed to read {path:?}: {source}")]
    ReadInput {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// An input file did not contain the expected JSON.
    #[error("failed to parse JSON in {path:?}: {source}")]
    ParseInput {
        path: Utf8PathBuf,
        #[source]
        source: serde_json::Error,
    },
    /// An imported POI has coordinates outside the globe.
    #[error("POI {id} has invalid coordinates ({lat}, {lng})")]
    InvalidPoi { id: u64, lat: f64, lng: f64 },
    /// The scoring configuration file failed validation.
    #[error("scoring configuration in {path:?} is invalid: {source}")]
    InvalidScoring {
        path: Utf8PathBuf,
        #[source]
        source: ScoringConfigError,
    },
    /// The viewport edges do not form a valid rectangle.
    #[error("invalid viewport: {0}")]
    InvalidBounds(#[from] BoundsError),
    /// Creating the directory for an output file failed.
    #[error("failed to create the directory for {path:?}: {source}")]
    CreateOutputDir {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Opening or writing a POI database failed.
    #[error("POI database {path:?}: {source}")]
    PoiDatabase {
        path: Utf8PathBuf,
        #[source]
        source: SqlitePoiStoreError,
    },
    /// Snapshotting the primary POI database for the fallback failed.
    #[error("failed to snapshot POIs for the fallback source: {0}")]
    SnapshotPois(#[source] PoiStoreError),
    /// Opening the SQLite L2 cache failed.
    #[error("failed to open cache database {path:?}: {source}")]
    OpenCache {
        path: Utf8PathBuf,
        #[source]
        source: SharedStoreError,
    },
    /// The async runtime could not be started.
    #[error("failed to start the async runtime: {0}")]
    Runtime(#[source] std::io::Error),
    /// Binding the listen address failed.
    #[error("failed to listen on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    /// The HTTP server stopped with an error.
    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
    /// Constructing the HTTP tile client failed.
    #[error(transparent)]
    BuildClient(#[from] ClientBuildError),
    /// The viewport fetch failed.
    #[error(transparent)]
    Prefetch(#[from] PrefetchError),
    /// Serializing command output failed.
    #[error("failed to serialize output: {0}")]
    SerializeOutput(#[source] serde_json::Error),
    /// Writing command output failed.
    #[error("failed to write output: {0}")]
    WriteOutput(#[source] std::io::Error),
}
