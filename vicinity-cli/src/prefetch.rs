//! Prefetch command: one orchestrated viewport fetch against a server.

use std::{io::Write, sync::Arc, time::Duration};

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};
use vicinity_core::{BatchMetadata, Bounds, DataSource, ScoringConfig};
use vicinity_prefetch::{
    DEFAULT_RADIUS, DEFAULT_REQUEST_TIMEOUT, FetchOutcome, HttpTileClient, HttpTileClientConfig,
    PrefetchConfig, PrefetchMode, PrefetchOrchestrator, TileClient, ViewportQuery,
};

use crate::{
    ARG_DATA_SOURCE, ARG_EAST, ARG_MODE, ARG_NORTH, ARG_RADIUS, ARG_SCORING, ARG_SERVER,
    ARG_SOUTH, ARG_TIMEOUT, ARG_WEST, CliError, ENV_PREFETCH_EAST, ENV_PREFETCH_NORTH,
    ENV_PREFETCH_SCORING, ENV_PREFETCH_SOUTH, ENV_PREFETCH_WEST, require_existing,
};

/// Server contacted when `--server` is not given.
pub(crate) const DEFAULT_SERVER: &str = "http://localhost:8080";

/// CLI arguments for the `prefetch` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Fetch the scores for a viewport and the rings around it \
                 from a running server, then print a JSON summary. The \
                 scoring configuration is read from a JSON file holding \
                 factors, distanceCurve, sensitivity and aggregationLambda.",
    about = "Prefetch scores around a viewport"
)]
#[ortho_config(prefix = "VICINITY")]
pub(crate) struct PrefetchArgs {
    /// Base URL of the server.
    #[arg(long = ARG_SERVER, value_name = "url")]
    #[serde(default)]
    pub(crate) server: Option<String>,
    /// JSON file holding the scoring configuration.
    #[arg(long = ARG_SCORING, value_name = "path")]
    #[serde(default)]
    pub(crate) scoring: Option<Utf8PathBuf>,
    /// Northern edge of the viewport in degrees.
    #[arg(long = ARG_NORTH, value_name = "deg", allow_negative_numbers = true)]
    #[serde(default)]
    pub(crate) north: Option<f64>,
    /// Southern edge of the viewport in degrees.
    #[arg(long = ARG_SOUTH, value_name = "deg", allow_negative_numbers = true)]
    #[serde(default)]
    pub(crate) south: Option<f64>,
    /// Eastern edge of the viewport in degrees.
    #[arg(long = ARG_EAST, value_name = "deg", allow_negative_numbers = true)]
    #[serde(default)]
    pub(crate) east: Option<f64>,
    /// Western edge of the viewport in degrees.
    #[arg(long = ARG_WEST, value_name = "deg", allow_negative_numbers = true)]
    #[serde(default)]
    pub(crate) west: Option<f64>,
    /// Rings fetched beyond the viewport.
    #[arg(long = ARG_RADIUS, value_name = "rings")]
    #[serde(default)]
    pub(crate) radius: Option<u32>,
    /// Preferred POI source: `primary` or `fallback`.
    #[arg(long = ARG_DATA_SOURCE, value_name = "source")]
    #[serde(default)]
    pub(crate) data_source: Option<String>,
    /// Phase plan: `progressive` or `batch`.
    #[arg(long = ARG_MODE, value_name = "mode")]
    #[serde(default)]
    pub(crate) mode: Option<String>,
    /// Deadline of each batch call in seconds.
    #[arg(long = ARG_TIMEOUT, value_name = "seconds")]
    #[serde(default)]
    pub(crate) timeout_secs: Option<u64>,
    /// Ask the server to rescale each batch to `[0, 1]`.
    #[arg(long)]
    #[serde(default)]
    pub(crate) normalize: bool,
    /// Request JSON responses instead of the compact binary encoding.
    #[arg(long)]
    #[serde(default)]
    pub(crate) json_wire: bool,
}

impl PrefetchArgs {
    pub(crate) fn into_config(self) -> Result<PrefetchCommandConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        PrefetchCommandConfig::try_from(merged)
    }
}

/// Resolved `prefetch` command configuration.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PrefetchCommandConfig {
    pub(crate) server: String,
    pub(crate) scoring_path: Utf8PathBuf,
    pub(crate) bounds: Bounds,
    pub(crate) radius: u32,
    pub(crate) data_source: DataSource,
    pub(crate) mode: PrefetchMode,
    pub(crate) timeout: Duration,
    pub(crate) normalize: bool,
    pub(crate) binary: bool,
}

impl TryFrom<PrefetchArgs> for PrefetchCommandConfig {
    type Error = CliError;

    fn try_from(args: PrefetchArgs) -> Result<Self, Self::Error> {
        let scoring_path = args.scoring.ok_or(CliError::MissingArgument {
            field: ARG_SCORING,
            env: ENV_PREFETCH_SCORING,
        })?;
        let north = args.north.ok_or(CliError::MissingArgument {
            field: ARG_NORTH,
            env: ENV_PREFETCH_NORTH,
        })?;
        let south = args.south.ok_or(CliError::MissingArgument {
            field: ARG_SOUTH,
            env: ENV_PREFETCH_SOUTH,
        })?;
        let east = args.east.ok_or(CliError::MissingArgument {
            field: ARG_EAST,
            env: ENV_PREFETCH_EAST,
        })?;
        let west = args.west.ok_or(CliError::MissingArgument {
            field: ARG_WEST,
            env: ENV_PREFETCH_WEST,
        })?;
        let bounds = Bounds::new(north, south, east, west)?;
        let data_source = parse_data_source(args.data_source.as_deref())?;
        let mode = parse_mode(args.mode.as_deref())?;
        Ok(Self {
            server: args.server.unwrap_or_else(|| DEFAULT_SERVER.to_owned()),
            scoring_path,
            bounds,
            radius: args.radius.unwrap_or(DEFAULT_RADIUS),
            data_source,
            mode,
            timeout: args
                .timeout_secs
                .map_or(DEFAULT_REQUEST_TIMEOUT, Duration::from_secs),
            normalize: args.normalize,
            binary: !args.json_wire,
        })
    }
}

fn parse_data_source(value: Option<&str>) -> Result<DataSource, CliError> {
    match value {
        None | Some("primary") => Ok(DataSource::Primary),
        Some("fallback") => Ok(DataSource::Fallback),
        Some(other) => Err(CliError::InvalidChoice {
            field: ARG_DATA_SOURCE,
            value: other.to_owned(),
            expected: "primary, fallback",
        }),
    }
}

fn parse_mode(value: Option<&str>) -> Result<PrefetchMode, CliError> {
    match value {
        None | Some("progressive") => Ok(PrefetchMode::Progressive),
        Some("batch") => Ok(PrefetchMode::Batch),
        Some(other) => Err(CliError::InvalidChoice {
            field: ARG_MODE,
            value: other.to_owned(),
            expected: "progressive, batch",
        }),
    }
}

/// Builds the batch client for the current prefetch invocation.
pub(crate) trait TileClientBuilder {
    fn build(&self, config: &PrefetchCommandConfig) -> Result<Arc<dyn TileClient>, CliError>;
}

pub(crate) struct HttpTileClientBuilder;

impl TileClientBuilder for HttpTileClientBuilder {
    fn build(&self, config: &PrefetchCommandConfig) -> Result<Arc<dyn TileClient>, CliError> {
        let client_config =
            HttpTileClientConfig::new(config.server.clone()).with_binary(config.binary);
        Ok(Arc::new(HttpTileClient::with_config(&client_config)?))
    }
}

/// What `prefetch` prints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PrefetchSummary {
    pub(crate) superseded: bool,
    pub(crate) radius: u32,
    pub(crate) requested_tiles: usize,
    pub(crate) covered_tiles: usize,
    pub(crate) points: usize,
    pub(crate) pois: usize,
    pub(crate) fallback_notice: bool,
    pub(crate) last_batch: Option<BatchMetadata>,
}

pub(crate) fn run_prefetch(args: PrefetchArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    run_prefetch_with(args, &HttpTileClientBuilder, writer)
}

pub(crate) fn run_prefetch_with(
    args: PrefetchArgs,
    builder: &dyn TileClientBuilder,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let config = args.into_config()?;
    let summary = execute_prefetch(&config, builder)?;
    write_summary(writer, &summary)
}

pub(crate) fn execute_prefetch(
    config: &PrefetchCommandConfig,
    builder: &dyn TileClientBuilder,
) -> Result<PrefetchSummary, CliError> {
    require_existing(&config.scoring_path, ARG_SCORING)?;
    let scoring = load_scoring(&config.scoring_path)?;
    let client = builder.build(config)?;
    let orchestrator = PrefetchOrchestrator::new(
        client,
        PrefetchConfig::default()
            .with_mode(config.mode)
            .with_request_timeout(config.timeout),
    );
    let query = ViewportQuery::new(config.bounds, scoring)
        .with_radius(config.radius)
        .with_data_source(config.data_source)
        .with_normalize(config.normalize);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;
    let outcome = runtime.block_on(orchestrator.fetch(&query))?;
    let (superseded, radius, requested_tiles) = match outcome {
        FetchOutcome::Completed {
            radius,
            requested_tiles,
            ..
        } => (false, radius, requested_tiles),
        FetchOutcome::Superseded { .. } => (true, 0, 0),
    };
    Ok(PrefetchSummary {
        superseded,
        radius,
        requested_tiles,
        covered_tiles: orchestrator.covered_tiles().len(),
        points: orchestrator.point_count(),
        pois: orchestrator.pois().values().map(Vec::len).sum(),
        fallback_notice: orchestrator.fallback_notice(),
        last_batch: orchestrator.last_metadata(),
    })
}

/// Read and validate a JSON scoring configuration.
pub(crate) fn load_scoring(path: &Utf8Path) -> Result<ScoringConfig, CliError> {
    let text = vicinity_fs::read_to_string(path).map_err(|source| CliError::ReadInput {
        path: path.to_path_buf(),
        source,
    })?;
    let scoring: ScoringConfig =
        serde_json::from_str(&text).map_err(|source| CliError::ParseInput {
            path: path.to_path_buf(),
            source,
        })?;
    scoring
        .validate()
        .map_err(|source| CliError::InvalidScoring {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(scoring)
}

fn write_summary(writer: &mut dyn Write, summary: &PrefetchSummary) -> Result<(), CliError> {
    let payload = serde_json::to_string_pretty(summary).map_err(CliError::SerializeOutput)?;
    writer
        .write_all(payload.as_bytes())
        .map_err(CliError::WriteOutput)?;
    writer.write_all(b"\n").map_err(CliError::WriteOutput)?;
    Ok(())
}
