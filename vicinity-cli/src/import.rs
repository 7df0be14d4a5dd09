//! Import command: JSON POIs into a SQLite POI database.

use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use log::info;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};
use vicinity_core::{PointOfInterest, write_poi_database};

use crate::{ARG_IMPORT_INPUT, ARG_POIS_DB, CliError, ENV_IMPORT_INPUT, require_existing};

/// Database written when `--pois-db` is not given.
pub(crate) const DEFAULT_POIS_DB: &str = "pois.db";

/// CLI arguments for the `import` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Read a JSON array of POIs ({id, lat, lng, category}) and \
                 write them into a SQLite POI database, replacing rows that \
                 share an id.",
    about = "Import POIs from JSON"
)]
#[ortho_config(prefix = "VICINITY")]
pub(crate) struct ImportArgs {
    /// Path to the JSON file holding the POIs.
    #[arg(value_name = "path")]
    #[serde(default)]
    pub(crate) input: Option<Utf8PathBuf>,
    /// SQLite database to create or extend.
    #[arg(long = ARG_POIS_DB, value_name = "path")]
    #[serde(default)]
    pub(crate) pois_db: Option<Utf8PathBuf>,
}

impl ImportArgs {
    pub(crate) fn into_config(self) -> Result<ImportConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        ImportConfig::try_from(merged)
    }
}

/// Resolved `import` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ImportConfig {
    pub(crate) input: Utf8PathBuf,
    pub(crate) pois_db: Utf8PathBuf,
}

impl TryFrom<ImportArgs> for ImportConfig {
    type Error = CliError;

    fn try_from(args: ImportArgs) -> Result<Self, Self::Error> {
        let input = args.input.ok_or(CliError::MissingArgument {
            field: ARG_IMPORT_INPUT,
            env: ENV_IMPORT_INPUT,
        })?;
        let pois_db = args
            .pois_db
            .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_POIS_DB));
        Ok(Self { input, pois_db })
    }
}

pub(crate) fn run_import(args: ImportArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let config = args.into_config()?;
    import_with(&config, writer)
}

/// Import using an already resolved configuration.
pub(crate) fn import_with(config: &ImportConfig, writer: &mut dyn Write) -> Result<(), CliError> {
    require_existing(&config.input, ARG_IMPORT_INPUT)?;
    let pois = load_pois(&config.input)?;
    vicinity_fs::ensure_parent_dir(&config.pois_db).map_err(|source| {
        CliError::CreateOutputDir {
            path: config.pois_db.clone(),
            source,
        }
    })?;
    let written = write_poi_database(config.pois_db.as_std_path(), &pois).map_err(|source| {
        CliError::PoiDatabase {
            path: config.pois_db.clone(),
            source,
        }
    })?;
    info!("imported {written} POIs into {}", config.pois_db);
    writeln!(writer, "imported {written} POIs into {}", config.pois_db)
        .map_err(CliError::WriteOutput)
}

/// Parse and check a JSON array of POIs.
pub(crate) fn load_pois(path: &Utf8Path) -> Result<Vec<PointOfInterest>, CliError> {
    let text = vicinity_fs::read_to_string(path).map_err(|source| CliError::ReadInput {
        path: path.to_path_buf(),
        source,
    })?;
    let pois: Vec<PointOfInterest> =
        serde_json::from_str(&text).map_err(|source| CliError::ParseInput {
            path: path.to_path_buf(),
            source,
        })?;
    if let Some(bad) = pois.iter().find(|poi| !on_globe(poi)) {
        return Err(CliError::InvalidPoi {
            id: bad.id,
            lat: bad.lat,
            lng: bad.lng,
        });
    }
    Ok(pois)
}

fn on_globe(poi: &PointOfInterest) -> bool {
    (-90.0..=90.0).contains(&poi.lat) && (-180.0..=180.0).contains(&poi.lng)
}
