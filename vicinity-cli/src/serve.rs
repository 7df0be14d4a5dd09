//! Serve command: the batch endpoint over HTTP.

use std::{sync::Arc, time::Duration};

use camino::Utf8PathBuf;
use clap::Parser;
use log::info;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use vicinity_cache::{CacheConfig, MAX_TTL, SqliteSharedStore, TileCache};
use vicinity_core::{Bounds, MemoryPoiStore, PoiStore, SqlitePoiStore};
use vicinity_service::{BatchTileService, PoiSources, ServiceConfig, http};

use crate::{
    ARG_CACHE_DB, ARG_CACHE_TTL, ARG_FALLBACK_DB, ARG_LISTEN, ARG_MAX_REQUEST_TILES, ARG_POIS_DB,
    CliError, ENV_SERVE_POIS_DB, require_existing,
};

/// Address bound when `--listen` is not given.
pub(crate) const DEFAULT_LISTEN: &str = "127.0.0.1:8080";

/// CLI arguments for the `serve` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Serve POST /api/tiles/batch and GET /api/cache/status. POIs \
                 are read from a SQLite database; without --fallback-db the \
                 fallback source is an in-memory snapshot of that database \
                 taken at start-up. Without --cache-db the L2 cache lives in \
                 process memory.",
    about = "Serve the batch tile endpoint"
)]
#[ortho_config(prefix = "VICINITY")]
pub(crate) struct ServeArgs {
    /// Socket address to listen on.
    #[arg(long = ARG_LISTEN, value_name = "addr")]
    #[serde(default)]
    pub(crate) listen: Option<String>,
    /// SQLite POI database used as the primary source.
    #[arg(long = ARG_POIS_DB, value_name = "path")]
    #[serde(default)]
    pub(crate) pois_db: Option<Utf8PathBuf>,
    /// SQLite POI database used as the fallback source.
    #[arg(long = ARG_FALLBACK_DB, value_name = "path")]
    #[serde(default)]
    pub(crate) fallback_db: Option<Utf8PathBuf>,
    /// SQLite database backing the shared L2 cache.
    #[arg(long = ARG_CACHE_DB, value_name = "path")]
    #[serde(default)]
    pub(crate) cache_db: Option<Utf8PathBuf>,
    /// Lifetime of cache entries in seconds.
    #[arg(long = ARG_CACHE_TTL, value_name = "seconds")]
    #[serde(default)]
    pub(crate) cache_ttl_secs: Option<u64>,
    /// Largest number of distinct tiles accepted per request.
    #[arg(long = ARG_MAX_REQUEST_TILES, value_name = "count")]
    #[serde(default)]
    pub(crate) max_request_tiles: Option<usize>,
}

impl ServeArgs {
    pub(crate) fn into_config(self) -> Result<ServeConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        ServeConfig::try_from(merged)
    }
}

/// Resolved `serve` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ServeConfig {
    pub(crate) listen: String,
    pub(crate) pois_db: Utf8PathBuf,
    pub(crate) fallback_db: Option<Utf8PathBuf>,
    pub(crate) cache_db: Option<Utf8PathBuf>,
    pub(crate) cache: CacheConfig,
    pub(crate) service: ServiceConfig,
}

impl ServeConfig {
    pub(crate) fn validate_sources(&self) -> Result<(), CliError> {
        require_existing(&self.pois_db, ARG_POIS_DB)?;
        if let Some(fallback) = &self.fallback_db {
            require_existing(fallback, ARG_FALLBACK_DB)?;
        }
        Ok(())
    }

    /// Open the POI sources and cache and assemble the service.
    pub(crate) fn build_service(&self) -> Result<BatchTileService, CliError> {
        let primary = open_pois(&self.pois_db)?;
        let fallback: Arc<dyn PoiStore> = match &self.fallback_db {
            Some(path) => Arc::new(open_pois(path)?),
            None => Arc::new(snapshot(&primary)?),
        };
        let cache = match &self.cache_db {
            Some(path) => {
                vicinity_fs::ensure_parent_dir(path).map_err(|source| {
                    CliError::CreateOutputDir {
                        path: path.clone(),
                        source,
                    }
                })?;
                let store = SqliteSharedStore::open(path.as_std_path()).map_err(|source| {
                    CliError::OpenCache {
                        path: path.clone(),
                        source,
                    }
                })?;
                TileCache::new(Arc::new(store), self.cache)
            }
            None => TileCache::in_memory(self.cache),
        };
        Ok(BatchTileService::new(
            Arc::new(cache),
            PoiSources::new(Arc::new(primary), fallback),
            self.service,
        ))
    }
}

impl TryFrom<ServeArgs> for ServeConfig {
    type Error = CliError;

    fn try_from(args: ServeArgs) -> Result<Self, Self::Error> {
        let pois_db = args.pois_db.ok_or(CliError::MissingArgument {
            field: ARG_POIS_DB,
            env: ENV_SERVE_POIS_DB,
        })?;
        let mut cache = CacheConfig::default();
        if let Some(secs) = args.cache_ttl_secs {
            if secs > MAX_TTL.as_secs() {
                return Err(CliError::OutOfRange {
                    field: ARG_CACHE_TTL,
                    value: secs,
                    max: MAX_TTL.as_secs(),
                });
            }
            cache = cache.with_ttl(Duration::from_secs(secs));
        }
        let mut service = ServiceConfig::default();
        if let Some(max) = args.max_request_tiles {
            service = service.with_max_request_tiles(max);
        }
        Ok(Self {
            listen: args.listen.unwrap_or_else(|| DEFAULT_LISTEN.to_owned()),
            pois_db,
            fallback_db: args.fallback_db,
            cache_db: args.cache_db,
            cache,
            service,
        })
    }
}

pub(crate) fn open_pois(path: &Utf8PathBuf) -> Result<SqlitePoiStore, CliError> {
    SqlitePoiStore::open(path.as_std_path()).map_err(|source| CliError::PoiDatabase {
        path: path.clone(),
        source,
    })
}

/// Copy every POI of `store` into memory.
pub(crate) fn snapshot(store: &SqlitePoiStore) -> Result<MemoryPoiStore, CliError> {
    let world = Bounds::new(90.0, -90.0, 180.0, -180.0)?;
    let pois = store
        .get_pois_in_bbox(&world.to_rect())
        .map_err(CliError::SnapshotPois)?;
    info!("fallback snapshot holds {} POIs", pois.len());
    Ok(MemoryPoiStore::new(pois))
}

pub(crate) fn run_serve(args: ServeArgs) -> Result<(), CliError> {
    let config = args.into_config()?;
    config.validate_sources()?;
    let service = Arc::new(config.build_service()?);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;
    runtime.block_on(async move {
        let listener =
            TcpListener::bind(&config.listen)
                .await
                .map_err(|source| CliError::Bind {
                    addr: config.listen.clone(),
                    source,
                })?;
        http::serve(listener, service).await.map_err(CliError::Serve)
    })
}
