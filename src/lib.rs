//! Facade crate for the vicinity tiled proximity-score engine.
//!
//! This crate re-exports the core tile and scoring types, the score engine
//! and the two-level tile cache. The batch service and the viewport
//! prefetcher sit behind feature flags.

#![forbid(unsafe_code)]

pub use vicinity_cache::{
    CacheConfig, MemorySharedStore, ScoreVariant, SharedStore, SqliteSharedStore, TileCache,
};
pub use vicinity_core::{
    BatchMetadata, BatchRequest, BatchResponse, Bounds, CacheStats, DataSource, DistanceCurve,
    Factor, PoiStore, PointOfInterest, ScorePoint, ScoringConfig, TileCoord, TileResult, Z_HEAT,
};
pub use vicinity_scorer::{ScoreEngine, ScoreEngineError};

#[cfg(feature = "store-sqlite")]
pub use vicinity_core::{SqlitePoiStore, SqlitePoiStoreError};

#[cfg(feature = "service")]
pub use vicinity_service::{BatchError, BatchTileService, PoiSources, ServiceConfig};

#[cfg(feature = "prefetch")]
pub use vicinity_prefetch::{
    HttpTileClient, PrefetchConfig, PrefetchError, PrefetchOrchestrator, TileClient,
    ViewportQuery,
};
