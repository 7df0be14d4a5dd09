//! Core domain types for the vicinity score pipeline.
//!
//! This crate holds the pure geometry of the tiled score field: bounds,
//! fixed-zoom tiles and the tile-set operations used by the prefetcher, the
//! scoring configuration with its stable hash, points of interest and their
//! stores, and the request/response types exchanged with the batch endpoint.

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod batch;
pub mod bounds;
pub mod factor;
pub mod indexer;
pub mod poi;
pub mod store;
pub mod tile;
pub mod wire;

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-support")))]
pub mod test_support;

pub use batch::{
    BatchMetadata, BatchRequest, BatchResponse, CacheKind, CacheStats, CacheStatus, DataSource,
    KindStats, TileResult,
};
pub use bounds::{Bounds, BoundsError};
pub use factor::{ConfigHash, DistanceCurve, Factor, ScoringConfig, ScoringConfigError};
pub use indexer::{
    MAX_TOTAL_TILES, MAX_VIEWPORT_TILES, TileIndexError, TileLimits, ViewportPlan,
    bounds_of_tiles, delta, expand_ring, key_of, key_of_set, overlap_ratio, plan_viewport,
    tile_count_for_bounds, tiles_for_bounds,
};
pub use poi::{PointOfInterest, ScorePoint, coord_key};
pub use store::{MemoryPoiStore, PoiStore, PoiStoreError};
#[cfg(feature = "store-sqlite")]
pub use store::{SqlitePoiStore, SqlitePoiStoreError, write_poi_database};
pub use tile::{TileCoord, Z_HEAT};
pub use wire::{Encoding, WireError, decode_response, encode_response};
