//! Two-level caching of per-tile POIs and scores.
//!
//! L1 is a bounded in-process map per cache kind with oldest-write-first
//! eviction and atomic hit/miss counters. L2 is a [`SharedStore`] with
//! per-key expiry, consulted on L1 misses and written through on every store.
//! A failing L2 is replaced by an in-process [`MemorySharedStore`] without
//! surfacing errors to callers.
//!
//! Values cross the L2 boundary encoded with `bincode`.

#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod config;
mod l1;
mod shared;
mod tile_cache;

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-support")))]
pub mod test_support;

pub use config::{
    CacheConfig, DEFAULT_FALLBACK_CAPACITY, DEFAULT_FALLBACK_TTL, DEFAULT_L1_CAPACITY,
    DEFAULT_TTL, MAX_TTL,
};
pub use l1::CacheEntry;
pub use shared::{MemorySharedStore, SharedStore, SharedStoreError, SqliteSharedStore};
pub use tile_cache::{ScoreVariant, TileCache, poi_key, score_key};
