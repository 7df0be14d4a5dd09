//! Two-level cache of per-tile POIs and scores.
#![forbid(unsafe_code)]

use std::{
    sync::{
        Arc, PoisonError, RwLock,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Instant,
};

use log::{debug, warn};
use serde::{Serialize, de::DeserializeOwned};
use vicinity_core::{
    CacheKind, CacheStats, CacheStatus, ConfigHash, DataSource, KindStats, PointOfInterest,
    ScorePoint, TileCoord,
};

use crate::{
    CacheConfig, MemorySharedStore, SharedStore, SharedStoreError, l1::BoundedMap,
};

#[derive(Debug, Default)]
struct Counters {
    l1_hits: AtomicU64,
    l2_hits: AtomicU64,
    misses: AtomicU64,
}

struct Tier<T> {
    l1: BoundedMap<T>,
    counters: Counters,
}

impl<T> Tier<T> {
    fn new(config: &CacheConfig) -> Self {
        Self {
            l1: BoundedMap::new(config.l1_capacity, config.ttl),
            counters: Counters::default(),
        }
    }

    fn stats(&self) -> KindStats {
        KindStats {
            size: self.l1.len(),
            max: self.l1.capacity(),
            l1_hits: self.counters.l1_hits.load(Ordering::Relaxed),
            l2_hits: self.counters.l2_hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
        }
    }
}

/// Everything besides the tile and the POI source that shapes a tile's scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScoreVariant {
    /// Hash of the scoring configuration.
    pub hash: ConfigHash,
    /// Rings of neighbouring tiles whose POIs fed the scores.
    pub ring: u32,
    /// Side of the sampling lattice.
    pub grid_side: u32,
}

impl ScoreVariant {
    /// Variant for `hash` sampled on a `grid_side` lattice over `ring` rings of POIs.
    #[must_use]
    pub const fn new(hash: ConfigHash, ring: u32, grid_side: u32) -> Self {
        Self {
            hash,
            ring,
            grid_side,
        }
    }
}

/// Lookaside cache: bounded L1 maps per kind in front of a shared L2 store.
///
/// POIs are keyed by `(tile, source)`; scores by `(tile, ScoreVariant)` and
/// partitioned by the source whose POIs produced them. Entries are never
/// mutated, so a changed configuration simply addresses different keys.
///
/// When the shared store fails the cache swaps to an in-process fallback with
/// a shorter lifetime. Callers never see the failure; it only shows up as
/// `type: "memory"` in [`TileCache::status`].
///
/// # Examples
///
/// ```
/// use vicinity_cache::{CacheConfig, TileCache};
/// use vicinity_core::{DataSource, PointOfInterest, TileCoord};
///
/// # fn main() -> Result<(), vicinity_core::TileIndexError> {
/// let cache = TileCache::in_memory(CacheConfig::default());
/// let tile = TileCoord::new(14, 8800, 5373)?;
/// assert!(cache.pois(&tile, DataSource::Primary).is_none());
/// cache.store_pois(&tile, DataSource::Primary, vec![PointOfInterest::new(1, 52.5, 13.4, "park")]);
/// assert_eq!(cache.pois(&tile, DataSource::Primary).map(|p| p.len()), Some(1));
/// assert_eq!(cache.stats().pois.l1_hits, 1);
/// # Ok(())
/// # }
/// ```
pub struct TileCache {
    pois: Tier<Vec<PointOfInterest>>,
    scores: Tier<Vec<ScorePoint>>,
    shared: RwLock<Arc<dyn SharedStore>>,
    degraded: AtomicBool,
    config: CacheConfig,
}

impl std::fmt::Debug for TileCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileCache")
            .field("config", &self.config)
            .field("degraded", &self.degraded.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl TileCache {
    /// Cache backed by `shared` as L2.
    #[must_use]
    pub fn new(shared: Arc<dyn SharedStore>, config: CacheConfig) -> Self {
        Self {
            pois: Tier::new(&config),
            scores: Tier::new(&config),
            shared: RwLock::new(shared),
            degraded: AtomicBool::new(false),
            config,
        }
    }

    /// Cache whose L2 is the in-process store from the outset.
    #[must_use]
    pub fn in_memory(config: CacheConfig) -> Self {
        Self::new(
            Arc::new(MemorySharedStore::new(config.fallback_capacity)),
            config,
        )
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Whether the shared store has failed and the fallback is in use.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Acquire)
    }

    /// Cached POIs for a tile from `source`.
    pub fn pois(&self, tile: &TileCoord, source: DataSource) -> Option<Arc<Vec<PointOfInterest>>> {
        self.lookup(&self.pois, &poi_key(tile, source))
    }

    /// Write POIs for a tile through both levels.
    pub fn store_pois(
        &self,
        tile: &TileCoord,
        source: DataSource,
        pois: Vec<PointOfInterest>,
    ) -> Arc<Vec<PointOfInterest>> {
        self.write_through(&self.pois, &poi_key(tile, source), pois)
    }

    /// Cached scores for a tile under `variant`, computed from `source` POIs.
    pub fn scores(
        &self,
        tile: &TileCoord,
        variant: &ScoreVariant,
        source: DataSource,
    ) -> Option<Arc<Vec<ScorePoint>>> {
        self.lookup(&self.scores, &score_key(tile, variant, source))
    }

    /// Write scores for a tile through both levels.
    pub fn store_scores(
        &self,
        tile: &TileCoord,
        variant: &ScoreVariant,
        source: DataSource,
        points: Vec<ScorePoint>,
    ) -> Arc<Vec<ScorePoint>> {
        self.write_through(&self.scores, &score_key(tile, variant, source), points)
    }

    /// Cumulative counters for both kinds.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            pois: self.pois.stats(),
            scores: self.scores.stats(),
        }
    }

    /// Health of the L2 backend.
    ///
    /// Only a shared backend answering a ping reports `connected`.
    #[must_use]
    pub fn status(&self) -> CacheStatus {
        let store = self.current();
        let started = Instant::now();
        match store.ping() {
            Ok(()) => {
                let latency = started.elapsed();
                let kind = store.kind();
                CacheStatus {
                    kind,
                    connected: kind == CacheKind::Shared,
                    latency_ms: (kind == CacheKind::Shared).then(|| millis(latency)),
                    key_count: store.key_count().ok(),
                }
            }
            Err(err) => {
                self.degrade(&err);
                let fallback = self.current();
                CacheStatus {
                    kind: CacheKind::Memory,
                    connected: false,
                    latency_ms: None,
                    key_count: fallback.key_count().ok(),
                }
            }
        }
    }

    fn lookup<T: DeserializeOwned>(&self, tier: &Tier<T>, key: &str) -> Option<Arc<T>> {
        if let Some(hit) = tier.l1.get(key) {
            tier.counters.l1_hits.fetch_add(1, Ordering::Relaxed);
            return Some(hit);
        }
        let found = self
            .shared_get(key)
            .and_then(|bytes| match bincode::deserialize::<T>(&bytes) {
                Ok(value) => Some(value),
                Err(err) => {
                    warn!("discarding undecodable cache entry {key}: {err}");
                    None
                }
            });
        if let Some(value) = found {
            let shared = Arc::new(value);
            tier.l1.insert(key, Arc::clone(&shared));
            tier.counters.l2_hits.fetch_add(1, Ordering::Relaxed);
            return Some(shared);
        }
        tier.counters.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    fn write_through<T: Serialize>(&self, tier: &Tier<T>, key: &str, value: T) -> Arc<T> {
        match bincode::serialize(&value) {
            Ok(bytes) => self.shared_set(key, &bytes),
            Err(err) => warn!("skipping L2 write for {key}: {err}"),
        }
        let shared = Arc::new(value);
        tier.l1.insert(key, Arc::clone(&shared));
        shared
    }

    fn shared_get(&self, key: &str) -> Option<Vec<u8>> {
        match self.current().get(key) {
            Ok(found) => found,
            Err(err) => {
                self.degrade(&err);
                self.current().get(key).ok().flatten()
            }
        }
    }

    fn shared_set(&self, key: &str, bytes: &[u8]) {
        let ttl = if self.is_degraded() {
            self.config.effective_fallback_ttl()
        } else {
            self.config.ttl
        };
        if let Err(err) = self.current().set(key, bytes, ttl) {
            self.degrade(&err);
            if let Err(fallback_err) =
                self.current()
                    .set(key, bytes, self.config.effective_fallback_ttl())
            {
                debug!("fallback cache rejected {key}: {fallback_err}");
            }
        }
    }

    fn current(&self) -> Arc<dyn SharedStore> {
        Arc::clone(&self.shared.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn degrade(&self, err: &SharedStoreError) {
        if self.degraded.swap(true, Ordering::AcqRel) {
            return;
        }
        warn!("shared cache failed, continuing with in-process fallback: {err}");
        let fallback: Arc<dyn SharedStore> =
            Arc::new(MemorySharedStore::new(self.config.fallback_capacity));
        *self.shared.write().unwrap_or_else(PoisonError::into_inner) = fallback;
    }
}

/// L2 key of a tile's POIs.
#[must_use]
pub fn poi_key(tile: &TileCoord, source: DataSource) -> String {
    format!("pois:{}:{tile}", source.as_str())
}

/// L2 key of a tile's scores.
#[must_use]
pub fn score_key(tile: &TileCoord, variant: &ScoreVariant, source: DataSource) -> String {
    format!(
        "scores:{}:{}:r{}:g{}:{tile}",
        source.as_str(),
        variant.hash,
        variant.ring,
        variant.grid_side
    )
}

#[expect(clippy::float_arithmetic, reason = "seconds to milliseconds")]
fn millis(duration: std::time::Duration) -> f64 {
    duration.as_secs_f64() * 1_000.0
}
