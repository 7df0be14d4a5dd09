//! Request and response types exchanged with the batch tile endpoint.
//!
//! Field names are camelCase on the wire. Responses avoid flattened or
//! conditionally skipped fields so that they also encode with `bincode`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Bounds, PointOfInterest, ScorePoint, ScoringConfig, TileCoord};

/// Which POI source produced, or should produce, the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    /// The authoritative POI database.
    #[default]
    Primary,
    /// The secondary source used when the primary is unavailable.
    Fallback,
}

impl DataSource {
    /// Lowercase wire name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Fallback => "fallback",
        }
    }
}

/// A batch of tiles to score under one configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    /// Tiles to score.
    pub tiles: Vec<TileCoord>,
    /// Factors and curve parameters.
    #[serde(flatten)]
    pub scoring: ScoringConfig,
    /// Rescale the batch to `[0, 1]` instead of the natural scale.
    #[serde(default)]
    pub normalize_to_viewport: bool,
    /// Preferred POI source.
    #[serde(default)]
    pub data_source: DataSource,
    /// Visible viewport; POIs in the response are limited to it when set.
    #[serde(default)]
    pub viewport_bounds: Option<Bounds>,
    /// Multiplier over the largest `maxDistance` deciding how far beyond a
    /// tile POIs are gathered.
    #[serde(default = "default_poi_buffer_scale")]
    pub poi_buffer_scale: f64,
}

const fn default_poi_buffer_scale() -> f64 {
    1.0
}

impl BatchRequest {
    /// Request for `tiles` with default flags.
    pub fn new(tiles: Vec<TileCoord>, scoring: ScoringConfig) -> Self {
        Self {
            tiles,
            scoring,
            normalize_to_viewport: false,
            data_source: DataSource::Primary,
            viewport_bounds: None,
            poi_buffer_scale: default_poi_buffer_scale(),
        }
    }

    /// Set the preferred data source.
    #[must_use]
    pub const fn with_data_source(mut self, source: DataSource) -> Self {
        self.data_source = source;
        self
    }

    /// Set the normalise-to-viewport flag.
    #[must_use]
    pub const fn with_normalize(mut self, normalize: bool) -> Self {
        self.normalize_to_viewport = normalize;
        self
    }

    /// Restrict returned POIs to the viewport.
    #[must_use]
    pub const fn with_viewport_bounds(mut self, bounds: Bounds) -> Self {
        self.viewport_bounds = Some(bounds);
        self
    }

    /// Set the POI buffer scale.
    #[must_use]
    pub const fn with_poi_buffer_scale(mut self, scale: f64) -> Self {
        self.poi_buffer_scale = scale;
        self
    }
}

/// Scores for one tile.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TileResult {
    /// Lattice samples.
    pub points: Vec<ScorePoint>,
    /// Whether the scores came from the cache.
    pub cached: bool,
}

/// Hit and size counters for one cache kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KindStats {
    /// Entries currently held in L1.
    pub size: usize,
    /// L1 capacity.
    pub max: usize,
    /// Reads served by L1.
    pub l1_hits: u64,
    /// Reads served by L2 after an L1 miss.
    pub l2_hits: u64,
    /// Reads that missed both levels.
    pub misses: u64,
}

/// Cumulative cache counters for the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CacheStats {
    /// POI-per-tile cache.
    pub pois: KindStats,
    /// Score-per-tile cache.
    pub scores: KindStats,
}

/// Batch bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchMetadata {
    /// Tiles in the response.
    pub total_tiles: usize,
    /// Tiles served from the score cache.
    pub cached_tiles: usize,
    /// Tiles scored by this request.
    pub computed_tiles: usize,
    /// Wall-clock time spent handling the request.
    pub compute_time_ms: u64,
    /// Source that actually supplied the POIs.
    pub data_source: DataSource,
    /// Cache counters after handling the request.
    pub cache_stats: CacheStats,
}

/// Response to a [`BatchRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResponse {
    /// Per-tile results keyed by `"z:x:y"`.
    pub tiles: BTreeMap<String, TileResult>,
    /// POIs per factor id, deduplicated by coordinate.
    pub pois: BTreeMap<String, Vec<PointOfInterest>>,
    /// Batch bookkeeping.
    pub metadata: BatchMetadata,
}

/// Backing store behind the L2 cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheKind {
    /// A shared, durable store.
    Shared,
    /// The in-process fallback.
    Memory,
}

/// Health of the L2 cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatus {
    /// Active backend.
    #[serde(rename = "type")]
    pub kind: CacheKind,
    /// Whether the backend answered a ping.
    pub connected: bool,
    /// Ping round trip in milliseconds.
    pub latency_ms: Option<f64>,
    /// Live keys in the backend.
    pub key_count: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn request_reads_flattened_scoring_fields() {
        let json = r#"{
            "tiles": [{"z":14,"x":1,"y":2}],
            "factors": [{"id":"park","weight":80,"maxDistance":1000}],
            "distanceCurve": "exp",
            "sensitivity": 2,
            "aggregationLambda": 0.5,
            "dataSource": "fallback",
            "poiBufferScale": 1.5
        }"#;
        let request: BatchRequest = serde_json::from_str(json).expect("deserialise");
        assert_eq!(request.tiles.len(), 1);
        assert_eq!(request.scoring.factors[0].id, "park");
        assert_eq!(request.data_source, DataSource::Fallback);
        assert!(!request.normalize_to_viewport);
        assert!(request.viewport_bounds.is_none());
        assert!((request.poi_buffer_scale - 1.5).abs() < f64::EPSILON);
    }

    #[rstest]
    fn status_uses_type_field() {
        let status = CacheStatus {
            kind: CacheKind::Memory,
            connected: true,
            latency_ms: None,
            key_count: Some(3),
        };
        let value = serde_json::to_value(&status).expect("serialise");
        assert_eq!(value["type"], "memory");
        assert_eq!(value["keyCount"], 3);
    }

    #[rstest]
    fn stats_use_camel_case() {
        let value = serde_json::to_value(CacheStats::default()).expect("serialise");
        assert_eq!(value["scores"]["l1Hits"], 0);
    }
}
