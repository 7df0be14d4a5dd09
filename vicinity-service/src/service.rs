//! Batch scoring of tiles with caching and source fallback.
#![forbid(unsafe_code)]

use std::{
    collections::{BTreeMap, HashSet},
    sync::Arc,
    time::Instant,
};

use log::debug;
use vicinity_cache::{ScoreVariant, TileCache};
use vicinity_core::{
    BatchMetadata, BatchRequest, BatchResponse, Bounds, Factor, PointOfInterest,
    ScorePoint, TileCoord, TileResult, expand_ring,
};
use vicinity_scorer::{ScoreEngine, ScoreEngineError, normalise_value, viewport_range};

use crate::{BatchError, PoiSources, ServiceConfig, sources::SourceSession};

/// Scores batches of tiles, serving repeated work from a [`TileCache`].
///
/// Scores are cached on the natural `[-100, 100]` scale under the request's
/// `ConfigHash`, POI buffer ring and lattice side; viewport normalisation is applied to the response only, so
/// normalised and raw requests share cache entries.
pub struct BatchTileService {
    cache: Arc<TileCache>,
    sources: PoiSources,
    config: ServiceConfig,
}

impl std::fmt::Debug for BatchTileService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchTileService")
            .field("cache", &self.cache)
            .field("sources", &self.sources)
            .field("config", &self.config)
            .finish()
    }
}

struct Scored {
    points: Arc<Vec<ScorePoint>>,
    cached: bool,
}

impl BatchTileService {
    /// Service drawing POIs from `sources` through `cache`.
    #[must_use]
    pub const fn new(cache: Arc<TileCache>, sources: PoiSources, config: ServiceConfig) -> Self {
        Self {
            cache,
            sources,
            config,
        }
    }

    /// The cache shared with the status endpoint.
    #[must_use]
    pub const fn cache(&self) -> &Arc<TileCache> {
        &self.cache
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Score every tile of `request`.
    ///
    /// Tiles are deduplicated. A configuration without active factors yields
    /// empty tiles without touching any POI source.
    ///
    /// # Errors
    /// Returns [`BatchError`] for malformed requests and when neither POI
    /// source can be read.
    pub fn handle(&self, request: &BatchRequest) -> Result<BatchResponse, BatchError> {
        let started = Instant::now();
        let tiles = self.validate(request)?;

        let engine = match ScoreEngine::new(&request.scoring) {
            Ok(engine) => engine.with_grid_side(self.config.grid_side)?,
            Err(ScoreEngineError::NoActiveFactors) => {
                debug!("no active factors; returning {} empty tiles", tiles.len());
                return Ok(self.empty_response(request, &tiles, started));
            }
            Err(err) => return Err(err.into()),
        };

        let mut session = SourceSession::new(&self.sources, &self.cache, request.data_source);
        let scored = self.score_tiles(&engine, request, &tiles, &mut session)?;
        let (visible, _) = session.gather(&tiles)?;
        let pois = pois_by_factor(engine.factors(), visible, request.viewport_bounds.as_ref());
        let range = if request.normalize_to_viewport {
            viewport_range(scored.iter().flat_map(|s| s.points.iter()))
        } else {
            None
        };

        let cached_tiles = scored.iter().filter(|s| s.cached).count();
        let results = tiles
            .iter()
            .zip(scored)
            .map(|(tile, s)| {
                let points = rescale(&s.points, range);
                (
                    tile.key(),
                    TileResult {
                        points,
                        cached: s.cached,
                    },
                )
            })
            .collect();

        Ok(BatchResponse {
            tiles: results,
            pois,
            metadata: BatchMetadata {
                total_tiles: tiles.len(),
                cached_tiles,
                computed_tiles: tiles.len() - cached_tiles,
                compute_time_ms: elapsed_ms(started),
                data_source: session.reported(),
                cache_stats: self.cache.stats(),
            },
        })
    }

    fn score_tiles(
        &self,
        engine: &ScoreEngine,
        request: &BatchRequest,
        tiles: &[TileCoord],
        session: &mut SourceSession<'_>,
    ) -> Result<Vec<Scored>, BatchError> {
        let hash = request.scoring.config_hash();
        let max_distance = request.scoring.max_active_distance();
        let mut scored = Vec::with_capacity(tiles.len());
        for tile in tiles {
            let ring = buffer_ring(
                tile,
                max_distance,
                request.poi_buffer_scale,
                self.config.max_buffer_ring,
            );
            let variant = ScoreVariant::new(hash, ring, engine.grid_side());
            let source = session.current();
            if let Some(points) = self.cache.scores(tile, &variant, source) {
                session.note(source);
                scored.push(Scored {
                    points,
                    cached: true,
                });
                continue;
            }
            let neighbourhood = expand_ring(std::slice::from_ref(tile), ring);
            let (pois, used) = session.gather(&neighbourhood)?;
            let points =
                self.cache
                    .store_scores(tile, &variant, used, engine.score_tile(tile, &pois));
            scored.push(Scored {
                points,
                cached: false,
            });
        }
        Ok(scored)
    }

    fn validate(&self, request: &BatchRequest) -> Result<Vec<TileCoord>, BatchError> {
        let mut seen = HashSet::new();
        let tiles: Vec<TileCoord> = request
            .tiles
            .iter()
            .copied()
            .filter(|tile| seen.insert(*tile))
            .collect();
        if tiles.len() > self.config.max_request_tiles {
            return Err(BatchError::TooManyTiles {
                requested: tiles.len(),
                max: self.config.max_request_tiles,
            });
        }
        request.scoring.validate()?;
        if let Some(bounds) = &request.viewport_bounds {
            bounds.validate()?;
        }
        let scale = request.poi_buffer_scale;
        if !scale.is_finite() || scale < 0.0 {
            return Err(BatchError::InvalidBufferScale { value: scale });
        }
        Ok(tiles)
    }

    fn empty_response(
        &self,
        request: &BatchRequest,
        tiles: &[TileCoord],
        started: Instant,
    ) -> BatchResponse {
        let session = SourceSession::new(&self.sources, &self.cache, request.data_source);
        BatchResponse {
            tiles: tiles
                .iter()
                .map(|tile| (tile.key(), TileResult::default()))
                .collect(),
            pois: BTreeMap::new(),
            metadata: BatchMetadata {
                total_tiles: tiles.len(),
                cached_tiles: 0,
                computed_tiles: 0,
                compute_time_ms: elapsed_ms(started),
                data_source: session.reported(),
                cache_stats: self.cache.stats(),
            },
        }
    }
}

/// Rings of neighbouring tiles whose POIs can reach samples on `tile`.
///
/// The smallest ring whose width covers `max_distance * scale` metres, capped
/// at `max_ring`.
#[expect(clippy::float_arithmetic, reason = "ring width in metres")]
pub(crate) fn buffer_ring(tile: &TileCoord, max_distance: f64, scale: f64, max_ring: u32) -> u32 {
    let reach = max_distance * scale;
    let extent = tile.min_extent_metres();
    if reach.is_nan() || reach <= 0.0 || extent <= 0.0 {
        return 0;
    }
    let mut ring = 0;
    while ring < max_ring && f64::from(ring) * extent < reach {
        ring += 1;
    }
    ring
}

/// POIs matching each factor, inside `viewport` when given, one per
/// coordinate and ordered by id.
fn pois_by_factor(
    factors: &[Factor],
    mut pois: Vec<PointOfInterest>,
    viewport: Option<&Bounds>,
) -> BTreeMap<String, Vec<PointOfInterest>> {
    pois.sort_by_key(|poi| poi.id);
    pois.retain(|poi| viewport.is_none_or(|bounds| bounds.contains(poi.lat, poi.lng)));
    factors
        .iter()
        .map(|factor| {
            let mut seen = HashSet::new();
            let matching = pois
                .iter()
                .filter(|poi| factor.matches_category(&poi.category))
                .filter(|poi| seen.insert(poi.coord_key()))
                .cloned()
                .collect();
            (factor.id.clone(), matching)
        })
        .collect()
}

fn rescale(points: &[ScorePoint], range: Option<(f64, f64)>) -> Vec<ScorePoint> {
    range.map_or_else(
        || points.to_vec(),
        |range| {
            points
                .iter()
                .map(|p| ScorePoint {
                    value: normalise_value(p.value, range),
                    ..*p
                })
                .collect()
        },
    )
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
