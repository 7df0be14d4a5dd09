//! The score engine: nearest-POI distances, decay, aggregation and tile
//! sampling.
#![forbid(unsafe_code)]

use vicinity_core::{DistanceCurve, Factor, PointOfInterest, ScorePoint, ScoringConfig, TileCoord};

use crate::{Contribution, FactorIndex, ScoreEngineError, aggregate, decay};

/// Samples per tile side when none is configured.
pub const DEFAULT_GRID_SIDE: u32 = 9;

/// Scores lattice points from the active factors of a configuration.
///
/// Factors are held sorted by id so that equal configurations sum in the same
/// order and produce bit-identical scores.
#[derive(Debug, Clone)]
pub struct ScoreEngine {
    factors: Vec<Factor>,
    curve: DistanceCurve,
    sensitivity: f64,
    lambda: f64,
    grid_side: u32,
}

impl ScoreEngine {
    /// Build an engine from a validated configuration.
    ///
    /// # Errors
    /// Returns [`ScoreEngineError::InvalidConfig`] when validation fails and
    /// [`ScoreEngineError::NoActiveFactors`] when every factor is disabled or
    /// has zero weight; callers should skip scoring in that case.
    pub fn new(config: &ScoringConfig) -> Result<Self, ScoreEngineError> {
        config.validate()?;
        let mut factors: Vec<Factor> = config.active_factors().cloned().collect();
        if factors.is_empty() {
            return Err(ScoreEngineError::NoActiveFactors);
        }
        factors.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(Self {
            factors,
            curve: config.distance_curve,
            sensitivity: config.sensitivity,
            lambda: config.aggregation_lambda,
            grid_side: DEFAULT_GRID_SIDE,
        })
    }

    /// Change the number of samples per tile side.
    ///
    /// # Errors
    /// Returns [`ScoreEngineError::InvalidGridSide`] for fewer than two
    /// samples.
    pub fn with_grid_side(mut self, grid_side: u32) -> Result<Self, ScoreEngineError> {
        if grid_side < 2 {
            return Err(ScoreEngineError::InvalidGridSide { grid_side });
        }
        self.grid_side = grid_side;
        Ok(self)
    }

    /// Active factors in scoring order.
    #[must_use]
    pub const fn factors(&self) -> &[Factor] {
        self.factors.as_slice()
    }

    /// Samples per tile side.
    #[must_use]
    pub const fn grid_side(&self) -> u32 {
        self.grid_side
    }

    /// Index `pois` by the engine's factors.
    #[must_use]
    pub fn index(&self, pois: &[PointOfInterest]) -> FactorIndex {
        FactorIndex::build(&self.factors, pois)
    }

    /// Score a single location on the `[-100, 100]` scale.
    #[must_use]
    #[expect(
        clippy::float_arithmetic,
        reason = "normalised distance is a ratio of metres"
    )]
    pub fn score_at(&self, index: &FactorIndex, lat: f64, lng: f64) -> f64 {
        let contributions: Vec<Contribution> = self
            .factors
            .iter()
            .enumerate()
            .map(|(position, factor)| {
                let strength = index
                    .nearest_within(position, lat, lng, factor.max_distance)
                    .map_or(0.0, |distance| {
                        decay(self.curve, distance / factor.max_distance, self.sensitivity)
                    });
                Contribution {
                    weight: factor.weight,
                    strength,
                }
            })
            .collect();
        aggregate(&contributions, self.lambda)
    }

    /// Score every lattice sample of `tile` against `pois`.
    ///
    /// `pois` should include POIs from neighbouring tiles out to the largest
    /// factor distance, otherwise samples near the edges lose contributions.
    #[must_use]
    pub fn score_tile(&self, tile: &TileCoord, pois: &[PointOfInterest]) -> Vec<ScorePoint> {
        let index = self.index(pois);
        sample_lattice(tile, self.grid_side)
            .into_iter()
            .map(|(lat, lng)| ScorePoint {
                lat,
                lng,
                value: self.score_at(&index, lat, lng),
            })
            .collect()
    }
}

/// Inclusive `grid_side × grid_side` lattice over the tile, north-west first.
///
/// Edge samples reproduce the tile bounds exactly, so adjacent tiles share
/// their boundary samples bit for bit.
#[must_use]
pub fn sample_lattice(tile: &TileCoord, grid_side: u32) -> Vec<(f64, f64)> {
    let bounds = tile.bounds();
    let steps = grid_side.max(2) - 1;
    let mut samples = Vec::new();
    for row in 0..=steps {
        let lat = lerp(bounds.north, bounds.south, fraction(row, steps));
        for column in 0..=steps {
            let lng = lerp(bounds.west, bounds.east, fraction(column, steps));
            samples.push((lat, lng));
        }
    }
    samples
}

#[expect(clippy::float_arithmetic, reason = "lattice position is a ratio")]
fn fraction(step: u32, steps: u32) -> f64 {
    f64::from(step) / f64::from(steps)
}

#[expect(
    clippy::float_arithmetic,
    reason = "this form is exact at both endpoints"
)]
fn lerp(start: f64, end: f64, fraction: f64) -> f64 {
    start * (1.0 - fraction) + end * fraction
}

/// Minimum and maximum score across a batch, or `None` when it is empty.
#[must_use]
pub fn viewport_range<'a, I>(points: I) -> Option<(f64, f64)>
where
    I: IntoIterator<Item = &'a ScorePoint>,
{
    points.into_iter().fold(None, |range, point| match range {
        None => Some((point.value, point.value)),
        Some((min, max)) => Some((min.min(point.value), max.max(point.value))),
    })
}

/// Rescale `value` so that the batch minimum maps to 0 and the maximum to 1.
///
/// A batch with a single distinct value maps to 0.
#[must_use]
#[expect(clippy::float_arithmetic, reason = "min-max rescaling")]
pub fn normalise_value(value: f64, (min, max): (f64, f64)) -> f64 {
    let span = max - min;
    if span <= 0.0 {
        return 0.0;
    }
    ((value - min) / span).clamp(0.0, 1.0)
}
