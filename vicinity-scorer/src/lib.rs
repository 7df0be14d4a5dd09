//! Livability scoring for sampled tile lattices.
//!
//! For each sample point the engine looks up the nearest POI of every active
//! factor within that factor's `maxDistance`, converts the great-circle
//! distance into a strength through a distance-decay curve, and aggregates the
//! signed, weighted strengths:
//!
//! - positive and negative factors are pooled separately;
//! - each pool is a `|w|`-weighted power mean with exponent `lambda`;
//! - the score is `K⁺ − K⁻` on the fixed `[-100, 100]` scale.
//!
//! Scores can optionally be rescaled per batch with [`viewport_range`] and
//! [`normalise_value`].
//!
//! # Examples
//!
//! ```
//! use vicinity_core::{Factor, PointOfInterest, ScoringConfig, TileCoord};
//! use vicinity_scorer::ScoreEngine;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ScoringConfig::new(vec![Factor::new("park", 80.0, 2_000.0)]);
//! let engine = ScoreEngine::new(&config)?;
//! let tile = TileCoord::new(14, 8800, 5373)?;
//! let (lat, lng) = tile.center();
//! let points = engine.score_tile(&tile, &[PointOfInterest::new(1, lat, lng, "park")]);
//! assert_eq!(points.len(), 81);
//! assert!(points.iter().all(|p| p.value > 0.0));
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

mod aggregate;
mod curve;
mod engine;
mod error;
mod index;

pub use aggregate::{Contribution, aggregate};
pub use curve::decay;
pub use engine::{
    DEFAULT_GRID_SIDE, ScoreEngine, normalise_value, sample_lattice, viewport_range,
};
pub use error::ScoreEngineError;
pub use index::FactorIndex;
