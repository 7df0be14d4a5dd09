//! Error types raised while constructing a score engine.
#![forbid(unsafe_code)]

use thiserror::Error;
use vicinity_core::ScoringConfigError;

/// Errors raised by [`ScoreEngine`](crate::ScoreEngine) construction.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScoreEngineError {
    /// The scoring configuration failed validation.
    #[error(transparent)]
    InvalidConfig(#[from] ScoringConfigError),
    /// No factor is both enabled and non-zero, so there is nothing to score.
    #[error("no enabled factor carries a non-zero weight")]
    NoActiveFactors,
    /// The sampling lattice needs at least two samples per side.
    #[error("grid side {grid_side} must be at least 2")]
    InvalidGridSide {
        /// Requested samples per side.
        grid_side: u32,
    },
}
