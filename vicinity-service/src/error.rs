//! Errors surfaced by the batch service.
#![forbid(unsafe_code)]

use thiserror::Error;
use vicinity_core::{BoundsError, PoiStoreError, ScoringConfigError};
use vicinity_scorer::ScoreEngineError;

/// Failure handling a batch request.
#[derive(Debug, Error)]
pub enum BatchError {
    /// The request names more distinct tiles than the service accepts.
    #[error("request names {requested} tiles but at most {max} are allowed")]
    TooManyTiles {
        /// Distinct tiles in the request.
        requested: usize,
        /// Configured cap.
        max: usize,
    },
    /// The factors or curve parameters are invalid.
    #[error("invalid scoring configuration: {0}")]
    InvalidConfig(#[from] ScoringConfigError),
    /// `viewportBounds` is malformed.
    #[error("invalid viewport bounds: {0}")]
    InvalidBounds(#[from] BoundsError),
    /// `poiBufferScale` is negative or not finite.
    #[error("poiBufferScale must be finite and non-negative, got {value}")]
    InvalidBufferScale {
        /// Rejected scale.
        value: f64,
    },
    /// The engine rejected the service's own configuration.
    #[error("score engine misconfigured: {0}")]
    Engine(ScoreEngineError),
    /// Neither the preferred nor the fallback POI source answered.
    #[error("no POI source is available: {source}")]
    SourcesUnavailable {
        /// Failure reported by the last source tried.
        #[source]
        source: PoiStoreError,
    },
}

impl From<ScoreEngineError> for BatchError {
    fn from(err: ScoreEngineError) -> Self {
        match err {
            ScoreEngineError::InvalidConfig(config) => Self::InvalidConfig(config),
            other => Self::Engine(other),
        }
    }
}

impl BatchError {
    /// Whether the request itself was at fault.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::TooManyTiles { .. }
                | Self::InvalidConfig(_)
                | Self::InvalidBounds(_)
                | Self::InvalidBufferScale { .. }
        )
    }
}
