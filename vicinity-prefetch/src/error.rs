//! Errors surfaced to the orchestrator's caller.

use thiserror::Error;
use vicinity_core::TileIndexError;

use crate::FetchError;

/// User-visible prefetch failure.
///
/// Supersession is not an error; it is reported as
/// [`FetchOutcome::Superseded`](crate::FetchOutcome::Superseded).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PrefetchError {
    /// The viewport covers too many tiles; zoom in. No request was made.
    #[error("viewport needs {required} tiles but at most {max} are allowed; zoom in")]
    TooLarge {
        /// Tiles the viewport would cover.
        required: usize,
        /// Configured cap.
        max: usize,
    },
    /// The viewport bounds or zoom are invalid.
    #[error("invalid viewport: {0}")]
    InvalidViewport(TileIndexError),
    /// A batch call failed; remaining phases were skipped.
    #[error("batch request failed: {source}")]
    FetchFailed {
        /// Generation whose phase failed.
        generation: u64,
        /// Underlying failure.
        #[source]
        source: FetchError,
    },
}

impl From<TileIndexError> for PrefetchError {
    fn from(err: TileIndexError) -> Self {
        match err {
            TileIndexError::TooLarge { required, max } => Self::TooLarge { required, max },
            other => Self::InvalidViewport(other),
        }
    }
}
