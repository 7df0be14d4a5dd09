//! Service tuning knobs.
#![forbid(unsafe_code)]

use vicinity_core::MAX_TOTAL_TILES;
use vicinity_scorer::DEFAULT_GRID_SIDE;

/// Default cap on neighbouring tile rings gathered for POIs.
pub const DEFAULT_MAX_BUFFER_RING: u32 = 3;

/// Configuration of a [`BatchTileService`](crate::BatchTileService).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Samples per tile side.
    pub grid_side: u32,
    /// Largest number of distinct tiles accepted in one request.
    pub max_request_tiles: usize,
    /// Upper bound on the POI buffer ring around each scored tile.
    pub max_buffer_ring: u32,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            grid_side: DEFAULT_GRID_SIDE,
            max_request_tiles: MAX_TOTAL_TILES,
            max_buffer_ring: DEFAULT_MAX_BUFFER_RING,
        }
    }
}

impl ServiceConfig {
    /// Override the lattice size.
    #[must_use]
    pub const fn with_grid_side(mut self, grid_side: u32) -> Self {
        self.grid_side = grid_side;
        self
    }

    /// Override the per-request tile cap.
    #[must_use]
    pub const fn with_max_request_tiles(mut self, max: usize) -> Self {
        self.max_request_tiles = max;
        self
    }

    /// Override the POI buffer ring cap.
    #[must_use]
    pub const fn with_max_buffer_ring(mut self, max: u32) -> Self {
        self.max_buffer_ring = max;
        self
    }
}
