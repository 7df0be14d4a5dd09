//! Orchestrator settings and per-fetch inputs.

use std::time::Duration;

use vicinity_core::{BatchRequest, Bounds, DataSource, ScoringConfig, TileCoord, TileLimits};

/// Default ring radius around the viewport.
pub const DEFAULT_RADIUS: u32 = 2;

/// Default overlap below which a viewport change counts as a zoom.
pub const DEFAULT_ZOOM_OVERLAP_THRESHOLD: f64 = 0.5;

/// Default deadline of one batch call.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// How rings are fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrefetchMode {
    /// One phase per radius `0..=R`, each merged as it arrives.
    #[default]
    Progressive,
    /// A single phase at radius `R`.
    Batch,
}

impl PrefetchMode {
    /// Radii fetched for a plan of radius `radius`.
    #[must_use]
    pub fn phases(self, radius: u32) -> Vec<u32> {
        match self {
            Self::Progressive => (0..=radius).collect(),
            Self::Batch => vec![radius],
        }
    }
}

/// Orchestrator settings.
#[derive(Debug, Clone, PartialEq)]
pub struct PrefetchConfig {
    /// Phase plan.
    pub mode: PrefetchMode,
    /// Zoom and tile caps.
    pub limits: TileLimits,
    /// Viewport overlap below which accumulated state is discarded.
    pub zoom_overlap_threshold: f64,
    /// Deadline of each batch call.
    pub request_timeout: Duration,
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self {
            mode: PrefetchMode::default(),
            limits: TileLimits::default(),
            zoom_overlap_threshold: DEFAULT_ZOOM_OVERLAP_THRESHOLD,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl PrefetchConfig {
    /// Set the phase plan.
    #[must_use]
    pub const fn with_mode(mut self, mode: PrefetchMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the tile caps.
    #[must_use]
    pub const fn with_limits(mut self, limits: TileLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Set the zoom-detection threshold.
    #[must_use]
    pub const fn with_zoom_overlap_threshold(mut self, threshold: f64) -> Self {
        self.zoom_overlap_threshold = threshold;
        self
    }

    /// Set the per-call deadline.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// What to fetch: the visible area and how to score it.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewportQuery {
    /// Visible area.
    pub bounds: Bounds,
    /// Factors and curve parameters.
    pub scoring: ScoringConfig,
    /// Rings fetched beyond the viewport.
    pub radius: u32,
    /// Preferred POI source.
    pub data_source: DataSource,
    /// Ask the service for per-batch normalisation.
    pub normalize_to_viewport: bool,
    /// Multiplier over the largest `maxDistance` for POI gathering.
    pub poi_buffer_scale: f64,
}

impl ViewportQuery {
    /// Query for `bounds` with the default radius and flags.
    #[must_use]
    pub const fn new(bounds: Bounds, scoring: ScoringConfig) -> Self {
        Self {
            bounds,
            scoring,
            radius: DEFAULT_RADIUS,
            data_source: DataSource::Primary,
            normalize_to_viewport: false,
            poi_buffer_scale: 1.0,
        }
    }

    /// Set the ring radius.
    #[must_use]
    pub const fn with_radius(mut self, radius: u32) -> Self {
        self.radius = radius;
        self
    }

    /// Set the preferred source.
    #[must_use]
    pub const fn with_data_source(mut self, source: DataSource) -> Self {
        self.data_source = source;
        self
    }

    /// Request per-batch normalisation.
    #[must_use]
    pub const fn with_normalize(mut self, normalize: bool) -> Self {
        self.normalize_to_viewport = normalize;
        self
    }

    /// Set the POI buffer scale.
    #[must_use]
    pub const fn with_poi_buffer_scale(mut self, scale: f64) -> Self {
        self.poi_buffer_scale = scale;
        self
    }

    pub(crate) fn request_for(&self, tiles: Vec<TileCoord>) -> BatchRequest {
        BatchRequest::new(tiles, self.scoring.clone())
            .with_data_source(self.data_source)
            .with_normalize(self.normalize_to_viewport)
            .with_viewport_bounds(self.bounds)
            .with_poi_buffer_scale(self.poi_buffer_scale)
    }
}
