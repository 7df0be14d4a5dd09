//! Pure tile-set geometry: bounding boxes to tiles, ring expansion, set
//! delta, overlap and stable keys.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    Bounds, BoundsError, TileCoord,
    tile::{Z_HEAT, lat_to_tile_y, lng_to_tile_x, tiles_per_side},
};

/// Default cap on tiles covering the visible viewport.
pub const MAX_VIEWPORT_TILES: usize = 48;

/// Default cap on tiles after ring expansion.
pub const MAX_TOTAL_TILES: usize = 256;

/// Errors raised by tile addressing and viewport planning.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TileIndexError {
    /// The viewport needs more tiles than allowed; the caller should zoom in.
    #[error("viewport needs {required} tiles but at most {max} are allowed")]
    TooLarge {
        /// Tiles the viewport would cover.
        required: usize,
        /// Configured cap.
        max: usize,
    },
    /// A tile key was not of the form `z:x:y`.
    #[error("invalid tile key `{key}`")]
    InvalidKey {
        /// Offending key.
        key: String,
    },
    /// The zoom level exceeds [`crate::tile::MAX_ZOOM`].
    #[error("zoom {zoom} is out of range")]
    ZoomOutOfRange {
        /// Requested zoom.
        zoom: u8,
    },
    /// A tile address lies outside the world grid.
    #[error("tile {z}:{x}:{y} lies outside the world grid")]
    OutOfGrid {
        /// Zoom level.
        z: u8,
        /// Column.
        x: u32,
        /// Row.
        y: u32,
    },
    /// The bounding box was malformed.
    #[error(transparent)]
    InvalidBounds(#[from] BoundsError),
}

/// Tile caps and the zoom level used for planning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TileLimits {
    /// Zoom at which tiles are addressed.
    pub zoom: u8,
    /// Maximum tiles covering the viewport itself.
    pub max_viewport_tiles: usize,
    /// Maximum tiles after ring expansion.
    pub max_total_tiles: usize,
}

impl Default for TileLimits {
    fn default() -> Self {
        Self {
            zoom: Z_HEAT,
            max_viewport_tiles: MAX_VIEWPORT_TILES,
            max_total_tiles: MAX_TOTAL_TILES,
        }
    }
}

impl TileLimits {
    /// Override the planning zoom.
    #[must_use]
    pub const fn with_zoom(mut self, zoom: u8) -> Self {
        self.zoom = zoom;
        self
    }

    /// Override the viewport cap.
    #[must_use]
    pub const fn with_max_viewport_tiles(mut self, max: usize) -> Self {
        self.max_viewport_tiles = max;
        self
    }

    /// Override the expanded-ring cap.
    #[must_use]
    pub const fn with_max_total_tiles(mut self, max: usize) -> Self {
        self.max_total_tiles = max;
        self
    }
}

/// Outcome of [`plan_viewport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewportPlan {
    /// Tiles covering the viewport, sorted.
    pub viewport: Vec<TileCoord>,
    /// Largest ring radius not exceeding the requested one that fits the cap.
    pub radius: u32,
    /// Viewport expanded by `radius`, sorted.
    pub tiles: Vec<TileCoord>,
}

/// Every tile whose extent overlaps `bounds`.
///
/// Tiles that merely touch an edge of `bounds` are not included, so feeding
/// the result of [`bounds_of_tiles`] back in yields the same set.
///
/// # Examples
///
/// ```
/// use vicinity_core::{Bounds, TileCoord, bounds_of_tiles, tiles_for_bounds};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let tiles = vec![TileCoord::new(14, 8800, 5373)?, TileCoord::new(14, 8801, 5373)?];
/// let bounds = bounds_of_tiles(&tiles).ok_or("empty")?;
/// assert_eq!(tiles_for_bounds(&bounds, 14)?, tiles);
/// # Ok(())
/// # }
/// ```
pub fn tiles_for_bounds(bounds: &Bounds, zoom: u8) -> Result<Vec<TileCoord>, TileIndexError> {
    TileSpan::of(bounds, zoom)?.tiles()
}

/// Number of tiles [`tiles_for_bounds`] would return, without building them.
pub fn tile_count_for_bounds(bounds: &Bounds, zoom: u8) -> Result<usize, TileIndexError> {
    Ok(TileSpan::of(bounds, zoom)?.len())
}

/// Inclusive rectangle of tile indices at one zoom level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TileSpan {
    zoom: u8,
    x_min: u32,
    x_max: u32,
    y_min: u32,
    y_max: u32,
}

impl TileSpan {
    fn of(bounds: &Bounds, zoom: u8) -> Result<Self, TileIndexError> {
        bounds.validate()?;
        if zoom > crate::tile::MAX_ZOOM {
            return Err(TileIndexError::ZoomOutOfRange { zoom });
        }
        let (x_min, x_max) = span(
            lng_to_tile_x(bounds.west, zoom),
            lng_to_tile_x(bounds.east, zoom),
            zoom,
        );
        // Rows grow southwards, so the northern edge gives the smaller index.
        let (y_min, y_max) = span(
            lat_to_tile_y(bounds.north, zoom),
            lat_to_tile_y(bounds.south, zoom),
            zoom,
        );
        Ok(Self {
            zoom,
            x_min,
            x_max,
            y_min,
            y_max,
        })
    }

    fn len(&self) -> usize {
        let width = u64::from(self.x_max - self.x_min) + 1;
        let height = u64::from(self.y_max - self.y_min) + 1;
        usize::try_from(width * height).unwrap_or(usize::MAX)
    }

    /// The span grown by `radius` tiles on every side, clamped to the grid.
    ///
    /// Equal to [`expand_ring`] over every tile of the span.
    fn expanded(&self, radius: u32) -> Self {
        let last = tiles_per_side(self.zoom) - 1;
        Self {
            zoom: self.zoom,
            x_min: self.x_min.saturating_sub(radius),
            x_max: self.x_max.saturating_add(radius).min(last),
            y_min: self.y_min.saturating_sub(radius),
            y_max: self.y_max.saturating_add(radius).min(last),
        }
    }

    /// Tiles of the span in `TileCoord` order.
    fn tiles(&self) -> Result<Vec<TileCoord>, TileIndexError> {
        let mut tiles = Vec::with_capacity(self.len());
        for x in self.x_min..=self.x_max {
            for y in self.y_min..=self.y_max {
                tiles.push(TileCoord::new(self.zoom, x, y)?);
            }
        }
        Ok(tiles)
    }
}

/// Fractional tile positions closer than this to a grid line are snapped onto
/// it, absorbing rounding in the Mercator round trip.
const EDGE_EPSILON: f64 = 1e-9;

/// Inclusive index range covering the half-open fractional span `[lo, hi)`.
fn span(lo: f64, hi: f64, zoom: u8) -> (u32, u32) {
    let last = i64::from(tiles_per_side(zoom)) - 1;
    let first = ((lo + EDGE_EPSILON).floor() as i64).clamp(0, last);
    let end = (((hi - EDGE_EPSILON).ceil() as i64) - 1).clamp(first, last);
    (
        u32::try_from(first).unwrap_or(0),
        u32::try_from(end).unwrap_or(0),
    )
}

/// Union of `tiles` and every tile within Chebyshev distance `radius` of one
/// of them. The result is sorted, deduplicated and clamped to the world grid.
pub fn expand_ring(tiles: &[TileCoord], radius: u32) -> Vec<TileCoord> {
    let mut out = BTreeSet::new();
    for tile in tiles {
        let last = tiles_per_side(tile.z()) - 1;
        let x_range = tile.x().saturating_sub(radius)..=tile.x().saturating_add(radius).min(last);
        for x in x_range {
            let y_range =
                tile.y().saturating_sub(radius)..=tile.y().saturating_add(radius).min(last);
            for y in y_range {
                if let Ok(neighbour) = TileCoord::new(tile.z(), x, y) {
                    out.insert(neighbour);
                }
            }
        }
    }
    out.into_iter().collect()
}

/// Tiles in `want` that are not in `have`, in `want` order without repeats.
pub fn delta(want: &[TileCoord], have: &HashSet<TileCoord>) -> Vec<TileCoord> {
    let mut seen = HashSet::new();
    want.iter()
        .filter(|tile| !have.contains(tile) && seen.insert(**tile))
        .copied()
        .collect()
}

/// Stable key of a single tile.
pub fn key_of(tile: &TileCoord) -> String {
    tile.key()
}

/// Order-independent key of a tile set: sorted tile keys joined by commas.
pub fn key_of_set(tiles: &[TileCoord]) -> String {
    let keys: BTreeSet<String> = tiles.iter().map(TileCoord::key).collect();
    keys.into_iter().collect::<Vec<_>>().join(",")
}

/// `|a ∩ b| / max(|a|, |b|)`.
///
/// Two empty sets are identical (ratio 1); an empty set shares nothing with a
/// non-empty one (ratio 0).
pub fn overlap_ratio(a: &[TileCoord], b: &[TileCoord]) -> f64 {
    let a: HashSet<_> = a.iter().collect();
    let b: HashSet<_> = b.iter().collect();
    let larger = a.len().max(b.len());
    if larger == 0 {
        return 1.0;
    }
    let shared = a.intersection(&b).count();
    shared as f64 / larger as f64
}

/// Geographic union of a tile set, or `None` when the set is empty.
pub fn bounds_of_tiles(tiles: &[TileCoord]) -> Option<Bounds> {
    tiles
        .iter()
        .map(TileCoord::bounds)
        .reduce(|acc, bounds| acc.union(&bounds))
}

/// Resolve a viewport into tiles and the widest ring that fits the caps.
///
/// Returns [`TileIndexError::TooLarge`] when the viewport alone exceeds
/// `limits.max_viewport_tiles`; the check runs before any tile is built.
/// Otherwise the radius is the largest value up to `radius` whose expanded set
/// fits `limits.max_total_tiles`; tiles are never dropped arbitrarily.
pub fn plan_viewport(
    bounds: &Bounds,
    radius: u32,
    limits: &TileLimits,
) -> Result<ViewportPlan, TileIndexError> {
    let span = TileSpan::of(bounds, limits.zoom)?;
    let required = span.len();
    if required > limits.max_viewport_tiles {
        return Err(TileIndexError::TooLarge {
            required,
            max: limits.max_viewport_tiles,
        });
    }
    if required > limits.max_total_tiles {
        return Err(TileIndexError::TooLarge {
            required,
            max: limits.max_total_tiles,
        });
    }

    // Expanded sizes never shrink as the radius grows.
    let (mut fits, mut too_wide) = (0, radius);
    while fits < too_wide {
        let candidate = fits + (too_wide - fits).div_ceil(2);
        if span.expanded(candidate).len() <= limits.max_total_tiles {
            fits = candidate;
        } else {
            too_wide = candidate - 1;
        }
    }

    Ok(ViewportPlan {
        viewport: span.tiles()?,
        radius: fits,
        tiles: span.expanded(fits).tiles()?,
    })
}
