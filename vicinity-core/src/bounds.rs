//! Geographic rectangles in WGS84 degrees.
//!
//! Bounds do not model regions crossing the antimeridian. Callers needing such
//! a viewport must split it into two rectangles.

use geo::{Coord, Rect};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Axis-aligned latitude/longitude rectangle.
///
/// # Examples
///
/// ```
/// use vicinity_core::Bounds;
///
/// # fn main() -> Result<(), vicinity_core::BoundsError> {
/// let bounds = Bounds::new(52.53, 52.50, 13.42, 13.38)?;
/// assert!(bounds.contains(52.51, 13.40));
/// assert!(!bounds.contains(52.60, 13.40));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    /// Northern edge latitude.
    pub north: f64,
    /// Southern edge latitude.
    pub south: f64,
    /// Eastern edge longitude.
    pub east: f64,
    /// Western edge longitude.
    pub west: f64,
}

/// Errors returned by [`Bounds::new`] and [`Bounds::validate`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BoundsError {
    /// A coordinate was NaN or infinite.
    #[error("bounds must contain finite coordinates")]
    NonFinite,
    /// `north` was not strictly greater than `south`.
    #[error("north ({north}) must be greater than south ({south})")]
    InvertedLatitude {
        /// Supplied northern edge.
        north: f64,
        /// Supplied southern edge.
        south: f64,
    },
    /// `east` was not strictly greater than `west`.
    #[error("east ({east}) must be greater than west ({west})")]
    InvertedLongitude {
        /// Supplied eastern edge.
        east: f64,
        /// Supplied western edge.
        west: f64,
    },
}

impl Bounds {
    /// Validate and construct a rectangle.
    pub fn new(north: f64, south: f64, east: f64, west: f64) -> Result<Self, BoundsError> {
        let bounds = Self {
            north,
            south,
            east,
            west,
        };
        bounds.validate()?;
        Ok(bounds)
    }

    /// Check the ordering and finiteness invariants.
    ///
    /// Deserialised bounds bypass [`Bounds::new`], so request handlers call
    /// this before using them.
    pub fn validate(&self) -> Result<(), BoundsError> {
        let edges = [self.north, self.south, self.east, self.west];
        if edges.iter().any(|edge| !edge.is_finite()) {
            return Err(BoundsError::NonFinite);
        }
        if self.north <= self.south {
            return Err(BoundsError::InvertedLatitude {
                north: self.north,
                south: self.south,
            });
        }
        if self.east <= self.west {
            return Err(BoundsError::InvertedLongitude {
                east: self.east,
                west: self.west,
            });
        }
        Ok(())
    }

    /// Report whether a point lies inside the rectangle. Edges are inclusive.
    pub fn contains(&self, lat: f64, lng: f64) -> bool {
        (self.south..=self.north).contains(&lat) && (self.west..=self.east).contains(&lng)
    }

    /// Return the geometric centre as `(lat, lng)`.
    pub fn center(&self) -> (f64, f64) {
        (
            (self.north + self.south) / 2.0,
            (self.east + self.west) / 2.0,
        )
    }

    /// Smallest rectangle covering both `self` and `other`.
    pub fn union(&self, other: &Self) -> Self {
        Self {
            north: self.north.max(other.north),
            south: self.south.min(other.south),
            east: self.east.max(other.east),
            west: self.west.min(other.west),
        }
    }

    /// Grow the rectangle by a margin in degrees on every side.
    ///
    /// Latitudes are clamped to the poles.
    pub fn expand(&self, lat_margin: f64, lng_margin: f64) -> Self {
        Self {
            north: (self.north + lat_margin).min(90.0),
            south: (self.south - lat_margin).max(-90.0),
            east: self.east + lng_margin,
            west: self.west - lng_margin,
        }
    }

    /// Convert into a `geo` rectangle with `x = longitude`, `y = latitude`.
    pub fn to_rect(&self) -> Rect<f64> {
        Rect::new(
            Coord {
                x: self.west,
                y: self.south,
            },
            Coord {
                x: self.east,
                y: self.north,
            },
        )
    }
}
