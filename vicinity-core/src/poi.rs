//! Points of interest and score samples.

use geo::Coord;
use rstar::{AABB, RTreeObject};
use serde::{Deserialize, Serialize};

/// Categorised location feeding the score field.
///
/// POIs are immutable once cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointOfInterest {
    /// Persistent identifier.
    pub id: u64,
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lng: f64,
    /// Category matched against factor categories.
    pub category: String,
}

impl PointOfInterest {
    /// Build a POI.
    pub fn new(id: u64, lat: f64, lng: f64, category: impl Into<String>) -> Self {
        Self {
            id,
            lat,
            lng,
            category: category.into(),
        }
    }

    /// Location as a `geo` coordinate (`x = lng`, `y = lat`).
    pub const fn location(&self) -> Coord<f64> {
        Coord {
            x: self.lng,
            y: self.lat,
        }
    }

    /// Coordinate key used to deduplicate POIs across tiles.
    pub fn coord_key(&self) -> String {
        coord_key(self.lat, self.lng)
    }
}

impl RTreeObject for PointOfInterest {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.lng, self.lat])
    }
}

/// A scored lattice sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScorePoint {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lng: f64,
    /// Score on the natural `[-100, 100]` scale, or `[0, 1]` once normalised.
    pub value: f64,
}

impl ScorePoint {
    /// Coordinate key; samples shared by neighbouring tiles collide on it.
    pub fn coord_key(&self) -> String {
        coord_key(self.lat, self.lng)
    }
}

/// Fixed-precision `"lat,lng"` key, roughly 0.1 m resolution.
pub fn coord_key(lat: f64, lng: f64) -> String {
    format!("{lat:.6},{lng:.6}")
}
