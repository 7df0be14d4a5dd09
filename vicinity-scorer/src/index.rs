//! Per-factor spatial indices for nearest-POI lookups.
#![forbid(unsafe_code)]

use geo::{Distance, Haversine, Point};
use rstar::{AABB, RTree};
use vicinity_core::{Factor, PointOfInterest};

/// Conservative metres per degree of latitude. Slightly below the true value
/// so that degree envelopes always cover the requested radius.
const METRES_PER_DEGREE: f64 = 110_000.0;

/// Highest latitude used when widening longitude envelopes.
const ENVELOPE_LAT_LIMIT: f64 = 89.0;

/// R\*-trees of the POIs feeding each factor, in factor order.
#[derive(Debug)]
pub struct FactorIndex {
    trees: Vec<RTree<PointOfInterest>>,
}

impl FactorIndex {
    /// Partition `pois` by the categories of each factor. A POI may feed
    /// several factors.
    #[must_use]
    pub fn build(factors: &[Factor], pois: &[PointOfInterest]) -> Self {
        let trees = factors
            .iter()
            .map(|factor| {
                let matching: Vec<_> = pois
                    .iter()
                    .filter(|poi| factor.matches_category(&poi.category))
                    .cloned()
                    .collect();
                RTree::bulk_load(matching)
            })
            .collect();
        Self { trees }
    }

    /// Great-circle distance in metres from `(lat, lng)` to the nearest POI
    /// of the factor at `position`, if one lies within `max_distance`.
    #[must_use]
    pub fn nearest_within(
        &self,
        position: usize,
        lat: f64,
        lng: f64,
        max_distance: f64,
    ) -> Option<f64> {
        let tree = self.trees.get(position)?;
        let origin = Point::new(lng, lat);
        tree.locate_in_envelope_intersecting(&search_envelope(lat, lng, max_distance))
            .map(|poi| Haversine.distance(origin, Point::new(poi.lng, poi.lat)))
            .filter(|distance| *distance <= max_distance)
            .min_by(f64::total_cmp)
    }
}

#[expect(
    clippy::float_arithmetic,
    reason = "envelope sizes are derived from metre radii"
)]
fn search_envelope(lat: f64, lng: f64, radius: f64) -> AABB<[f64; 2]> {
    let dlat = radius / METRES_PER_DEGREE;
    let widest = (lat.abs() + dlat).min(ENVELOPE_LAT_LIMIT);
    let dlng = (radius / (METRES_PER_DEGREE * widest.to_radians().cos())).min(180.0);
    AABB::from_corners([lng - dlng, lat - dlat], [lng + dlng, lat + dlat])
}
