//! Accumulated score points and the last-known-good POI snapshot.

use std::collections::{BTreeMap, HashMap};

use vicinity_core::{Bounds, PointOfInterest, ScorePoint};

/// Score points merged across phases, keyed by coordinate.
///
/// Merging is last-write-wins per coordinate, so adjacent tiles sharing edge
/// samples collapse to one point and merging a batch twice is a no-op.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccumulatedStore {
    points: BTreeMap<String, ScorePoint>,
}

impl AccumulatedStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge `points`, replacing any held at the same coordinate.
    pub fn merge<'a, I>(&mut self, points: I)
    where
        I: IntoIterator<Item = &'a ScorePoint>,
    {
        for point in points {
            self.points.insert(point.coord_key(), *point);
        }
    }

    /// Drop every point outside `bounds`.
    pub fn prune(&mut self, bounds: &Bounds) {
        self.points
            .retain(|_, point| bounds.contains(point.lat, point.lng));
    }

    /// Remove everything.
    pub fn clear(&mut self) {
        self.points.clear();
    }

    /// Number of distinct coordinates held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the store holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Point held at `coord_key`, if any.
    #[must_use]
    pub fn get(&self, coord_key: &str) -> Option<&ScorePoint> {
        self.points.get(coord_key)
    }

    /// Held points in coordinate-key order.
    pub fn points(&self) -> impl Iterator<Item = &ScorePoint> {
        self.points.values()
    }
}

/// POIs per factor id, deduplicated by coordinate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoiSnapshot {
    by_factor: BTreeMap<String, HashMap<String, PointOfInterest>>,
}

impl PoiSnapshot {
    /// Merge a response's POIs; later POIs replace earlier ones at the same
    /// coordinate.
    pub fn merge(&mut self, pois: &BTreeMap<String, Vec<PointOfInterest>>) {
        for (factor, list) in pois {
            let held = self.by_factor.entry(factor.clone()).or_default();
            for poi in list {
                held.insert(poi.coord_key(), poi.clone());
            }
        }
    }

    /// Drop every POI outside `bounds`.
    pub fn prune(&mut self, bounds: &Bounds) {
        for held in self.by_factor.values_mut() {
            held.retain(|_, poi| bounds.contains(poi.lat, poi.lng));
        }
        self.by_factor.retain(|_, held| !held.is_empty());
    }

    /// Remove everything.
    pub fn clear(&mut self) {
        self.by_factor.clear();
    }

    /// Total POIs held across factors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_factor.values().map(HashMap::len).sum()
    }

    /// Whether the snapshot holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_factor.is_empty()
    }

    /// POIs per factor, each list ordered by id.
    #[must_use]
    pub fn to_map(&self) -> BTreeMap<String, Vec<PointOfInterest>> {
        self.by_factor
            .iter()
            .map(|(factor, held)| {
                let mut list: Vec<PointOfInterest> = held.values().cloned().collect();
                list.sort_by_key(|poi| poi.id);
                (factor.clone(), list)
            })
            .collect()
    }
}
