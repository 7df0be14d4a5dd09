//! Data access for points of interest.
//!
//! The `PoiStore` trait is a read-only, fallible bounding-box query. Primary
//! sources can go away at runtime, so callers are expected to handle errors
//! by switching to a secondary store.

use geo::Rect;
use rstar::{AABB, RTree};
use thiserror::Error;

use crate::PointOfInterest;

#[cfg(feature = "store-sqlite")]
mod sqlite;

#[cfg(feature = "store-sqlite")]
pub use sqlite::{SqlitePoiStore, SqlitePoiStoreError, write_poi_database};

/// Failure reported by a [`PoiStore`].
#[derive(Debug, Error)]
pub enum PoiStoreError {
    /// The source cannot currently answer queries.
    #[error("POI source unavailable: {message}")]
    Unavailable {
        /// Human-readable reason.
        message: String,
    },
    /// The backend failed while running a query.
    #[error("POI query failed: {source}")]
    Backend {
        /// Underlying backend error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Read-only access to categorised points of interest.
///
/// The bounding box uses WGS84 coordinates (`x = longitude`, `y = latitude`)
/// and includes its boundary. Regions crossing the antimeridian must be split
/// by the caller.
///
/// # Examples
///
/// ```rust
/// use geo::{Coord, Rect};
/// use vicinity_core::{MemoryPoiStore, PoiStore, PointOfInterest};
///
/// # fn main() -> Result<(), vicinity_core::PoiStoreError> {
/// let poi = PointOfInterest::new(1, 0.0, 0.0, "park");
/// let store = MemoryPoiStore::new(vec![poi.clone()]);
/// let bbox = Rect::new(Coord { x: -1.0, y: -1.0 }, Coord { x: 1.0, y: 1.0 });
/// assert_eq!(store.get_pois_in_bbox(&bbox)?, vec![poi]);
/// # Ok(())
/// # }
/// ```
pub trait PoiStore: Send + Sync {
    /// Return all POIs inside `bbox`, ordered by id.
    fn get_pois_in_bbox(&self, bbox: &Rect<f64>) -> Result<Vec<PointOfInterest>, PoiStoreError>;
}

/// In-memory store backed by an R\*-tree.
#[derive(Debug, Default)]
pub struct MemoryPoiStore {
    index: RTree<PointOfInterest>,
}

impl MemoryPoiStore {
    /// Bulk-load a store from POIs.
    pub fn new(pois: Vec<PointOfInterest>) -> Self {
        Self {
            index: RTree::bulk_load(pois),
        }
    }

    /// Number of POIs held.
    pub fn len(&self) -> usize {
        self.index.size()
    }

    /// Whether the store holds no POIs.
    pub fn is_empty(&self) -> bool {
        self.index.size() == 0
    }
}

impl FromIterator<PointOfInterest> for MemoryPoiStore {
    fn from_iter<I: IntoIterator<Item = PointOfInterest>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl PoiStore for MemoryPoiStore {
    fn get_pois_in_bbox(&self, bbox: &Rect<f64>) -> Result<Vec<PointOfInterest>, PoiStoreError> {
        let envelope =
            AABB::from_corners([bbox.min().x, bbox.min().y], [bbox.max().x, bbox.max().y]);
        let mut pois: Vec<_> = self
            .index
            .locate_in_envelope_intersecting(&envelope)
            .cloned()
            .collect();
        pois.sort_unstable_by_key(|poi| poi.id);
        Ok(pois)
    }
}
