//! Test doubles for POI sources, shared by unit and behaviour tests across the
//! workspace.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use geo::Rect;

use crate::{MemoryPoiStore, PoiStore, PoiStoreError, PointOfInterest};

/// POI source that can be switched off to simulate an outage.
#[derive(Debug, Default)]
pub struct ToggleStore {
    inner: MemoryPoiStore,
    offline: AtomicBool,
    queries: AtomicUsize,
}

impl ToggleStore {
    /// Online store holding `pois`.
    pub fn new(pois: Vec<PointOfInterest>) -> Self {
        Self {
            inner: MemoryPoiStore::new(pois),
            offline: AtomicBool::new(false),
            queries: AtomicUsize::new(0),
        }
    }

    /// Store that fails every query.
    pub fn offline() -> Self {
        let store = Self::default();
        store.set_offline(true);
        store
    }

    /// Switch the simulated outage on or off.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of queries received, including failed ones.
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

impl PoiStore for ToggleStore {
    fn get_pois_in_bbox(&self, bbox: &Rect<f64>) -> Result<Vec<PointOfInterest>, PoiStoreError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(PoiStoreError::Unavailable {
                message: String::from("simulated outage"),
            });
        }
        self.inner.get_pois_in_bbox(bbox)
    }
}
