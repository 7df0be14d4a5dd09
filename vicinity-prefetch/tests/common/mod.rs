//! In-process batch service shared by the integration suites.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use vicinity_cache::{CacheConfig, TileCache};
use vicinity_core::{
    BatchRequest, BatchResponse, Bounds, DistanceCurve, Factor, PointOfInterest, ScoringConfig,
    TileCoord, bounds_of_tiles, test_support::ToggleStore,
};
use vicinity_prefetch::{FetchError, PrefetchEvent, PrefetchListener, TileClient};
use vicinity_service::{BatchTileService, PoiSources, ServiceConfig};

pub const X0: u32 = 8800;
pub const Y0: u32 = 5373;

/// Calls the service on the blocking pool, as the HTTP handler does.
pub struct InProcessClient {
    service: Arc<BatchTileService>,
    calls: AtomicUsize,
}

impl InProcessClient {
    pub fn new(service: Arc<BatchTileService>) -> Self {
        Self {
            service,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TileClient for InProcessClient {
    async fn fetch_batch(&self, request: &BatchRequest) -> Result<BatchResponse, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let service = Arc::clone(&self.service);
        let owned = request.clone();
        let joined = tokio::task::spawn_blocking(move || service.handle(&owned))
            .await
            .map_err(|err| FetchError::Network {
                url: String::from("in-process"),
                message: err.to_string(),
            })?;
        joined.map_err(|err| FetchError::Http {
            url: String::from("in-process"),
            status: if err.is_client_error() { 400 } else { 503 },
            message: err.to_string(),
        })
    }
}

#[derive(Default)]
pub struct Events(Mutex<Vec<PrefetchEvent>>);

impl Events {
    pub fn snapshot(&self) -> Vec<PrefetchEvent> {
        self.0.lock().expect("events lock").clone()
    }
}

impl PrefetchListener for Events {
    fn on_event(&self, event: &PrefetchEvent) {
        self.0.lock().expect("events lock").push(event.clone());
    }
}

pub fn tile(x: u32, y: u32) -> TileCoord {
    TileCoord::new(14, x, y).expect("valid tile")
}

/// Bounds of the `side × side` block of tiles anchored at `(X0, Y0)`.
pub fn viewport(side: u32) -> Bounds {
    let tiles: Vec<TileCoord> = (X0..X0 + side)
        .flat_map(|x| (Y0..Y0 + side).map(move |y| tile(x, y)))
        .collect();
    bounds_of_tiles(&tiles).expect("non-empty viewport")
}

/// The corner shared by the four tiles of the 2x2 viewport.
pub fn shared_corner() -> (f64, f64) {
    let bounds = tile(X0 + 1, Y0 + 1).bounds();
    (bounds.north, bounds.west)
}

pub fn park_at_corner() -> PointOfInterest {
    let (lat, lng) = shared_corner();
    PointOfInterest::new(1, lat, lng, "park")
}

pub fn scoring(sensitivity: f64) -> ScoringConfig {
    ScoringConfig::new(vec![Factor::new("park", 80.0, 1_000.0)])
        .with_curve(DistanceCurve::Linear)
        .with_sensitivity(sensitivity)
}

pub fn service_with(primary: ToggleStore, fallback: ToggleStore) -> Arc<BatchTileService> {
    Arc::new(BatchTileService::new(
        Arc::new(TileCache::in_memory(CacheConfig::default())),
        PoiSources::new(Arc::new(primary), Arc::new(fallback)),
        ServiceConfig::default(),
    ))
}

pub fn healthy_service() -> Arc<BatchTileService> {
    service_with(
        ToggleStore::new(vec![park_at_corner()]),
        ToggleStore::new(vec![park_at_corner()]),
    )
}
