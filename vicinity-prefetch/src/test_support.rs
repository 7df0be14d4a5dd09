//! Test doubles for the batch client and event listener.

use std::{
    collections::BTreeMap,
    sync::{
        Mutex, PoisonError,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use vicinity_core::{
    BatchMetadata, BatchRequest, BatchResponse, CacheStats, DataSource, ScorePoint, TileResult,
};

use crate::{FetchError, PrefetchEvent, PrefetchListener, TileClient};

/// Client that answers every tile with two synthetic points: one at the tile
/// centre and one at its north-west corner.
///
/// Requests are recorded, and the client can be made slow or failing.
#[derive(Debug, Default)]
pub struct StubTileClient {
    delay: Duration,
    failure: Option<FetchError>,
    answer_source: Option<DataSource>,
    calls: AtomicUsize,
    requests: Mutex<Vec<BatchRequest>>,
}

impl StubTileClient {
    /// Client that answers immediately.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep for `delay` before answering.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fail every call with `error`.
    #[must_use]
    pub fn failing(mut self, error: FetchError) -> Self {
        self.failure = Some(error);
        self
    }

    /// Report `source` in the metadata regardless of what was asked for.
    #[must_use]
    pub const fn answering_from(mut self, source: DataSource) -> Self {
        self.answer_source = Some(source);
        self
    }

    /// Calls received, including failed ones.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Requests received, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<BatchRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn respond(&self, request: &BatchRequest) -> BatchResponse {
        let tiles: BTreeMap<String, TileResult> = request
            .tiles
            .iter()
            .map(|tile| {
                let (lat, lng) = tile.center();
                let bounds = tile.bounds();
                let points = vec![
                    ScorePoint {
                        lat,
                        lng,
                        value: 50.0,
                    },
                    ScorePoint {
                        lat: bounds.north,
                        lng: bounds.west,
                        value: 10.0,
                    },
                ];
                (
                    tile.key(),
                    TileResult {
                        points,
                        cached: false,
                    },
                )
            })
            .collect();
        BatchResponse {
            metadata: BatchMetadata {
                total_tiles: tiles.len(),
                cached_tiles: 0,
                computed_tiles: tiles.len(),
                compute_time_ms: 0,
                data_source: self.answer_source.unwrap_or(request.data_source),
                cache_stats: CacheStats::default(),
            },
            tiles,
            pois: BTreeMap::new(),
        }
    }
}

#[async_trait]
impl TileClient for StubTileClient {
    async fn fetch_batch(&self, request: &BatchRequest) -> Result<BatchResponse, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        Ok(self.respond(request))
    }
}

/// Listener that keeps every event it sees.
#[derive(Debug, Default)]
pub struct RecordingListener {
    events: Mutex<Vec<PrefetchEvent>>,
}

impl RecordingListener {
    /// Empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Events seen so far, in order.
    #[must_use]
    pub fn events(&self) -> Vec<PrefetchEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Index of the first event matching `predicate`.
    #[must_use]
    pub fn position(&self, predicate: impl Fn(&PrefetchEvent) -> bool) -> Option<usize> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .position(predicate)
    }
}

impl PrefetchListener for RecordingListener {
    fn on_event(&self, event: &PrefetchEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}
