//! Progressive, cancellable viewport prefetching.

use std::{
    collections::{BTreeMap, BTreeSet, HashSet},
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
};

use log::{debug, warn};
use tokio_util::sync::CancellationToken;
use vicinity_core::{
    BatchMetadata, BatchResponse, ConfigHash, DataSource, PointOfInterest, ScorePoint, TileCoord,
    bounds_of_tiles, delta, expand_ring, overlap_ratio, plan_viewport,
};

use crate::{
    AccumulatedStore, ClearReason, FetchError, FetchOutcome, LoadState, PoiSnapshot,
    PrefetchConfig, PrefetchError, PrefetchEvent, PrefetchListener, TileClient, ViewportQuery,
    fetch_with_deadline,
};

/// Request options whose change invalidates every accumulated point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct QueryFingerprint {
    hash: ConfigHash,
    data_source: DataSource,
    normalize: bool,
    buffer_scale_bits: u64,
}

impl QueryFingerprint {
    fn of(query: &ViewportQuery) -> Self {
        Self {
            hash: query.scoring.config_hash(),
            data_source: query.data_source,
            normalize: query.normalize_to_viewport,
            buffer_scale_bits: query.poi_buffer_scale.to_bits(),
        }
    }
}

#[derive(Debug, Default)]
struct OrchestratorState {
    load: LoadState,
    store: AccumulatedStore,
    pois: PoiSnapshot,
    held: HashSet<TileCoord>,
    covered: BTreeSet<TileCoord>,
    viewport: Vec<TileCoord>,
    fingerprint: Option<QueryFingerprint>,
    last_error: Option<String>,
    fallback_notice: bool,
    last_metadata: Option<BatchMetadata>,
}

/// Fetches the tiles around a viewport in expanding rings and accumulates the
/// returned score points.
///
/// Each call to [`fetch`](Self::fetch) starts a new generation. Starting a
/// generation fires the previous generation's cancellation token, and every
/// resumption point compares the captured generation against the current one,
/// discarding results that arrive late. Only one generation is active at a
/// time.
///
/// Accumulated state is discarded when the scoring configuration, the
/// preferred source, the normalisation flag or the POI buffer scale changes,
/// or when the viewport moves so far that fewer than
/// [`PrefetchConfig::zoom_overlap_threshold`] of its tiles are shared with
/// the previous viewport. After every phase the points and POIs are pruned to
/// the bounds of the tiles covered so far.
pub struct PrefetchOrchestrator<C> {
    client: C,
    config: PrefetchConfig,
    generation: AtomicU64,
    cancel: Mutex<CancellationToken>,
    state: Mutex<OrchestratorState>,
    listener: Option<Arc<dyn PrefetchListener>>,
}

impl<C> std::fmt::Debug for PrefetchOrchestrator<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrefetchOrchestrator")
            .field("config", &self.config)
            .field("generation", &self.generation.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl<C: TileClient> PrefetchOrchestrator<C> {
    /// Orchestrator fetching through `client`.
    #[must_use]
    pub fn new(client: C, config: PrefetchConfig) -> Self {
        Self {
            client,
            config,
            generation: AtomicU64::new(0),
            cancel: Mutex::new(CancellationToken::new()),
            state: Mutex::new(OrchestratorState::default()),
            listener: None,
        }
    }

    /// Attach an event listener.
    #[must_use]
    pub fn with_listener(mut self, listener: Arc<dyn PrefetchListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// The batch client.
    #[must_use]
    pub const fn client(&self) -> &C {
        &self.client
    }

    /// Active settings.
    #[must_use]
    pub const fn config(&self) -> &PrefetchConfig {
        &self.config
    }

    /// Current generation; zero before the first fetch.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Loading state of the active generation.
    #[must_use]
    pub fn load_state(&self) -> LoadState {
        self.with_state(|state| state.load.clone())
    }

    /// Accumulated points in coordinate-key order.
    #[must_use]
    pub fn points(&self) -> Vec<ScorePoint> {
        self.with_state(|state| state.store.points().copied().collect())
    }

    /// Number of accumulated points.
    #[must_use]
    pub fn point_count(&self) -> usize {
        self.with_state(|state| state.store.len())
    }

    /// Last-known-good POIs per factor.
    #[must_use]
    pub fn pois(&self) -> BTreeMap<String, Vec<PointOfInterest>> {
        self.with_state(|state| state.pois.to_map())
    }

    /// Tiles covered by the active generation, sorted.
    #[must_use]
    pub fn covered_tiles(&self) -> Vec<TileCoord> {
        self.with_state(|state| state.covered.iter().copied().collect())
    }

    /// Whether the service answered from a source other than the one asked
    /// for during the active generation.
    #[must_use]
    pub fn fallback_notice(&self) -> bool {
        self.with_state(|state| state.fallback_notice)
    }

    /// Acknowledge the fallback notification.
    pub fn dismiss_fallback_notice(&self) {
        self.with_state(|state| state.fallback_notice = false);
    }

    /// Message of the last failure in the active generation.
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.with_state(|state| state.last_error.clone())
    }

    /// Metadata of the most recent merged response.
    #[must_use]
    pub fn last_metadata(&self) -> Option<BatchMetadata> {
        self.with_state(|state| state.last_metadata.clone())
    }

    /// Cancel the active generation without starting another.
    pub fn abort(&self) {
        let (generation, _) = self.begin();
        self.with_state(|state| {
            if !self.is_stale(generation) {
                state.load = LoadState::Aborted;
            }
        });
    }

    /// Fetch the tiles around `query.bounds`, phase by phase.
    ///
    /// Phase 0 is the viewport itself; later phases add one ring each in
    /// progressive mode. Tiles already held are not requested again. A
    /// `yield_now` separates background phases.
    ///
    /// # Errors
    /// Returns [`PrefetchError::TooLarge`] without making any request when the
    /// viewport exceeds the tile cap, and [`PrefetchError::FetchFailed`] when a
    /// batch call fails; remaining phases are then skipped. Supersession is
    /// reported as [`FetchOutcome::Superseded`], not as an error.
    pub async fn fetch(&self, query: &ViewportQuery) -> Result<FetchOutcome, PrefetchError> {
        let (generation, token) = self.begin();
        let plan = match plan_viewport(&query.bounds, query.radius, &self.config.limits) {
            Ok(plan) => plan,
            Err(err) => {
                let error = PrefetchError::from(err);
                self.fail(generation, &error);
                return Err(error);
            }
        };
        if !self.start_generation(generation, query, &plan.viewport, &plan.tiles) {
            return Ok(self.superseded(generation));
        }

        let mut requested_tiles = 0;
        for (index, radius) in self.config.mode.phases(plan.radius).into_iter().enumerate() {
            if index > 0 {
                tokio::task::yield_now().await;
            }
            let Some((ring, missing)) =
                self.begin_phase(generation, radius, index == 0, &plan.viewport)
            else {
                return Ok(self.superseded(generation));
            };
            if !missing.is_empty() {
                requested_tiles += missing.len();
                let request = query.request_for(missing.clone());
                let result =
                    fetch_with_deadline(&self.client, &request, &token, self.config.request_timeout)
                        .await;
                match result {
                    Ok(response) => {
                        if !self.merge(generation, query.data_source, &missing, &response) {
                            return Ok(self.superseded(generation));
                        }
                    }
                    Err(FetchError::Cancelled) => return Ok(self.superseded(generation)),
                    Err(_) if self.is_stale(generation) => {
                        return Ok(self.superseded(generation));
                    }
                    Err(source) => {
                        let error = PrefetchError::FetchFailed { generation, source };
                        self.fail(generation, &error);
                        return Err(error);
                    }
                }
            }
            if !self.finish_phase(generation, radius, &ring, missing.len()) {
                return Ok(self.superseded(generation));
            }
        }

        if !self.complete(generation) {
            return Ok(self.superseded(generation));
        }
        Ok(FetchOutcome::Completed {
            generation,
            radius: plan.radius,
            requested_tiles,
        })
    }

    fn begin(&self) -> (u64, CancellationToken) {
        let token = CancellationToken::new();
        let mut current = self.cancel.lock().unwrap_or_else(PoisonError::into_inner);
        current.cancel();
        *current = token.clone();
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        drop(current);
        (generation, token)
    }

    fn is_stale(&self, generation: u64) -> bool {
        self.generation.load(Ordering::Acquire) != generation
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut OrchestratorState) -> R) -> R {
        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    fn emit(&self, event: &PrefetchEvent) {
        if let Some(listener) = &self.listener {
            listener.on_event(event);
        }
    }

    fn start_generation(
        &self,
        generation: u64,
        query: &ViewportQuery,
        viewport: &[TileCoord],
        planned: &[TileCoord],
    ) -> bool {
        let fingerprint = QueryFingerprint::of(query);
        let hash = fingerprint.hash;
        let threshold = self.config.zoom_overlap_threshold;
        let cleared = self.with_state(|state| {
            if self.is_stale(generation) {
                return None;
            }
            let reason = if state
                .fingerprint
                .is_some_and(|previous| previous != fingerprint)
            {
                Some(ClearReason::ConfigChanged)
            } else if !state.viewport.is_empty()
                && overlap_ratio(&state.viewport, viewport) < threshold
            {
                Some(ClearReason::ZoomChanged)
            } else {
                None
            };
            if reason.is_some() {
                state.store.clear();
                state.pois.clear();
                state.held.clear();
            }
            let reusable: HashSet<&TileCoord> = planned.iter().collect();
            state.held.retain(|tile| reusable.contains(tile));
            state.covered = state.held.iter().copied().collect();
            state.viewport = viewport.to_vec();
            state.fingerprint = Some(fingerprint);
            state.last_error = None;
            state.fallback_notice = false;
            Some(reason)
        });
        let Some(clear) = cleared else {
            return false;
        };
        debug!(
            "generation {generation}: {} viewport tiles, config {hash}",
            viewport.len()
        );
        self.emit(&PrefetchEvent::Started {
            generation,
            viewport_tiles: viewport.len(),
        });
        if let Some(reason) = clear {
            debug!("generation {generation}: cleared accumulated state ({reason:?})");
            self.emit(&PrefetchEvent::Cleared { generation, reason });
        }
        true
    }

    fn begin_phase(
        &self,
        generation: u64,
        radius: u32,
        blocking: bool,
        viewport: &[TileCoord],
    ) -> Option<(Vec<TileCoord>, Vec<TileCoord>)> {
        self.with_state(|state| {
            if self.is_stale(generation) {
                return None;
            }
            state.load = LoadState::Loading {
                phase: radius,
                blocking,
            };
            let ring = expand_ring(viewport, radius);
            let missing = delta(&ring, &state.held);
            Some((ring, missing))
        })
    }

    fn merge(
        &self,
        generation: u64,
        requested: DataSource,
        tiles: &[TileCoord],
        response: &BatchResponse,
    ) -> bool {
        let actual = response.metadata.data_source;
        let merged = self.with_state(|state| {
            if self.is_stale(generation) {
                return false;
            }
            for result in response.tiles.values() {
                state.store.merge(&result.points);
            }
            state.pois.merge(&response.pois);
            state.held.extend(tiles.iter().copied());
            state.last_metadata = Some(response.metadata.clone());
            if actual != requested {
                state.fallback_notice = true;
            }
            true
        });
        if merged && actual != requested {
            warn!(
                "generation {generation}: asked for {} data, service answered from {}",
                requested.as_str(),
                actual.as_str()
            );
            self.emit(&PrefetchEvent::SourceFallback {
                generation,
                requested,
                actual,
            });
        }
        merged
    }

    fn finish_phase(
        &self,
        generation: u64,
        radius: u32,
        ring: &[TileCoord],
        requested_tiles: usize,
    ) -> bool {
        let points_held = self.with_state(|state| {
            if self.is_stale(generation) {
                return None;
            }
            state.covered.extend(ring.iter().copied());
            let covered: Vec<TileCoord> = state.covered.iter().copied().collect();
            if let Some(bounds) = bounds_of_tiles(&covered) {
                state.store.prune(&bounds);
                state.pois.prune(&bounds);
            }
            Some(state.store.len())
        });
        let Some(points_held) = points_held else {
            return false;
        };
        debug!(
            "generation {generation}: phase {radius} requested {requested_tiles} tiles, holding {points_held} points"
        );
        self.emit(&PrefetchEvent::PhaseMerged {
            generation,
            phase: radius,
            requested_tiles,
            points_held,
        });
        true
    }

    fn complete(&self, generation: u64) -> bool {
        let done = self.with_state(|state| {
            if self.is_stale(generation) {
                return false;
            }
            state.load = LoadState::Done;
            true
        });
        if done {
            self.emit(&PrefetchEvent::Completed { generation });
        }
        done
    }

    fn superseded(&self, generation: u64) -> FetchOutcome {
        debug!("generation {generation} superseded; discarding its results");
        self.emit(&PrefetchEvent::Superseded { generation });
        FetchOutcome::Superseded { generation }
    }

    fn fail(&self, generation: u64, error: &PrefetchError) {
        let message = error.to_string();
        let current = self.with_state(|state| {
            if self.is_stale(generation) {
                return false;
            }
            state.load = LoadState::Failed {
                message: message.clone(),
            };
            state.last_error = Some(message.clone());
            true
        });
        if current {
            warn!("generation {generation} failed: {message}");
            self.emit(&PrefetchEvent::Failed {
                generation,
                message,
            });
        }
    }
}
