//! The orchestrator driving a real batch service in process.

mod common;

use std::{collections::BTreeMap, sync::Arc};

use common::{
    Events, InProcessClient, healthy_service, park_at_corner, scoring, service_with,
    shared_corner, viewport,
};
use rstest::rstest;
use vicinity_core::{DataSource, coord_key, test_support::ToggleStore};
use vicinity_prefetch::{
    ClearReason, PrefetchConfig, PrefetchError, PrefetchEvent, PrefetchOrchestrator,
    ViewportQuery,
};
use vicinity_service::BatchTileService;

struct Session {
    client: Arc<InProcessClient>,
    events: Arc<Events>,
    orchestrator: PrefetchOrchestrator<Arc<InProcessClient>>,
}

fn session(service: Arc<BatchTileService>, config: PrefetchConfig) -> Session {
    let client = Arc::new(InProcessClient::new(service));
    let events = Arc::new(Events::default());
    let orchestrator =
        PrefetchOrchestrator::new(Arc::clone(&client), config).with_listener(events.clone());
    Session {
        client,
        events,
        orchestrator,
    }
}

fn values_by_key(session: &Session) -> BTreeMap<String, f64> {
    session
        .orchestrator
        .points()
        .iter()
        .map(|p| (p.coord_key(), p.value))
        .collect()
}

#[rstest]
#[tokio::test]
async fn a_poi_at_the_viewport_centre_scores_the_full_weight() {
    let s = session(healthy_service(), PrefetchConfig::default());
    let query = ViewportQuery::new(viewport(2), scoring(1.0)).with_radius(0);
    s.orchestrator.fetch(&query).await.expect("fetch");
    let (lat, lng) = shared_corner();
    let values = values_by_key(&s);
    let at_poi = values.get(&coord_key(lat, lng)).copied().expect("sample at the POI");
    assert!((at_poi - 80.0).abs() < 0.5, "scored {at_poi}");
    assert!(values.values().all(|v| *v <= at_poi));
    assert_eq!(s.orchestrator.covered_tiles().len(), 4);
}

#[rstest]
#[tokio::test]
async fn a_second_session_hits_the_score_cache() {
    let service = healthy_service();
    let query = ViewportQuery::new(viewport(2), scoring(1.0)).with_radius(0);
    let first = session(Arc::clone(&service), PrefetchConfig::default());
    first.orchestrator.fetch(&query).await.expect("first fetch");

    let second = session(service, PrefetchConfig::default());
    second.orchestrator.fetch(&query).await.expect("second fetch");
    let metadata = second.orchestrator.last_metadata().expect("metadata");
    assert!(metadata.cache_stats.scores.l1_hits >= 1);
    assert_eq!(metadata.cached_tiles, 4);
    assert_eq!(values_by_key(&first), values_by_key(&second));
}

#[rstest]
#[tokio::test]
async fn widening_the_radius_only_adds_points() {
    let s = session(healthy_service(), PrefetchConfig::default());
    let narrow = ViewportQuery::new(viewport(2), scoring(1.0)).with_radius(0);
    s.orchestrator.fetch(&narrow).await.expect("narrow fetch");
    let before = values_by_key(&s);

    s.orchestrator
        .fetch(&narrow.clone().with_radius(2))
        .await
        .expect("wide fetch");
    let after = values_by_key(&s);
    assert!(after.len() > before.len());
    for (key, value) in &before {
        assert_eq!(after.get(key), Some(value), "point {key} changed");
    }
}

#[rstest]
#[tokio::test]
async fn a_new_sensitivity_clears_before_merging() {
    let s = session(healthy_service(), PrefetchConfig::default());
    let query = ViewportQuery::new(viewport(2), scoring(1.0)).with_radius(1);
    s.orchestrator.fetch(&query).await.expect("first fetch");
    let calls = s.client.calls();

    let sharper = ViewportQuery::new(viewport(2), scoring(2.0)).with_radius(1);
    s.orchestrator.fetch(&sharper).await.expect("second fetch");
    let events = s.events.snapshot();
    let cleared = events
        .iter()
        .position(|e| {
            *e == PrefetchEvent::Cleared {
                generation: 2,
                reason: ClearReason::ConfigChanged,
            }
        })
        .expect("cleared");
    let merged = events
        .iter()
        .position(|e| matches!(e, PrefetchEvent::PhaseMerged { generation: 2, .. }))
        .expect("merged");
    assert!(cleared < merged);
    assert_eq!(s.client.calls(), calls + 2);
    assert!(s.orchestrator.point_count() > 0);
}

#[rstest]
#[tokio::test]
async fn oversized_viewports_make_no_calls() {
    let s = session(healthy_service(), PrefetchConfig::default());
    let query = ViewportQuery::new(viewport(7), scoring(1.0));
    let err = s.orchestrator.fetch(&query).await.expect_err("too large");
    assert_eq!(
        err,
        PrefetchError::TooLarge {
            required: 49,
            max: 48,
        }
    );
    assert_eq!(s.client.calls(), 0);
}

#[rstest]
#[tokio::test]
async fn a_primary_outage_raises_the_fallback_notice() {
    let s = session(
        service_with(
            ToggleStore::offline(),
            ToggleStore::new(vec![park_at_corner()]),
        ),
        PrefetchConfig::default(),
    );
    let query = ViewportQuery::new(viewport(2), scoring(1.0))
        .with_radius(0)
        .with_data_source(DataSource::Primary);
    s.orchestrator.fetch(&query).await.expect("fetch");
    assert!(s.orchestrator.fallback_notice());
    let metadata = s.orchestrator.last_metadata().expect("metadata");
    assert_eq!(metadata.data_source, DataSource::Fallback);
    assert_eq!(
        s.orchestrator.pois().get("park").map(Vec::len),
        Some(1),
        "the fallback POI is kept"
    );
}
