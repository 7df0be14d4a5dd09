//! Behavioural tests for `BatchTileService` using rstest-bdd.

use std::{cell::RefCell, sync::Arc};

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use vicinity_cache::{CacheConfig, TileCache};
use vicinity_core::{
    BatchRequest, BatchResponse, DataSource, Factor, PointOfInterest, ScoringConfig, TileCoord,
    test_support::ToggleStore,
};
use vicinity_service::{BatchTileService, PoiSources, ServiceConfig};

struct ServiceWorld {
    tile: TileCoord,
    pois: RefCell<Vec<PointOfInterest>>,
    primary_offline: RefCell<bool>,
    factor_enabled: RefCell<bool>,
    responses: RefCell<Vec<BatchResponse>>,
}

#[fixture]
fn world() -> ServiceWorld {
    ServiceWorld {
        tile: TileCoord::new(14, 8800, 5373).expect("valid tile"),
        pois: RefCell::new(Vec::new()),
        primary_offline: RefCell::new(false),
        factor_enabled: RefCell::new(true),
        responses: RefCell::new(Vec::new()),
    }
}

fn run(world: &ServiceWorld, times: usize) {
    let pois = world.pois.borrow().clone();
    let primary = ToggleStore::new(pois.clone());
    primary.set_offline(*world.primary_offline.borrow());
    let service = BatchTileService::new(
        Arc::new(TileCache::in_memory(CacheConfig::default())),
        PoiSources::new(Arc::new(primary), Arc::new(ToggleStore::new(pois))),
        ServiceConfig::default(),
    );
    let config = ScoringConfig::new(vec![
        Factor::new("park", 80.0, 1_000.0).with_enabled(*world.factor_enabled.borrow()),
    ]);
    let request = BatchRequest::new(vec![world.tile], config);
    for _ in 0..times {
        let response = service.handle(&request).expect("batch succeeds");
        world.responses.borrow_mut().push(response);
    }
}

fn last_response(world: &ServiceWorld) -> BatchResponse {
    world
        .responses
        .borrow()
        .last()
        .cloned()
        .expect("a request was made")
}

#[given("a park at the centre of the tile")]
fn given_park(world: &ServiceWorld) {
    let (lat, lng) = world.tile.center();
    world
        .pois
        .borrow_mut()
        .push(PointOfInterest::new(1, lat, lng, "park"));
}

#[given("the primary source is offline")]
fn given_offline(world: &ServiceWorld) {
    world.primary_offline.replace(true);
}

#[given("the park factor is disabled")]
fn given_disabled(world: &ServiceWorld) {
    world.factor_enabled.replace(false);
}

#[when("I request the tile")]
fn when_request(world: &ServiceWorld) {
    run(world, 1);
}

#[when("I request the tile twice")]
fn when_request_twice(world: &ServiceWorld) {
    run(world, 2);
}

#[then("the second response reports {count} cached tile")]
fn then_cached(world: &ServiceWorld, count: usize) {
    assert_eq!(last_response(world).metadata.cached_tiles, count);
}

#[then("the score cache reports at least {hits} L1 hit")]
fn then_l1_hits(world: &ServiceWorld, hits: u64) {
    assert!(last_response(world).metadata.cache_stats.scores.l1_hits >= hits);
}

#[then("the response reports the fallback source")]
fn then_fallback(world: &ServiceWorld) {
    assert_eq!(
        last_response(world).metadata.data_source,
        DataSource::Fallback
    );
}

#[then("every tile in the response is empty")]
fn then_empty(world: &ServiceWorld) {
    let response = last_response(world);
    assert!(!response.tiles.is_empty());
    assert!(response.tiles.values().all(|t| t.points.is_empty()));
}

#[scenario(path = "tests/features/batch_service.feature", index = 0)]
fn repeated_batch(world: ServiceWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/batch_service.feature", index = 1)]
fn primary_outage(world: ServiceWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/batch_service.feature", index = 2)]
fn disabled_factors(world: ServiceWorld) {
    let _ = world;
}
