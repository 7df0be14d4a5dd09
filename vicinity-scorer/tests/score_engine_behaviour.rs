//! Behavioural tests for `ScoreEngine` using rstest-bdd.

use std::cell::RefCell;

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use vicinity_core::{Factor, PointOfInterest, ScorePoint, ScoringConfig, TileCoord};
use vicinity_scorer::{ScoreEngine, ScoreEngineError};

#[derive(Debug)]
struct ScoringWorld {
    tile: TileCoord,
    factors: RefCell<Vec<Factor>>,
    pois: RefCell<Vec<PointOfInterest>>,
    points: RefCell<Vec<ScorePoint>>,
    engine_error: RefCell<Option<ScoreEngineError>>,
}

#[fixture]
fn world() -> ScoringWorld {
    ScoringWorld {
        tile: TileCoord::new(14, 8800, 5373).expect("valid tile"),
        factors: RefCell::new(Vec::new()),
        pois: RefCell::new(Vec::new()),
        points: RefCell::new(Vec::new()),
        engine_error: RefCell::new(None),
    }
}

fn add_corner_poi(world: &ScoringWorld, category: &str) {
    let bounds = world.tile.bounds();
    let id = u64::try_from(world.pois.borrow().len()).expect("small dataset");
    world
        .pois
        .borrow_mut()
        .push(PointOfInterest::new(id, bounds.north, bounds.west, category));
}

#[given("a park factor weighted {weight} reaching {distance} metres")]
fn given_park(world: &ScoringWorld, weight: f64, distance: f64) {
    world
        .factors
        .borrow_mut()
        .push(Factor::new("park", weight, distance));
}

#[given("a noise factor weighted {weight} reaching {distance} metres")]
fn given_noise(world: &ScoringWorld, weight: f64, distance: f64) {
    world
        .factors
        .borrow_mut()
        .push(Factor::new("noise", weight, distance).with_categories(["highway"]));
}

#[given("a disabled park factor")]
fn given_disabled(world: &ScoringWorld) {
    world
        .factors
        .borrow_mut()
        .push(Factor::new("park", 50.0, 500.0).with_enabled(false));
}

#[given("a park on the north-west corner of the tile")]
fn given_park_poi(world: &ScoringWorld) {
    add_corner_poi(world, "park");
}

#[given("a highway on the north-west corner of the tile")]
fn given_highway_poi(world: &ScoringWorld) {
    add_corner_poi(world, "highway");
}

fn build_engine(world: &ScoringWorld) -> Option<ScoreEngine> {
    let config = ScoringConfig::new(world.factors.borrow().clone());
    match ScoreEngine::new(&config) {
        Ok(engine) => Some(engine),
        Err(err) => {
            world.engine_error.replace(Some(err));
            None
        }
    }
}

#[when("I build the score engine")]
fn when_build(world: &ScoringWorld) {
    let _ = build_engine(world);
}

#[when("I score the tile")]
fn when_score(world: &ScoringWorld) {
    let engine = build_engine(world).expect("engine should build");
    let points = engine.score_tile(&world.tile, &world.pois.borrow());
    world.points.replace(points);
}

#[then("the north-west sample scores {expected}")]
fn then_corner_score(world: &ScoringWorld, expected: f64) {
    let points = world.points.borrow();
    let corner = points.first().expect("lattice should be non-empty");
    assert!(
        (corner.value - expected).abs() < 1e-9,
        "expected {expected}, got {}",
        corner.value
    );
}

#[then("engine construction reports no active factors")]
fn then_no_active(world: &ScoringWorld) {
    assert_eq!(
        world.engine_error.borrow().as_ref(),
        Some(&ScoreEngineError::NoActiveFactors)
    );
}

#[scenario(path = "tests/features/score_engine.feature", index = 0)]
fn corner_park(world: ScoringWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/score_engine.feature", index = 1)]
fn park_and_noise(world: ScoringWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/score_engine.feature", index = 2)]
fn disabled_factor(world: ScoringWorld) {
    let _ = world;
}
