//! Behavioural tests for viewport planning using rstest-bdd.

use std::cell::RefCell;

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use vicinity_core::{
    Bounds, TileCoord, TileIndexError, TileLimits, ViewportPlan, Z_HEAT, bounds_of_tiles,
    plan_viewport,
};

#[derive(Debug, Default)]
struct PlanningWorld {
    bounds: RefCell<Option<Bounds>>,
    limits: RefCell<TileLimits>,
    outcome: RefCell<Option<Result<ViewportPlan, TileIndexError>>>,
}

#[fixture]
fn world() -> PlanningWorld {
    PlanningWorld::default()
}

#[given("a viewport covering a two by two tile block")]
fn given_block(world: &PlanningWorld) {
    let tiles: Vec<_> = [(8800, 5373), (8801, 5373), (8800, 5374), (8801, 5374)]
        .into_iter()
        .map(|(x, y)| TileCoord::new(Z_HEAT, x, y).expect("valid tile"))
        .collect();
    world.bounds.replace(bounds_of_tiles(&tiles));
}

#[given("a viewport covering a whole degree of latitude and longitude")]
fn given_large_viewport(world: &PlanningWorld) {
    let bounds = Bounds::new(53.0, 52.0, 14.0, 13.0).expect("valid bounds");
    world.bounds.replace(Some(bounds));
}

#[given("a total tile cap of {cap}")]
fn given_cap(world: &PlanningWorld, cap: usize) {
    let limits = world.limits.borrow().with_max_total_tiles(cap);
    world.limits.replace(limits);
}

#[when("I plan the viewport with ring radius {radius}")]
fn when_plan(world: &PlanningWorld, radius: u32) {
    let bounds = world.bounds.borrow().expect("bounds should be set");
    let outcome = plan_viewport(&bounds, radius, &world.limits.borrow());
    world.outcome.replace(Some(outcome));
}

#[then("the plan covers {count} tiles at radius {radius}")]
fn then_plan(world: &PlanningWorld, count: usize, radius: u32) {
    let binding = world.outcome.borrow();
    let plan = binding
        .as_ref()
        .expect("planning should have run")
        .as_ref()
        .expect("planning should succeed");
    assert_eq!(plan.viewport.len(), 4);
    assert_eq!(plan.tiles.len(), count);
    assert_eq!(plan.radius, radius);
}

#[then("planning fails because the viewport is too large")]
fn then_too_large(world: &PlanningWorld) {
    let binding = world.outcome.borrow();
    let outcome = binding.as_ref().expect("planning should have run");
    assert!(matches!(outcome, Err(TileIndexError::TooLarge { .. })));
}

#[scenario(path = "tests/features/viewport_planning.feature", index = 0)]
fn ring_fits(world: PlanningWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/viewport_planning.feature", index = 1)]
fn ring_shrinks(world: PlanningWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/viewport_planning.feature", index = 2)]
fn viewport_too_large(world: PlanningWorld) {
    let _ = world;
}
