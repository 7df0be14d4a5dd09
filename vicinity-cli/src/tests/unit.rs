//! Unit tests covering import and serve configuration and execution.

use super::helpers::{Workspace, berlin_tile, sample_pois, scoring, write_pois_json, write_utf8};
use super::*;
use crate::import::{DEFAULT_POIS_DB, ImportConfig, import_with, load_pois};
use crate::serve::{DEFAULT_LISTEN, ServeConfig, open_pois, snapshot};
use camino::Utf8PathBuf;
use rstest::rstest;
use std::time::Duration;
use vicinity_cache::{CacheConfig, MAX_TTL};
use vicinity_core::{
    BatchRequest, Bounds, DataSource, PoiStore, PointOfInterest, SqlitePoiStore,
    write_poi_database,
};
use vicinity_service::ServiceConfig;

#[rstest]
fn import_requires_an_input_path() {
    let err = ImportConfig::try_from(ImportArgs::default()).expect_err("missing input");
    match err {
        CliError::MissingArgument { field, env } => {
            assert_eq!(field, ARG_IMPORT_INPUT);
            assert_eq!(env, ENV_IMPORT_INPUT);
        }
        other => panic!("expected MissingArgument, found {other:?}"),
    }
}

#[rstest]
fn import_defaults_the_database_path() {
    let args = ImportArgs {
        input: Some(Utf8PathBuf::from("pois.json")),
        ..ImportArgs::default()
    };
    let config = ImportConfig::try_from(args).expect("valid config");
    assert_eq!(config.pois_db, Utf8PathBuf::from(DEFAULT_POIS_DB));
}

#[rstest]
fn serve_requires_a_poi_database() {
    let err = ServeConfig::try_from(ServeArgs::default()).expect_err("missing database");
    match err {
        CliError::MissingArgument { field, env } => {
            assert_eq!(field, ARG_POIS_DB);
            assert_eq!(env, ENV_SERVE_POIS_DB);
        }
        other => panic!("expected MissingArgument, found {other:?}"),
    }
}

#[rstest]
fn serve_applies_cache_and_service_overrides() {
    let args = ServeArgs {
        pois_db: Some(Utf8PathBuf::from("pois.db")),
        cache_ttl_secs: Some(60),
        max_request_tiles: Some(32),
        ..ServeArgs::default()
    };
    let config = ServeConfig::try_from(args).expect("valid config");
    assert_eq!(config.listen, DEFAULT_LISTEN);
    assert_eq!(
        config.cache,
        CacheConfig::default().with_ttl(Duration::from_secs(60))
    );
    assert_eq!(
        config.service,
        ServiceConfig::default().with_max_request_tiles(32)
    );
    assert!(config.fallback_db.is_none());
}

#[rstest]
#[case(u64::MAX)]
#[case(MAX_TTL.as_secs() + 1)]
fn serve_rejects_cache_lifetimes_beyond_the_cap(#[case] secs: u64) {
    let args = ServeArgs {
        pois_db: Some(Utf8PathBuf::from("pois.db")),
        cache_ttl_secs: Some(secs),
        ..ServeArgs::default()
    };
    match ServeConfig::try_from(args).expect_err("lifetime too long") {
        CliError::OutOfRange { field, value, max } => {
            assert_eq!(field, ARG_CACHE_TTL);
            assert_eq!(value, secs);
            assert_eq!(max, MAX_TTL.as_secs());
        }
        other => panic!("expected OutOfRange, found {other:?}"),
    }
}

#[rstest]
fn serve_accepts_the_longest_cache_lifetime() {
    let args = ServeArgs {
        pois_db: Some(Utf8PathBuf::from("pois.db")),
        cache_ttl_secs: Some(MAX_TTL.as_secs()),
        ..ServeArgs::default()
    };
    let config = ServeConfig::try_from(args).expect("valid config");
    assert_eq!(config.cache.ttl, MAX_TTL);
}

#[rstest]
fn require_existing_reports_missing_files() {
    let workspace = Workspace::new();
    let err = require_existing(&workspace.path("absent.json"), ARG_IMPORT_INPUT)
        .expect_err("missing file");
    match err {
        CliError::MissingSourceFile { field, .. } => assert_eq!(field, ARG_IMPORT_INPUT),
        other => panic!("expected MissingSourceFile, found {other:?}"),
    }
}

#[rstest]
fn require_existing_rejects_directories() {
    let workspace = Workspace::new();
    let err = require_existing(workspace.root(), ARG_POIS_DB).expect_err("directory");
    match err {
        CliError::SourcePathNotFile { field, .. } => assert_eq!(field, ARG_POIS_DB),
        other => panic!("expected SourcePathNotFile, found {other:?}"),
    }
}

#[rstest]
fn import_writes_every_poi_into_a_nested_database() {
    let workspace = Workspace::new();
    let input = workspace.path("pois.json");
    let database = workspace.path("out/nested/pois.db");
    write_pois_json(&input, &sample_pois());

    let mut stdout = Vec::new();
    import_with(
        &ImportConfig {
            input,
            pois_db: database.clone(),
        },
        &mut stdout,
    )
    .expect("import succeeds");

    let printed = String::from_utf8(stdout).expect("utf-8 output");
    assert!(printed.starts_with("imported 2 POIs into "));
    let store = SqlitePoiStore::open(database.as_std_path()).expect("open database");
    let tile = berlin_tile().bounds().to_rect();
    assert_eq!(store.get_pois_in_bbox(&tile).expect("query").len(), 2);
}

#[rstest]
fn load_pois_rejects_coordinates_off_the_globe() {
    let workspace = Workspace::new();
    let input = workspace.path("pois.json");
    write_pois_json(&input, &[PointOfInterest::new(7, 91.0, 0.0, "park")]);

    match load_pois(&input).expect_err("invalid latitude") {
        CliError::InvalidPoi { id, .. } => assert_eq!(id, 7),
        other => panic!("expected InvalidPoi, found {other:?}"),
    }
}

#[rstest]
fn load_pois_reports_malformed_json() {
    let workspace = Workspace::new();
    let input = workspace.path("pois.json");
    write_utf8(&input, b"[{ not json");

    match load_pois(&input).expect_err("malformed input") {
        CliError::ParseInput { path, .. } => assert_eq!(path, input),
        other => panic!("expected ParseInput, found {other:?}"),
    }
}

#[rstest]
#[case::primary(DataSource::Primary)]
#[case::fallback(DataSource::Fallback)]
fn serve_builds_a_service_over_the_poi_database(#[case] source: DataSource) {
    let workspace = Workspace::new();
    let database = workspace.path("pois.db");
    write_poi_database(database.as_std_path(), &sample_pois()).expect("seed database");
    let config = ServeConfig {
        listen: DEFAULT_LISTEN.to_owned(),
        pois_db: database,
        fallback_db: None,
        cache_db: Some(workspace.path("cache/l2.db")),
        cache: CacheConfig::default(),
        service: ServiceConfig::default(),
    };
    config.validate_sources().expect("sources exist");

    let service = config.build_service().expect("service builds");
    let request = BatchRequest::new(vec![berlin_tile()], scoring()).with_data_source(source);
    let response = service.handle(&request).expect("batch succeeds");

    assert_eq!(response.metadata.data_source, source);
    assert_eq!(response.tiles.len(), 1);
    let parks = response.pois.get("park").map_or(0, Vec::len);
    assert_eq!(parks, 1);
    assert!(workspace.path("cache/l2.db").is_file());
}

#[rstest]
fn serve_snapshot_covers_the_whole_globe() {
    let workspace = Workspace::new();
    let database = workspace.path("pois.db");
    let antipodes = [
        PointOfInterest::new(1, 89.0, 179.0, "park"),
        PointOfInterest::new(2, -89.0, -179.0, "park"),
    ];
    write_poi_database(database.as_std_path(), &antipodes).expect("seed database");

    let primary = open_pois(&database).expect("open database");
    let copy = snapshot(&primary).expect("snapshot");

    let world = Bounds::new(90.0, -90.0, 180.0, -180.0).expect("world bounds");
    let mut ids: Vec<u64> = copy
        .get_pois_in_bbox(&world.to_rect())
        .expect("query")
        .iter()
        .map(|poi| poi.id)
        .collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![1, 2]);
}
