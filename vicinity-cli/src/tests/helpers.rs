//! Test helpers for writing CLI inputs into temporary workspaces.

use std::{fs, sync::Arc};

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::TempDir;
use vicinity_core::{DistanceCurve, Factor, PointOfInterest, ScoringConfig, TileCoord, Z_HEAT};
use vicinity_prefetch::{TileClient, test_support::StubTileClient};

use super::*;
use crate::prefetch::{PrefetchCommandConfig, TileClientBuilder};

/// A temporary directory addressed through UTF-8 paths.
pub(super) struct Workspace {
    _dir: TempDir,
    root: Utf8PathBuf,
}

impl Workspace {
    pub(super) fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 workspace");
        Self { _dir: dir, root }
    }

    pub(super) fn path(&self, name: &str) -> Utf8PathBuf {
        self.root.join(name)
    }

    pub(super) fn root(&self) -> &Utf8Path {
        &self.root
    }
}

pub(super) fn write_utf8(path: &Utf8Path, contents: &[u8]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent directories");
    }
    fs::write(path, contents).expect("write file");
}

/// One park and one cafe close to the centre of [`berlin_tile`].
pub(super) fn sample_pois() -> Vec<PointOfInterest> {
    let (lat, lng) = berlin_tile().center();
    vec![
        PointOfInterest::new(1, lat, lng, "park"),
        PointOfInterest::new(2, lat + 0.001, lng - 0.001, "cafe"),
    ]
}

pub(super) fn write_pois_json(path: &Utf8Path, pois: &[PointOfInterest]) {
    let payload = serde_json::to_string_pretty(pois).expect("serialize POIs");
    write_utf8(path, payload.as_bytes());
}

pub(super) fn scoring() -> ScoringConfig {
    ScoringConfig::new(vec![Factor::new("park", 80.0, 1000.0)]).with_curve(DistanceCurve::Linear)
}

pub(super) fn write_scoring_json(path: &Utf8Path, scoring: &ScoringConfig) {
    let payload = serde_json::to_string_pretty(scoring).expect("serialize scoring");
    write_utf8(path, payload.as_bytes());
}

pub(super) fn berlin_tile() -> TileCoord {
    TileCoord::new(Z_HEAT, 8800, 5373).expect("valid tile")
}

/// Viewport edges `[north, south, east, west]` lying inside [`berlin_tile`].
pub(super) fn single_tile_edges() -> [f64; 4] {
    let (lat, lng) = berlin_tile().center();
    [lat + 0.001, lat - 0.001, lng + 0.001, lng - 0.001]
}

/// Hands out a shared [`StubTileClient`] so tests can inspect its calls.
#[derive(Debug, Default)]
pub(super) struct StubClientBuilder {
    pub(super) client: Arc<StubTileClient>,
}

impl StubClientBuilder {
    pub(super) fn new(client: StubTileClient) -> Self {
        Self {
            client: Arc::new(client),
        }
    }
}

impl TileClientBuilder for StubClientBuilder {
    fn build(&self, _config: &PrefetchCommandConfig) -> Result<Arc<dyn TileClient>, CliError> {
        Ok(self.client.clone())
    }
}
