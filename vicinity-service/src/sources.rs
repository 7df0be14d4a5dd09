//! Preferred and fallback POI sources, read through the tile cache.
#![forbid(unsafe_code)]

use std::sync::Arc;

use log::{debug, warn};
use vicinity_cache::TileCache;
use vicinity_core::{DataSource, PoiStore, PoiStoreError, PointOfInterest, TileCoord};

use crate::BatchError;

/// The POI sources a service draws from.
///
/// The fallback is mandatory; the primary may be absent, in which case every
/// request is served from the fallback and reported as such.
#[derive(Clone)]
pub struct PoiSources {
    primary: Option<Arc<dyn PoiStore>>,
    fallback: Arc<dyn PoiStore>,
}

impl std::fmt::Debug for PoiSources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoiSources")
            .field("has_primary", &self.primary.is_some())
            .finish_non_exhaustive()
    }
}

impl PoiSources {
    /// Primary source backed by `fallback`.
    #[must_use]
    pub fn new(primary: Arc<dyn PoiStore>, fallback: Arc<dyn PoiStore>) -> Self {
        Self {
            primary: Some(primary),
            fallback,
        }
    }

    /// Only a fallback source.
    #[must_use]
    pub fn fallback_only(fallback: Arc<dyn PoiStore>) -> Self {
        Self {
            primary: None,
            fallback,
        }
    }

    /// Whether a primary source is configured.
    #[must_use]
    pub const fn has_primary(&self) -> bool {
        self.primary.is_some()
    }

    fn store(&self, source: DataSource) -> &Arc<dyn PoiStore> {
        match (source, &self.primary) {
            (DataSource::Primary, Some(primary)) => primary,
            _ => &self.fallback,
        }
    }
}

/// Source selection for the lifetime of one request.
///
/// Once the primary fails it is skipped for the rest of the request, so a
/// single outage costs one failed query rather than one per tile.
pub(crate) struct SourceSession<'a> {
    sources: &'a PoiSources,
    cache: &'a TileCache,
    preferred: DataSource,
    primary_failed: bool,
    used_fallback: bool,
}

impl<'a> SourceSession<'a> {
    pub(crate) const fn new(
        sources: &'a PoiSources,
        cache: &'a TileCache,
        preferred: DataSource,
    ) -> Self {
        Self {
            sources,
            cache,
            preferred,
            primary_failed: false,
            used_fallback: false,
        }
    }

    /// Source the next lookup should use.
    pub(crate) const fn current(&self) -> DataSource {
        match self.preferred {
            DataSource::Primary if self.sources.has_primary() && !self.primary_failed => {
                DataSource::Primary
            }
            _ => DataSource::Fallback,
        }
    }

    /// Record that data from `source` ended up in the response.
    pub(crate) const fn note(&mut self, source: DataSource) {
        if matches!(source, DataSource::Fallback) {
            self.used_fallback = true;
        }
    }

    /// Source to report in the response metadata.
    pub(crate) const fn reported(&self) -> DataSource {
        if self.used_fallback {
            DataSource::Fallback
        } else {
            self.current()
        }
    }

    /// POIs of every tile in `tiles`, all from a single source.
    ///
    /// # Errors
    /// Returns [`BatchError::SourcesUnavailable`] when the fallback fails.
    pub(crate) fn gather(
        &mut self,
        tiles: &[TileCoord],
    ) -> Result<(Vec<PointOfInterest>, DataSource), BatchError> {
        loop {
            let source = self.current();
            match self.collect(tiles, source) {
                Ok(pois) => {
                    self.note(source);
                    return Ok((pois, source));
                }
                Err(err) if source == DataSource::Primary => {
                    warn!("primary POI source failed, switching to fallback: {err}");
                    self.primary_failed = true;
                }
                Err(err) => return Err(BatchError::SourcesUnavailable { source: err }),
            }
        }
    }

    fn collect(
        &self,
        tiles: &[TileCoord],
        source: DataSource,
    ) -> Result<Vec<PointOfInterest>, PoiStoreError> {
        let store = self.sources.store(source);
        let mut out = Vec::new();
        for tile in tiles {
            let pois = if let Some(hit) = self.cache.pois(tile, source) {
                hit
            } else {
                let fetched = store.get_pois_in_bbox(&tile.bounds().to_rect())?;
                debug!("fetched {} POIs for {tile} from {}", fetched.len(), source.as_str());
                self.cache.store_pois(tile, source, fetched)
            };
            out.extend(pois.iter().cloned());
        }
        Ok(out)
    }
}
