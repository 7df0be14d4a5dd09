//! Viewport-driven prefetching of tiled scores.
//!
//! [`PrefetchOrchestrator`] turns a visible area into tile requests against
//! the batch endpoint: the viewport first, then expanding rings around it.
//! Results are merged into an [`AccumulatedStore`] keyed by coordinate, so
//! panning only fetches tiles that are not already held. A new fetch
//! supersedes the previous one, cancelling its in-flight request and
//! discarding anything it would still have merged.
//!
//! The endpoint is reached through the [`TileClient`] trait;
//! [`HttpTileClient`] is the `reqwest` implementation.

#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod client;
mod config;
mod error;
mod http_client;
mod orchestrator;
mod state;
mod store;

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-support")))]
pub mod test_support;

pub use client::{FetchError, TileClient, fetch_with_deadline};
pub use config::{
    DEFAULT_RADIUS, DEFAULT_REQUEST_TIMEOUT, DEFAULT_ZOOM_OVERLAP_THRESHOLD, PrefetchConfig,
    PrefetchMode, ViewportQuery,
};
pub use error::PrefetchError;
pub use http_client::{ClientBuildError, DEFAULT_USER_AGENT, HttpTileClient, HttpTileClientConfig};
pub use orchestrator::PrefetchOrchestrator;
pub use state::{ClearReason, FetchOutcome, LoadState, PrefetchEvent, PrefetchListener};
pub use store::{AccumulatedStore, PoiSnapshot};
