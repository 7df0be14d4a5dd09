//! Batch tile scoring service.
//!
//! [`BatchTileService`] answers batch requests by reading scores from the
//! [`TileCache`](vicinity_cache::TileCache), gathering POIs for the tiles it
//! has to compute (from the preferred source, falling back transparently when
//! it fails) and scoring them with the
//! [`ScoreEngine`](vicinity_scorer::ScoreEngine). The [`http`] module exposes
//! it over axum.

#![forbid(unsafe_code)]

mod config;
mod error;
pub mod http;
mod service;
mod sources;

pub use config::{DEFAULT_MAX_BUFFER_RING, ServiceConfig};
pub use error::BatchError;
pub use service::BatchTileService;
pub use sources::PoiSources;
