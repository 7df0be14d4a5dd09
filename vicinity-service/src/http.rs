//! HTTP boundary: the batch and cache-status endpoints.
#![forbid(unsafe_code)]

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::{
        HeaderMap, StatusCode,
        header::{ACCEPT, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
    routing::{get, post},
};
use log::{error, info, warn};
use serde_json::json;
use tokio::net::TcpListener;
use vicinity_core::{BatchRequest, BatchResponse, CacheStatus, Encoding, encode_response};

use crate::{BatchError, BatchTileService};

/// Path of the batch scoring endpoint.
pub const BATCH_PATH: &str = "/api/tiles/batch";

/// Path of the cache health endpoint.
pub const STATUS_PATH: &str = "/api/cache/status";

#[derive(Clone)]
struct AppState {
    service: Arc<BatchTileService>,
}

/// Router exposing `service`.
#[must_use]
pub fn router(service: Arc<BatchTileService>) -> Router {
    Router::new()
        .route(BATCH_PATH, post(batch_tiles))
        .route(STATUS_PATH, get(cache_status))
        .with_state(AppState { service })
}

/// Serve `service` on `listener` until the server stops.
///
/// # Errors
/// Returns the I/O error that stopped the server.
pub async fn serve(listener: TcpListener, service: Arc<BatchTileService>) -> std::io::Result<()> {
    info!("serving tile batches on {}", listener.local_addr()?);
    axum::serve(listener, router(service)).await
}

async fn batch_tiles(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<BatchRequest>,
) -> Response {
    let encoding = Encoding::from_accept(headers.get(ACCEPT).and_then(|v| v.to_str().ok()));
    let service = Arc::clone(&state.service);
    match tokio::task::spawn_blocking(move || service.handle(&request)).await {
        Ok(Ok(response)) => encoded(&response, encoding),
        Ok(Err(err)) => batch_error(&err),
        Err(err) => {
            error!("batch worker failed: {err}");
            error_body(StatusCode::INTERNAL_SERVER_ERROR, "batch worker failed")
        }
    }
}

async fn cache_status(State(state): State<AppState>) -> Response {
    let service = Arc::clone(&state.service);
    match tokio::task::spawn_blocking(move || service.cache().status()).await {
        Ok(status) => Json::<CacheStatus>(status).into_response(),
        Err(err) => {
            error!("status probe failed: {err}");
            error_body(StatusCode::INTERNAL_SERVER_ERROR, "status probe failed")
        }
    }
}

fn encoded(response: &BatchResponse, encoding: Encoding) -> Response {
    match encode_response(response, encoding) {
        Ok(body) => ([(CONTENT_TYPE, encoding.content_type())], body).into_response(),
        Err(err) => {
            error!("failed to encode batch response: {err}");
            error_body(StatusCode::INTERNAL_SERVER_ERROR, "failed to encode response")
        }
    }
}

fn batch_error(err: &BatchError) -> Response {
    let status = if err.is_client_error() {
        StatusCode::BAD_REQUEST
    } else if matches!(err, BatchError::SourcesUnavailable { .. }) {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    warn!("batch request rejected with {status}: {err}");
    error_body(status, &err.to_string())
}

fn error_body(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}
