//! `HttpTileClient` against the axum router over a loopback socket.

#[expect(dead_code, reason = "this suite drives the client over HTTP, not in process")]
mod common;

use std::sync::Arc;

use common::{X0, Y0, healthy_service, scoring, tile, viewport};
use rstest::rstest;
use tokio::net::TcpListener;
use vicinity_cache::{CacheConfig, TileCache};
use vicinity_core::{BatchRequest, DataSource, test_support::ToggleStore};
use vicinity_prefetch::{
    FetchError, FetchOutcome, HttpTileClient, HttpTileClientConfig, PrefetchConfig,
    PrefetchOrchestrator, TileClient, ViewportQuery,
};
use vicinity_service::{BatchTileService, PoiSources, ServiceConfig, http::serve};

async fn spawn_server(service: Arc<BatchTileService>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let _server = tokio::spawn(serve(listener, service));
    format!("http://{addr}/")
}

#[rstest]
#[case::binary(true)]
#[case::json(false)]
#[tokio::test]
async fn client_decodes_either_encoding(#[case] binary: bool) {
    let base = spawn_server(healthy_service()).await;
    let client = HttpTileClient::with_config(&HttpTileClientConfig::new(base).with_binary(binary))
        .expect("client");
    assert!(client.endpoint().ends_with("/api/tiles/batch"));
    assert!(!client.endpoint().contains("//api"));

    let block = vec![
        tile(X0, Y0),
        tile(X0 + 1, Y0),
        tile(X0, Y0 + 1),
        tile(X0 + 1, Y0 + 1),
    ];
    let response = client
        .fetch_batch(&BatchRequest::new(block, scoring(1.0)))
        .await
        .expect("batch");

    assert_eq!(response.metadata.total_tiles, 4);
    assert_eq!(response.metadata.data_source, DataSource::Primary);
    assert_eq!(response.pois.get("park").map(Vec::len), Some(1));
}

#[rstest]
#[tokio::test]
async fn client_reports_rejected_batches_as_http_errors() {
    let service = Arc::new(BatchTileService::new(
        Arc::new(TileCache::in_memory(CacheConfig::default())),
        PoiSources::fallback_only(Arc::new(ToggleStore::new(Vec::new()))),
        ServiceConfig::default().with_max_request_tiles(1),
    ));
    let base = spawn_server(service).await;
    let client = HttpTileClient::new(base).expect("client");

    let request = BatchRequest::new(vec![tile(X0, Y0), tile(X0, Y0 + 1)], scoring(1.0));
    match client.fetch_batch(&request).await {
        Err(FetchError::Http { status, .. }) => assert_eq!(status, 400),
        other => panic!("expected an HTTP 400, found {other:?}"),
    }
}

#[rstest]
#[tokio::test]
async fn client_reports_unreachable_servers_as_network_errors() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    let client = HttpTileClient::new(format!("http://{addr}")).expect("client");

    let request = BatchRequest::new(vec![tile(X0, Y0)], scoring(1.0));
    match client.fetch_batch(&request).await {
        Err(FetchError::Network { url, .. }) => assert!(url.ends_with("/api/tiles/batch")),
        other => panic!("expected a network error, found {other:?}"),
    }
}

#[rstest]
#[tokio::test]
async fn orchestrator_fetches_rings_over_http() {
    let base = spawn_server(healthy_service()).await;
    let client = HttpTileClient::new(base).expect("client");
    let orchestrator = PrefetchOrchestrator::new(client, PrefetchConfig::default());
    let query = ViewportQuery::new(viewport(2), scoring(1.0)).with_radius(1);

    let outcome = orchestrator.fetch(&query).await.expect("fetch");

    assert!(matches!(
        outcome,
        FetchOutcome::Completed {
            radius: 1,
            requested_tiles: 16,
            ..
        }
    ));
    assert_eq!(orchestrator.covered_tiles().len(), 16);
    assert!(!orchestrator.fallback_notice());
}
