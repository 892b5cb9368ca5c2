//! Updates flowing from a mirror through the cache to HTTP responses.

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use chrono::Utc;
use gfs_fetch::{gfs_path, FetchConfig, FetchEngine};
use reqwest::Url;
use test_utils::{DecodeFault, FakeDecoder, MockMirror};
use tokio::sync::broadcast;
use tower::ServiceExt;
use wind_cache::ResultCache;
use wind_common::{Cycle, ErrorKind, Precision};
use windy::{router, AppState, Updater, WindArtifact};

const LEVEL: &str = "850 mb";

fn config(mirror: &MockMirror) -> FetchConfig {
    FetchConfig {
        mirror: Url::parse(&mirror.url()).unwrap(),
        precision: 90.0,
        level: LEVEL.to_string(),
        timeout: Some(Duration::from_secs(10)),
        fetch_timeout: Some(Duration::from_secs(5)),
        max_prev_cycles: Some(2),
        max_retry: Some(1),
    }
}

fn updater(mirror: &MockMirror, decoder: FakeDecoder) -> (Updater, Arc<ResultCache<WindArtifact>>) {
    let engine =
        FetchEngine::with_client(config(mirror), Arc::new(decoder), reqwest::Client::new()).unwrap();
    let cache = Arc::new(ResultCache::new());
    (Updater::new(Arc::new(engine), cache.clone()), cache)
}

fn path_of(cycle: Cycle) -> String {
    gfs_path(cycle, Precision::new(90.0).unwrap())
}

#[tokio::test]
async fn test_refresh_falls_back_and_serves_previous_cycle() {
    let mirror = MockMirror::start().await.unwrap();
    let previous = Cycle::of(Utc::now()).previous();
    mirror.publish_wind(&path_of(previous), LEVEL);

    let (updater, cache) = updater(&mirror, FakeDecoder::new(90.0));
    updater.refresh().await.unwrap();

    let read = cache.get(None).await.unwrap();
    let artifact = read.value.unwrap();
    assert!(read.error.is_none());
    assert_eq!(artifact.cycle, previous);
    assert_eq!(artifact.source, path_of(previous));
    assert_eq!(artifact.fallbacks, 1);
    assert_eq!(artifact.attempts, 2);

    let texture = image::load_from_memory(&artifact.png.data).unwrap();
    assert_eq!((texture.width(), texture.height()), (4, 3));

    let app = router(Arc::new(AppState {
        cache,
        response_timeout: Some(Duration::from_millis(50)),
        metrics: None,
        proxy_header: None,
    }));
    let response = app
        .oneshot(Request::get("/wind_field.png").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cycle = response.headers()["x-gfs-cycle"].to_str().unwrap().to_string();
    assert_eq!(cycle, previous.to_string());
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(body, artifact.png.data);
}

#[tokio::test]
async fn test_failed_refresh_keeps_previous_artifact() {
    let mirror = MockMirror::start().await.unwrap();
    let current = Cycle::of(Utc::now());
    mirror.publish_wind(&path_of(current), LEVEL);

    let (updater, cache) = updater(&mirror, FakeDecoder::new(90.0).with_fault(DecodeFault::Missing));
    let err = updater.refresh().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InternalFault);
    let read = cache.get(None).await.unwrap();
    assert!(read.value.is_none());
    assert!(read.error.unwrap().to_string().contains("expected 12 points"));

    // a healthy update, then a failing one
    let (updater, cache) = updater_with_cache(&mirror, FakeDecoder::new(90.0), cache);
    updater.refresh().await.unwrap();
    let first = cache.get(None).await.unwrap().value.unwrap();

    let (updater, cache) =
        updater_with_cache(&mirror, FakeDecoder::new(90.0).with_fault(DecodeFault::Empty), cache);
    updater.refresh().await.unwrap_err();
    let read = cache.get(None).await.unwrap();
    assert!(Arc::ptr_eq(&read.value.unwrap(), &first));
    assert!(read.error.is_some());
}

fn updater_with_cache(
    mirror: &MockMirror,
    decoder: FakeDecoder,
    cache: Arc<ResultCache<WindArtifact>>,
) -> (Updater, Arc<ResultCache<WindArtifact>>) {
    let engine =
        FetchEngine::with_client(config(mirror), Arc::new(decoder), reqwest::Client::new()).unwrap();
    (Updater::new(Arc::new(engine), cache.clone()), cache)
}

#[tokio::test]
async fn test_run_updates_immediately_and_stops_on_shutdown() {
    let mirror = MockMirror::start().await.unwrap();
    mirror.publish_wind(&path_of(Cycle::of(Utc::now())), LEVEL);

    let (updater, cache) = updater(&mirror, FakeDecoder::new(90.0));
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let worker = tokio::spawn(updater.with_interval(Duration::from_secs(3600)).run(shutdown_rx));

    let read = tokio::time::timeout(Duration::from_secs(5), cache.get(None))
        .await
        .expect("first update never finished")
        .unwrap();
    assert!(read.value.is_some());

    shutdown_tx.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(1), worker)
        .await
        .expect("worker did not stop")
        .unwrap();
}

#[tokio::test]
async fn test_run_repeats_after_interval() {
    let mirror = MockMirror::start().await.unwrap();
    mirror.publish_wind(&path_of(Cycle::of(Utc::now())), LEVEL);

    let decoder = FakeDecoder::new(90.0);
    let (updater, _cache) = updater(&mirror, decoder.clone());
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let worker = tokio::spawn(updater.with_interval(Duration::from_millis(20)).run(shutdown_rx));

    // two components per update
    tokio::time::timeout(Duration::from_secs(5), async {
        while decoder.calls() < 4 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("second update never ran");

    shutdown_tx.send(()).unwrap();
    worker.await.unwrap();
}

#[tokio::test]
async fn test_scheduled_update_reports_single_fallback() {
    let mirror = MockMirror::start().await.unwrap();
    let current = Cycle::of(Utc::now());
    let previous = current.previous();
    mirror.publish_wind(&path_of(previous), LEVEL);

    let (updater, cache) = updater(&mirror, FakeDecoder::new(90.0));
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let worker = tokio::spawn(updater.run(shutdown_rx));

    let read = tokio::time::timeout(Duration::from_secs(5), cache.get(None))
        .await
        .expect("first update never finished")
        .unwrap();
    let artifact = read.value.unwrap();
    assert_eq!(artifact.cycle, previous);
    assert_eq!(artifact.fallbacks, 1);

    // the current cycle's index was asked for once, then never again
    let current_index = format!("{}.idx", path_of(current));
    assert_eq!(
        mirror.requests().iter().filter(|p| **p == current_index).count(),
        1
    );

    shutdown_tx.send(()).unwrap();
    worker.await.unwrap();
}
