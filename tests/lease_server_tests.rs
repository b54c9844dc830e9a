use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use leader_elector::config::{ElectionIdentity, TimingConfig, DEFAULT_NAMESPACE};
use leader_elector::election::{Elector, ElectionRole};
use leader_elector::error::LeaseStoreError;
use leader_elector::lease::server::{router, serve, LeaseServerState};
use leader_elector::lease::{CasOutcome, CreateOutcome, HttpLeaseStore, LeaseStore, MemoryLeaseStore};

const KEY: &str = "default/example";

fn app(token: Option<&str>) -> Router {
    router(LeaseServerState::new(
        Arc::new(MemoryLeaseStore::new()),
        token.map(str::to_string),
    ))
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, body.to_vec())
}

fn create_body(value: &str) -> Value {
    json!({ "key": KEY, "value": value, "ttl_ms": 10_000 })
}

#[tokio::test]
async fn test_create_then_conflict() {
    let app = app(None);

    let (status, _) = send(&app, post("/v1/lease/create", create_body("a"))).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = send(&app, post("/v1/lease/create", create_body("b"))).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_get_returns_holder_and_remaining_ttl() {
    let app = app(None);

    let (status, _) = send(&app, get("/v1/lease?key=default%2Fexample")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    send(&app, post("/v1/lease/create", create_body("a"))).await;

    let (status, body) = send(&app, get("/v1/lease?key=default%2Fexample")).await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["value"], "a");
    let remaining = json["remaining_ttl_ms"].as_u64().unwrap();
    assert!(remaining > 0 && remaining <= 10_000);
}

#[tokio::test]
async fn test_cas_swaps_only_expected_value() {
    let app = app(None);
    send(&app, post("/v1/lease/create", create_body("a"))).await;

    let (status, _) = send(
        &app,
        post(
            "/v1/lease/cas",
            json!({ "key": KEY, "expected": "b", "value": "b", "ttl_ms": 10_000 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        &app,
        post(
            "/v1/lease/cas",
            json!({ "key": KEY, "expected": "a", "value": "a", "ttl_ms": 10_000 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_token_is_enforced() {
    let app = app(Some("s3cret"));

    let (status, _) = send(&app, post("/v1/lease/create", create_body("a"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let mut req = post("/v1/lease/create", create_body("a"));
    req.headers_mut()
        .insert(header::AUTHORIZATION, "Bearer wrong".parse().unwrap());
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let mut req = post("/v1/lease/create", create_body("a"));
    req.headers_mut()
        .insert(header::AUTHORIZATION, "Bearer s3cret".parse().unwrap());
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::CREATED);
}

// =============================================================================
// HttpLeaseStore against a live server
// =============================================================================

async fn start_server(token: Option<&str>) -> (String, CancellationToken) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());

    let shutdown = CancellationToken::new();
    let state = LeaseServerState::new(Arc::new(MemoryLeaseStore::new()), token.map(str::to_string));
    let server_shutdown = shutdown.clone();
    tokio::spawn(async move {
        serve(listener, state, server_shutdown).await.unwrap();
    });

    (url, shutdown)
}

#[tokio::test]
async fn test_http_store_round_trip() {
    let (url, shutdown) = start_server(None).await;
    let store = HttpLeaseStore::new(url, None);
    let ttl = Duration::from_secs(10);

    assert!(store.get(KEY).await.unwrap().is_none());
    assert_eq!(
        store.create_if_absent(KEY, "a", ttl).await.unwrap(),
        CreateOutcome::Created
    );
    assert_eq!(
        store.create_if_absent(KEY, "b", ttl).await.unwrap(),
        CreateOutcome::AlreadyExists
    );
    assert_eq!(store.get(KEY).await.unwrap().unwrap().value, "a");
    assert_eq!(
        store.compare_and_swap(KEY, "b", "b", ttl).await.unwrap(),
        CasOutcome::Conflict
    );
    assert_eq!(
        store.compare_and_swap(KEY, "a", "a", ttl).await.unwrap(),
        CasOutcome::Swapped
    );

    shutdown.cancel();
}

#[tokio::test]
async fn test_http_store_reports_bad_token() {
    let (url, shutdown) = start_server(Some("s3cret")).await;

    let store = HttpLeaseStore::new(url.clone(), Some("wrong".to_string()));
    let err = store.get(KEY).await.unwrap_err();
    assert!(matches!(err, LeaseStoreError::Unauthorized));

    let store = HttpLeaseStore::new(url, Some("s3cret".to_string()));
    assert!(store.get(KEY).await.unwrap().is_none());

    shutdown.cancel();
}

#[tokio::test]
async fn test_electors_over_http() {
    let (url, shutdown) = start_server(None).await;
    let timing = TimingConfig::from_ttl(Duration::from_secs(2)).with_jitter(Duration::ZERO);

    let (mut a, mut a_rx) = Elector::new(
        ElectionIdentity::new("example", "a", DEFAULT_NAMESPACE),
        timing.clone(),
        Arc::new(HttpLeaseStore::new(url.clone(), None)),
    )
    .unwrap();
    let (mut b, mut b_rx) = Elector::new(
        ElectionIdentity::new("example", "b", DEFAULT_NAMESPACE),
        timing,
        Arc::new(HttpLeaseStore::new(url, None)),
    )
    .unwrap();

    assert_eq!(a.poll_once().await.as_deref(), Some("a"));
    assert_eq!(b.poll_once().await.as_deref(), Some("a"));
    assert_eq!(a.poll_once().await.as_deref(), Some("a"));

    assert_eq!(a.role(), ElectionRole::Leading);
    assert_eq!(b.role(), ElectionRole::Following);
    assert_eq!(a_rx.try_recv().unwrap().holder, "a");
    assert_eq!(b_rx.try_recv().unwrap().holder, "a");
    assert!(a_rx.try_recv().is_err());

    shutdown.cancel();
}
