//! HTTP front end for a [`MemoryLeaseStore`], used as the coordination
//! backend by every participant that points `--lease-server` at it.
//!
//! | Method | Path               | Outcome                                 |
//! |--------|--------------------|-----------------------------------------|
//! | POST   | `/v1/lease/create` | 201 created, 409 already exists         |
//! | GET    | `/v1/lease?key=`   | 200 entry, 404 absent                   |
//! | POST   | `/v1/lease/cas`    | 200 swapped, 409 conflict               |
//!
//! All routes answer 401 when a token is configured and the request does not
//! carry it as a bearer credential.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Query, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use super::{CasOutcome, CreateOutcome, LeaseStore, MemoryLeaseStore};

#[derive(Clone)]
pub struct LeaseServerState {
    pub store: Arc<MemoryLeaseStore>,
    pub auth_token: Option<Arc<str>>,
}

impl LeaseServerState {
    pub fn new(store: Arc<MemoryLeaseStore>, auth_token: Option<String>) -> Self {
        Self {
            store,
            auth_token: auth_token.map(Arc::from),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateRequest {
    pub key: String,
    pub value: String,
    pub ttl_ms: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CasRequest {
    pub key: String,
    pub expected: String,
    pub value: String,
    pub ttl_ms: u64,
}

#[derive(Debug, Deserialize)]
struct KeyQuery {
    key: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

pub fn router(state: LeaseServerState) -> Router {
    Router::new()
        .route("/v1/lease", get(get_handler))
        .route("/v1/lease/create", post(create_handler))
        .route("/v1/lease/cas", post(cas_handler))
        .layer(middleware::from_fn_with_state(state.clone(), require_token))
        .with_state(state)
}

pub async fn run_lease_server(
    addr: SocketAddr,
    state: LeaseServerState,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    serve(listener, state, shutdown).await
}

/// Serve on an already bound listener until `shutdown` fires.
pub async fn serve(
    listener: TcpListener,
    state: LeaseServerState,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    tracing::info!(addr = %listener.local_addr()?, "Starting lease server");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

async fn require_token(
    State(state): State<LeaseServerState>,
    request: Request,
    next: Next,
) -> Response {
    if let Some(expected) = state.auth_token.as_deref() {
        let presented = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));
        if presented != Some(expected) {
            return error_response(StatusCode::UNAUTHORIZED, "missing or invalid bearer token");
        }
    }
    next.run(request).await
}

async fn create_handler(
    State(state): State<LeaseServerState>,
    Json(req): Json<CreateRequest>,
) -> Response {
    let ttl = Duration::from_millis(req.ttl_ms);
    match state.store.create_if_absent(&req.key, &req.value, ttl).await {
        Ok(CreateOutcome::Created) => {
            tracing::debug!(key = %req.key, holder = %req.value, "Lease created");
            StatusCode::CREATED.into_response()
        }
        Ok(CreateOutcome::AlreadyExists) => StatusCode::CONFLICT.into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

async fn get_handler(
    State(state): State<LeaseServerState>,
    Query(query): Query<KeyQuery>,
) -> Response {
    match state.store.get(&query.key).await {
        Ok(Some(entry)) => Json(entry).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

async fn cas_handler(State(state): State<LeaseServerState>, Json(req): Json<CasRequest>) -> Response {
    let ttl = Duration::from_millis(req.ttl_ms);
    match state
        .store
        .compare_and_swap(&req.key, &req.expected, &req.value, ttl)
        .await
    {
        Ok(CasOutcome::Swapped) => StatusCode::OK.into_response(),
        Ok(CasOutcome::Conflict) => StatusCode::CONFLICT.into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}
