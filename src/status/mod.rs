//! Read-only HTTP status endpoint.
//!
//! Every path answers with the current [`LeaderSnapshot`] as JSON:
//! `{"name":"a","namespace":"default","podAddress":"10.0.0.1"}`, with
//! `podAddress` omitted when no address is known.
//!
//! [`LeaderSnapshot`]: crate::registry::LeaderSnapshot

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};

use crate::registry::LeaderRegistry;

#[derive(Clone)]
pub struct StatusState {
    pub registry: Arc<LeaderRegistry>,
}

pub fn router(state: StatusState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(status_handler))
        .fallback(status_handler)
        .layer(cors)
        .with_state(state)
}

pub async fn run_status_server(
    addr: SocketAddr,
    state: StatusState,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "Starting status server");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

async fn status_handler(State(state): State<StatusState>) -> Response {
    let snapshot = state.registry.get_leader().await;

    match serde_json::to_vec(&snapshot) {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize leader snapshot");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}
