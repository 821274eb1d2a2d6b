//! HTTP gateway layer (spec §4.5, §6).
//!
//! Thin Axum wiring in front of the [`crate::orchestrator::Orchestrator`]:
//! size cap, coarse rate floor, JSON parsing, and API key extraction happen
//! here; everything else is delegated to the Orchestrator and its
//! collaborators.

pub mod error;
pub mod handler;
pub mod state;

pub use error::GatewayError;
pub use handler::proxy_handler;
pub use state::HandlerState;

use axum::{
    Json, Router,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

/// Builds the full router: the proxy endpoint, its `/v1/chat/completions`
/// alias, the admin/ops surface (spec §6), and the ambient `/healthz`/
/// `/ready` endpoints (spec §2 "Ambient ops endpoints").
pub fn create_router_with_state(state: HandlerState) -> Router {
    Router::new()
        .route("/healthz", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/proxy", post(handler::proxy_handler))
        .route("/v1/chat/completions", post(handler::proxy_handler))
        .route("/logs/{proxy_id}", get(handler::get_log_handler))
        .route(
            "/ttl/{api_key}",
            get(handler::get_ttl_handler).post(handler::post_ttl_handler),
        )
        .route(
            "/similarity-threshold/{api_key}",
            get(handler::get_similarity_threshold_handler)
                .post(handler::post_similarity_threshold_handler),
        )
        .route("/cache/stats", get(handler::cache_stats_handler))
        .route(
            "/cache/invalidate/{api_key}",
            post(handler::cache_invalidate_handler),
        )
        .route("/cache/clear", post(handler::cache_clear_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(serde::Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn health_handler() -> Response {
    Json(HealthResponse { status: "ok" }).into_response()
}

#[derive(serde::Serialize)]
struct ReadyResponse {
    status: &'static str,
}

/// Always ready once the process has bound its listener: every component the
/// Orchestrator depends on is constructed synchronously before
/// `create_router_with_state` is ever called (spec §9 "Lifecycle").
async fn ready_handler() -> Response {
    Json(ReadyResponse { status: "ok" }).into_response()
}
