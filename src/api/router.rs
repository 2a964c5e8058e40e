use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

use crate::core::auth::AuthProvider;
use crate::core::config::AppConfig;
use crate::ingest::pipeline::IngestPipeline;
use crate::records::VideoStore;

use super::handlers;

// ---------------------------------------------------------------------------
// API router
// ---------------------------------------------------------------------------

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub auth: Arc<AuthProvider>,
    pub videos: Arc<dyn VideoStore>,
    pub pipeline: Arc<IngestPipeline>,
    pub start_time: std::time::Instant,
    /// Prometheus metrics handle for rendering the /metrics endpoint.
    pub metrics_handle: metrics_exporter_prometheus::PrometheusHandle,
}

/// Build the full Axum router.
///
/// Route table:
///
/// **Video API (authenticated):**
/// - `POST /api/videos`                        — Create a video record
/// - `GET  /api/videos`                        — List the caller's records
/// - `GET  /api/videos/{video_id}`             — Get one record
/// - `POST /api/videos/{video_id}/upload`      — Ingest a video (multipart)
/// - `POST /api/videos/{video_id}/thumbnail`   — Set a thumbnail (multipart)
///
/// **Public reads (unauthenticated):**
/// - `GET /api/videos/{video_id}/thumbnail`    — Serve the stored thumbnail
///
/// **Health (unauthenticated):**
/// - `GET /healthz` — Liveness probe
/// - `GET /readyz`  — Readiness probe (external tool checks)
/// - `GET /metrics` — Prometheus metrics
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([http::Method::GET, http::Method::POST, http::Method::OPTIONS])
        .allow_headers([http::header::AUTHORIZATION, http::header::CONTENT_TYPE]);

    // The cap on the whole request body: the video payload cap plus slack
    // for multipart framing. The pipeline enforces the exact payload cap
    // while streaming.
    let body_limit =
        DefaultBodyLimit::max(state.config.upload.max_upload_size_bytes as usize + 1_048_576);

    Router::new()
        .route(
            "/api/videos",
            post(handlers::create_video).get(handlers::list_videos),
        )
        .route("/api/videos/{video_id}", get(handlers::get_video))
        .route("/api/videos/{video_id}/upload", post(handlers::upload_video))
        .route(
            "/api/videos/{video_id}/thumbnail",
            post(handlers::upload_thumbnail).get(handlers::get_thumbnail),
        )
        .route("/healthz", get(handlers::healthz))
        .route("/readyz", get(handlers::readyz))
        .route("/metrics", get(handlers::metrics_handler))
        .layer(cors)
        .layer(body_limit)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}
