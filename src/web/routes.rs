//! Route definitions for the viewer API

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::HttpConfig;
use crate::AppState;

use super::api;

/// JSON envelope allowance around an exported avatar URL
const MESSAGE_OVERHEAD: usize = 64 * 1024;

/// Largest accepted `/api/message` body: a `data:` export of the biggest
/// loadable asset, base64 encoded, plus its envelope
fn message_body_limit(max_asset_bytes: u64) -> usize {
    let encoded = max_asset_bytes.div_ceil(3).saturating_mul(4);
    usize::try_from(encoded)
        .unwrap_or(usize::MAX)
        .saturating_add(MESSAGE_OVERHEAD)
}

/// Create the API router
pub fn create_router(app_state: Arc<AppState>, config: &HttpConfig) -> Router {
    let message_limit = message_body_limit(app_state.session.config().loader.max_asset_bytes);

    let cors = if config.cors_enabled {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        CorsLayer::new()
    };

    Router::new()
        // Inbound messages from the Avaturn iframe
        .route(
            "/api/message",
            post(api::post_message).layer(DefaultBodyLimit::max(message_limit)),
        )
        // Read-only views
        .route("/api/status", get(api::get_status))
        .route("/api/avatar", get(api::get_avatar))
        .route("/api/scene", get(api::get_scene))
        // Controls
        .route("/api/models/:id", delete(api::delete_model))
        .route("/api/viewport", post(api::post_viewport))
        .route("/api/step", post(api::post_step))
        // SSE stream of scene events
        .route("/api/stream", get(api::scene_stream))
        // Middleware
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
