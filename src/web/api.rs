//! REST API endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::SwapPolicy;
use crate::error::SceneError;
use crate::output::sse;
use crate::scene::ModelId;
use crate::scene::stage::Viewport;
use crate::AppState;

/// API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

impl ApiResponse<()> {
    pub fn error(message: &str) -> Json<Self> {
        Json(Self {
            success: false,
            data: None,
            error: Some(message.to_string()),
        })
    }

    pub fn ok() -> Json<Self> {
        Json(Self {
            success: true,
            data: None,
            error: None,
        })
    }
}

/// Accept a raw message from the Avaturn iframe.
///
/// The sender gets no acknowledgement beyond `204`, whatever the payload.
pub async fn post_message(State(state): State<Arc<AppState>>, body: String) -> StatusCode {
    state.controller.handle_message(&body);
    StatusCode::NO_CONTENT
}

/// Status response
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub version: String,
    pub current_avatar: Option<ModelId>,
    pub models: usize,
    pub swap_count: u64,
    pub swap_policy: SwapPolicy,
    pub clip: Option<String>,
    pub clip_time: Option<f32>,
    pub frames: u64,
    pub fps: f32,
}

/// Get current status
pub async fn get_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let session = &state.session;

    let (current_avatar, models, swap_count) = {
        let scene = session.scene().read().await;
        (scene.current_avatar(), scene.len(), scene.swap_count())
    };
    let (clip, clip_time) = {
        let mixer = session.mixer().read().await;
        match mixer.active_action() {
            Some(action) => (Some(action.clip().name.clone()), Some(action.time())),
            None => (None, None),
        }
    };
    let (frames, fps) = {
        let stats = session.stats().read().await;
        (stats.frames(), stats.fps())
    };

    ApiResponse::success(StatusResponse {
        version: crate::VERSION.to_string(),
        current_avatar,
        models,
        swap_count,
        swap_policy: state.controller.policy(),
        clip,
        clip_time,
        frames,
        fps,
    })
}

/// Get the current avatar
pub async fn get_avatar(State(state): State<Arc<AppState>>) -> Response {
    match state.session.avatar_info().await {
        Some(info) => ApiResponse::success(info).into_response(),
        None => (StatusCode::NOT_FOUND, ApiResponse::error("No avatar loaded")).into_response(),
    }
}

/// Get every attached model
pub async fn get_scene(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ApiResponse::success(state.session.scene_summary().await)
}

/// Dispose a model that is no longer the current avatar
pub async fn delete_model(State(state): State<Arc<AppState>>, Path(id): Path<u64>) -> Response {
    match state.session.dispose_model(ModelId::from(id)).await {
        Ok(()) => ApiResponse::ok().into_response(),
        Err(e @ SceneError::UnknownModel(_)) => {
            (StatusCode::NOT_FOUND, ApiResponse::error(&e.to_string())).into_response()
        }
        Err(e @ SceneError::DisposeCurrent(_)) => {
            (StatusCode::CONFLICT, ApiResponse::error(&e.to_string())).into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ViewportUpdate {
    pub width: u32,
    pub height: u32,
}

/// Resize the viewer for a new window size
pub async fn post_viewport(
    State(state): State<Arc<AppState>>,
    Json(update): Json<ViewportUpdate>,
) -> Json<ApiResponse<Viewport>> {
    state.session.resize(update.width, update.height).await;
    let viewport = state.session.stage().read().await.viewport;
    ApiResponse::success(viewport)
}

#[derive(Debug, Deserialize)]
pub struct StepUpdate {
    #[serde(default)]
    pub single_step: Option<bool>,
    /// Seconds to advance on the next frame in single-step mode
    #[serde(default)]
    pub step: Option<f32>,
}

/// Toggle single-step mode or queue the next step
pub async fn post_step(
    State(state): State<Arc<AppState>>,
    Json(update): Json<StepUpdate>,
) -> Response {
    if let Some(step) = update.step {
        if !step.is_finite() || step < 0.0 {
            return (
                StatusCode::BAD_REQUEST,
                ApiResponse::error("step must be a non-negative number of seconds"),
            )
                .into_response();
        }
    }

    let mut control = state.session.step().write().await;
    if let Some(single_step) = update.single_step {
        control.single_step = single_step;
    }
    if let Some(step) = update.step {
        control.next_step = step;
    }

    ApiResponse::success(*control).into_response()
}

/// SSE endpoint for scene events
pub async fn scene_stream(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    sse::create_scene_stream(Arc::clone(&state.session))
}
