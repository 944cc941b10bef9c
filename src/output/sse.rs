//! Server-Sent Events for scene changes

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use crate::session::{SceneEvent, ViewerSession};

/// Create an SSE stream of scene events
pub fn create_scene_stream(
    session: Arc<ViewerSession>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = session.subscribe_events();

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(event) => Some(Ok(scene_to_event(&event))),
        Err(_) => None, // Skip lagged messages
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// SSE event name for a scene event
pub fn event_name(event: &SceneEvent) -> &'static str {
    match event {
        SceneEvent::ModelAttached { .. } => "model_attached",
        SceneEvent::AvatarSwapped { .. } => "avatar_swapped",
        SceneEvent::SwapFailed { .. } => "swap_failed",
        SceneEvent::ModelDisposed { .. } => "model_disposed",
    }
}

fn scene_to_event(event: &SceneEvent) -> Event {
    let data = serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string());
    Event::default().event(event_name(event)).data(data)
}
