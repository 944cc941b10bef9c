//! Render loop
//!
//! Drives the animation mixer once per frame and hands a snapshot of the
//! scene to a [`FrameSink`]. Each frame reads the scene graph exactly once,
//! so an avatar swap is either fully visible to a frame or not at all.

pub mod clock;
pub mod stats;

pub use clock::{FrameClock, StepControl};
pub use stats::FrameStats;

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{info, trace};

use crate::scene::ModelId;
use crate::session::ViewerSession;

/// What one frame drew
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameSnapshot {
    pub frame: u64,
    /// Local time of the playing clip, if any
    pub clip_time: Option<f32>,
    pub current_avatar: Option<ModelId>,
    pub visible: Vec<ModelId>,
    pub camera_aspect: f32,
}

/// Receives every rendered frame
pub trait FrameSink: Send {
    fn present(&mut self, frame: &FrameSnapshot);
}

/// Logs frames at trace level
#[derive(Debug, Default)]
pub struct TraceSink;

impl FrameSink for TraceSink {
    fn present(&mut self, frame: &FrameSnapshot) {
        trace!(
            "frame {} clip_time={:?} avatar={:?} visible={:?}",
            frame.frame,
            frame.clip_time,
            frame.current_avatar,
            frame.visible
        );
    }
}

pub struct RenderLoop {
    session: Arc<ViewerSession>,
    sink: Box<dyn FrameSink>,
    clock: FrameClock,
    frame: u64,
}

impl RenderLoop {
    pub fn new(session: Arc<ViewerSession>) -> Self {
        Self::with_sink(session, Box::new(TraceSink))
    }

    pub fn with_sink(session: Arc<ViewerSession>, sink: Box<dyn FrameSink>) -> Self {
        Self {
            session,
            sink,
            clock: FrameClock::new(),
            frame: 0,
        }
    }

    /// Render one frame using the wall-clock delta
    pub async fn tick(&mut self) -> FrameSnapshot {
        let wall_delta = self.clock.delta();
        self.tick_with(wall_delta).await
    }

    /// Render one frame as if `wall_delta` seconds had passed
    pub async fn tick_with(&mut self, wall_delta: f32) -> FrameSnapshot {
        let delta = self.session.step().write().await.take_delta(wall_delta);

        let clip_time = {
            let mut mixer = self.session.mixer().write().await;
            mixer.update(delta);
            mixer.active_action().map(|action| action.time())
        };

        self.session.stats().write().await.update();
        self.frame += 1;

        let camera_aspect = self.session.stage().read().await.camera.aspect;

        let snapshot = {
            let scene = self.session.scene().read().await;
            FrameSnapshot {
                frame: self.frame,
                clip_time,
                current_avatar: scene.current_avatar(),
                visible: scene.visible_models().collect(),
                camera_aspect,
            }
        };

        self.sink.present(&snapshot);
        snapshot
    }

    /// Tick at `render.target_fps` until shutdown
    pub async fn run(mut self) {
        let fps = self.session.config().render.target_fps.max(1);
        let mut interval = tokio::time::interval(Duration::from_secs_f64(1.0 / f64::from(fps)));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut shutdown_rx = self.session.subscribe_shutdown();

        info!("Render loop started at {} fps", fps);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick().await;
                }
                _ = shutdown_rx.recv() => {
                    info!("Render loop shutting down after {} frames", self.frame);
                    break;
                }
            }
        }
    }
}
