//! Frame statistics

use serde::Serialize;
use std::time::{Duration, Instant};

const FPS_WINDOW: Duration = Duration::from_secs(1);

/// Frame counter with frames per second over a rolling one-second window
#[derive(Debug, Clone, Default, Serialize)]
pub struct FrameStats {
    frames: u64,
    fps: f32,
    last_frame_ms: f32,
    #[serde(skip)]
    window_start: Option<Instant>,
    #[serde(skip)]
    window_frames: u32,
    #[serde(skip)]
    last_frame: Option<Instant>,
}

impl FrameStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self) {
        self.update_at(Instant::now());
    }

    pub fn update_at(&mut self, now: Instant) {
        self.frames += 1;

        if let Some(last) = self.last_frame {
            self.last_frame_ms = now.saturating_duration_since(last).as_secs_f32() * 1000.0;
        }
        self.last_frame = Some(now);

        let start = *self.window_start.get_or_insert(now);
        self.window_frames += 1;

        let elapsed = now.saturating_duration_since(start);
        if elapsed >= FPS_WINDOW {
            self.fps = self.window_frames as f32 / elapsed.as_secs_f32();
            self.window_start = Some(now);
            self.window_frames = 0;
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn fps(&self) -> f32 {
        self.fps
    }

    pub fn last_frame_ms(&self) -> f32 {
        self.last_frame_ms
    }
}
