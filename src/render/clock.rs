//! Frame clock and single-step control

use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Wall-clock delta between consecutive ticks
#[derive(Debug, Default)]
pub struct FrameClock {
    last: Option<Instant>,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seconds since the previous call; the first call returns 0
    pub fn delta(&mut self) -> f32 {
        self.delta_at(Instant::now())
    }

    pub fn delta_at(&mut self, now: Instant) -> f32 {
        let delta = match self.last {
            Some(last) => now.saturating_duration_since(last).as_secs_f32(),
            None => 0.0,
        };
        self.last = Some(now);
        delta
    }
}

/// Single-step mode: the mixer only advances by explicitly queued steps
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StepControl {
    pub single_step: bool,
    /// Seconds to advance on the next tick while in single-step mode
    pub next_step: f32,
}

impl StepControl {
    /// Delta to feed the mixer this frame.
    ///
    /// Outside single-step mode this is the wall-clock delta. In single-step
    /// mode the queued step is consumed and reset to zero.
    pub fn take_delta(&mut self, wall_delta: f32) -> f32 {
        if self.single_step {
            std::mem::take(&mut self.next_step)
        } else {
            wall_delta
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_clock_delta() {
        let start = Instant::now();
        let mut clock = FrameClock::new();
        assert_eq!(clock.delta_at(start), 0.0);
        let delta = clock.delta_at(start + Duration::from_millis(250));
        assert!((delta - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_step_control() {
        let mut step = StepControl::default();
        assert_eq!(step.take_delta(0.016), 0.016);

        step.single_step = true;
        assert_eq!(step.take_delta(0.016), 0.0);

        step.next_step = 0.05;
        assert_eq!(step.take_delta(0.016), 0.05);
        assert_eq!(step.next_step, 0.0);
        assert_eq!(step.take_delta(0.016), 0.0);
    }
}
