//! Animation clips and the mixer that drives the shared animation group.
//!
//! The mixer owns one clock for the whole group: any avatar attached to the
//! group samples the playing clip at the same time, so a freshly swapped-in
//! avatar picks up the clip mid-loop.

use serde::Serialize;

/// Animated property of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TrackProperty {
    Position,
    Quaternion,
    Scale,
    MorphTargetInfluences,
}

impl TrackProperty {
    pub fn as_str(self) -> &'static str {
        match self {
            TrackProperty::Position => "position",
            TrackProperty::Quaternion => "quaternion",
            TrackProperty::Scale => "scale",
            TrackProperty::MorphTargetInfluences => "morphTargetInfluences",
        }
    }
}

/// One keyframe track, named `"<node>.<property>"`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Track {
    pub name: String,
    pub property: TrackProperty,
    pub keyframes: usize,
}

impl Track {
    /// Build a track for `node_name`; unnamed nodes give an empty track name.
    pub fn for_node(node_name: Option<&str>, property: TrackProperty, keyframes: usize) -> Self {
        let name = match node_name {
            Some(node) if !node.is_empty() => format!("{}.{}", node, property.as_str()),
            _ => String::new(),
        };
        Self {
            name,
            property,
            keyframes,
        }
    }
}

/// A named animation clip
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnimationClip {
    pub name: String,
    /// Clip length in seconds
    pub duration: f32,
    pub tracks: Vec<Track>,
}

impl AnimationClip {
    pub fn new(name: impl Into<String>, duration: f32, tracks: Vec<Track>) -> Self {
        Self {
            name: name.into(),
            duration,
            tracks,
        }
    }
}

/// Drop tracks that have no target name; they cannot bind to any node.
pub fn filter_animation(mut clip: AnimationClip) -> AnimationClip {
    let before = clip.tracks.len();
    clip.tracks.retain(|track| !track.name.is_empty());
    tracing::debug!(
        "Clip '{}': kept {} of {} tracks ({:.2}s)",
        clip.name,
        clip.tracks.len(),
        before,
        clip.duration
    );
    clip
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionState {
    Stopped,
    Playing,
}

/// Playback state of one clip on the mixer
#[derive(Debug, Clone)]
pub struct ClipAction {
    clip: AnimationClip,
    time: f32,
    state: ActionState,
}

impl ClipAction {
    fn new(clip: AnimationClip) -> Self {
        Self {
            clip,
            time: 0.0,
            state: ActionState::Stopped,
        }
    }

    pub fn play(&mut self) -> &mut Self {
        self.state = ActionState::Playing;
        self
    }

    pub fn stop(&mut self) -> &mut Self {
        self.state = ActionState::Stopped;
        self.time = 0.0;
        self
    }

    pub fn is_playing(&self) -> bool {
        self.state == ActionState::Playing
    }

    pub fn state(&self) -> ActionState {
        self.state
    }

    pub fn clip(&self) -> &AnimationClip {
        &self.clip
    }

    /// Local time inside the clip, in `[0, duration)`
    pub fn time(&self) -> f32 {
        self.time
    }

    fn advance(&mut self, delta: f32) {
        if !self.is_playing() {
            return;
        }
        let duration = self.clip.duration;
        if duration <= 0.0 {
            self.time = 0.0;
            return;
        }
        let time = (self.time + delta).rem_euclid(duration);
        // rem_euclid can round up to exactly `duration`
        self.time = if time >= duration { 0.0 } else { time };
    }
}

/// Mixer bound to the shared animation group
#[derive(Debug, Clone, Default)]
pub struct AnimationMixer {
    actions: Vec<ClipAction>,
    time: f64,
}

impl AnimationMixer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the action for `clip` (matched by clip name)
    pub fn clip_action(&mut self, clip: AnimationClip) -> &mut ClipAction {
        let idx = match self.actions.iter().position(|a| a.clip.name == clip.name) {
            Some(idx) => idx,
            None => {
                self.actions.push(ClipAction::new(clip));
                self.actions.len() - 1
            }
        };
        &mut self.actions[idx]
    }

    /// Advance every playing action by `delta` seconds
    pub fn update(&mut self, delta: f32) {
        self.time += f64::from(delta);
        for action in &mut self.actions {
            action.advance(delta);
        }
    }

    /// Total time the mixer has been advanced
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn actions(&self) -> &[ClipAction] {
        &self.actions
    }

    /// The first playing action, if any
    pub fn active_action(&self) -> Option<&ClipAction> {
        self.actions.iter().find(|a| a.is_playing())
    }
}
