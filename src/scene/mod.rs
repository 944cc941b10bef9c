//! Scene module
//!
//! The render-host side of the viewer: attached models, the shared animation
//! group and mixer, and the stage around the avatar.

pub mod animation;
pub mod graph;
pub mod model;
pub mod stage;

pub use animation::{filter_animation, AnimationClip, AnimationMixer, Track, TrackProperty};
pub use graph::{AnimationGroup, SceneGraph};
pub use model::{MeshNode, Model, ModelId};
pub use stage::Stage;
