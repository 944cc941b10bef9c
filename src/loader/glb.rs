//! glTF/GLB parsing into scene models.
//!
//! Only what the viewer needs is extracted: mesh nodes (for shadow and
//! shading flags), node names, and animation clips with their track names
//! and durations. Binary buffers are never decoded; clip durations come from
//! the `max` bound every animation input accessor must carry.

use gltf::animation::Property;
use gltf::Gltf;

use super::fetch::truncate;
use crate::error::LoadError;
use crate::scene::{AnimationClip, MeshNode, Model, Track, TrackProperty};

/// Parse GLB or JSON glTF bytes loaded from `url`
pub fn parse_model(url: &str, bytes: &[u8]) -> Result<Model, LoadError> {
    let gltf = Gltf::from_slice(bytes).map_err(|e| LoadError::Parse {
        url: truncate(url),
        reason: e.to_string(),
    })?;
    let document = &gltf.document;

    let mut meshes = Vec::new();
    let mut node_names = Vec::new();

    let scenes: Vec<gltf::Scene> = match document.default_scene() {
        Some(scene) => vec![scene],
        None => document.scenes().collect(),
    };

    if scenes.is_empty() {
        // No scene hierarchy: every node counts, no recursion needed
        for node in document.nodes() {
            visit_node(&node, &mut meshes, &mut node_names);
        }
    } else {
        for scene in &scenes {
            for root in scene.nodes() {
                walk(&root, &mut meshes, &mut node_names);
            }
        }
    }

    let animations: Vec<AnimationClip> = document
        .animations()
        .map(|animation| read_clip(&animation))
        .collect();

    tracing::debug!(
        "Parsed {}: {} meshes, {} named nodes, {} animations",
        truncate(url),
        meshes.len(),
        node_names.len(),
        animations.len()
    );

    Ok(Model::new(url)
        .with_meshes(meshes)
        .with_node_names(node_names)
        .with_animations(animations))
}

fn walk(node: &gltf::Node, meshes: &mut Vec<MeshNode>, names: &mut Vec<String>) {
    visit_node(node, meshes, names);
    for child in node.children() {
        walk(&child, meshes, names);
    }
}

fn visit_node(node: &gltf::Node, meshes: &mut Vec<MeshNode>, names: &mut Vec<String>) {
    if let Some(name) = node.name().filter(|n| !n.is_empty()) {
        names.push(name.to_string());
    }
    if let Some(mesh) = node.mesh() {
        let name = node.name().or_else(|| mesh.name()).unwrap_or("");
        meshes.push(MeshNode::new(name));
    }
}

fn read_clip(animation: &gltf::Animation) -> AnimationClip {
    let name = animation
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("animation_{}", animation.index()));

    let mut duration = 0.0f32;
    let mut tracks = Vec::new();

    for channel in animation.channels() {
        let target = channel.target();
        let property = match target.property() {
            Property::Translation => TrackProperty::Position,
            Property::Rotation => TrackProperty::Quaternion,
            Property::Scale => TrackProperty::Scale,
            Property::MorphTargetWeights => TrackProperty::MorphTargetInfluences,
        };

        let input = channel.sampler().input();
        let end = input
            .max()
            .as_ref()
            .and_then(|max| max.as_array())
            .and_then(|values| values.first())
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0) as f32;
        duration = duration.max(end);

        let node = target.node();
        tracks.push(Track::for_node(node.name(), property, input.count()));
    }

    AnimationClip::new(name, duration, tracks)
}
