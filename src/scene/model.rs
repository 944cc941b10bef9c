//! Loaded model handles

use serde::Serialize;

use super::animation::AnimationClip;

/// Identifier of a model attached to the scene graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ModelId(pub(crate) u64);

impl ModelId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl From<u64> for ModelId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for ModelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "model#{}", self.0)
    }
}

/// A mesh node inside a model, with its shadow and shading flags
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeshNode {
    pub name: String,
    pub cast_shadow: bool,
    pub receive_shadow: bool,
    pub env_map_intensity: f32,
}

impl MeshNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cast_shadow: false,
            receive_shadow: false,
            env_map_intensity: 1.0,
        }
    }
}

/// A loaded 3D asset.
///
/// Owned by the [`SceneGraph`](super::SceneGraph) once attached; addressed by
/// [`ModelId`] from then on.
#[derive(Debug, Clone)]
pub struct Model {
    source: String,
    meshes: Vec<MeshNode>,
    node_names: Vec<String>,
    animations: Vec<AnimationClip>,
    visible: bool,
}

impl Model {
    /// Create an empty, visible model loaded from `source`
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            meshes: Vec::new(),
            node_names: Vec::new(),
            animations: Vec::new(),
            visible: true,
        }
    }

    pub fn with_meshes(mut self, meshes: Vec<MeshNode>) -> Self {
        self.meshes = meshes;
        self
    }

    pub fn with_node_names(mut self, names: Vec<String>) -> Self {
        self.node_names = names;
        self
    }

    pub fn with_animations(mut self, animations: Vec<AnimationClip>) -> Self {
        self.animations = animations;
        self
    }

    /// Url the model was loaded from
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn meshes(&self) -> &[MeshNode] {
        &self.meshes
    }

    pub fn node_names(&self) -> &[String] {
        &self.node_names
    }

    pub fn animations(&self) -> &[AnimationClip] {
        &self.animations
    }

    /// Take ownership of the animation clips, leaving the model without any
    pub fn take_animations(&mut self) -> Vec<AnimationClip> {
        std::mem::take(&mut self.animations)
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    /// Visit every mesh node
    pub fn traverse_meshes_mut(&mut self, mut f: impl FnMut(&mut MeshNode)) {
        for mesh in &mut self.meshes {
            f(mesh);
        }
    }

    /// Make every mesh cast and receive shadows and use the given
    /// environment-map intensity.
    pub fn prepare_shading(&mut self, env_map_intensity: f32) {
        self.traverse_meshes_mut(|mesh| {
            mesh.cast_shadow = true;
            mesh.receive_shadow = true;
            mesh.env_map_intensity = env_map_intensity;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_model_is_visible() {
        let model = Model::new("a.glb");
        assert!(model.is_visible());
        assert_eq!(model.source(), "a.glb");
        assert!(model.meshes().is_empty());
    }

    #[test]
    fn test_prepare_shading_marks_every_mesh() {
        let mut model = Model::new("a.glb")
            .with_meshes(vec![MeshNode::new("Body"), MeshNode::new("Hair")]);

        model.prepare_shading(0.3);

        for mesh in model.meshes() {
            assert!(mesh.cast_shadow);
            assert!(mesh.receive_shadow);
            assert!((mesh.env_map_intensity - 0.3).abs() < f32::EPSILON);
        }
    }

    #[test]
    fn test_model_id_display() {
        assert_eq!(ModelId::from(7).to_string(), "model#7");
    }
}
