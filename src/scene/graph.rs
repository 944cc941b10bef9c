//! Scene graph holding every attached model and the current avatar

use std::collections::BTreeMap;

use crate::error::SceneError;

use super::model::{Model, ModelId};

/// Objects driven by one shared animation clock
#[derive(Debug, Clone, Default)]
pub struct AnimationGroup {
    members: Vec<ModelId>,
}

impl AnimationGroup {
    pub fn add(&mut self, id: ModelId) {
        if !self.members.contains(&id) {
            self.members.push(id);
        }
    }

    pub fn remove(&mut self, id: ModelId) -> bool {
        let before = self.members.len();
        self.members.retain(|m| *m != id);
        self.members.len() != before
    }

    pub fn contains(&self, id: ModelId) -> bool {
        self.members.contains(&id)
    }

    pub fn members(&self) -> &[ModelId] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Scene graph: attached models, the animation group, and the current avatar.
///
/// All mutation goes through `&mut self`, so a single write lock around the
/// graph makes a swap atomic for any reader.
#[derive(Debug, Default)]
pub struct SceneGraph {
    next_id: u64,
    models: BTreeMap<ModelId, Model>,
    group: AnimationGroup,
    current_avatar: Option<ModelId>,
    swap_count: u64,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a model to the scene and to the shared animation group
    pub fn attach(&mut self, model: Model) -> ModelId {
        self.next_id += 1;
        let id = ModelId(self.next_id);
        self.models.insert(id, model);
        self.group.add(id);
        id
    }

    pub fn set_visible(&mut self, id: ModelId, visible: bool) -> Result<(), SceneError> {
        let model = self
            .models
            .get_mut(&id)
            .ok_or(SceneError::UnknownModel(id))?;
        model.set_visible(visible);
        Ok(())
    }

    /// Hide the current avatar and make `id` current.
    ///
    /// Returns the previous avatar, if any. The new avatar keeps whatever
    /// visibility it was attached with.
    pub fn swap_current(&mut self, id: ModelId) -> Result<Option<ModelId>, SceneError> {
        if !self.models.contains_key(&id) {
            return Err(SceneError::UnknownModel(id));
        }

        let previous = self.current_avatar.filter(|prev| *prev != id);
        if let Some(prev) = previous {
            self.set_visible(prev, false)?;
        }
        self.current_avatar = Some(id);
        self.swap_count += 1;
        Ok(previous)
    }

    /// Remove a model from the scene and the animation group
    pub fn dispose(&mut self, id: ModelId) -> Result<Model, SceneError> {
        if self.current_avatar == Some(id) {
            return Err(SceneError::DisposeCurrent(id));
        }
        let model = self.models.remove(&id).ok_or(SceneError::UnknownModel(id))?;
        self.group.remove(id);
        Ok(model)
    }

    pub fn current_avatar(&self) -> Option<ModelId> {
        self.current_avatar
    }

    pub fn current_model(&self) -> Option<&Model> {
        self.current_avatar.and_then(|id| self.models.get(&id))
    }

    pub fn model(&self, id: ModelId) -> Option<&Model> {
        self.models.get(&id)
    }

    /// All attached models in attachment order
    pub fn models(&self) -> impl Iterator<Item = (ModelId, &Model)> {
        self.models.iter().map(|(id, model)| (*id, model))
    }

    pub fn visible_models(&self) -> impl Iterator<Item = ModelId> + '_ {
        self.models
            .iter()
            .filter(|(_, model)| model.is_visible())
            .map(|(id, _)| *id)
    }

    pub fn animation_group(&self) -> &AnimationGroup {
        &self.group
    }

    /// Number of times the current avatar slot was assigned
    pub fn swap_count(&self) -> u64 {
        self.swap_count
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
