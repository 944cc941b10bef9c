//! Viewer session
//!
//! The context object shared by the swap controller, the render loop and the
//! HTTP surface. It owns the scene graph (and with it the current avatar),
//! the animation mixer, the stage and the model loader.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{LoadError, Result, SceneError};
use crate::loader::fetch::truncate;
use crate::loader::ModelLoader;
use crate::render::{FrameStats, StepControl};
use crate::scene::{filter_animation, AnimationMixer, MeshNode, Model, ModelId, SceneGraph, Stage};

/// Notifications about scene changes, broadcast to observers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SceneEvent {
    ModelAttached { id: ModelId, source: String },
    AvatarSwapped { previous: Option<ModelId>, current: ModelId },
    SwapFailed { url: String, reason: String },
    ModelDisposed { id: ModelId },
}

/// Result of installing a new avatar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvatarChange {
    pub previous: Option<ModelId>,
    pub current: ModelId,
}

#[derive(Debug, Clone, Serialize)]
pub struct AvatarInfo {
    pub id: ModelId,
    pub source: String,
    pub meshes: Vec<MeshNode>,
    pub node_names: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelSummary {
    pub id: ModelId,
    pub source: String,
    pub visible: bool,
    pub current: bool,
    pub meshes: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SceneSummary {
    pub current_avatar: Option<ModelId>,
    pub swap_count: u64,
    pub animation_group: Vec<ModelId>,
    pub models: Vec<ModelSummary>,
}

pub struct ViewerSession {
    config: Config,
    scene: RwLock<SceneGraph>,
    mixer: RwLock<AnimationMixer>,
    stage: RwLock<Stage>,
    step: RwLock<StepControl>,
    stats: RwLock<FrameStats>,
    loader: Arc<dyn ModelLoader>,
    events_tx: broadcast::Sender<SceneEvent>,
    shutdown_tx: broadcast::Sender<()>,
}

impl std::fmt::Debug for ViewerSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewerSession")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ViewerSession {
    /// Create a session with an empty scene
    pub fn new(config: Config, loader: Arc<dyn ModelLoader>) -> Arc<Self> {
        let (events_tx, _) = broadcast::channel(64);
        let (shutdown_tx, _) = broadcast::channel(1);
        let stage = Stage::new(&config.stage, &config.render);

        Arc::new(Self {
            config,
            scene: RwLock::new(SceneGraph::new()),
            mixer: RwLock::new(AnimationMixer::new()),
            stage: RwLock::new(stage),
            step: RwLock::new(StepControl::default()),
            stats: RwLock::new(FrameStats::new()),
            loader,
            events_tx,
            shutdown_tx,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Load the environment map, the default avatar and the looping clip.
    ///
    /// Only the default avatar is required; a missing environment map or clip
    /// is logged and the viewer runs without it.
    pub async fn start(&self) -> Result<ModelId> {
        let viewer = &self.config.viewer;

        if let Some(ref env_url) = viewer.environment_map {
            match self.loader.load_environment(env_url).await {
                Ok(bytes) => {
                    self.stage.write().await.set_environment(env_url, bytes);
                    info!("Environment map loaded: {} ({} bytes)", env_url, bytes);
                }
                Err(e) => warn!("Environment map unavailable: {}", e),
            }
        }

        let id = self.load_avatar(&viewer.default_model).await?;
        let previous = self.scene.write().await.swap_current(id)?;
        let _ = self.events_tx.send(SceneEvent::AvatarSwapped {
            previous,
            current: id,
        });
        info!("Default avatar ready: {} ({})", id, viewer.default_model);

        match self.loader.load_clip(&viewer.animation_clip).await {
            Ok(clip) => {
                let clip = filter_animation(clip);
                info!("Playing clip '{}' ({:.2}s)", clip.name, clip.duration);
                self.mixer.write().await.clip_action(clip).play();
            }
            Err(e) => warn!("Animation clip unavailable: {}", e),
        }

        Ok(id)
    }

    /// Fetch a model and prepare its shading, without attaching it
    pub async fn fetch_avatar(&self, url: &str) -> std::result::Result<Model, LoadError> {
        let mut model = self.loader.load_model(url).await?;
        model.prepare_shading(self.config.viewer.env_map_intensity);
        debug!(
            "Fetched {} ({} meshes, {} animations)",
            truncate(url),
            model.meshes().len(),
            model.animations().len()
        );
        Ok(model)
    }

    /// Load a model and attach it to the scene and the shared animation group
    pub async fn load_avatar(&self, url: &str) -> Result<ModelId> {
        let model = self.fetch_avatar(url).await?;
        let source = truncate(model.source());
        let id = self.scene.write().await.attach(model);
        let _ = self.events_tx.send(SceneEvent::ModelAttached { id, source });
        Ok(id)
    }

    /// Attach `model` and make it the current avatar in one scene write.
    ///
    /// `accept` runs under the write lock; when it returns false nothing is
    /// attached and `Ok(None)` is returned. With `swap.dispose_replaced` the
    /// previous avatar is disposed in the same write. Nothing after the lock
    /// is released awaits, so an aborted caller either sees no change or the
    /// whole swap.
    pub async fn install_avatar(
        &self,
        model: Model,
        accept: impl FnOnce() -> bool + Send,
    ) -> Result<Option<AvatarChange>> {
        let source = truncate(model.source());

        let (change, disposed) = {
            let mut scene = self.scene.write().await;
            if !accept() {
                return Ok(None);
            }
            let current = scene.attach(model);
            let previous = scene.swap_current(current)?;

            let disposed = match previous {
                Some(previous) if self.config.swap.dispose_replaced => {
                    match scene.dispose(previous) {
                        Ok(_) => Some(previous),
                        Err(e) => {
                            warn!("Failed to dispose replaced avatar {}: {}", previous, e);
                            None
                        }
                    }
                }
                _ => None,
            };

            (AvatarChange { previous, current }, disposed)
        };

        let _ = self.events_tx.send(SceneEvent::ModelAttached {
            id: change.current,
            source,
        });
        let _ = self.events_tx.send(SceneEvent::AvatarSwapped {
            previous: change.previous,
            current: change.current,
        });
        if let Some(id) = disposed {
            debug!("Disposed replaced avatar {}", id);
            let _ = self.events_tx.send(SceneEvent::ModelDisposed { id });
        }

        Ok(Some(change))
    }

    /// Remove a model that is no longer the current avatar
    pub async fn dispose_model(&self, id: ModelId) -> std::result::Result<(), SceneError> {
        let model = self.scene.write().await.dispose(id)?;
        debug!("Disposed {} ({})", id, truncate(model.source()));
        let _ = self.events_tx.send(SceneEvent::ModelDisposed { id });
        Ok(())
    }

    /// Broadcast a failed swap
    pub fn report_swap_failed(&self, url: &str, reason: &str) {
        let _ = self.events_tx.send(SceneEvent::SwapFailed {
            url: truncate(url),
            reason: reason.to_string(),
        });
    }

    pub async fn current_avatar(&self) -> Option<ModelId> {
        self.scene.read().await.current_avatar()
    }

    pub async fn avatar_info(&self) -> Option<AvatarInfo> {
        let scene = self.scene.read().await;
        let id = scene.current_avatar()?;
        let model = scene.model(id)?;
        Some(AvatarInfo {
            id,
            source: truncate(model.source()),
            meshes: model.meshes().to_vec(),
            node_names: model.node_names().to_vec(),
        })
    }

    pub async fn scene_summary(&self) -> SceneSummary {
        let scene = self.scene.read().await;
        let current = scene.current_avatar();
        SceneSummary {
            current_avatar: current,
            swap_count: scene.swap_count(),
            animation_group: scene.animation_group().members().to_vec(),
            models: scene
                .models()
                .map(|(id, model)| ModelSummary {
                    id,
                    source: truncate(model.source()),
                    visible: model.is_visible(),
                    current: current == Some(id),
                    meshes: model.meshes().len(),
                })
                .collect(),
        }
    }

    /// Resize the viewer for a new window size
    pub async fn resize(&self, width: u32, height: u32) {
        self.stage.write().await.resize(width, height);
    }

    pub async fn set_step(&self, step: StepControl) {
        *self.step.write().await = step;
    }

    pub fn scene(&self) -> &RwLock<SceneGraph> {
        &self.scene
    }

    pub fn mixer(&self) -> &RwLock<AnimationMixer> {
        &self.mixer
    }

    pub fn stage(&self) -> &RwLock<Stage> {
        &self.stage
    }

    pub fn step(&self) -> &RwLock<StepControl> {
        &self.step
    }

    pub fn stats(&self) -> &RwLock<FrameStats> {
        &self.stats
    }

    /// Subscribe to scene events
    pub fn subscribe_events(&self) -> broadcast::Receiver<SceneEvent> {
        self.events_tx.subscribe()
    }

    /// Subscribe to shutdown signal
    pub fn subscribe_shutdown(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Signal shutdown
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }
}
