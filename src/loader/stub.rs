//! In-memory loader for tests: no I/O, optional per-url gates to control
//! the order in which loads resolve.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::oneshot;

use super::ModelLoader;
use crate::error::LoadError;
use crate::scene::{AnimationClip, MeshNode, Model, Track, TrackProperty};

#[derive(Default)]
pub(crate) struct StubLoader {
    failing: HashSet<String>,
    gates: Mutex<HashMap<String, oneshot::Receiver<()>>>,
    loads: AtomicUsize,
}

impl StubLoader {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Every load of `url` fails with a fetch error
    pub(crate) fn failing(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }

    /// The next load of `url` waits until the returned sender fires (or drops)
    pub(crate) fn gate(&self, url: &str) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.gates
            .lock()
            .unwrap()
            .insert(url.to_string(), rx);
        tx
    }

    /// Number of `load_model` calls so far
    pub(crate) fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

pub(crate) fn avatar_model(url: &str) -> Model {
    Model::new(url)
        .with_meshes(vec![MeshNode::new("Body"), MeshNode::new("Hair")])
        .with_node_names(vec!["Armature".to_string(), "Hips".to_string()])
}

pub(crate) fn typing_clip() -> AnimationClip {
    AnimationClip::new(
        "Typing",
        2.0,
        vec![
            Track::for_node(Some("Hips"), TrackProperty::Quaternion, 60),
            Track::for_node(None, TrackProperty::Position, 60),
        ],
    )
}

#[async_trait]
impl ModelLoader for StubLoader {
    async fn load_model(&self, url: &str) -> Result<Model, LoadError> {
        self.loads.fetch_add(1, Ordering::SeqCst);

        let gate = self.gates.lock().unwrap().remove(url);
        if let Some(gate) = gate {
            let _ = gate.await;
        }

        if self.failing.contains(url) {
            return Err(LoadError::Fetch {
                url: url.to_string(),
                reason: "stub failure".to_string(),
            });
        }

        let model = avatar_model(url);
        if url.contains("typing") {
            Ok(model.with_animations(vec![typing_clip()]))
        } else {
            Ok(model)
        }
    }

    async fn load_environment(&self, url: &str) -> Result<usize, LoadError> {
        if self.failing.contains(url) {
            return Err(LoadError::Fetch {
                url: url.to_string(),
                reason: "stub failure".to_string(),
            });
        }
        Ok(1024)
    }
}
