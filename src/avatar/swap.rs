//! Avatar hot-swap controller
//!
//! Turns raw messages from the customization iframe into avatar swaps. The
//! load runs as a spawned task so neither the caller nor the render loop
//! waits on the network; the swap itself is a single scene-graph write.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, info, warn};

use crate::bridge::{self, InboundEvent, IrrelevantReason, MalformedReason};
use crate::config::SwapPolicy;
use crate::loader::fetch::truncate;
use crate::scene::ModelId;
use crate::session::ViewerSession;

/// Why a message did not start a swap
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    Malformed(MalformedReason),
    Irrelevant(IrrelevantReason),
}

/// How a dispatched swap ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwapOutcome {
    /// The new model is attached and is now the current avatar
    Swapped {
        previous: Option<ModelId>,
        current: ModelId,
    },
    /// Loading failed; the current avatar is unchanged
    LoadFailed(String),
    /// A newer swap took over before this one was attached
    Superseded,
}

/// Handle to an in-flight swap
#[derive(Debug)]
pub struct SwapTicket {
    url: String,
    generation: u64,
    handle: JoinHandle<SwapOutcome>,
}

impl SwapTicket {
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Dispatch order of this swap, starting at 1
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Wait for the swap to settle
    pub async fn settled(self) -> SwapOutcome {
        match self.handle.await {
            Ok(outcome) => outcome,
            Err(e) if e.is_cancelled() => SwapOutcome::Superseded,
            Err(e) => SwapOutcome::LoadFailed(format!("swap task failed: {}", e)),
        }
    }
}

/// Result of handling one message
#[derive(Debug)]
pub enum MessageOutcome {
    Ignored(IgnoreReason),
    Dispatched(SwapTicket),
}

impl MessageOutcome {
    pub fn is_dispatched(&self) -> bool {
        matches!(self, MessageOutcome::Dispatched(_))
    }

    pub fn into_ticket(self) -> Option<SwapTicket> {
        match self {
            MessageOutcome::Dispatched(ticket) => Some(ticket),
            MessageOutcome::Ignored(_) => None,
        }
    }
}

/// Validates inbound messages and swaps the current avatar
#[derive(Debug)]
pub struct SwapController {
    session: Arc<ViewerSession>,
    policy: SwapPolicy,
    generation: Arc<AtomicU64>,
    in_flight: Mutex<Vec<AbortHandle>>,
}

impl SwapController {
    pub fn new(session: Arc<ViewerSession>) -> Self {
        let policy = session.config().swap.policy;
        Self {
            session,
            policy,
            generation: Arc::new(AtomicU64::new(0)),
            in_flight: Mutex::new(Vec::new()),
        }
    }

    pub fn policy(&self) -> SwapPolicy {
        self.policy
    }

    /// Handle one raw message payload.
    ///
    /// Must be called from within a tokio runtime: an actionable message
    /// spawns the load task and returns immediately.
    pub fn handle_message(&self, raw: &str) -> MessageOutcome {
        match bridge::decode(raw) {
            InboundEvent::Malformed(reason) => {
                warn!("Ignoring malformed message: {}", reason);
                MessageOutcome::Ignored(IgnoreReason::Malformed(reason))
            }
            InboundEvent::Irrelevant(reason) => {
                debug!("Ignoring message: {}", reason);
                MessageOutcome::Ignored(IgnoreReason::Irrelevant(reason))
            }
            InboundEvent::AvatarExported { url, url_type } => {
                debug!("Avatar exported ({:?}): {}", url_type, truncate(&url));
                MessageOutcome::Dispatched(self.dispatch(url))
            }
        }
    }

    /// Start loading `url` and swap it in once loaded
    pub fn dispatch(&self, url: String) -> SwapTicket {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let session = Arc::clone(&self.session);
        let counter = Arc::clone(&self.generation);
        let policy = self.policy;
        let task_url = url.clone();

        let handle = tokio::spawn(async move {
            run_swap(session, task_url, policy, counter, generation).await
        });

        if self.policy == SwapPolicy::CancelSuperseded {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
            for older in in_flight.drain(..) {
                older.abort();
            }
            in_flight.push(handle.abort_handle());
        }

        SwapTicket {
            url,
            generation,
            handle,
        }
    }
}

async fn run_swap(
    session: Arc<ViewerSession>,
    url: String,
    policy: SwapPolicy,
    counter: Arc<AtomicU64>,
    generation: u64,
) -> SwapOutcome {
    let model = match session.fetch_avatar(&url).await {
        Ok(model) => model,
        Err(e) => {
            warn!("Failed to load avatar {}: {}", truncate(&url), e);
            session.report_swap_failed(&url, &e.to_string());
            return SwapOutcome::LoadFailed(e.to_string());
        }
    };

    let accept = move || match policy {
        SwapPolicy::LastCompletedWins => true,
        SwapPolicy::CancelSuperseded => counter.load(Ordering::SeqCst) == generation,
    };

    match session.install_avatar(model, accept).await {
        Ok(Some(change)) => {
            info!(
                "Avatar swapped: {:?} -> {} ({})",
                change.previous,
                change.current,
                truncate(&url)
            );
            SwapOutcome::Swapped {
                previous: change.previous,
                current: change.current,
            }
        }
        Ok(None) => {
            debug!("Swap #{} superseded before attach", generation);
            SwapOutcome::Superseded
        }
        Err(e) => {
            warn!("Failed to install avatar {}: {}", truncate(&url), e);
            session.report_swap_failed(&url, &e.to_string());
            SwapOutcome::LoadFailed(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::loader::stub::StubLoader;
    use crate::render::tests::CollectSink;
    use crate::render::RenderLoop;
    use crate::session::SceneEvent;
    use std::time::Duration;

    fn export(url: &str) -> String {
        serde_json::json!({
            "source": "avaturn",
            "eventName": "v2.avatar.exported",
            "data": { "url": url, "urlType": "httpURL" }
        })
        .to_string()
    }

    fn config(policy: SwapPolicy) -> Config {
        let mut config = Config::default();
        config.viewer.default_model = "default.glb".to_string();
        config.viewer.animation_clip = "typing.glb".to_string();
        config.viewer.environment_map = None;
        config.swap.policy = policy;
        config
    }

    async fn setup(
        loader: StubLoader,
        policy: SwapPolicy,
    ) -> (Arc<ViewerSession>, SwapController, Arc<StubLoader>) {
        let loader = Arc::new(loader);
        let session = ViewerSession::new(config(policy), loader.clone());
        session.start().await.unwrap();
        let controller = SwapController::new(session.clone());
        (session, controller, loader)
    }

    /// Current avatar id, its source, and the ids of all visible models
    async fn snapshot(session: &ViewerSession) -> (ModelId, String, Vec<ModelId>) {
        let scene = session.scene().read().await;
        let current = scene.current_avatar().unwrap();
        let source = scene.model(current).unwrap().source().to_string();
        (current, source, scene.visible_models().collect())
    }

    #[tokio::test]
    async fn test_malformed_message_leaves_avatar() {
        let (session, controller, loader) = setup(StubLoader::new(), SwapPolicy::default()).await;
        let before = snapshot(&session).await;

        for raw in ["{oops", "", r#"{"source":"avaturn","eventName":"v2.avatar.exported"}"#] {
            let outcome = controller.handle_message(raw);
            assert!(!outcome.is_dispatched());
            assert!(matches!(
                outcome,
                MessageOutcome::Ignored(IgnoreReason::Malformed(_))
            ));
        }

        assert_eq!(snapshot(&session).await, before);
        // Only the default avatar and the clip were loaded
        assert_eq!(loader.loads(), 2);
    }

    #[tokio::test]
    async fn test_foreign_source_is_ignored() {
        let (session, controller, _) = setup(StubLoader::new(), SwapPolicy::default()).await;
        let before = snapshot(&session).await;

        let raw = r#"{"source":"other","eventName":"v2.avatar.exported","data":{"url":"x.glb"}}"#;
        assert!(matches!(
            controller.handle_message(raw),
            MessageOutcome::Ignored(IgnoreReason::Irrelevant(IrrelevantReason::ForeignSource(_)))
        ));
        assert_eq!(snapshot(&session).await, before);
    }

    #[tokio::test]
    async fn test_unknown_event_is_ignored() {
        let (session, controller, _) = setup(StubLoader::new(), SwapPolicy::default()).await;
        let before = snapshot(&session).await;

        let raw = r#"{"source":"avaturn","eventName":"v2.avatar.saved","data":{"url":"x.glb"}}"#;
        assert!(matches!(
            controller.handle_message(raw),
            MessageOutcome::Ignored(IgnoreReason::Irrelevant(IrrelevantReason::UnknownEvent(_)))
        ));
        assert_eq!(snapshot(&session).await, before);
    }

    #[tokio::test]
    async fn test_valid_export_swaps_avatar() {
        let (session, controller, _) = setup(StubLoader::new(), SwapPolicy::default()).await;
        let (old, _, _) = snapshot(&session).await;

        let ticket = controller.handle_message(&export("new.glb")).into_ticket().unwrap();
        assert_eq!(ticket.url(), "new.glb");
        let outcome = ticket.settled().await;

        let (current, source, visible) = snapshot(&session).await;
        assert_eq!(
            outcome,
            SwapOutcome::Swapped {
                previous: Some(old),
                current
            }
        );
        assert_eq!(source, "new.glb");
        assert_eq!(visible, vec![current]);

        let scene = session.scene().read().await;
        assert!(!scene.model(old).unwrap().is_visible());
        assert!(scene.animation_group().contains(old));
        assert!(scene.animation_group().contains(current));
        assert!(scene.model(current).unwrap().meshes()[0].cast_shadow);
    }

    #[tokio::test]
    async fn test_load_failure_leaves_avatar() {
        let loader = StubLoader::new().failing("broken.glb");
        let (session, controller, _) = setup(loader, SwapPolicy::default()).await;
        let before = snapshot(&session).await;
        let mut events = session.subscribe_events();

        let ticket = controller.handle_message(&export("broken.glb")).into_ticket().unwrap();
        assert!(matches!(ticket.settled().await, SwapOutcome::LoadFailed(_)));

        assert_eq!(snapshot(&session).await, before);
        assert!(matches!(
            events.recv().await.unwrap(),
            SceneEvent::SwapFailed { url, .. } if url == "broken.glb"
        ));
    }

    #[tokio::test]
    async fn test_last_completed_load_wins() {
        let (session, controller, loader) = setup(StubLoader::new(), SwapPolicy::LastCompletedWins).await;
        let release_a = loader.gate("a.glb");
        let release_b = loader.gate("b.glb");

        let first = controller.handle_message(&export("a.glb")).into_ticket().unwrap();
        let second = controller.handle_message(&export("b.glb")).into_ticket().unwrap();
        assert!(first.generation() < second.generation());

        release_b.send(()).unwrap();
        assert!(matches!(second.settled().await, SwapOutcome::Swapped { .. }));
        assert_eq!(snapshot(&session).await.1, "b.glb");

        release_a.send(()).unwrap();
        assert!(matches!(first.settled().await, SwapOutcome::Swapped { .. }));

        let (current, source, visible) = snapshot(&session).await;
        assert_eq!(source, "a.glb");
        assert_eq!(visible, vec![current]);
        // Default, b and a are all still attached
        assert_eq!(session.scene().read().await.len(), 3);
    }

    #[tokio::test]
    async fn test_replayed_event_attaches_twice() {
        let (session, controller, _) = setup(StubLoader::new(), SwapPolicy::default()).await;

        let first = controller.handle_message(&export("same.glb")).into_ticket().unwrap();
        let first = first.settled().await;
        let second = controller.handle_message(&export("same.glb")).into_ticket().unwrap();
        let second = second.settled().await;

        let (SwapOutcome::Swapped { current: a, .. }, SwapOutcome::Swapped { previous, current: b }) =
            (first, second)
        else {
            panic!("both swaps should succeed");
        };
        assert_ne!(a, b);
        assert_eq!(previous, Some(a));

        let scene = session.scene().read().await;
        assert!(!scene.model(a).unwrap().is_visible());
        assert!(scene.model(b).unwrap().is_visible());
        assert_eq!(scene.current_avatar(), Some(b));
    }

    #[tokio::test]
    async fn test_cancel_superseded_keeps_newest() {
        let (session, controller, loader) = setup(StubLoader::new(), SwapPolicy::CancelSuperseded).await;
        let _release_a = loader.gate("a.glb");

        let first = controller.handle_message(&export("a.glb")).into_ticket().unwrap();
        let second = controller.handle_message(&export("b.glb")).into_ticket().unwrap();

        assert!(matches!(second.settled().await, SwapOutcome::Swapped { .. }));
        assert_eq!(first.settled().await, SwapOutcome::Superseded);

        let (_, source, visible) = snapshot(&session).await;
        assert_eq!(source, "b.glb");
        assert_eq!(visible.len(), 1);
        assert_eq!(session.scene().read().await.len(), 2);
    }

    #[tokio::test]
    async fn test_cancel_superseded_disposes_with_swap() {
        let mut config = config(SwapPolicy::CancelSuperseded);
        config.swap.dispose_replaced = true;
        let loader = Arc::new(StubLoader::new());
        let session = ViewerSession::new(config, loader.clone());
        let default = session.start().await.unwrap();
        let controller = SwapController::new(session.clone());

        let first = controller.handle_message(&export("a.glb")).into_ticket().unwrap();
        let SwapOutcome::Swapped { previous, current: a } = first.settled().await else {
            panic!("first swap should succeed");
        };
        assert_eq!(previous, Some(default));
        {
            // The replaced default is gone as soon as the swap is visible
            let scene = session.scene().read().await;
            assert_eq!(scene.len(), 1);
            assert!(scene.model(default).is_none());
        }

        // Dispatching b aborts a's finished task, which must not undo a's swap
        let release_b = loader.gate("b.glb");
        let second = controller.handle_message(&export("b.glb")).into_ticket().unwrap();
        assert_eq!(snapshot(&session).await.0, a);

        release_b.send(()).unwrap();
        let SwapOutcome::Swapped { previous, current: b } = second.settled().await else {
            panic!("second swap should succeed");
        };
        assert_eq!(previous, Some(a));

        let scene = session.scene().read().await;
        assert_eq!(scene.len(), 1);
        assert_eq!(scene.current_avatar(), Some(b));
        assert!(!scene.animation_group().contains(a));
    }

    #[tokio::test]
    async fn test_cancel_superseded_while_waiting_for_scene() {
        let mut config = config(SwapPolicy::CancelSuperseded);
        config.swap.dispose_replaced = true;
        let loader = Arc::new(StubLoader::new());
        let session = ViewerSession::new(config, loader.clone());
        let default = session.start().await.unwrap();
        let controller = SwapController::new(session.clone());

        // a is loaded but blocked on the scene write lock when b arrives
        let reader = session.scene().read().await;
        let first = controller.handle_message(&export("a.glb")).into_ticket().unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        let second = controller.handle_message(&export("b.glb")).into_ticket().unwrap();
        drop(reader);

        assert_eq!(first.settled().await, SwapOutcome::Superseded);
        assert_eq!(
            second.settled().await,
            SwapOutcome::Swapped {
                previous: Some(default),
                current: snapshot(&session).await.0
            }
        );

        let scene = session.scene().read().await;
        assert_eq!(scene.len(), 1);
        assert!(scene.model(default).is_none());
    }

    #[tokio::test]
    async fn test_gltf_exports_swap_avatar() {
        use crate::loader::fetch::tests::serve;
        use crate::loader::glb::tests::{to_glb, AVATAR_GLTF};
        use crate::loader::GltfLoader;
        use base64::{engine::general_purpose, Engine as _};

        let glb = to_glb(AVATAR_GLTF);
        let data_url = format!(
            "data:model/gltf-binary;base64,{}",
            general_purpose::STANDARD.encode(&glb)
        );
        let base = serve(
            axum::Router::new()
                .route("/avatar.glb", axum::routing::get(move || async move { glb })),
        )
        .await;

        let mut config = config(SwapPolicy::default());
        config.viewer.default_model = data_url.clone();
        config.viewer.animation_clip = data_url.clone();
        config.loader.timeout_secs = 5;
        let session = ViewerSession::new(config.clone(), Arc::new(GltfLoader::new(&config.loader)));
        let default = session.start().await.unwrap();
        assert_eq!(
            session.mixer().read().await.active_action().unwrap().clip().name,
            "Typing"
        );
        let controller = SwapController::new(session.clone());

        let remote = format!("{}/avatar.glb", base);
        let ticket = controller.handle_message(&export(&remote)).into_ticket().unwrap();
        assert_eq!(
            ticket.settled().await,
            SwapOutcome::Swapped {
                previous: Some(default),
                current: snapshot(&session).await.0
            }
        );
        let (http_id, source, visible) = snapshot(&session).await;
        assert_eq!(source, remote);
        assert_eq!(visible, vec![http_id]);

        let raw = serde_json::json!({
            "source": "avaturn",
            "eventName": "v2.avatar.exported",
            "data": { "url": data_url, "urlType": "dataURL" }
        })
        .to_string();
        let ticket = controller.handle_message(&raw).into_ticket().unwrap();
        assert!(matches!(
            ticket.settled().await,
            SwapOutcome::Swapped { previous: Some(p), .. } if p == http_id
        ));
        let (current, source, visible) = snapshot(&session).await;
        assert!(source.starts_with("data:model/gltf-binary;base64,"));
        assert_eq!(visible, vec![current]);

        let info = session.avatar_info().await.unwrap();
        assert_eq!(info.meshes.len(), 1);
        assert_eq!(info.meshes[0].name, "Body");
        assert!(info.meshes[0].cast_shadow);

        // A missing remote asset is a load failure, not a swap
        let ticket = controller
            .handle_message(&export(&format!("{}/missing.glb", base)))
            .into_ticket()
            .unwrap();
        assert!(matches!(ticket.settled().await, SwapOutcome::LoadFailed(_)));
        assert_eq!(snapshot(&session).await.0, current);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_frames_never_show_two_avatars() {
        let (session, controller, _) = setup(StubLoader::new(), SwapPolicy::default()).await;
        let sink = CollectSink::default();
        let render = RenderLoop::with_sink(session.clone(), Box::new(sink.clone()));
        let render_task = tokio::spawn(render.run());

        let mut tickets = Vec::new();
        for i in 0..50 {
            let ticket = controller
                .handle_message(&export(&format!("avatar-{}.glb", i)))
                .into_ticket()
                .unwrap();
            tickets.push(ticket);
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        for ticket in tickets {
            assert!(matches!(ticket.settled().await, SwapOutcome::Swapped { .. }));
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        session.shutdown();
        render_task.await.unwrap();

        let frames = sink.0.lock().unwrap();
        assert!(!frames.is_empty());
        for frame in frames.iter() {
            assert_eq!(frame.visible.len(), 1, "frame {}", frame.frame);
            assert_eq!(Some(frame.visible[0]), frame.current_avatar);
        }
        assert_eq!(session.scene().read().await.len(), 51);
    }
}
