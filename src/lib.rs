//! Kawari3D - Avatar hot-swap viewer service
//!
//! A Rust service that hosts a 3D avatar viewer session:
//! - Loads a glTF/GLB avatar and loops an animation clip over it
//! - Swaps the avatar when Avaturn reports an exported avatar
//! - Exposes the inbound message bridge, scene state and an SSE event stream over HTTP

pub mod avatar;
pub mod bridge;
pub mod config;
pub mod error;
pub mod loader;
pub mod output;
pub mod render;
pub mod scene;
pub mod session;
pub mod web;

pub use config::Config;
pub use error::{Kawari3dError, Result};

use std::sync::Arc;
use tokio::sync::broadcast;

use avatar::SwapController;
use session::ViewerSession;

/// Application state shared across all components
#[derive(Debug)]
pub struct AppState {
    /// Viewer session: scene, mixer, stage and loader
    pub session: Arc<ViewerSession>,
    /// Inbound message handling and avatar swaps
    pub controller: SwapController,
}

impl AppState {
    /// Create the application state around a viewer session
    pub fn new(session: Arc<ViewerSession>) -> Arc<Self> {
        let controller = SwapController::new(Arc::clone(&session));
        Arc::new(Self {
            session,
            controller,
        })
    }

    /// Subscribe to shutdown signal
    pub fn subscribe_shutdown(&self) -> broadcast::Receiver<()> {
        self.session.subscribe_shutdown()
    }

    /// Signal shutdown
    pub fn shutdown(&self) {
        self.session.shutdown();
    }
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
