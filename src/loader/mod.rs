//! Model loading module
//!
//! The suspending half of the render host: turn an asset url into a parsed
//! [`Model`]. Everything after the bytes arrive is synchronous.

pub mod fetch;
pub mod glb;

#[cfg(test)]
pub(crate) mod stub;

use async_trait::async_trait;

use crate::config::LoaderConfig;
use crate::error::LoadError;
use crate::scene::{AnimationClip, Model};

pub use fetch::{AssetFetcher, AssetLocation};

/// Asynchronous model source used by the viewer session
#[async_trait]
pub trait ModelLoader: Send + Sync {
    /// Fetch and parse the model at `url`
    async fn load_model(&self, url: &str) -> Result<Model, LoadError>;

    /// Load `url` and return its first animation clip
    async fn load_clip(&self, url: &str) -> Result<AnimationClip, LoadError> {
        let mut model = self.load_model(url).await?;
        model
            .take_animations()
            .into_iter()
            .next()
            .ok_or_else(|| LoadError::NoAnimations(url.to_string()))
    }

    /// Fetch an HDR environment map, returning its size in bytes
    async fn load_environment(&self, url: &str) -> Result<usize, LoadError> {
        Err(LoadError::Fetch {
            url: url.to_string(),
            reason: "environment maps are not supported by this loader".to_string(),
        })
    }
}

/// glTF/GLB loader backed by [`AssetFetcher`]
#[derive(Debug, Clone)]
pub struct GltfLoader {
    fetcher: AssetFetcher,
}

impl GltfLoader {
    pub fn new(config: &LoaderConfig) -> Self {
        Self {
            fetcher: AssetFetcher::new(config),
        }
    }

    pub fn fetcher(&self) -> &AssetFetcher {
        &self.fetcher
    }
}

#[async_trait]
impl ModelLoader for GltfLoader {
    async fn load_model(&self, url: &str) -> Result<Model, LoadError> {
        let bytes = self.fetcher.fetch(url).await?;
        glb::parse_model(url, &bytes)
    }

    async fn load_environment(&self, url: &str) -> Result<usize, LoadError> {
        let bytes = self.fetcher.fetch(url).await?;
        check_radiance_header(url, &bytes)?;
        Ok(bytes.len())
    }
}

/// Radiance HDR files start with `#?RADIANCE` or `#?RGBE`
fn check_radiance_header(url: &str, bytes: &[u8]) -> Result<(), LoadError> {
    if bytes.starts_with(b"#?RADIANCE") || bytes.starts_with(b"#?RGBE") {
        Ok(())
    } else {
        Err(LoadError::Parse {
            url: url.to_string(),
            reason: "missing Radiance HDR header".to_string(),
        })
    }
}
