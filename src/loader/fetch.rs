//! Asset byte fetching for http(s), data and file urls

use base64::{engine::general_purpose, Engine as _};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::LoaderConfig;
use crate::error::LoadError;

/// Where an asset url points
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetLocation {
    /// http:// or https://
    Remote(String),
    /// `data:<mime>;base64,<payload>`
    Inline { mime: String, payload: String },
    /// Path on disk, already joined with the assets root
    Local(PathBuf),
}

/// Classify `url` and resolve relative paths against `assets_root`
pub fn resolve(url: &str, assets_root: &Path) -> Result<AssetLocation, LoadError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(LoadError::InvalidUrl(url.to_string()));
    }

    let lower = url.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return Ok(AssetLocation::Remote(url.to_string()));
    }

    if lower.starts_with("data:") {
        let (header, payload) = url[5..]
            .split_once(',')
            .ok_or_else(|| LoadError::InvalidUrl(truncate(url)))?;
        let mime = match header.strip_suffix(";base64") {
            Some(mime) => mime,
            None => return Err(LoadError::InvalidUrl(truncate(url))),
        };
        return Ok(AssetLocation::Inline {
            mime: mime.to_string(),
            payload: payload.to_string(),
        });
    }

    let path = url.strip_prefix("file://").unwrap_or(url);
    if lower.contains("://") && !lower.starts_with("file://") {
        return Err(LoadError::InvalidUrl(url.to_string()));
    }

    let path = Path::new(path);
    Ok(AssetLocation::Local(if path.is_absolute() {
        path.to_path_buf()
    } else {
        assets_root.join(path)
    }))
}

/// Data urls can be megabytes long; keep log lines readable
pub(crate) fn truncate(url: &str) -> String {
    const MAX: usize = 64;
    match url.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &url[..idx]),
        None => url.to_string(),
    }
}

/// Fetches raw asset bytes
#[derive(Debug, Clone)]
pub struct AssetFetcher {
    client: reqwest::Client,
    config: LoaderConfig,
}

impl AssetFetcher {
    pub fn new(config: &LoaderConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build HTTP client with timeout: {}", e);
                reqwest::Client::new()
            });

        Self {
            client,
            config: config.clone(),
        }
    }

    pub fn assets_root(&self) -> &Path {
        &self.config.assets_root
    }

    /// Fetch the bytes behind `url`
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>, LoadError> {
        let limit = self.config.max_asset_bytes;

        let bytes = match resolve(url, &self.config.assets_root)? {
            AssetLocation::Remote(remote) => {
                if !self.config.allow_remote {
                    return Err(LoadError::RemoteDisabled(remote));
                }
                self.fetch_remote(&remote, limit).await?
            }
            AssetLocation::Inline { mime, payload } => {
                tracing::debug!("Decoding inline {} asset ({} chars)", mime, payload.len());
                general_purpose::STANDARD
                    .decode(payload.as_bytes())
                    .map_err(|e| LoadError::Parse {
                        url: truncate(url),
                        reason: format!("invalid base64 payload: {}", e),
                    })?
            }
            AssetLocation::Local(path) => {
                let metadata = tokio::fs::metadata(&path).await.map_err(|e| LoadError::Fetch {
                    url: path.display().to_string(),
                    reason: e.to_string(),
                })?;
                if metadata.len() > limit {
                    return Err(LoadError::TooLarge {
                        url: path.display().to_string(),
                        limit,
                    });
                }
                tokio::fs::read(&path).await.map_err(|e| LoadError::Fetch {
                    url: path.display().to_string(),
                    reason: e.to_string(),
                })?
            }
        };

        if bytes.len() as u64 > limit {
            return Err(LoadError::TooLarge {
                url: truncate(url),
                limit,
            });
        }

        Ok(bytes)
    }

    async fn fetch_remote(&self, url: &str, limit: u64) -> Result<Vec<u8>, LoadError> {
        tracing::debug!("Fetching remote asset {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| LoadError::Fetch {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(LoadError::Http {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        if response.content_length().is_some_and(|len| len > limit) {
            return Err(LoadError::TooLarge {
                url: url.to_string(),
                limit,
            });
        }

        // Content-Length is optional; enforce the limit as chunks arrive
        let mut body = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| LoadError::Fetch {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
            if (body.len() + chunk.len()) as u64 > limit {
                return Err(LoadError::TooLarge {
                    url: url.to_string(),
                    limit,
                });
            }
            body.extend_from_slice(&chunk);
        }

        Ok(body)
    }
}
