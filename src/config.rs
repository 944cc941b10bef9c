//! Configuration parsing and management for Kawari3D

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, Kawari3dError};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub viewer: ViewerConfig,
    pub loader: LoaderConfig,
    pub swap: SwapConfig,
    pub render: RenderConfig,
    pub stage: StageConfig,
    pub http: HttpConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Kawari3dError> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ConfigError::ReadFile(format!("{}: {}", path.as_ref().display(), e))
        })?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, Kawari3dError> {
        toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()).into())
    }

    /// Load configuration from default paths
    pub fn load() -> Result<Self, Kawari3dError> {
        let paths = [
            PathBuf::from("config.toml"),
            PathBuf::from("config/default.toml"),
            dirs_path().join("config.toml"),
        ];

        for path in &paths {
            if path.exists() {
                tracing::info!("Loading config from: {}", path.display());
                return Self::from_file(path);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), Kawari3dError> {
        if self.viewer.default_model.trim().is_empty() {
            return Err(invalid("viewer.default_model", "Default model url must not be empty"));
        }

        let intensity = self.viewer.env_map_intensity;
        if intensity.is_nan() || intensity < 0.0 {
            return Err(invalid(
                "viewer.env_map_intensity",
                "Environment map intensity must be zero or positive",
            ));
        }

        if self.loader.max_asset_bytes == 0 {
            return Err(invalid("loader.max_asset_bytes", "Asset size limit must be greater than 0"));
        }

        if self.render.target_fps == 0 {
            return Err(invalid("render.target_fps", "Target FPS must be greater than 0"));
        }

        if !(self.render.viewport_fraction > 0.0 && self.render.viewport_fraction <= 1.0) {
            return Err(invalid(
                "render.viewport_fraction",
                "Viewport fraction must be in (0.0, 1.0]",
            ));
        }

        if self.render.window_width == 0 || self.render.window_height == 0 {
            tracing::warn!(
                "Window size {}x{} has a zero dimension, aspect will fall back to 1.0",
                self.render.window_width,
                self.render.window_height
            );
        }

        if self.stage.camera_near <= 0.0 || self.stage.camera_far <= self.stage.camera_near {
            return Err(invalid(
                "stage.camera_near",
                "Camera near plane must be positive and less than the far plane",
            ));
        }

        if self.http.port == 0 {
            return Err(invalid("http.port", "Port must be greater than 0"));
        }

        Ok(())
    }
}

fn invalid(field: &str, message: &str) -> Kawari3dError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        message: message.to_string(),
    }
    .into()
}

/// Startup assets and viewer behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Avatar shown at startup
    pub default_model: String,
    /// Asset whose first animation clip loops over every avatar
    pub animation_clip: String,
    /// Equirectangular HDR environment map (optional)
    pub environment_map: Option<String>,
    /// Avaturn editor embedded by the viewer page
    pub avaturn_url: String,
    /// Environment map intensity applied to every avatar mesh
    pub env_map_intensity: f32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            default_model: "public/default_model.glb".to_string(),
            animation_clip: "public/typing.glb".to_string(),
            environment_map: Some("public/brown_photostudio_01.hdr".to_string()),
            avaturn_url: "https://demo.avaturn.dev".to_string(),
            env_map_intensity: 0.3,
        }
    }
}

/// Asset fetching configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Base directory for relative asset paths
    pub assets_root: PathBuf,
    /// Allow http(s) asset urls
    pub allow_remote: bool,
    /// HTTP fetch timeout in seconds
    pub timeout_secs: u64,
    /// Largest accepted asset payload in bytes
    pub max_asset_bytes: u64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            assets_root: PathBuf::from("."),
            allow_remote: true,
            timeout_secs: 30,
            max_asset_bytes: 64 * 1024 * 1024,
        }
    }
}

/// What happens to concurrent and replaced avatars
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SwapConfig {
    /// Handling of loads that overlap in time
    pub policy: SwapPolicy,
    /// Dispose a replaced avatar instead of only hiding it
    pub dispose_replaced: bool,
}

/// Swap race policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapPolicy {
    /// Every load runs to completion; the last one to finish becomes current
    #[default]
    LastCompletedWins,
    /// A newer swap event aborts older in-flight loads
    CancelSuperseded,
}

/// Render loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Frames per second driven by the render loop
    pub target_fps: u32,
    /// Initial window width in pixels
    pub window_width: u32,
    /// Initial window height in pixels
    pub window_height: u32,
    /// Share of the window width used by the viewport
    pub viewport_fraction: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            target_fps: 60,
            window_width: 1920,
            window_height: 1080,
            viewport_fraction: 0.5,
        }
    }
}

/// Camera, lights, fog and ground
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StageConfig {
    pub camera_fov_deg: f32,
    pub camera_near: f32,
    pub camera_far: f32,
    pub camera_position: [f32; 3],
    pub camera_target: [f32; 3],
    pub background: u32,
    pub fog_color: u32,
    pub fog_near: f32,
    pub fog_far: f32,
    pub ground_size: f32,
    pub ground_color: u32,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            camera_fov_deg: 45.0,
            camera_near: 1.0,
            camera_far: 1000.0,
            camera_position: [-2.0, 1.0, 3.0],
            camera_target: [0.0, 1.0, 0.0],
            background: 0xffffff,
            fog_color: 0xa0a0a0,
            fog_near: 10.0,
            fog_far: 50.0,
            ground_size: 100.0,
            ground_color: 0x999999,
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Enable HTTP server
    pub enabled: bool,
    /// HTTP server host
    pub host: String,
    /// HTTP server port
    pub port: u16,
    /// Enable CORS
    pub cors_enabled: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 8080,
            cors_enabled: true,
        }
    }
}

/// Get the platform-specific configuration directory
fn dirs_path() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        if let Some(config_dir) = std::env::var_os("XDG_CONFIG_HOME") {
            return PathBuf::from(config_dir).join("kawari3d");
        }
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(".config/kawari3d");
        }
    }

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join("Library/Application Support/kawari3d");
        }
    }

    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata).join("kawari3d");
        }
    }

    PathBuf::from(".")
}
