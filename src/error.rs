//! Error types for Kawari3D

use thiserror::Error;

use crate::scene::ModelId;

/// Main error type for Kawari3D
#[derive(Error, Debug)]
pub enum Kawari3dError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    #[error("Scene error: {0}")]
    Scene(#[from] SceneError),

    #[error("Web server error: {0}")]
    Web(#[from] WebError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadFile(String),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid configuration value: {field} - {message}")]
    InvalidValue { field: String, message: String },
}

/// Asset fetch and parse errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoadError {
    #[error("Invalid asset url: {0}")]
    InvalidUrl(String),

    #[error("Remote assets are disabled: {0}")]
    RemoteDisabled(String),

    #[error("Failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("HTTP {status} while fetching {url}")]
    Http { url: String, status: u16 },

    #[error("Asset {url} exceeds the {limit} byte limit")]
    TooLarge { url: String, limit: u64 },

    #[error("Failed to parse {url}: {reason}")]
    Parse { url: String, reason: String },

    #[error("Asset has no animations: {0}")]
    NoAnimations(String),
}

/// Scene graph errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SceneError {
    #[error("Unknown model: {0}")]
    UnknownModel(ModelId),

    #[error("Cannot dispose the current avatar: {0}")]
    DisposeCurrent(ModelId),
}

/// Web server errors
#[derive(Error, Debug)]
pub enum WebError {
    #[error("Failed to bind to address: {0}")]
    Bind(String),

    #[error("Server error: {0}")]
    Serve(String),
}

/// Result type alias for Kawari3D operations
pub type Result<T> = std::result::Result<T, Kawari3dError>;
