//! Error types shared by the server and the client.
//!
//! Startup problems are [`ConfigError`]s and stop the process. Anything that
//! goes wrong while talking to the generative backend is a
//! [`GenerationError`], which is recoverable per request.

use std::path::PathBuf;
use thiserror::Error;

/// Fatal configuration problems, reported before the server starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No AI service is enabled in the configuration (enable [vertexai] or [google_ai_studio])")]
    NoBackendEnabled,

    #[error("Both [vertexai] and [google_ai_studio] are enabled; enable exactly one")]
    MultipleBackendsEnabled,

    #[error("Missing required key '{key}' in [{section}]")]
    MissingKey {
        section: &'static str,
        key: &'static str,
    },

    #[error("Invalid port {0}: must be between 1 and 65535")]
    InvalidPort(u16),

    #[error("Invalid fuzzy threshold {0}: must be between 0 and 100")]
    InvalidThreshold(u8),

    #[error("Could not determine the configuration directory")]
    NoConfigDir,

    #[error("Created a default configuration at {}; edit it to enable an AI service", .0.display())]
    TemplateCreated(PathBuf),

    #[error("Failed to read configuration {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to migrate legacy configuration {}: {message}", path.display())]
    Legacy { path: PathBuf, message: String },
}

/// Failures of a single generation request.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// No backend is configured or enabled.
    #[error("No generative backend is available")]
    BackendUnavailable,

    /// Transport, authentication or payload failure from the backend.
    #[error("Backend error: {0}")]
    Backend(String),

    /// The request was abandoned because the server is shutting down.
    #[error("Request cancelled by server shutdown")]
    Cancelled,
}

impl GenerationError {
    pub fn backend(err: impl std::fmt::Display) -> Self {
        Self::Backend(err.to_string())
    }
}
