//! Error types for the DigiOnline client

use std::fmt;
use thiserror::Error;

/// Result type alias for pmodigi
pub type Result<T> = std::result::Result<T, DigiError>;

/// Step of the playlist resolution that ran out of attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionStage {
    /// No player hash could be derived
    Hash,
    /// The playlist endpoint never returned a manifest
    Playlist,
}

impl fmt::Display for ResolutionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hash => f.write_str("hash"),
            Self::Playlist => f.write_str("playlist"),
        }
    }
}

/// Errors that can occur while resolving a DigiOnline stream
#[derive(Error, Debug)]
pub enum DigiError {
    /// The login page carried no form token
    #[error("Login form token missing")]
    TokenMissing,

    /// Credentials were submitted but the site does not show a logged-in user
    #[error("Login failed for device {0}")]
    LoginFailed(String),

    /// Retry budget exhausted while resolving a playlist
    #[error("Playlist resolution failed at stage: {stage}")]
    PlaylistResolutionFailed { stage: ResolutionStage },

    /// The manifest has no quality-tagged stream URL
    #[error("No stream found in manifest")]
    NoStreamFound,

    /// The player page holds no playlist token
    #[error("No player hash found for channel {0}")]
    HashNotFound(String),

    /// Unknown device id
    #[error("Device not found: {0}")]
    DeviceNotFound(usize),

    /// Non-success HTTP status
    #[error("HTTP {status} for {url}")]
    HttpStatus { status: u16, url: String },

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML (de)serialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Regex error
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// Configuration or store error (from pmoconfig/anyhow)
    #[error("Configuration error: {0}")]
    Config(#[from] anyhow::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl DigiError {
    /// Create a generic error from a string
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Authentication errors are fatal: no layer above retries them
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Self::TokenMissing | Self::LoginFailed(_))
    }

    /// Network or upstream-format failure; the retry loops absorb these
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Http(_) | Self::HttpStatus { .. } | Self::Json(_))
    }
}
