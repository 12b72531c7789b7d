//! Error types for the offline cache

use crate::controller::ControllerState;
use crate::network::NetworkError;
use crate::origin::OriginError;

/// Errors raised by the cache storage, the lifecycle and configuration
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// A core asset could not be fetched during install
    #[error("Install failed: could not cache '{url}': {reason}")]
    InstallFailed { url: String, reason: String },
    /// A core asset fetch did not complete within the install timeout
    #[error("Install failed: timed out fetching '{url}'")]
    InstallTimeout { url: String },
    /// Lifecycle operation attempted in the wrong state
    #[error("Invalid controller state: expected {expected}, got {actual}")]
    InvalidState {
        expected: &'static str,
        actual: ControllerState,
    },
    /// Transport-level failure
    #[error(transparent)]
    Network(#[from] NetworkError),
    /// Partial responses cannot be stored
    #[error("Cannot cache partial responses (206)")]
    PartialResponse,
    /// The named cache does not exist
    #[error("Cache not found: {0}")]
    CacheNotFound(String),
    /// Cache names must not be empty
    #[error("Cache name cannot be empty")]
    EmptyName,
    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Origin(#[from] OriginError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;
