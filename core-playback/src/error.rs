//! # Playback Error Types
//!
//! Error types for caching, proxying and queue playback.

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Errors that can occur during playback operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Source Errors
    // ========================================================================
    /// Remote file is unavailable (network error, non-2xx status, timeout).
    #[error("Audio source unavailable: {0}")]
    SourceUnavailable(String),

    /// Request could not be understood.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // ========================================================================
    // Proxy Errors
    // ========================================================================
    /// The loopback proxy has not been started.
    #[error("Streaming proxy is not running")]
    ProxyNotRunning,

    /// The loopback proxy could not bind or serve.
    #[error("Streaming proxy error: {0}")]
    ProxyError(String),

    // ========================================================================
    // Playback Control Errors
    // ========================================================================
    /// Playback operation failed.
    #[error("Playback operation failed: {0}")]
    PlaybackFailed(String),

    /// Queue position does not exist.
    #[error("Queue index {index} out of range (queue length {len})")]
    QueueIndexOutOfRange { index: usize, len: usize },

    // ========================================================================
    // Cache Errors
    // ========================================================================
    /// Cache operation failed.
    #[error("Cache error: {0}")]
    CacheError(String),

    /// File is larger than the whole cache budget.
    #[error("File of {size_bytes} bytes exceeds the cache budget of {limit_bytes} bytes")]
    CacheFull { size_bytes: u64, limit_bytes: u64 },

    // ========================================================================
    // Authentication Errors
    // ========================================================================
    /// The remote store rejected the credentials.
    #[error("Not authenticated")]
    NotAuthenticated,

    // ========================================================================
    // Generic Errors
    // ========================================================================
    /// I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error from the cache index.
    #[error("Library error: {0}")]
    LibraryError(#[from] core_library::error::LibraryError),

    /// Error from a platform bridge.
    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    /// Internal error (should not occur in normal operation).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlaybackError {
    /// Classify an error returned by a `RemoteStore`.
    pub fn from_remote(error: BridgeError) -> Self {
        match error {
            BridgeError::Unauthenticated(_) => PlaybackError::NotAuthenticated,
            other => PlaybackError::SourceUnavailable(other.to_string()),
        }
    }

    /// Returns `true` if this error is transient and the operation can be retried.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PlaybackError::SourceUnavailable(_) | PlaybackError::IoError(_)
        )
    }

    /// Returns `true` if this error is due to rejected credentials.
    pub fn is_authentication_error(&self) -> bool {
        matches!(self, PlaybackError::NotAuthenticated)
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
