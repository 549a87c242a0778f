//! Domain models for the cache index
//!
//! `CacheRecord` is the persisted row; `TrackRef` is the lightweight handle the
//! playback layer passes around to identify a remote audio file.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// =============================================================================
// Cache Record
// =============================================================================

/// A locally cached copy of a remote file.
///
/// A record exists iff `local_path` exists on disk. Readers that observe a
/// missing file delete the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRecord {
    /// Remote file identifier (unique key)
    pub remote_id: String,
    /// Absolute path of the cached file
    pub local_path: PathBuf,
    /// Size of the cached file in bytes
    pub size_bytes: u64,
    /// When the file was cached (Unix seconds)
    pub cached_at: i64,
    /// Last time the file was served or looked up (Unix milliseconds)
    pub last_accessed_at: i64,
}

impl CacheRecord {
    /// Create a record stamped with the current time.
    pub fn new(remote_id: impl Into<String>, local_path: impl Into<PathBuf>, size_bytes: u64) -> Self {
        let now = chrono::Utc::now();
        Self {
            remote_id: remote_id.into(),
            local_path: local_path.into(),
            size_bytes,
            cached_at: now.timestamp(),
            last_accessed_at: now.timestamp_millis(),
        }
    }

    /// Override the access timestamp.
    pub fn with_last_accessed_at(mut self, millis: i64) -> Self {
        self.last_accessed_at = millis;
        self
    }

    /// Validate record data
    pub fn validate(&self) -> Result<(), String> {
        validate_remote_id(&self.remote_id)?;

        if self.local_path.as_os_str().is_empty() {
            return Err("Cache record local path cannot be empty".to_string());
        }

        if self.size_bytes > i64::MAX as u64 {
            return Err(format!("Cache record size {} is out of range", self.size_bytes));
        }

        Ok(())
    }
}

/// Current time in Unix milliseconds, the resolution of `last_accessed_at`.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

// =============================================================================
// Track Reference
// =============================================================================

/// Identifies a remote audio file for playback and caching.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackRef {
    /// Remote file identifier
    pub remote_id: String,
    /// File extension with its leading dot (`.mp3`), may be empty
    pub file_extension: String,
    /// Nominal size reported by the remote store
    pub size_bytes: u64,
    /// Display title
    pub title: Option<String>,
}

impl TrackRef {
    /// Create a track reference. A missing leading dot on the extension is added.
    pub fn new(remote_id: impl Into<String>, file_extension: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            remote_id: remote_id.into(),
            file_extension: normalize_extension(file_extension.into()),
            size_bytes,
            title: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Name of the cache file for this track: `{remote_id}{extension}`.
    pub fn file_name(&self) -> String {
        format!("{}{}", self.remote_id, self.file_extension)
    }

    /// Validate track data
    pub fn validate(&self) -> Result<(), String> {
        validate_remote_id(&self.remote_id)?;

        if self.file_extension.contains(['/', '\\']) {
            return Err(format!("Invalid file extension: {}", self.file_extension));
        }

        Ok(())
    }
}

fn normalize_extension(extension: String) -> String {
    if extension.is_empty() || extension.starts_with('.') {
        extension
    } else {
        format!(".{}", extension)
    }
}

/// Remote ids become file names, so they must not escape the cache directory.
pub fn validate_remote_id(remote_id: &str) -> Result<(), String> {
    if remote_id.trim().is_empty() {
        return Err("Remote id cannot be empty".to_string());
    }

    if remote_id.contains(['/', '\\']) || remote_id.contains("..") {
        return Err(format!("Invalid remote id: {}", remote_id));
    }

    Ok(())
}
