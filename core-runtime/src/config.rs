//! # Stream Cache Configuration
//!
//! Provides the validated settings shared by the cache manager, the loopback
//! proxy and the playback queue.
//!
//! ## Overview
//!
//! The configuration uses a builder pattern to construct a
//! [`StreamCacheConfig`]. Every value has a sensible default except the
//! database path, which the host must supply. Validation is fail-fast: an
//! invalid combination is rejected by [`StreamCacheConfigBuilder::build`]
//! rather than surfacing later as a runtime failure.
//!
//! Relative `cache_directory` and `database_path` values are resolved by the
//! service against the platform cache and data directories.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::StreamCacheConfig;
//! use std::time::Duration;
//!
//! let config = StreamCacheConfig::builder()
//!     .database_path("library.db")
//!     .max_cache_size_bytes(512 * 1024 * 1024)
//!     .relay_timeout(Duration::from_secs(120))
//!     .build()?;
//! ```
//!
//! ## Environment
//!
//! [`StreamCacheConfig::from_env`] reads the same settings from `STREAM_CACHE_*`
//! variables, falling back to defaults for anything unset:
//!
//! | Variable | Setting |
//! |----------|---------|
//! | `STREAM_CACHE_DATABASE_PATH` | `database_path` (required) |
//! | `STREAM_CACHE_DIRECTORY` | `cache_directory` |
//! | `STREAM_CACHE_MAX_SIZE_BYTES` | `max_cache_size_bytes` |
//! | `STREAM_CACHE_MAX_CONCURRENT_DOWNLOADS` | `max_concurrent_downloads` |
//! | `STREAM_CACHE_CHUNK_SIZE` | `chunk_size` |
//! | `STREAM_CACHE_RELAY_TIMEOUT_SECS` | `relay_timeout` |
//! | `STREAM_CACHE_DOWNLOAD_TIMEOUT_SECS` | `download_timeout` |
//! | `STREAM_CACHE_RESTART_THRESHOLD_MS` | `restart_threshold` |
//! | `STREAM_CACHE_EVENT_BUFFER_SIZE` | `event_buffer_size` |

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Default cache budget: 2 GiB.
pub const DEFAULT_MAX_CACHE_SIZE_BYTES: u64 = 2 * 1024 * 1024 * 1024;

/// Default number of concurrent remote downloads.
pub const DEFAULT_MAX_CONCURRENT_DOWNLOADS: usize = 3;

/// Default chunk size for streaming copies (80 KiB).
pub const DEFAULT_CHUNK_SIZE: usize = 81_920;

/// Default cache directory name.
pub const DEFAULT_CACHE_DIRECTORY: &str = "MusicCache";

const MIN_CHUNK_SIZE: usize = 1024;
const MAX_CHUNK_SIZE: usize = 16 * 1024 * 1024;

const ENV_PREFIX: &str = "STREAM_CACHE_";

/// Settings for the stream cache subsystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamCacheConfig {
    /// SQLite database holding the cache index
    pub database_path: PathBuf,

    /// Directory holding cached audio files
    pub cache_directory: PathBuf,

    /// Total byte budget for cached files
    pub max_cache_size_bytes: u64,

    /// Maximum number of concurrent background downloads
    pub max_concurrent_downloads: usize,

    /// Chunk size for file and network copies
    pub chunk_size: usize,

    /// Deadline for relaying a remote response through the proxy
    pub relay_timeout: Duration,

    /// Deadline for a full background download
    pub download_timeout: Duration,

    /// Position after which "previous" restarts the current track
    pub restart_threshold: Duration,

    /// Event bus buffer size
    pub event_buffer_size: usize,
}

impl StreamCacheConfig {
    /// Create a new builder with default settings.
    pub fn builder() -> StreamCacheConfigBuilder {
        StreamCacheConfigBuilder::default()
    }

    /// Load settings from `STREAM_CACHE_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings through an arbitrary variable lookup.
    ///
    /// `lookup` receives fully-prefixed names such as
    /// `STREAM_CACHE_CHUNK_SIZE`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));
        let mut builder = Self::builder();

        if let Some(path) = var("DATABASE_PATH") {
            builder = builder.database_path(path);
        }
        if let Some(dir) = var("DIRECTORY") {
            builder = builder.cache_directory(dir);
        }
        if let Some(bytes) = parse_var(&var, "MAX_SIZE_BYTES")? {
            builder = builder.max_cache_size_bytes(bytes);
        }
        if let Some(count) = parse_var(&var, "MAX_CONCURRENT_DOWNLOADS")? {
            builder = builder.max_concurrent_downloads(count);
        }
        if let Some(size) = parse_var(&var, "CHUNK_SIZE")? {
            builder = builder.chunk_size(size);
        }
        if let Some(secs) = parse_var(&var, "RELAY_TIMEOUT_SECS")? {
            builder = builder.relay_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = parse_var(&var, "DOWNLOAD_TIMEOUT_SECS")? {
            builder = builder.download_timeout(Duration::from_secs(secs));
        }
        if let Some(ms) = parse_var(&var, "RESTART_THRESHOLD_MS")? {
            builder = builder.restart_threshold(Duration::from_millis(ms));
        }
        if let Some(size) = parse_var(&var, "EVENT_BUFFER_SIZE")? {
            builder = builder.event_buffer_size(size);
        }

        builder.build()
    }

    /// Validate settings.
    pub fn validate(&self) -> Result<()> {
        if self.database_path.as_os_str().is_empty() {
            return Err(Error::Config("Database path cannot be empty".to_string()));
        }

        if self.cache_directory.as_os_str().is_empty() {
            return Err(Error::Config("Cache directory cannot be empty".to_string()));
        }

        if self.max_cache_size_bytes == 0 {
            return Err(Error::Config(
                "Cache size budget must be greater than 0".to_string(),
            ));
        }

        if self.max_concurrent_downloads == 0 {
            return Err(Error::Config(
                "At least one concurrent download must be allowed".to_string(),
            ));
        }

        if !(MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&self.chunk_size) {
            return Err(Error::Config(format!(
                "Chunk size must be between {} and {} bytes, got {}",
                MIN_CHUNK_SIZE, MAX_CHUNK_SIZE, self.chunk_size
            )));
        }

        if self.relay_timeout.is_zero() || self.download_timeout.is_zero() {
            return Err(Error::Config(
                "Relay and download timeouts must be greater than 0".to_string(),
            ));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

fn parse_var<T, F>(var: &F, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match var(name) {
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|e| {
            Error::Config(format!("Invalid value for {}{}: {}", ENV_PREFIX, name, e))
        }),
        None => Ok(None),
    }
}

/// Builder for [`StreamCacheConfig`].
#[derive(Debug, Clone)]
pub struct StreamCacheConfigBuilder {
    database_path: Option<PathBuf>,
    cache_directory: PathBuf,
    max_cache_size_bytes: u64,
    max_concurrent_downloads: usize,
    chunk_size: usize,
    relay_timeout: Duration,
    download_timeout: Duration,
    restart_threshold: Duration,
    event_buffer_size: usize,
}

impl Default for StreamCacheConfigBuilder {
    fn default() -> Self {
        Self {
            database_path: None,
            cache_directory: PathBuf::from(DEFAULT_CACHE_DIRECTORY),
            max_cache_size_bytes: DEFAULT_MAX_CACHE_SIZE_BYTES,
            max_concurrent_downloads: DEFAULT_MAX_CONCURRENT_DOWNLOADS,
            chunk_size: DEFAULT_CHUNK_SIZE,
            relay_timeout: Duration::from_secs(300),
            download_timeout: Duration::from_secs(300),
            restart_threshold: Duration::from_secs(3),
            event_buffer_size: DEFAULT_EVENT_BUFFER_SIZE,
        }
    }
}

impl StreamCacheConfigBuilder {
    /// Set the SQLite database path (required).
    pub fn database_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.database_path = Some(path.into());
        self
    }

    /// Set the cache directory.
    pub fn cache_directory<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.cache_directory = path.into();
        self
    }

    /// Set the cache byte budget.
    pub fn max_cache_size_bytes(mut self, bytes: u64) -> Self {
        self.max_cache_size_bytes = bytes;
        self
    }

    /// Set the maximum number of concurrent downloads.
    pub fn max_concurrent_downloads(mut self, count: usize) -> Self {
        self.max_concurrent_downloads = count;
        self
    }

    /// Set the chunk size for streaming copies.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    pub fn relay_timeout(mut self, timeout: Duration) -> Self {
        self.relay_timeout = timeout;
        self
    }

    pub fn download_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout = timeout;
        self
    }

    pub fn restart_threshold(mut self, threshold: Duration) -> Self {
        self.restart_threshold = threshold;
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = size;
        self
    }

    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the database path is missing or any value
    /// is out of range.
    pub fn build(self) -> Result<StreamCacheConfig> {
        let database_path = self.database_path.ok_or_else(|| {
            Error::Config(
                "Database path is required. Use .database_path() to set it.".to_string(),
            )
        })?;

        let config = StreamCacheConfig {
            database_path,
            cache_directory: self.cache_directory,
            max_cache_size_bytes: self.max_cache_size_bytes,
            max_concurrent_downloads: self.max_concurrent_downloads,
            chunk_size: self.chunk_size,
            relay_timeout: self.relay_timeout,
            download_timeout: self.download_timeout,
            restart_threshold: self.restart_threshold,
            event_buffer_size: self.event_buffer_size,
        };

        config.validate()?;
        Ok(config)
    }
}
