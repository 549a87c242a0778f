//! Cache configuration

use core_runtime::config::{
    StreamCacheConfig, DEFAULT_CACHE_DIRECTORY, DEFAULT_CHUNK_SIZE,
    DEFAULT_MAX_CACHE_SIZE_BYTES, DEFAULT_MAX_CONCURRENT_DOWNLOADS,
};
use std::path::PathBuf;
use std::time::Duration;

/// Longest a playback request waits on a running download before streaming.
pub const DEFAULT_DOWNLOAD_WAIT: Duration = Duration::from_secs(3);

/// Configuration for the cache manager.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum cache size in bytes (default: 2 GiB)
    pub max_cache_size_bytes: u64,

    /// Number of concurrent downloads allowed (default: 3)
    pub max_concurrent_downloads: usize,

    /// Copy buffer size for downloads (default: 80 KiB)
    pub chunk_size: usize,

    /// Deadline for a whole download (default: 300s)
    pub download_timeout: Duration,

    /// How long playback waits on a download that already holds a slot
    /// before falling back to streaming (default: 3s). Zero never waits.
    pub download_wait: Duration,

    /// Directory for cache files. Relative paths are resolved against the
    /// platform cache directory.
    pub cache_directory: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_cache_size_bytes: DEFAULT_MAX_CACHE_SIZE_BYTES,
            max_concurrent_downloads: DEFAULT_MAX_CONCURRENT_DOWNLOADS,
            chunk_size: DEFAULT_CHUNK_SIZE,
            download_timeout: Duration::from_secs(300),
            download_wait: DEFAULT_DOWNLOAD_WAIT,
            cache_directory: PathBuf::from(DEFAULT_CACHE_DIRECTORY),
        }
    }
}

impl CacheConfig {
    /// Create a new cache configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum cache size.
    pub fn with_max_size(mut self, bytes: u64) -> Self {
        self.max_cache_size_bytes = bytes;
        self
    }

    /// Set download timeout.
    pub fn with_download_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout = timeout;
        self
    }

    /// Set how long playback waits on a running download.
    pub fn with_download_wait(mut self, wait: Duration) -> Self {
        self.download_wait = wait;
        self
    }

    /// Set maximum concurrent downloads.
    pub fn with_max_concurrent_downloads(mut self, count: usize) -> Self {
        self.max_concurrent_downloads = count;
        self
    }

    /// Set copy chunk size.
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    /// Set cache directory.
    pub fn with_cache_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_directory = dir.into();
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_cache_size_bytes == 0 {
            return Err("max_cache_size_bytes must be greater than 0".to_string());
        }

        if self.max_concurrent_downloads == 0 {
            return Err("max_concurrent_downloads must be at least 1".to_string());
        }

        if self.chunk_size == 0 {
            return Err("chunk_size must be greater than 0".to_string());
        }

        if self.download_timeout.is_zero() {
            return Err("download_timeout must be greater than 0".to_string());
        }

        if self.cache_directory.as_os_str().is_empty() {
            return Err("cache_directory cannot be empty".to_string());
        }

        Ok(())
    }
}

impl From<&StreamCacheConfig> for CacheConfig {
    fn from(config: &StreamCacheConfig) -> Self {
        Self {
            max_cache_size_bytes: config.max_cache_size_bytes,
            max_concurrent_downloads: config.max_concurrent_downloads,
            chunk_size: config.chunk_size,
            download_timeout: config.download_timeout,
            download_wait: DEFAULT_DOWNLOAD_WAIT,
            cache_directory: config.cache_directory.clone(),
        }
    }
}
