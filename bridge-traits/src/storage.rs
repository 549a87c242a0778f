//! Storage and File System Abstractions
//!
//! Provides the platform-agnostic file I/O trait used by the cache to manage
//! its directory of downloaded audio files.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::platform::{DynAsyncRead, DynAsyncWrite};

/// File metadata information
#[derive(Debug, Clone)]
pub struct FileMetadata {
    pub size: u64,
    pub modified_at: Option<i64>,
    pub is_directory: bool,
}

/// File system access trait
///
/// Abstracts file I/O operations so the cache can run against the real disk on
/// desktop and against mocks in tests.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::FileSystemAccess;
///
/// async fn cache_dir(fs: &dyn FileSystemAccess) -> Result<PathBuf> {
///     let dir = fs.get_cache_directory().await?.join("MusicCache");
///     fs.create_dir_all(&dir).await?;
///     Ok(dir)
/// }
/// ```
#[async_trait]
pub trait FileSystemAccess: Send + Sync {
    /// Get the application's cache directory
    ///
    /// This directory is suitable for files that can be deleted by the
    /// system when storage is low.
    async fn get_cache_directory(&self) -> Result<PathBuf>;

    /// Get the application's data directory
    ///
    /// This directory is suitable for persistent application data such as the
    /// metadata database.
    async fn get_data_directory(&self) -> Result<PathBuf>;

    /// Check if a file or directory exists
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Get metadata for a file or directory
    async fn metadata(&self, path: &Path) -> Result<FileMetadata>;

    /// Create a directory and all parent directories if they don't exist
    async fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// List the entries of a directory (non-recursive)
    async fn list_directory(&self, path: &Path) -> Result<Vec<PathBuf>>;

    /// Delete a file
    ///
    /// Deleting a file that does not exist succeeds.
    async fn delete_file(&self, path: &Path) -> Result<()>;

    /// Atomically move a file into place, replacing any existing file
    async fn rename(&self, from: &Path, to: &Path) -> Result<()>;

    /// Open a file for streaming reads starting at `offset` bytes
    async fn open_read_at(&self, path: &Path, offset: u64) -> Result<Box<DynAsyncRead>>;

    /// Create (or truncate) a file for streaming writes
    async fn create_file(&self, path: &Path) -> Result<Box<DynAsyncWrite>>;
}
