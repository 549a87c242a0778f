//! Caching a file as a side effect of relaying it.

use crate::cache::in_flight::InFlightGuard;
use crate::cache::manager::CacheManager;
use crate::error::{PlaybackError, Result};
use bridge_traits::platform::DynAsyncWrite;
use core_async::io::AsyncWriteExt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

/// A cache file being filled from a relayed response.
///
/// Holds the remote id's in-flight lock until committed or dropped. Dropping
/// without [`commit`](Self::commit) removes the partial file.
pub struct WriteThrough {
    manager: Arc<CacheManager>,
    remote_id: String,
    temp_path: PathBuf,
    final_path: PathBuf,
    file: Option<Box<DynAsyncWrite>>,
    written: u64,
    committed: bool,
    _guard: InFlightGuard,
}

impl WriteThrough {
    pub(crate) fn new(
        manager: Arc<CacheManager>,
        remote_id: String,
        temp_path: PathBuf,
        final_path: PathBuf,
        file: Box<DynAsyncWrite>,
        guard: InFlightGuard,
    ) -> Self {
        Self {
            manager,
            remote_id,
            temp_path,
            final_path,
            file: Some(file),
            written: 0,
            committed: false,
            _guard: guard,
        }
    }

    /// Remote id being cached.
    pub fn remote_id(&self) -> &str {
        &self.remote_id
    }

    /// Bytes written so far.
    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    /// Append a chunk to the cache file.
    pub async fn write(&mut self, chunk: &[u8]) -> Result<()> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| PlaybackError::Internal("Write-through file closed".to_string()))?;
        file.write_all(chunk).await?;
        self.written += chunk.len() as u64;
        Ok(())
    }

    /// Close the file and admit it into the cache. Returns the final path.
    pub async fn commit(mut self) -> Result<PathBuf> {
        if self.written == 0 {
            return Err(PlaybackError::CacheError(format!(
                "Nothing written for {}",
                self.remote_id
            )));
        }

        if let Some(mut file) = self.file.take() {
            file.flush().await?;
            file.shutdown().await?;
        }

        // From here the manager owns cleanup of the temp file.
        self.committed = true;
        self.manager
            .commit_file(&self.remote_id, &self.temp_path, &self.final_path, self.written)
            .await?;

        debug!(remote_id = %self.remote_id, size_bytes = self.written, "Write-through committed");
        Ok(self.final_path.clone())
    }
}

impl Drop for WriteThrough {
    fn drop(&mut self) {
        if self.committed {
            return;
        }

        // Close the handle before removing the file.
        self.file.take();

        let manager = self.manager.clone();
        let path = self.temp_path.clone();
        debug!(remote_id = %self.remote_id, "Discarding partial write-through");
        if core_async::task::try_spawn(async move { manager.discard(&path).await }).is_none() {
            warn!(path = ?self.temp_path, "No runtime to remove partial cache file");
        }
    }
}
