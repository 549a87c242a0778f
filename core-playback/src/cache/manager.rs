//! # Cache Manager
//!
//! Single source of truth for "is this file cached, and if not, get it cached".
//!
//! - Fast-path lookups that treat the disk as ground truth and self-heal stale
//!   records
//! - At most one download or write-through per remote id (keyed in-flight
//!   lock) plus a global semaphore bounding concurrent downloads
//! - LRU eviction to a byte budget before every admission
//! - Atomic admission: files are written to a `.part` file and renamed into
//!   place only once complete

use crate::cache::config::CacheConfig;
use crate::cache::in_flight::{InFlight, InFlightGuard, InFlightKind};
use crate::cache::write_through::WriteThrough;
use crate::error::{PlaybackError, Result};
use bridge_traits::remote::RemoteStore;
use bridge_traits::storage::FileSystemAccess;
use core_async::io::{AsyncReadExt, AsyncWriteExt};
use core_async::sync::{Mutex, Semaphore};
use core_async::time::timeout;
use core_library::models::{now_millis, validate_remote_id, CacheRecord, TrackRef};
use core_library::repositories::CacheStore;
use core_runtime::events::{CacheEvent, CoreEvent, EventBus};
use parking_lot::Mutex as SyncMutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn, Instrument};

/// Cache manager for remote audio files.
pub struct CacheManager {
    config: CacheConfig,
    store: Arc<dyn CacheStore>,
    fs: Arc<dyn FileSystemAccess>,
    remote: Arc<dyn RemoteStore>,
    event_bus: Option<Arc<EventBus>>,
    download_semaphore: Arc<Semaphore>,
    in_flight: InFlight,
    /// Serializes budget checks with the commits they admit.
    admission: Mutex<()>,
    cache_path: SyncMutex<Option<PathBuf>>,
}

impl CacheManager {
    /// Create a new cache manager.
    ///
    /// # Arguments
    ///
    /// * `config` - Cache configuration
    /// * `store` - Cache record index
    /// * `fs` - Filesystem access for cached files
    /// * `remote` - Remote object store the files are fetched from
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// use core_playback::cache::{CacheConfig, CacheManager};
    /// use std::sync::Arc;
    ///
    /// let manager = Arc::new(CacheManager::new(CacheConfig::default(), store, fs, remote));
    /// manager.initialize().await?;
    /// ```
    pub fn new(
        config: CacheConfig,
        store: Arc<dyn CacheStore>,
        fs: Arc<dyn FileSystemAccess>,
        remote: Arc<dyn RemoteStore>,
    ) -> Self {
        let download_semaphore = Arc::new(Semaphore::new(config.max_concurrent_downloads));

        Self {
            config,
            store,
            fs,
            remote,
            event_bus: None,
            download_semaphore,
            in_flight: InFlight::new(),
            admission: Mutex::new(()),
            cache_path: SyncMutex::new(None),
        }
    }

    /// Set event bus for cache events.
    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Initialize the cache manager (validate config, create directory, initialize store).
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> Result<()> {
        info!("Initializing cache manager");

        self.config.validate().map_err(|e| {
            PlaybackError::CacheError(format!("Invalid cache configuration: {}", e))
        })?;

        self.store.initialize().await?;

        let cache_dir = self.fs.get_cache_directory().await.map_err(|e| {
            error!("Failed to get cache directory: {}", e);
            PlaybackError::CacheError(format!("Failed to get cache directory: {}", e))
        })?;

        // An absolute configured directory replaces the platform one.
        let cache_path = cache_dir.join(&self.config.cache_directory);

        self.fs.create_dir_all(&cache_path).await.map_err(|e| {
            error!("Failed to create cache directory: {}", e);
            PlaybackError::CacheError(format!("Failed to create cache directory: {}", e))
        })?;

        self.sweep_partial_files(&cache_path).await;

        *self.cache_path.lock() = Some(cache_path.clone());

        info!("Cache manager initialized at {:?}", cache_path);
        Ok(())
    }

    /// Remove `.part` files left behind by an interrupted run.
    ///
    /// Runs before the cache accepts work, so no admission can own them.
    async fn sweep_partial_files(&self, cache_path: &Path) {
        let entries = match self.fs.list_directory(cache_path).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "Failed to list cache directory, skipping partial file sweep");
                return;
            }
        };

        let mut removed = 0usize;
        for path in entries {
            if path.extension().map_or(false, |ext| ext == PART_EXTENSION) {
                self.discard(&path).await;
                removed += 1;
            }
        }

        if removed > 0 {
            info!(removed, "Removed partial files from an earlier run");
        }
    }

    /// Configuration in effect.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Filesystem the cache lives on.
    pub fn filesystem(&self) -> &Arc<dyn FileSystemAccess> {
        &self.fs
    }

    /// Remote store files are fetched from.
    pub fn remote(&self) -> &Arc<dyn RemoteStore> {
        &self.remote
    }

    /// Resolved cache directory. Fails before `initialize()`.
    pub fn cache_directory(&self) -> Result<PathBuf> {
        self.cache_path
            .lock()
            .clone()
            .ok_or_else(|| PlaybackError::CacheError("Cache not initialized".to_string()))
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    /// Path of the cached file for `remote_id`, if cached.
    ///
    /// A record whose file is gone is deleted and `None` is returned. On a hit
    /// the access time is updated in a detached task.
    #[instrument(skip(self))]
    pub async fn get_cached_path(&self, remote_id: &str) -> Result<Option<PathBuf>> {
        let record = match self.store.lookup(remote_id).await? {
            Some(record) => record,
            None => return Ok(None),
        };

        let exists = self.fs.exists(&record.local_path).await.unwrap_or(false);
        if !exists {
            warn!(
                remote_id,
                path = ?record.local_path,
                "Cached file missing from disk, dropping stale record"
            );
            self.store.delete(remote_id).await?;
            return Ok(None);
        }

        let store = self.store.clone();
        let id = remote_id.to_string();
        core_async::spawn(async move {
            if let Err(e) = store.touch(&id, now_millis()).await {
                warn!(remote_id = %id, error = %e, "Failed to update cache access time");
            }
        });

        Ok(Some(record.local_path))
    }

    /// Check if a file is cached and present on disk.
    pub async fn is_cached(&self, remote_id: &str) -> Result<bool> {
        Ok(self.get_cached_path(remote_id).await?.is_some())
    }

    /// Sum of all cached file sizes in bytes.
    pub async fn cache_size(&self) -> Result<u64> {
        Ok(self.store.total_size().await?)
    }

    /// True while a download or write-through holds `remote_id`.
    pub fn is_in_flight(&self, remote_id: &str) -> bool {
        self.in_flight.holder(remote_id).is_some()
    }

    /// True while a full download holds `remote_id` and one of the download
    /// slots. A download still queued for a slot does not count.
    pub fn is_downloading(&self, remote_id: &str) -> bool {
        self.in_flight.holder(remote_id) == Some(InFlightKind::Download)
    }

    /// Wait for any in-flight work on `remote_id`, then return the cached path.
    #[instrument(skip(self))]
    pub async fn wait_for_in_flight(&self, remote_id: &str) -> Result<Option<PathBuf>> {
        if self.in_flight.wait(remote_id).await {
            debug!(remote_id, "In-flight work finished");
        }
        self.get_cached_path(remote_id).await
    }

    /// Cached path for `remote_id`, waiting a bounded time for a running download.
    ///
    /// Only a download that already holds a slot is awaited, for at most
    /// `download_wait`. Returns `None` when the caller should stream instead.
    #[instrument(skip(self))]
    pub async fn cached_or_active_download(&self, remote_id: &str) -> Result<Option<PathBuf>> {
        if let Some(path) = self.get_cached_path(remote_id).await? {
            return Ok(Some(path));
        }
        if !self.is_downloading(remote_id) {
            return Ok(None);
        }

        debug!(wait = ?self.config.download_wait, "Download running, waiting for it");
        match timeout(self.config.download_wait, self.in_flight.wait(remote_id)).await {
            Ok(_) => self.get_cached_path(remote_id).await,
            Err(_) => {
                debug!("Download still running, streaming instead");
                Ok(None)
            }
        }
    }

    // ========================================================================
    // Download
    // ========================================================================

    /// Download a file into the cache unless it is already there.
    ///
    /// Concurrent callers for the same id share one remote fetch: the first
    /// downloads, the rest wait on the id's lock and find the file cached.
    /// The download permit and the id's lock are released on every path.
    #[instrument(skip(self, track), fields(remote_id = %track.remote_id))]
    pub async fn download_and_cache(&self, track: &TrackRef) -> Result<PathBuf> {
        track
            .validate()
            .map_err(|e| PlaybackError::InvalidRequest(format!("Invalid track: {}", e)))?;

        if let Some(path) = self.get_cached_path(&track.remote_id).await? {
            debug!("Already cached");
            return Ok(path);
        }

        let lock = self
            .in_flight
            .acquire(&track.remote_id, InFlightKind::Queued)
            .await;

        self.download_holding(track, lock).await
    }

    /// Start a detached download of `track` for later playback.
    ///
    /// The id is marked in flight before this returns, so a second pre-cache
    /// or write-through for it is refused. Returns `false` without spawning
    /// when the id is already in flight or the track is invalid. Failures are
    /// logged, never surfaced.
    pub fn spawn_precache(self: &Arc<Self>, track: TrackRef) -> bool {
        if let Err(e) = track.validate() {
            warn!(remote_id = %track.remote_id, error = %e, "Not pre-caching invalid track");
            return false;
        }

        let lock = match self
            .in_flight
            .try_acquire(&track.remote_id, InFlightKind::Queued)
        {
            Some(lock) => lock,
            None => {
                debug!(remote_id = %track.remote_id, "Pre-cache skipped, already in flight");
                return false;
            }
        };

        let manager = self.clone();
        let span = tracing::debug_span!("precache", remote_id = %track.remote_id);
        core_async::spawn(
            async move {
                match manager.download_holding(&track, lock).await {
                    Ok(_) => debug!("Pre-cache complete"),
                    Err(e) => warn!(error = %e, "Pre-cache failed"),
                }
            }
            .instrument(span),
        );
        true
    }

    /// Download with the id's in-flight lock already held.
    async fn download_holding(&self, track: &TrackRef, mut lock: InFlightGuard) -> Result<PathBuf> {
        if let Some(path) = self.get_cached_path(&track.remote_id).await? {
            debug!("Cached by a concurrent caller");
            return Ok(path);
        }

        let _permit = self
            .download_semaphore
            .acquire()
            .await
            .map_err(|_| PlaybackError::Internal("Download semaphore closed".to_string()))?;
        lock.set_kind(InFlightKind::Download);

        if let Some(path) = self.get_cached_path(&track.remote_id).await? {
            debug!("Cached while waiting for a download slot");
            return Ok(path);
        }

        let limit = self.config.max_cache_size_bytes;
        if track.size_bytes > limit {
            return Err(PlaybackError::CacheFull {
                size_bytes: track.size_bytes,
                limit_bytes: limit,
            });
        }

        self.ensure_space(track.size_bytes).await?;

        let cache_dir = self.cache_directory()?;
        let final_path = cache_dir.join(track.file_name());
        let temp_path = temp_path_for(&cache_dir, &track.remote_id);

        info!(size_bytes = track.size_bytes, "Downloading");

        let fetched = match timeout(
            self.config.download_timeout,
            self.fetch_into(&track.remote_id, &temp_path),
        )
        .await
        {
            Ok(Ok(written)) => written,
            Ok(Err(e)) => {
                self.discard(&temp_path).await;
                error!(error = %e, "Download failed");
                return Err(e);
            }
            Err(_) => {
                self.discard(&temp_path).await;
                error!("Download timed out");
                return Err(PlaybackError::SourceUnavailable(format!(
                    "Download of {} timed out after {:?}",
                    track.remote_id, self.config.download_timeout
                )));
            }
        };

        self.commit_file(&track.remote_id, &temp_path, &final_path, fetched)
            .await?;

        info!(size_bytes = fetched, "Download cached");
        Ok(final_path)
    }

    /// Stream the whole remote object into `path`, returning the byte count.
    async fn fetch_into(&self, remote_id: &str, path: &Path) -> Result<u64> {
        let mut response = self
            .remote
            .fetch_range(remote_id, None)
            .await
            .map_err(PlaybackError::from_remote)?;

        if !response.is_success() {
            return Err(PlaybackError::SourceUnavailable(format!(
                "Remote store returned status {} for {}",
                response.status, remote_id
            )));
        }

        let mut file = self.fs.create_file(path).await?;
        let mut buffer = vec![0u8; self.config.chunk_size];
        let mut written = 0u64;

        loop {
            let read = response.body.read(&mut buffer).await.map_err(|e| {
                PlaybackError::SourceUnavailable(format!("Remote read failed: {}", e))
            })?;
            if read == 0 {
                break;
            }
            file.write_all(&buffer[..read]).await?;
            written += read as u64;
        }

        file.flush().await?;
        file.shutdown().await?;

        if written == 0 {
            return Err(PlaybackError::SourceUnavailable(format!(
                "Remote store returned an empty body for {}",
                remote_id
            )));
        }

        Ok(written)
    }

    // ========================================================================
    // Write-through
    // ========================================================================

    /// Start caching a file that is being relayed to a client.
    ///
    /// Returns `None` when another download or write-through already holds the
    /// id; the caller then relays without caching.
    pub async fn begin_write_through(
        self: &Arc<Self>,
        remote_id: &str,
        extension: &str,
    ) -> Result<Option<WriteThrough>> {
        let guard = match self
            .in_flight
            .try_acquire(remote_id, InFlightKind::WriteThrough)
        {
            Some(guard) => guard,
            None => {
                debug!(remote_id, "Write-through skipped, id already in flight");
                return Ok(None);
            }
        };

        let cache_dir = self.cache_directory()?;
        let final_path = cache_dir.join(format!("{}{}", remote_id, extension));
        let temp_path = temp_path_for(&cache_dir, remote_id);
        let file = self.fs.create_file(&temp_path).await?;

        Ok(Some(WriteThrough::new(
            self.clone(),
            remote_id.to_string(),
            temp_path,
            final_path,
            file,
            guard,
        )))
    }

    /// Admit a completed temp file: make room, rename into place, record it.
    pub(crate) async fn commit_file(
        &self,
        remote_id: &str,
        temp_path: &Path,
        final_path: &Path,
        size_bytes: u64,
    ) -> Result<()> {
        let _admission = self.admission.lock().await;

        let limit = self.config.max_cache_size_bytes;
        if size_bytes > limit {
            self.discard(temp_path).await;
            return Err(PlaybackError::CacheFull {
                size_bytes,
                limit_bytes: limit,
            });
        }

        if let Err(e) = self.ensure_space_locked(size_bytes).await {
            self.discard(temp_path).await;
            return Err(e);
        }

        if let Err(e) = self.fs.rename(temp_path, final_path).await {
            self.discard(temp_path).await;
            return Err(e.into());
        }

        let record = CacheRecord::new(remote_id, final_path, size_bytes);
        if let Err(e) = self.store.upsert(&record).await {
            // Without a record the file would be invisible to eviction.
            self.discard(final_path).await;
            return Err(e.into());
        }

        self.emit(CacheEvent::Cached {
            remote_id: remote_id.to_string(),
            size_bytes,
        });

        Ok(())
    }

    /// Best-effort removal of a file the cache does not track.
    pub(crate) async fn discard(&self, path: &Path) {
        if let Err(e) = self.fs.delete_file(path).await {
            warn!(path = ?path, error = %e, "Failed to remove cache file");
        }
    }

    // ========================================================================
    // Eviction
    // ========================================================================

    /// Evict least recently used files until `required_bytes` more fit in the budget.
    #[instrument(skip(self))]
    pub async fn ensure_space(&self, required_bytes: u64) -> Result<()> {
        let _admission = self.admission.lock().await;
        self.ensure_space_locked(required_bytes).await
    }

    async fn ensure_space_locked(&self, required_bytes: u64) -> Result<()> {
        let limit = self.config.max_cache_size_bytes;
        let current = self.store.total_size().await?;

        if current.saturating_add(required_bytes) > limit {
            let target = limit.saturating_sub(required_bytes);
            debug!(current, required_bytes, target, "Cache over budget, evicting");
            self.evict_locked(target).await?;
        }

        Ok(())
    }

    /// Evict least recently accessed files until the cache is at most `target_size` bytes.
    ///
    /// Returns the number of files evicted. Failures on individual files are
    /// logged and skipped.
    #[instrument(skip(self))]
    pub async fn evict_least_recently_used(&self, target_size: u64) -> Result<usize> {
        let _admission = self.admission.lock().await;
        self.evict_locked(target_size).await
    }

    async fn evict_locked(&self, target_size: u64) -> Result<usize> {
        let mut estimate = self.store.total_size().await?;
        if estimate <= target_size {
            return Ok(0);
        }

        let candidates = self.store.list_all_by_last_access_ascending().await?;
        let mut evicted = 0usize;

        for record in candidates {
            if estimate <= target_size {
                break;
            }

            if let Err(e) = self.fs.delete_file(&record.local_path).await {
                warn!(remote_id = %record.remote_id, error = %e, "Failed to delete cached file, skipping");
                continue;
            }

            if let Err(e) = self.store.delete(&record.remote_id).await {
                warn!(remote_id = %record.remote_id, error = %e, "Failed to delete cache record, skipping");
                continue;
            }

            estimate = estimate.saturating_sub(record.size_bytes);
            evicted += 1;

            debug!(
                remote_id = %record.remote_id,
                size_bytes = record.size_bytes,
                remaining = estimate,
                "Evicted cached file"
            );
            self.emit(CacheEvent::Evicted {
                remote_id: record.remote_id,
                size_bytes: record.size_bytes,
            });
        }

        if estimate > target_size {
            warn!(estimate, target_size, "Eviction could not reach target size");
        }

        info!(evicted, remaining = estimate, "Eviction complete");
        Ok(evicted)
    }

    /// Delete every cached file and record. Returns the number of records removed.
    #[instrument(skip(self))]
    pub async fn clear_all(&self) -> Result<usize> {
        let _admission = self.admission.lock().await;

        let records = self.store.list_all_by_last_access_ascending().await?;
        for record in &records {
            if let Err(e) = self.fs.delete_file(&record.local_path).await {
                warn!(remote_id = %record.remote_id, error = %e, "Failed to delete cached file");
            }
        }

        self.store.clear().await?;

        let removed = records.len();
        info!(removed, "Cache cleared");
        self.emit(CacheEvent::Cleared { removed });
        Ok(removed)
    }

    fn emit(&self, event: CacheEvent) {
        if let Some(bus) = &self.event_bus {
            // No subscribers is not an error.
            let _ = bus.emit(CoreEvent::Cache(event));
        }
    }
}

const PART_EXTENSION: &str = "part";

/// Unique temp file for a pending admission of `remote_id`.
fn temp_path_for(cache_dir: &Path, remote_id: &str) -> PathBuf {
    cache_dir.join(format!(
        "{}.{}.{}",
        remote_id,
        uuid::Uuid::new_v4(),
        PART_EXTENSION
    ))
}

/// Reject ids that could escape the cache directory.
pub(crate) fn check_remote_id(remote_id: &str) -> Result<()> {
    validate_remote_id(remote_id).map_err(PlaybackError::InvalidRequest)
}
