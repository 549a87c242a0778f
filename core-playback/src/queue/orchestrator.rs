//! # Playback Orchestrator
//!
//! Decides what plays next and keeps the near future buffered.
//!
//! The orchestrator owns the [`QueueState`], drives the host [`MediaPlayer`],
//! and picks a source for every track: the cached file when there is one,
//! otherwise the streaming proxy URL. After each track starts, the next queue
//! entry is downloaded in the background.
//!
//! Only one track load runs at a time. Skip and track-end signals that arrive
//! while a load is in progress are dropped, not queued.

use crate::cache::CacheManager;
use crate::error::{PlaybackError, Result};
use crate::proxy::StreamingProxy;
use crate::queue::state::{QueueEntry, QueueState, RepeatMode, TrackEndAction};
use bridge_traits::playback::{AudioSource, MediaPlayer};
use core_library::models::TrackRef;
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent, PlaybackSource};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

/// Default position after which "previous" restarts the current track.
pub const DEFAULT_RESTART_THRESHOLD: Duration = Duration::from_secs(3);

/// Player state as seen by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackStatus {
    #[default]
    Stopped,
    Loading,
    Playing,
    Paused,
}

/// Point-in-time view of the queue for hosts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    /// Entries in play order
    pub entries: Vec<QueueEntry>,
    pub current_index: Option<usize>,
    pub repeat_mode: RepeatMode,
    pub shuffle_enabled: bool,
    pub status: PlaybackStatus,
}

/// Clears the loading flag when a load ends, however it ends.
struct LoadingGuard<'a>(&'a AtomicBool);

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Queue-driven playback over the cache, the proxy and the host player.
pub struct PlaybackOrchestrator {
    cache: Arc<CacheManager>,
    proxy: Arc<StreamingProxy>,
    player: Arc<dyn MediaPlayer>,
    event_bus: Option<Arc<EventBus>>,
    restart_threshold: Duration,
    queue: Mutex<QueueState>,
    status: Mutex<PlaybackStatus>,
    loading: AtomicBool,
}

impl PlaybackOrchestrator {
    pub fn new(
        cache: Arc<CacheManager>,
        proxy: Arc<StreamingProxy>,
        player: Arc<dyn MediaPlayer>,
    ) -> Self {
        Self {
            cache,
            proxy,
            player,
            event_bus: None,
            restart_threshold: DEFAULT_RESTART_THRESHOLD,
            queue: Mutex::new(QueueState::new()),
            status: Mutex::new(PlaybackStatus::Stopped),
            loading: AtomicBool::new(false),
        }
    }

    /// Set event bus for playback events.
    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Set the position after which "previous" restarts the current track.
    pub fn with_restart_threshold(mut self, threshold: Duration) -> Self {
        self.restart_threshold = threshold;
        self
    }

    // ========================================================================
    // State
    // ========================================================================

    pub fn status(&self) -> PlaybackStatus {
        *self.status.lock()
    }

    /// True while a track load is in progress.
    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::Acquire)
    }

    pub fn current_track(&self) -> Option<TrackRef> {
        self.queue.lock().current().map(|e| e.track.clone())
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        let queue = self.queue.lock();
        QueueSnapshot {
            entries: queue.active_order().to_vec(),
            current_index: queue.current_index(),
            repeat_mode: queue.repeat_mode(),
            shuffle_enabled: queue.shuffle_enabled(),
            status: self.status(),
        }
    }

    // ========================================================================
    // Queue editing
    // ========================================================================

    /// Replace the queue without starting playback.
    pub fn set_queue(&self, tracks: Vec<TrackRef>, start_index: usize) {
        {
            let mut queue = self.queue.lock();
            queue.set_tracks(tracks, start_index, &mut rand::thread_rng());
        }
        self.emit_queue_changed();
    }

    /// Replace the queue and play from `start_index`.
    pub async fn play_queue(&self, tracks: Vec<TrackRef>, start_index: usize) -> Result<bool> {
        self.set_queue(tracks, start_index);
        let current = self.queue.lock().current_index();
        match current {
            Some(index) => self.play_track_at_index(index).await,
            None => Ok(false),
        }
    }

    /// Replace the queue with a single track and play it.
    pub async fn play_single(&self, track: TrackRef) -> Result<bool> {
        self.play_queue(vec![track], 0).await
    }

    pub fn add_to_queue(&self, track: TrackRef) {
        self.queue.lock().push(track);
        self.emit_queue_changed();
    }

    /// Remove the entry at `index` of the play order. Playback is not interrupted.
    pub fn remove_from_queue(&self, index: usize) -> Option<QueueEntry> {
        let removed = self.queue.lock().remove(index);
        if removed.is_some() {
            self.emit_queue_changed();
        }
        removed
    }

    pub fn clear_queue(&self) {
        self.queue.lock().clear();
        self.emit_queue_changed();
    }

    /// Toggle shuffle. The current track keeps playing and moves to the front
    /// of the shuffled order.
    pub fn set_shuffle(&self, enabled: bool) {
        let changed = self
            .queue
            .lock()
            .set_shuffle(enabled, &mut rand::thread_rng());
        if changed {
            self.emit_queue_changed();
        }
    }

    pub fn set_repeat_mode(&self, mode: RepeatMode) {
        self.queue.lock().set_repeat_mode(mode);
        self.emit_queue_changed();
    }

    // ========================================================================
    // Track loading
    // ========================================================================

    /// Load and start the entry at `index` of the play order.
    ///
    /// Returns `Ok(false)` when another load is in progress and this request
    /// was dropped.
    #[instrument(skip(self))]
    pub async fn play_track_at_index(&self, index: usize) -> Result<bool> {
        let _loading = match self.try_begin_load() {
            Some(guard) => guard,
            None => {
                debug!("Track load already in progress, dropping request");
                return Ok(false);
            }
        };

        self.load_index(index).await?;
        Ok(true)
    }

    fn try_begin_load(&self) -> Option<LoadingGuard<'_>> {
        self.loading
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| LoadingGuard(&self.loading))
    }

    async fn load_index(&self, index: usize) -> Result<()> {
        let (entry, precache) = {
            let mut queue = self.queue.lock();
            if !queue.set_current(index) {
                return Err(PlaybackError::QueueIndexOutOfRange {
                    index,
                    len: queue.len(),
                });
            }
            let entry = queue
                .current()
                .cloned()
                .ok_or_else(|| PlaybackError::Internal("Queue position not set".to_string()))?;
            (entry, queue.precache_candidate().cloned())
        };

        let track = entry.track;
        self.set_status(PlaybackStatus::Loading);
        self.emit(PlaybackEvent::TrackChanged {
            track_id: track.remote_id.clone(),
            index,
            title: track.title.clone(),
        });

        match self.start_track(&track).await {
            Ok(source) => {
                self.set_status(PlaybackStatus::Playing);
                info!(remote_id = %track.remote_id, ?source, "Playback started");
                self.emit(PlaybackEvent::Started {
                    track_id: track.remote_id.clone(),
                    source,
                });

                if let Some(next) = precache {
                    self.cache.spawn_precache(next);
                }
                Ok(())
            }
            Err(e) => {
                error!(remote_id = %track.remote_id, error = %e, "Failed to start track");
                self.set_status(PlaybackStatus::Stopped);
                self.emit(PlaybackEvent::Error {
                    track_id: Some(track.remote_id.clone()),
                    message: e.to_string(),
                    recoverable: e.is_transient(),
                });
                self.emit(PlaybackEvent::Stopped {
                    track_id: Some(track.remote_id),
                });
                Err(e)
            }
        }
    }

    async fn start_track(&self, track: &TrackRef) -> Result<PlaybackSource> {
        let (source, kind) = self.resolve_source(track).await?;
        self.player
            .load(source)
            .await
            .map_err(|e| PlaybackError::PlaybackFailed(e.to_string()))?;
        Ok(kind)
    }

    /// Cached file if there is one, or will be shortly because its download
    /// is already transferring; otherwise the proxy URL.
    async fn resolve_source(&self, track: &TrackRef) -> Result<(AudioSource, PlaybackSource)> {
        let remote_id = &track.remote_id;

        match self.cache.cached_or_active_download(remote_id).await {
            Ok(Some(path)) => return Ok((AudioSource::LocalFile { path }, PlaybackSource::Cache)),
            Ok(None) => {}
            Err(e) => warn!(remote_id = %remote_id, error = %e, "Cache lookup failed, streaming"),
        }

        let url = self.proxy.stream_url(remote_id, &track.file_extension)?;
        Ok((AudioSource::RemoteStream { url }, PlaybackSource::Stream))
    }

    // ========================================================================
    // Navigation
    // ========================================================================

    /// Skip forward, wrapping unless repeat is off (then stop at the end).
    #[instrument(skip(self))]
    pub async fn next(&self) -> Result<bool> {
        let next = {
            let queue = self.queue.lock();
            if queue.is_empty() {
                return Ok(false);
            }
            queue.next_index()
        };

        match next {
            Some(index) => self.play_track_at_index(index).await,
            None => {
                self.stop().await?;
                Ok(true)
            }
        }
    }

    /// Skip back, or restart the current track once past the restart threshold.
    #[instrument(skip(self))]
    pub async fn previous(&self) -> Result<bool> {
        if self.queue.lock().is_empty() {
            return Ok(false);
        }

        let position = self.player.position().await.unwrap_or_else(|e| {
            warn!(error = %e, "Could not read playback position");
            Duration::ZERO
        });

        if position > self.restart_threshold {
            debug!(?position, "Restarting current track");
            self.seek(Duration::ZERO).await?;
            return Ok(true);
        }

        let previous = self.queue.lock().previous_index();
        match previous {
            Some(index) => self.play_track_at_index(index).await,
            None => Ok(false),
        }
    }

    /// Apply the repeat policy when the player reaches end of media.
    #[instrument(skip(self))]
    pub async fn on_track_ended(&self) -> Result<bool> {
        if self.is_loading() {
            debug!("Track end during load, ignoring");
            return Ok(false);
        }

        let action = self.queue.lock().track_end_action();
        debug!(?action, "Track ended");

        match action {
            TrackEndAction::Restart => {
                self.player.seek(Duration::ZERO).await?;
                self.player.play().await?;
                self.set_status(PlaybackStatus::Playing);
                Ok(true)
            }
            TrackEndAction::Play(index) => self.play_track_at_index(index).await,
            TrackEndAction::Stop => {
                info!("End of queue");
                self.stop().await?;
                Ok(true)
            }
        }
    }

    // ========================================================================
    // Transport
    // ========================================================================

    pub async fn pause(&self) -> Result<()> {
        self.player.pause().await?;
        self.set_status(PlaybackStatus::Paused);

        if let Some(track) = self.current_track() {
            let position = self.player.position().await.unwrap_or_default();
            self.emit(PlaybackEvent::Paused {
                track_id: track.remote_id,
                position_ms: position.as_millis() as u64,
            });
        }
        Ok(())
    }

    pub async fn resume(&self) -> Result<()> {
        self.player.play().await?;
        self.set_status(PlaybackStatus::Playing);

        if let Some(track) = self.current_track() {
            self.emit(PlaybackEvent::Resumed {
                track_id: track.remote_id,
            });
        }
        Ok(())
    }

    pub async fn stop(&self) -> Result<()> {
        self.player.stop().await?;
        self.set_status(PlaybackStatus::Stopped);
        self.emit(PlaybackEvent::Stopped {
            track_id: self.current_track().map(|t| t.remote_id),
        });
        Ok(())
    }

    pub async fn seek(&self, position: Duration) -> Result<()> {
        self.player.seek(position).await?;
        Ok(())
    }

    // ========================================================================
    // Events
    // ========================================================================

    fn set_status(&self, status: PlaybackStatus) {
        *self.status.lock() = status;
    }

    fn emit_queue_changed(&self) {
        let (length, shuffle_enabled) = {
            let queue = self.queue.lock();
            (queue.len(), queue.shuffle_enabled())
        };
        self.emit(PlaybackEvent::QueueChanged {
            length,
            shuffle_enabled,
        });
    }

    fn emit(&self, event: PlaybackEvent) {
        if let Some(bus) = &self.event_bus {
            let _ = bus.emit(CoreEvent::Playback(event));
        }
    }
}
