//! Playback bridge trait and source descriptor.
//!
//! The queue orchestrator never decodes audio itself. It hands an
//! [`AudioSource`] to the host's [`MediaPlayer`], which is either a local cache
//! file or a loopback proxy URL the player fetches like any HTTP resource.

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::Result;

/// High-level audio source descriptor provided to the media player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioSource {
    /// Local file accessible to the host runtime.
    LocalFile { path: PathBuf },
    /// HTTP stream to be fetched by the host (the loopback proxy).
    RemoteStream { url: String },
}

impl AudioSource {
    /// Determine whether the source represents remote content.
    pub fn is_remote(&self) -> bool {
        matches!(self, AudioSource::RemoteStream { .. })
    }
}

/// Host media player driven by the playback orchestrator.
///
/// Implementations report end-of-media back to the core by calling the
/// orchestrator's `on_track_ended`.
#[async_trait]
pub trait MediaPlayer: Send + Sync {
    /// Replace the current media with `source` and start playing it.
    async fn load(&self, source: AudioSource) -> Result<()>;

    /// Begin or resume playback of the loaded media.
    async fn play(&self) -> Result<()>;

    /// Pause playback without unloading the media.
    async fn pause(&self) -> Result<()>;

    /// Stop playback and release the current media.
    async fn stop(&self) -> Result<()>;

    /// Seek to an absolute position within the loaded media.
    async fn seek(&self, position: Duration) -> Result<()>;

    /// Current playback position.
    async fn position(&self) -> Result<Duration>;
}
