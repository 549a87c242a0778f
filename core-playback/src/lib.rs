//! # Playback & Stream Cache Module
//!
//! Plays remote audio through a local cache.
//!
//! ## Overview
//!
//! This module handles:
//! - A size-bounded disk cache with deduplicated downloads and LRU eviction
//!   ([`cache`])
//! - A loopback HTTP proxy serving cached files with range support, or
//!   relaying the remote store while caching ([`proxy`])
//! - The play queue: shuffle, repeat, track-end policy and pre-caching of the
//!   next track ([`queue`])

pub mod cache;
pub mod error;
pub mod proxy;
pub mod queue;

pub use cache::{CacheConfig, CacheManager, WriteThrough};
pub use error::{PlaybackError, Result};
pub use proxy::StreamingProxy;
pub use queue::{
    PlaybackOrchestrator, PlaybackStatus, QueueEntry, QueueSnapshot, QueueState, RepeatMode,
};
