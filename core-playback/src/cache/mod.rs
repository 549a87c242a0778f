//! # Stream Cache Module
//!
//! Size-bounded local disk cache for remote audio files.
//!
//! ## Overview
//!
//! - One file per remote id, named `{remote_id}{extension}`, indexed by the
//!   `CacheStore` (SQLite)
//! - Disk is ground truth: a record whose file is missing is dropped on lookup
//! - At most one download or write-through per remote id, at most
//!   `max_concurrent_downloads` downloads overall
//! - LRU eviction to the byte budget before each admission
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────┐
//! │     CacheManager                       │
//! │  - get_cached_path()                   │
//! │  - download_and_cache()                │
//! │  - begin_write_through()               │
//! │  - ensure_space() / clear_all()        │
//! └────────┬───────────────────────────────┘
//!          │
//!          ├──> CacheStore (SQLite index)
//!          ├──> FileSystemAccess (cache files)
//!          └──> RemoteStore (downloads)
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_playback::cache::{CacheConfig, CacheManager};
//! use core_library::models::TrackRef;
//!
//! # async fn example(manager: &CacheManager) -> Result<(), Box<dyn std::error::Error>> {
//! let track = TrackRef::new("1AbC", ".mp3", 4_200_000);
//!
//! let path = manager.download_and_cache(&track).await?;
//! assert_eq!(manager.get_cached_path("1AbC").await?, Some(path));
//! # Ok(())
//! # }
//! ```

pub mod config;
mod in_flight;
pub mod manager;
pub mod write_through;

pub use config::CacheConfig;
pub use in_flight::InFlightKind;
pub use manager::CacheManager;
pub use write_through::WriteThrough;
