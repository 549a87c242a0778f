//! # Cache Persistence
//!
//! Owns the SQLite index of locally cached audio files.
//!
//! ## Overview
//!
//! - `adapters::SqliteAdapter`: `DatabaseAdapter` over a sqlx pool
//! - `models`: `CacheRecord` and `TrackRef`
//! - `repositories::cache`: the `CacheStore` trait and its SQLite implementation

pub mod adapters;
pub mod error;
pub mod models;
pub mod repositories;

pub use adapters::SqliteAdapter;
pub use error::{LibraryError, Result};
pub use models::{CacheRecord, TrackRef};
pub use repositories::{CacheStore, SqliteCacheStore};
