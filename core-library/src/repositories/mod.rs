//! # Repositories
//!
//! Repository traits and their SQLite implementations. Every repository talks
//! to storage through the `DatabaseAdapter` bridge and returns `Result<T>`.

pub mod cache;

pub use cache::{CacheStore, SqliteCacheStore};
