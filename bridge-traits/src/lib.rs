//! # Host Bridge Traits
//!
//! Abstraction traits for the collaborators the stream cache depends on but
//! does not implement itself.
//!
//! ## Traits
//!
//! ### Remote content
//! - [`RemoteStore`](remote::RemoteStore) - Byte-range fetches of remote audio objects
//! - [`AccessTokenProvider`](remote::AccessTokenProvider) - Bearer tokens with forced refresh
//! - [`HttpClient`](http::HttpClient) - Streaming HTTP requests
//!
//! ### Local storage
//! - [`FileSystemAccess`](storage::FileSystemAccess) - Cache directory file I/O
//! - [`DatabaseAdapter`](database::DatabaseAdapter) - SQL access for the cache index
//!
//! ### Playback
//! - [`MediaPlayer`](playback::MediaPlayer) - Host audio player driven by the queue
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Platform
//! implementations should:
//!
//! - Convert platform-specific errors to `BridgeError`
//! - Report rejected credentials as `BridgeError::Unauthenticated`
//! - Include error context (e.g., file paths, remote ids)
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds to support safe concurrent usage
//! across async tasks. Implementations must ensure thread safety.
//!
//! ## Examples
//!
//! ### Implementing RemoteStore
//!
//! ```ignore
//! use bridge_traits::remote::{ByteRange, RemoteResponse, RemoteStore};
//! use bridge_traits::error::Result;
//! use async_trait::async_trait;
//!
//! pub struct MyStore;
//!
//! #[async_trait]
//! impl RemoteStore for MyStore {
//!     async fn fetch_range(&self, remote_id: &str, range: Option<ByteRange>) -> Result<RemoteResponse> {
//!         // Implementation
//!         todo!()
//!     }
//! }
//! ```

pub mod database;
pub mod error;
pub mod http;
pub mod platform;
pub mod playback;
pub mod remote;
pub mod storage;

pub use error::BridgeError;

// Re-export commonly used types
pub use database::{DatabaseAdapter, DatabaseConfig, QueryRow, QueryValue};
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpStreamResponse};
pub use playback::{AudioSource, MediaPlayer};
pub use remote::{AccessTokenProvider, ByteRange, RemoteResponse, RemoteStore};
pub use storage::{FileMetadata, FileSystemAccess};
