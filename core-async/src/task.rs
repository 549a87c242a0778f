//! Task spawning.
//!
//! Tasks run on the multi-threaded Tokio runtime and must be `Send + 'static`.
//! Dropping a `JoinHandle` detaches the task; it keeps running to completion.
//!
//! # Examples
//!
//! ```rust
//! use core_async::task;
//!
//! async fn example() {
//!     let handle = task::spawn(async { 42 });
//!     assert_eq!(handle.await.unwrap(), 42);
//! }
//! ```

pub use tokio::task::{spawn_blocking, yield_now, JoinError, JoinHandle, JoinSet};

/// Spawns a new asynchronous task on the Tokio runtime.
///
/// The returned handle can be awaited for the task's output. Dropping it
/// without awaiting leaves the task running in the background, which is how
/// fire-and-forget work (pre-caching, access-time updates) is scheduled.
pub fn spawn<F>(future: F) -> JoinHandle<F::Output>
where
    F: std::future::Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::task::spawn(future)
}

/// Spawns a task if called from within a Tokio runtime.
///
/// Returns `None` outside a runtime instead of panicking, which makes it safe
/// to call from `Drop` implementations.
pub fn try_spawn<F>(future: F) -> Option<JoinHandle<F::Output>>
where
    F: std::future::Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::runtime::Handle::try_current()
        .ok()
        .map(|handle| handle.spawn(future))
}

/// Result type for task operations.
pub type Result<T> = std::result::Result<T, JoinError>;
