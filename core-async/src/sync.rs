//! Synchronization primitives.
//!
//! Re-exports the async-aware primitives from `tokio::sync` together with
//! `CancellationToken` from `tokio-util`. These are safe to hold across
//! `.await` points, unlike `parking_lot` locks which callers should only use
//! for short synchronous critical sections.
//!
//! # Examples
//!
//! ```rust
//! use core_async::sync::{Mutex, Semaphore};
//! use std::sync::Arc;
//!
//! async fn example() {
//!     let slots = Arc::new(Semaphore::new(3));
//!     let _permit = slots.acquire().await.unwrap();
//!
//!     let mutex = Mutex::new(42);
//!     let mut guard = mutex.lock().await;
//!     *guard += 1;
//! }
//! ```

pub use tokio::sync::{
    broadcast, mpsc, oneshot, watch, AcquireError, Mutex, MutexGuard, Notify, OwnedMutexGuard,
    OwnedSemaphorePermit, RwLock, RwLockReadGuard, RwLockWriteGuard, Semaphore, SemaphorePermit,
    TryAcquireError,
};

pub use tokio_util::sync::CancellationToken;
