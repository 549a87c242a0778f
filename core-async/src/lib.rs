//! Async runtime facade for the drive stream cache.
//!
//! Every other crate in the workspace goes through this crate for task
//! spawning, timers, synchronization primitives and async I/O traits instead of
//! naming `tokio` directly. Keeping the runtime behind one crate means the
//! cache manager, the loopback proxy and the queue orchestrator all agree on
//! the same primitives (`Semaphore`, `Mutex`, `CancellationToken`, ...).
//!
//! # Modules
//!
//! - `task`: Task spawning and join handles
//! - `time`: Sleep, timeouts and deadlines
//! - `sync`: Async-aware locks, semaphores, channels and cancellation
//! - `io`: Async read/write traits and stream adapters
//! - `net`: TCP listener for the loopback proxy
//!
//! # Examples
//!
//! ```rust
//! use core_async::task;
//! use core_async::time::{sleep, Duration};
//!
//! async fn example() {
//!     let handle = task::spawn(async {
//!         sleep(Duration::from_millis(10)).await;
//!         42
//!     });
//!     assert_eq!(handle.await.unwrap(), 42);
//! }
//! ```

pub mod io;
pub mod net;
pub mod sync;
pub mod task;
pub mod time;

pub use task::spawn;
pub use time::{sleep, Duration, Instant};
