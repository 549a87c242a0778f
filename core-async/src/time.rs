//! Time-related abstractions.
//!
//! Re-exports Tokio's timer primitives. `Instant` is Tokio's instant so that
//! deadlines created here can be handed to [`timeout_at`] and remain
//! controllable from tests that pause the clock.
//!
//! # Examples
//!
//! ```rust
//! use core_async::time::{sleep, timeout, Duration};
//!
//! async fn example() {
//!     let result = timeout(Duration::from_millis(100), async {
//!         sleep(Duration::from_millis(10)).await;
//!         42
//!     })
//!     .await;
//!     assert_eq!(result.unwrap(), 42);
//! }
//! ```

pub use tokio::time::{
    error::Elapsed, interval, sleep, sleep_until, timeout, timeout_at, Instant, Interval, Sleep,
    Timeout,
};

pub use std::time::{Duration, SystemTime, UNIX_EPOCH};
