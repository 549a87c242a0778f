//! Drive stream cache.
//!
//! Umbrella crate for hosts that want the whole stack from one dependency.
//! With the default `desktop-shims` feature it re-exports `core-service`,
//! including [`bootstrap_desktop`], so a desktop app only supplies access
//! tokens and a media player.

#[cfg(feature = "desktop-shims")]
pub use core_service::*;
