//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the stream cache:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Event bus system
//!
//! ## Overview
//!
//! This crate contains the runtime utilities that other modules depend on.
//! It establishes the logging conventions, the validated settings shared by the
//! cache, proxy and queue, and the event broadcasting used to notify hosts.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{StreamCacheConfig, StreamCacheConfigBuilder};
pub use error::{Error, Result};
