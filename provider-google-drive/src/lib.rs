//! # Google Drive Provider
//!
//! Implements the `RemoteStore` trait for Google Drive API v3.
//!
//! ## Overview
//!
//! This module provides:
//! - Streaming `alt=media` downloads with range request support
//! - Bearer authentication through an `AccessTokenProvider`
//! - One token refresh and retry when Drive answers `401`

pub mod connector;
pub mod error;

pub use connector::GoogleDriveConnector;
pub use error::{GoogleDriveError, Result};
