//! Remote Object Store Abstraction
//!
//! The cache and the streaming proxy fetch audio bytes through [`RemoteStore`].
//! Implementations own credentials and must transparently refresh them once
//! when the remote side answers `401`; any residual rejection is reported as
//! [`BridgeError::Unauthenticated`](crate::error::BridgeError::Unauthenticated).

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;

use crate::error::Result;
use crate::platform::DynAsyncRead;

/// Byte range of a remote object, as carried by an HTTP `Range` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteRange {
    /// `bytes=<start>-<end>`, both inclusive.
    Bounded { start: u64, end: u64 },
    /// `bytes=<start>-`, through the end of the object.
    From { start: u64 },
    /// `bytes=-<length>`, the final `length` bytes.
    Suffix { length: u64 },
}

impl ByteRange {
    /// Parse a single-range `Range` header value.
    ///
    /// Multi-range requests and units other than `bytes` yield `None`.
    pub fn parse(header: &str) -> Option<Self> {
        let ranges = header.trim().strip_prefix("bytes=")?;
        if ranges.contains(',') {
            return None;
        }
        let (start, end) = ranges.split_once('-')?;
        let (start, end) = (start.trim(), end.trim());

        match (start.is_empty(), end.is_empty()) {
            (false, false) => {
                let start = start.parse().ok()?;
                let end = end.parse().ok()?;
                (start <= end).then_some(ByteRange::Bounded { start, end })
            }
            (false, true) => Some(ByteRange::From {
                start: start.parse().ok()?,
            }),
            (true, false) => Some(ByteRange::Suffix {
                length: end.parse().ok()?,
            }),
            (true, true) => None,
        }
    }

    /// Resolve the range against an object of `size` bytes.
    ///
    /// Returns inclusive `(start, end)` offsets, or `None` when the range is
    /// not satisfiable.
    pub fn resolve(&self, size: u64) -> Option<(u64, u64)> {
        if size == 0 {
            return None;
        }
        let last = size - 1;
        let (start, end) = match *self {
            ByteRange::Bounded { start, end } => (start, end),
            ByteRange::From { start } => (start, last),
            ByteRange::Suffix { length } if length > 0 => (size.saturating_sub(length), last),
            ByteRange::Suffix { .. } => return None,
        };
        (start <= end && end <= last).then_some((start, end))
    }

    /// Render as an HTTP `Range` header value.
    pub fn to_header(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ByteRange::Bounded { start, end } => write!(f, "bytes={}-{}", start, end),
            ByteRange::From { start } => write!(f, "bytes={}-", start),
            ByteRange::Suffix { length } => write!(f, "bytes=-{}", length),
        }
    }
}

/// Response from a remote object fetch.
///
/// Non-2xx statuses other than a residual `401` are returned as responses so
/// callers can mirror them. Header names are lower-case.
pub struct RemoteResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Box<DynAsyncRead>,
}

impl RemoteResponse {
    /// Look up a header by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    pub fn content_length(&self) -> Option<u64> {
        self.header("content-length").and_then(|v| v.parse().ok())
    }

    /// Check if response status is successful (2xx)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl fmt::Debug for RemoteResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Byte-addressable remote object store.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetch an object, or a byte range of it, as a stream.
    ///
    /// # Errors
    ///
    /// - `BridgeError::Unauthenticated` if the credentials are rejected after
    ///   one refresh-and-retry
    /// - `BridgeError::OperationFailed` on transport failure
    async fn fetch_range(&self, remote_id: &str, range: Option<ByteRange>)
        -> Result<RemoteResponse>;
}

/// Supplies bearer tokens to remote store connectors.
///
/// Obtaining and persisting credentials is the host's concern; connectors only
/// read the current token and ask for a refresh after a `401`.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    /// Current access token.
    async fn access_token(&self) -> Result<String>;

    /// Force a token refresh and return the new token.
    async fn force_refresh(&self) -> Result<String>;
}
