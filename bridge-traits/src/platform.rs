//! Shared trait-object aliases for streaming I/O.
//!
//! Bridge implementations hand byte streams across crate boundaries as boxed
//! trait objects. The aliases keep the `Send + Unpin` bounds consistent so a
//! reader produced by the HTTP bridge can be moved into a spawned task by the
//! proxy without re-boxing.

/// Dynamic async reader shared between tasks.
pub type DynAsyncRead = dyn core_async::io::AsyncRead + Send + Unpin;

/// Dynamic async writer shared between tasks.
pub type DynAsyncWrite = dyn core_async::io::AsyncWrite + Send + Unpin;
