//! Async I/O traits and utilities.
//!
//! Re-exports Tokio's I/O traits plus the `tokio-util` adapters used to turn
//! an `AsyncRead` into a chunked byte stream and back.

pub use tokio::io::{
    empty, AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt,
    AsyncWrite, AsyncWriteExt, BufReader, BufWriter, ReadBuf, Take,
};

pub use tokio_util::io::{ReaderStream, StreamReader};
