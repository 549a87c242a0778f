//! Request handling for the loopback proxy.
//!
//! Each request ends in one of two paths: serve a cached file with range
//! support, or relay the remote object (optionally copying it into the cache).

use crate::cache::{CacheManager, WriteThrough};
use crate::cache::manager::check_remote_id;
use crate::error::Result;
use crate::proxy::media::{content_type_for, split_file_name};
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header::{ACCEPT_RANGES, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, RANGE};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use bridge_traits::platform::DynAsyncRead;
use bridge_traits::remote::ByteRange;
use bytes::Bytes;
use core_async::io::{AsyncReadExt, ReaderStream};
use core_async::sync::mpsc;
use core_async::time::{timeout, Duration};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn, Instrument};

/// Chunks buffered between the relay pump and the client connection.
const RELAY_CHANNEL_CAPACITY: usize = 4;

#[derive(Clone)]
pub(crate) struct ProxyState {
    pub cache: Arc<CacheManager>,
    pub chunk_size: usize,
    pub relay_timeout: Duration,
}

pub(crate) fn router(state: ProxyState) -> Router {
    Router::new()
        .route("/:file", get(stream_file))
        .fallback(malformed_path)
        .with_state(state)
}

async fn malformed_path() -> StatusCode {
    StatusCode::BAD_REQUEST
}

#[instrument(skip(state, headers))]
async fn stream_file(
    State(state): State<ProxyState>,
    Path(file): Path<String>,
    headers: HeaderMap,
) -> Response {
    let (remote_id, extension) = match split_file_name(&file) {
        Some(parts) if check_remote_id(parts.0).is_ok() => parts,
        _ => {
            debug!("Rejecting malformed path");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    let range = headers
        .get(RANGE)
        .map(|value| value.to_str().unwrap_or_default().to_string());

    if let Some(path) = cached_path(&state, remote_id).await {
        match serve_file(&state, path, extension, range.as_deref()).await {
            Ok(response) => return response,
            Err(e) => warn!(error = %e, "Failed to serve cached file, relaying instead"),
        }
    }

    relay(&state, remote_id, extension, range.as_deref()).await
}

/// Cached file for `remote_id`, briefly waiting out a download that is
/// already transferring.
async fn cached_path(state: &ProxyState, remote_id: &str) -> Option<PathBuf> {
    state
        .cache
        .cached_or_active_download(remote_id)
        .await
        .unwrap_or_else(|e| {
            warn!(error = %e, "Cache lookup failed");
            None
        })
}

// ============================================================================
// Serve from cache
// ============================================================================

async fn serve_file(
    state: &ProxyState,
    path: PathBuf,
    extension: &str,
    range: Option<&str>,
) -> Result<Response> {
    let fs = state.cache.filesystem();
    let size = fs.metadata(&path).await?.size;

    // Unparseable or unsatisfiable ranges fall back to the whole file.
    let resolved = range
        .and_then(ByteRange::parse)
        .and_then(|range| range.resolve(size));

    let (status, start, len) = match resolved {
        Some((start, end)) => (StatusCode::PARTIAL_CONTENT, start, end - start + 1),
        None => (StatusCode::OK, 0, size),
    };

    let reader = fs.open_read_at(&path, start).await?;
    let stream = ReaderStream::with_capacity(reader.take(len), state.chunk_size);

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type_for(extension)));
    headers.insert(CONTENT_LENGTH, HeaderValue::from(len));
    headers.insert(ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    if let Some((start, end)) = resolved {
        insert_header(
            &mut headers,
            CONTENT_RANGE,
            &format!("bytes {}-{}/{}", start, end, size),
        );
    }

    debug!(status = status.as_u16(), start, len, "Serving from cache");
    Ok((status, headers, Body::from_stream(stream)).into_response())
}

// ============================================================================
// Relay from remote
// ============================================================================

async fn relay(
    state: &ProxyState,
    remote_id: &str,
    extension: &str,
    range_header: Option<&str>,
) -> Response {
    let range = range_header.and_then(ByteRange::parse);

    let fetched = timeout(
        state.relay_timeout,
        state.cache.remote().fetch_range(remote_id, range),
    )
    .await;

    let response = match fetched {
        Ok(Ok(response)) => response,
        Ok(Err(e)) if e.is_unauthenticated() => {
            warn!(error = %e, "Remote store rejected credentials");
            return StatusCode::UNAUTHORIZED.into_response();
        }
        Ok(Err(e)) => {
            error!(error = %e, "Remote fetch failed");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
        Err(_) => {
            error!(timeout = ?state.relay_timeout, "Remote fetch timed out");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let mut headers = HeaderMap::new();
    insert_header(
        &mut headers,
        CONTENT_TYPE,
        response.content_type().unwrap_or(content_type_for(extension)),
    );
    headers.insert(ACCEPT_RANGES, HeaderValue::from_static("bytes"));

    if !response.is_success() {
        warn!(status = response.status, "Remote store returned error status");
        return (status, headers).into_response();
    }

    let content_length = response.content_length();
    if let Some(len) = content_length {
        headers.insert(CONTENT_LENGTH, HeaderValue::from(len));
    }
    if let Some(content_range) = response.header("content-range") {
        insert_header(&mut headers, CONTENT_RANGE, content_range);
    }

    // Partial content must never be cached as the whole file.
    let write_through = if range_header.is_none() && status == StatusCode::OK {
        state
            .cache
            .begin_write_through(remote_id, extension)
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "Could not start write-through");
                None
            })
    } else {
        None
    };

    info!(
        status = response.status,
        content_length,
        caching = write_through.is_some(),
        "Relaying from remote"
    );

    let (tx, rx) = mpsc::channel(RELAY_CHANNEL_CAPACITY);
    let pump = RelayPump {
        body: response.body,
        tx,
        cache: write_through,
        expected_len: content_length,
        chunk_size: state.chunk_size,
        idle_timeout: state.relay_timeout,
    };
    core_async::spawn(
        pump.run()
            .instrument(tracing::debug_span!("relay_pump", remote_id = %remote_id)),
    );

    let body = Body::from_stream(futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|chunk| (chunk, rx))
    }));

    (status, headers, body).into_response()
}

/// Copies a remote body to the client, teeing it into the cache.
struct RelayPump {
    body: Box<DynAsyncRead>,
    tx: mpsc::Sender<io::Result<Bytes>>,
    cache: Option<WriteThrough>,
    expected_len: Option<u64>,
    chunk_size: usize,
    idle_timeout: Duration,
}

impl RelayPump {
    async fn run(mut self) {
        let mut buffer = vec![0u8; self.chunk_size];
        let mut forwarded = 0u64;

        loop {
            let read = match timeout(self.idle_timeout, self.body.read(&mut buffer)).await {
                Ok(Ok(read)) => read,
                Ok(Err(e)) => {
                    warn!(error = %e, forwarded, "Remote read failed");
                    let _ = self.tx.send(Err(e)).await;
                    return;
                }
                Err(_) => {
                    warn!(forwarded, "Remote stream stalled");
                    let _ = self
                        .tx
                        .send(Err(io::Error::new(
                            io::ErrorKind::TimedOut,
                            "remote stream stalled",
                        )))
                        .await;
                    return;
                }
            };

            if read == 0 {
                break;
            }

            let chunk = Bytes::copy_from_slice(&buffer[..read]);

            if let Some(writer) = self.cache.as_mut() {
                if let Err(e) = writer.write(&chunk).await {
                    warn!(error = %e, "Cache write failed, continuing without caching");
                    self.cache = None;
                }
            }

            if self.tx.send(Ok(chunk)).await.is_err() {
                debug!(forwarded, "Client disconnected");
                return;
            }
            forwarded += read as u64;
        }

        let writer = match self.cache.take() {
            Some(writer) => writer,
            None => return,
        };

        // With a known length hyper may drop the body once the last byte is
        // written, so a closed channel only signals a disconnect without one.
        match self.expected_len {
            Some(expected) if expected != forwarded => {
                warn!(expected, forwarded, "Remote body length mismatch, discarding cache copy");
                return;
            }
            None if self.tx.is_closed() => {
                debug!("Client disconnected before completion, discarding cache copy");
                return;
            }
            _ => {}
        }

        match writer.commit().await {
            Ok(path) => debug!(path = ?path, size_bytes = forwarded, "Relay cached"),
            Err(e) => warn!(error = %e, "Failed to commit relayed file"),
        }
    }
}

fn insert_header(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(value) => {
            headers.insert(name, value);
        }
        Err(_) => warn!(header = %name, "Dropping invalid header value"),
    }
}
