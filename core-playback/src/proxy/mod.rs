//! # Streaming Proxy
//!
//! Loopback-only HTTP endpoint that hands audio to the media player.
//!
//! ## Overview
//!
//! The player is given `http://127.0.0.1:<port>/<remote_id><extension>` and
//! treats it like any HTTP media resource, including the range requests it
//! issues when seeking. Each request is answered either from the local cache
//! (with `Range` support) or by relaying the remote object. A full, non-range
//! relay is copied into the cache as it streams.
//!
//! ```text
//!  GET /{id}{ext} ──> cached? ──yes──> serve file (200 / 206)
//!                        │
//!                        no ──> download in flight? ──yes──> wait, serve file
//!                                   │
//!                                   no ──> relay remote (+ write-through)
//! ```
//!
//! Connections are served on independent tasks; a slow client never stalls
//! another and a failing request never takes the listener down.

mod handler;
pub mod media;

use crate::cache::CacheManager;
use crate::error::{PlaybackError, Result};
use core_async::net::TcpListener;
use core_async::sync::CancellationToken;
use core_async::task::JoinHandle;
use core_async::time::Duration;
use handler::ProxyState;
use parking_lot::Mutex;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tracing::{error, info, instrument};

/// Default deadline for a remote fetch, and for each stalled remote read.
pub const DEFAULT_RELAY_TIMEOUT: Duration = Duration::from_secs(300);

struct Running {
    addr: SocketAddr,
    shutdown: CancellationToken,
    _task: JoinHandle<()>,
}

/// Loopback HTTP proxy in front of the cache and the remote store.
pub struct StreamingProxy {
    cache: Arc<CacheManager>,
    chunk_size: usize,
    relay_timeout: Duration,
    running: Mutex<Option<Running>>,
}

impl StreamingProxy {
    /// Create a stopped proxy over `cache`.
    pub fn new(cache: Arc<CacheManager>) -> Self {
        let chunk_size = cache.config().chunk_size;
        Self {
            cache,
            chunk_size,
            relay_timeout: DEFAULT_RELAY_TIMEOUT,
            running: Mutex::new(None),
        }
    }

    /// Set the remote fetch deadline.
    pub fn with_relay_timeout(mut self, timeout: Duration) -> Self {
        self.relay_timeout = timeout;
        self
    }

    /// Set the chunk size for streamed bodies.
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    /// Bind an ephemeral loopback port and start serving.
    ///
    /// Starting a running proxy is a no-op that returns the existing address.
    #[instrument(skip(self))]
    pub async fn start(&self) -> Result<SocketAddr> {
        if let Some(addr) = self.local_addr() {
            return Ok(addr);
        }

        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
            .await
            .map_err(|e| PlaybackError::ProxyError(format!("Failed to bind loopback port: {}", e)))?;
        let addr = listener
            .local_addr()
            .map_err(|e| PlaybackError::ProxyError(format!("Failed to read bound address: {}", e)))?;

        let app = handler::router(ProxyState {
            cache: self.cache.clone(),
            chunk_size: self.chunk_size,
            relay_timeout: self.relay_timeout,
        });

        let shutdown = CancellationToken::new();
        let signal = shutdown.clone();
        let task = core_async::spawn(async move {
            let server = axum::serve(listener, app)
                .with_graceful_shutdown(async move { signal.cancelled().await });
            if let Err(e) = server.await {
                error!(error = %e, "Streaming proxy stopped with error");
            }
        });

        let mut running = self.running.lock();
        if let Some(existing) = running.as_ref() {
            // A concurrent start won; shut ours down.
            shutdown.cancel();
            return Ok(existing.addr);
        }
        *running = Some(Running {
            addr,
            shutdown,
            _task: task,
        });

        info!(%addr, "Streaming proxy listening");
        Ok(addr)
    }

    /// Stop accepting connections and release the socket.
    ///
    /// Responses already streaming are allowed to finish.
    pub fn stop(&self) {
        if let Some(running) = self.running.lock().take() {
            running.shutdown.cancel();
            info!(addr = %running.addr, "Streaming proxy stopped");
        }
    }

    /// True between a successful `start()` and `stop()`.
    pub fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }

    /// Bound address while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.lock().as_ref().map(|running| running.addr)
    }

    /// Bound port while running.
    pub fn port(&self) -> Option<u16> {
        self.local_addr().map(|addr| addr.port())
    }

    /// URL the player should load for a remote file.
    pub fn stream_url(&self, remote_id: &str, extension: &str) -> Result<String> {
        let addr = self.local_addr().ok_or(PlaybackError::ProxyNotRunning)?;
        Ok(format!("http://{}/{}{}", addr, remote_id, extension))
    }
}

impl Drop for StreamingProxy {
    fn drop(&mut self) {
        self.stop();
    }
}
