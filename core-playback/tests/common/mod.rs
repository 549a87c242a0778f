//! Shared fixtures: an in-memory remote store, a recording player, and a
//! cache manager over a scratch directory.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_desktop::TokioFileSystem;
use bridge_traits::database::{DatabaseAdapter, DatabaseConfig};
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::playback::{AudioSource, MediaPlayer};
use bridge_traits::remote::{ByteRange, RemoteResponse, RemoteStore};
use core_library::{SqliteAdapter, SqliteCacheStore};
use core_playback::cache::{CacheConfig, CacheManager};
use core_runtime::events::EventBus;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};
use tokio::sync::Semaphore;

/// Deterministic audio-like payload.
pub fn audio(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// Poll `check` until it holds or a second passes.
pub async fn eventually<F: FnMut() -> bool>(mut check: F) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

// ============================================================================
// Remote store
// ============================================================================

/// How a full-object body misbehaves after its first bytes.
#[derive(Clone, Copy)]
enum BodyFault {
    FailAfter(usize),
    StallAfter(usize),
}

/// In-memory `RemoteStore` that counts fetches and can hold them at a gate.
pub struct FakeRemote {
    files: Mutex<HashMap<String, Vec<u8>>>,
    fetches: Mutex<HashMap<String, usize>>,
    ranges: Mutex<Vec<Option<ByteRange>>>,
    faults: Mutex<HashMap<String, BodyFault>>,
    held: Mutex<HashSet<String>>,
    gated: AtomicBool,
    gate: Semaphore,
    unauthenticated: AtomicBool,
}

impl Default for FakeRemote {
    fn default() -> Self {
        Self {
            files: Mutex::new(HashMap::new()),
            fetches: Mutex::new(HashMap::new()),
            ranges: Mutex::new(Vec::new()),
            faults: Mutex::new(HashMap::new()),
            held: Mutex::new(HashSet::new()),
            gated: AtomicBool::new(false),
            gate: Semaphore::new(0),
            unauthenticated: AtomicBool::new(false),
        }
    }
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full-object bodies of `remote_id` fail with a reset after `bytes`.
    pub fn fail_after(self, remote_id: &str, bytes: usize) -> Self {
        self.faults
            .lock()
            .insert(remote_id.to_string(), BodyFault::FailAfter(bytes));
        self
    }

    /// Full-object bodies of `remote_id` stop producing data after `bytes`.
    pub fn stall_after(self, remote_id: &str, bytes: usize) -> Self {
        self.faults
            .lock()
            .insert(remote_id.to_string(), BodyFault::StallAfter(bytes));
        self
    }

    /// Hold fetches of `remote_id` until `open_gate`, leaving others free.
    pub fn hold(&self, remote_id: &str) {
        self.held.lock().insert(remote_id.to_string());
    }

    pub fn with_file(self, remote_id: &str, bytes: Vec<u8>) -> Self {
        self.files.lock().insert(remote_id.to_string(), bytes);
        self
    }

    /// Hold every fetch until `open_gate` is called.
    pub fn gated(self) -> Self {
        self.gated.store(true, Ordering::SeqCst);
        self
    }

    /// Start holding fetches again.
    pub fn close_gate(&self) {
        self.gated.store(true, Ordering::SeqCst);
    }

    pub fn open_gate(&self) {
        self.gated.store(false, Ordering::SeqCst);
        self.held.lock().clear();
        self.gate.add_permits(1024);
    }

    pub fn reject_credentials(&self) {
        self.unauthenticated.store(true, Ordering::SeqCst);
    }

    pub fn fetch_count(&self, remote_id: &str) -> usize {
        self.fetches.lock().get(remote_id).copied().unwrap_or(0)
    }

    pub fn total_fetches(&self) -> usize {
        self.fetches.lock().values().sum()
    }

    pub fn ranges(&self) -> Vec<Option<ByteRange>> {
        self.ranges.lock().clone()
    }
}

#[async_trait]
impl RemoteStore for FakeRemote {
    async fn fetch_range(
        &self,
        remote_id: &str,
        range: Option<ByteRange>,
    ) -> BridgeResult<RemoteResponse> {
        *self.fetches.lock().entry(remote_id.to_string()).or_default() += 1;
        self.ranges.lock().push(range);

        let held = self.held.lock().contains(remote_id);
        if held || self.gated.load(Ordering::SeqCst) {
            self.gate
                .acquire()
                .await
                .map_err(|e| BridgeError::OperationFailed(e.to_string()))?
                .forget();
        }

        if self.unauthenticated.load(Ordering::SeqCst) {
            return Err(BridgeError::Unauthenticated("token rejected".to_string()));
        }

        let bytes = match self.files.lock().get(remote_id).cloned() {
            Some(bytes) => bytes,
            None => {
                return Ok(RemoteResponse {
                    status: 404,
                    headers: HashMap::new(),
                    body: Box::new(tokio::io::empty()),
                })
            }
        };

        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), "audio/mpeg".to_string());

        let size = bytes.len() as u64;
        let (status, body) = match range.and_then(|r| r.resolve(size)) {
            Some((start, end)) => {
                headers.insert(
                    "content-range".to_string(),
                    format!("bytes {}-{}/{}", start, end, size),
                );
                (206, bytes[start as usize..=end as usize].to_vec())
            }
            None => (200, bytes),
        };
        headers.insert("content-length".to_string(), body.len().to_string());

        let fault = self.faults.lock().get(remote_id).copied();
        let body: Box<bridge_traits::platform::DynAsyncRead> = match (status, fault) {
            (200, Some(BodyFault::FailAfter(n))) => {
                let head = std::io::Cursor::new(body[..n.min(body.len())].to_vec());
                Box::new(head.chain(BrokenBody { stall: false }))
            }
            (200, Some(BodyFault::StallAfter(n))) => {
                let head = std::io::Cursor::new(body[..n.min(body.len())].to_vec());
                Box::new(head.chain(BrokenBody { stall: true }))
            }
            _ => Box::new(std::io::Cursor::new(body)),
        };

        Ok(RemoteResponse {
            status,
            headers,
            body,
        })
    }
}

/// Tail of a faulty body: either a connection reset or silence.
struct BrokenBody {
    stall: bool,
}

impl AsyncRead for BrokenBody {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if self.stall {
            Poll::Pending
        } else {
            Poll::Ready(Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "connection reset by remote",
            )))
        }
    }
}

// ============================================================================
// Media player
// ============================================================================

/// Player that records what it was asked to do.
#[derive(Default)]
pub struct RecordingPlayer {
    loads: Mutex<Vec<AudioSource>>,
    calls: Mutex<Vec<String>>,
    position: Mutex<Duration>,
}

impl RecordingPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn loads(&self) -> Vec<AudioSource> {
        self.loads.lock().clone()
    }

    pub fn last_load(&self) -> Option<AudioSource> {
        self.loads.lock().last().cloned()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn set_position(&self, position: Duration) {
        *self.position.lock() = position;
    }
}

#[async_trait]
impl MediaPlayer for RecordingPlayer {
    async fn load(&self, source: AudioSource) -> BridgeResult<()> {
        self.calls.lock().push("load".to_string());
        self.loads.lock().push(source);
        Ok(())
    }

    async fn play(&self) -> BridgeResult<()> {
        self.calls.lock().push("play".to_string());
        Ok(())
    }

    async fn pause(&self) -> BridgeResult<()> {
        self.calls.lock().push("pause".to_string());
        Ok(())
    }

    async fn stop(&self) -> BridgeResult<()> {
        self.calls.lock().push("stop".to_string());
        Ok(())
    }

    async fn seek(&self, position: Duration) -> BridgeResult<()> {
        self.calls.lock().push(format!("seek:{}", position.as_millis()));
        *self.position.lock() = position;
        Ok(())
    }

    async fn position(&self) -> BridgeResult<Duration> {
        Ok(*self.position.lock())
    }
}

// ============================================================================
// Cache harness
// ============================================================================

pub struct Harness {
    pub dir: TempDir,
    pub remote: Arc<FakeRemote>,
    pub store: Arc<SqliteCacheStore>,
    pub cache: Arc<CacheManager>,
    pub events: Arc<EventBus>,
}

impl Harness {
    pub async fn new(config: CacheConfig, remote: FakeRemote) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let fs = Arc::new(TokioFileSystem::with_directories(
            dir.path().join("cache"),
            dir.path().join("data"),
        ));

        let mut adapter = SqliteAdapter::new(DatabaseConfig::new(dir.path().join("cache.db")))
            .await
            .unwrap();
        adapter.initialize().await.unwrap();
        let store = Arc::new(SqliteCacheStore::new(Arc::new(adapter)));

        let remote = Arc::new(remote);
        let events = Arc::new(EventBus::new(64));
        let cache = Arc::new(
            CacheManager::new(config, store.clone(), fs, remote.clone())
                .with_event_bus(events.clone()),
        );
        cache.initialize().await.unwrap();

        Self {
            dir,
            remote,
            store,
            cache,
            events,
        }
    }

    pub async fn with_remote(remote: FakeRemote) -> Self {
        Self::new(CacheConfig::default(), remote).await
    }

    /// Files currently in the cache directory.
    pub fn cache_files(&self) -> Vec<PathBuf> {
        let dir = self.cache.cache_directory().unwrap();
        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect();
        files.sort();
        files
    }
}
