//! Per-remote-id write locks.
//!
//! At most one download or write-through runs per remote id. Callers for the
//! same id queue on a keyed `tokio::sync::Mutex`; map entries live only while
//! some caller holds or awaits the lock.

use core_async::sync::{Mutex, OwnedMutexGuard};
use parking_lot::Mutex as SyncMutex;
use std::collections::HashMap;
use std::sync::Arc;

/// What currently holds an id's lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InFlightKind {
    /// Download waiting for a free download slot
    Queued,
    /// Download holding a slot and fetching from the remote
    Download,
    /// Proxy relay copying a streamed response into the cache
    WriteThrough,
}

struct Entry {
    lock: Arc<Mutex<()>>,
    holder: Option<InFlightKind>,
}

type Entries = Arc<SyncMutex<HashMap<String, Entry>>>;

/// Keyed lock map.
#[derive(Default)]
pub(crate) struct InFlight {
    entries: Entries,
}

impl InFlight {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn entry_lock(&self, key: &str) -> Arc<Mutex<()>> {
        self.entries
            .lock()
            .entry(key.to_string())
            .or_insert_with(|| Entry {
                lock: Arc::new(Mutex::new(())),
                holder: None,
            })
            .lock
            .clone()
    }

    fn guard(&self, key: &str, kind: Option<InFlightKind>, guard: OwnedMutexGuard<()>) -> InFlightGuard {
        if kind.is_some() {
            if let Some(entry) = self.entries.lock().get_mut(key) {
                entry.holder = kind;
            }
        }

        InFlightGuard {
            entries: self.entries.clone(),
            key: key.to_string(),
            kind,
            guard: Some(guard),
        }
    }

    /// Wait for the id's lock and hold it as `kind`.
    pub(crate) async fn acquire(&self, key: &str, kind: InFlightKind) -> InFlightGuard {
        let lock = self.entry_lock(key);
        let guard = lock.lock_owned().await;
        self.guard(key, Some(kind), guard)
    }

    /// Take the id's lock only if nobody holds it.
    pub(crate) fn try_acquire(&self, key: &str, kind: InFlightKind) -> Option<InFlightGuard> {
        let lock = self.entry_lock(key);
        match lock.try_lock_owned() {
            Ok(guard) => Some(self.guard(key, Some(kind), guard)),
            Err(_) => None,
        }
    }

    /// Who holds the id's lock right now, if anyone.
    pub(crate) fn holder(&self, key: &str) -> Option<InFlightKind> {
        self.entries.lock().get(key).and_then(|entry| entry.holder)
    }

    /// Wait until the current holder of the id's lock releases it.
    ///
    /// Returns `false` immediately when nothing holds the lock.
    pub(crate) async fn wait(&self, key: &str) -> bool {
        let lock = {
            let entries = self.entries.lock();
            match entries.get(key) {
                Some(entry) if entry.holder.is_some() => entry.lock.clone(),
                _ => return false,
            }
        };

        let guard = lock.lock_owned().await;
        drop(self.guard(key, None, guard));
        true
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

/// Holds an id's lock; releases it and prunes the map entry on drop.
pub struct InFlightGuard {
    entries: Entries,
    key: String,
    kind: Option<InFlightKind>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl InFlightGuard {
    /// Record a new holder kind for the id, e.g. once a download gets its slot.
    pub(crate) fn set_kind(&mut self, kind: InFlightKind) {
        if let Some(entry) = self.entries.lock().get_mut(&self.key) {
            entry.holder = Some(kind);
        }
        self.kind = Some(kind);
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut entries = self.entries.lock();

        if let Some(entry) = entries.get_mut(&self.key) {
            if self.kind.is_some() {
                entry.holder = None;
            }
        }

        drop(self.guard.take());

        // Only the map itself still references the lock: nobody is waiting.
        let idle = entries
            .get(&self.key)
            .map(|entry| Arc::strong_count(&entry.lock) == 1)
            .unwrap_or(false);
        if idle {
            entries.remove(&self.key);
        }
    }
}
