//! # Persistent Value Cell
//!
//! A value that is read from durable storage at startup and written back on
//! every change.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      PersistentCell Lifecycle                           │
//! │                                                                         │
//! │  new(key, storage, initial)                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  storage.read(key)                                                     │
//! │       │                                                                 │
//! │       ├── Some(json), parses ──────► value = stored     hydrated       │
//! │       ├── Some(json), malformed ───► value = initial    hydrated       │
//! │       ├── None ────────────────────► value = initial    hydrated       │
//! │       └── Err (unavailable) ───────► value = initial    NOT hydrated   │
//! │                                                                         │
//! │  set(v) ──► value = v ──► serialize ──► Immediate: storage.write       │
//! │                                     └─► Deferred:  write-behind queue  │
//! │             failure → warn! + PersistError on errors() channel         │
//! │                                                                         │
//! │  rehydrate()  (only while NOT hydrated, succeeds at most once)         │
//! │       ├── never set since init → adopt stored value if well-formed    │
//! │       └── set since init ──────→ keep in-memory value, write it back   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Initialization never writes. Storage is advisory: nothing read from it
//! can make construction fail, and nothing written to it can make `set` fail.

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::backend::Storage;
use crate::error::{PersistError, StorageError, StorageResult};
use crate::write_behind::WriteBehindHandle;

/// Capacity of each cell's error channel. Slow listeners lose the oldest
/// errors rather than blocking writes.
const ERROR_CHANNEL_CAPACITY: usize = 16;

/// How a cell hands new values to storage.
#[derive(Debug, Clone)]
pub enum WriteBack {
    /// Write synchronously inside `set`.
    Immediate,
    /// Queue on a write-behind worker; only the latest value is flushed.
    Deferred(WriteBehindHandle),
}

/// Storage-backed value holder.
pub struct PersistentCell<T> {
    key: String,
    value: T,
    storage: Arc<dyn Storage>,
    write_back: WriteBack,
    hydrated: bool,
    /// Set since initialization.
    dirty: bool,
    errors: broadcast::Sender<PersistError>,
}

impl<T> PersistentCell<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Opens the cell with a ready-made initial value.
    pub fn new(key: impl Into<String>, storage: Arc<dyn Storage>, initial: T) -> Self {
        Self::with_producer(key, storage, || initial)
    }

    /// Opens the cell, calling `producer` only if no stored value is adopted.
    pub fn with_producer<F>(key: impl Into<String>, storage: Arc<dyn Storage>, producer: F) -> Self
    where
        F: FnOnce() -> T,
    {
        let key = key.into();
        let (errors, _) = broadcast::channel(ERROR_CHANNEL_CAPACITY);

        let (value, hydrated) = match storage.read(&key) {
            Ok(raw) => match raw.and_then(|json| decode::<T>(&key, &json)) {
                Some(stored) => {
                    info!(key = %key, "Hydrated value from storage");
                    (stored, true)
                }
                None => {
                    debug!(key = %key, "No stored value, using initial value");
                    (producer(), true)
                }
            },
            Err(e) => {
                warn!(key = %key, error = %e, "Storage not readable at startup, using initial value");
                (producer(), false)
            }
        };

        PersistentCell {
            key,
            value,
            storage,
            write_back: WriteBack::Immediate,
            hydrated,
            dirty: false,
            errors,
        }
    }

    /// Routes future writes through a write-behind worker.
    #[must_use]
    pub fn with_write_back(mut self, write_back: WriteBack) -> Self {
        self.write_back = write_back;
        self
    }

    /// Current value.
    #[inline]
    pub fn get(&self) -> &T {
        &self.value
    }

    /// Replaces the value and writes it back.
    pub fn set(&mut self, value: T) {
        self.value = value;
        self.dirty = true;
        self.persist();
    }

    /// Retries the startup read if storage was unavailable then.
    ///
    /// Returns `true` when a stored value was adopted. Does nothing once the
    /// cell is hydrated.
    pub fn rehydrate(&mut self) -> bool {
        if self.hydrated {
            return false;
        }

        let raw = match self.storage.read(&self.key) {
            Ok(raw) => raw,
            Err(e) => {
                debug!(key = %self.key, error = %e, "Storage still not readable");
                return false;
            }
        };
        self.hydrated = true;

        if self.dirty {
            info!(key = %self.key, "Keeping in-memory value over stored value");
            self.persist();
            return false;
        }

        match raw.and_then(|json| decode::<T>(&self.key, &json)) {
            Some(stored) => {
                info!(key = %self.key, "Rehydrated value from storage");
                self.value = stored;
                true
            }
            None => false,
        }
    }

    /// Waits until every queued write for this cell has reached storage.
    pub async fn flush(&self) -> StorageResult<()> {
        match &self.write_back {
            WriteBack::Immediate => Ok(()),
            WriteBack::Deferred(handle) => handle.flush().await,
        }
    }

    /// Subscribes to write failures. Only failures after this call are seen.
    pub fn errors(&self) -> broadcast::Receiver<PersistError> {
        self.errors.subscribe()
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn is_hydrated(&self) -> bool {
        self.hydrated
    }

    /// Current write path. Falls back to `Immediate` once a deferred worker
    /// has been found stopped.
    pub fn write_back(&self) -> &WriteBack {
        &self.write_back
    }

    pub fn into_inner(self) -> T {
        self.value
    }

    fn persist(&mut self) {
        let json = match serde_json::to_string(&self.value) {
            Ok(json) => json,
            Err(e) => return self.report(&StorageError::from(e)),
        };

        if let WriteBack::Deferred(handle) = &self.write_back {
            match handle.schedule(self.key.clone(), json.clone(), self.errors.clone()) {
                Ok(()) => return,
                Err(e) => {
                    warn!(key = %self.key, error = %e, "Write-behind gone, writing directly");
                    self.write_back = WriteBack::Immediate;
                }
            }
        }

        match self.storage.write(&self.key, &json) {
            Ok(()) => debug!(key = %self.key, bytes = json.len(), "Value written"),
            Err(e) => self.report(&e),
        }
    }

    fn report(&self, err: &StorageError) {
        warn!(key = %self.key, error = %err, "Failed to persist value");
        // No subscribers is fine: the warning above is the record.
        let _ = self.errors.send(PersistError::new(&self.key, err));
    }
}

impl<T: fmt::Debug> fmt::Debug for PersistentCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistentCell")
            .field("key", &self.key)
            .field("value", &self.value)
            .field("hydrated", &self.hydrated)
            .field("dirty", &self.dirty)
            .finish_non_exhaustive()
    }
}

/// Parses stored JSON; malformed content counts as absent.
fn decode<T: DeserializeOwned>(key: &str, json: &str) -> Option<T> {
    match serde_json::from_str(json) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(key = %key, error = %e, "Ignoring malformed stored value");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryStorage;
    use crate::write_behind::WriteBehind;
    use std::cell::Cell;
    use std::time::Duration;

    fn memory(entries: &[(&str, &str)]) -> Arc<MemoryStorage> {
        Arc::new(MemoryStorage::with_entries(entries.iter().copied()))
    }

    #[test]
    fn test_initial_value_when_absent() {
        let storage = memory(&[]);
        let cell = PersistentCell::new("k", storage.clone(), vec![1u32, 2]);

        assert_eq!(cell.get(), &vec![1, 2]);
        assert!(cell.is_hydrated());
        assert_eq!(storage.write_count(), 0, "init must not write");
    }

    #[test]
    fn test_stored_value_wins() {
        let storage = memory(&[("k", "[7,8,9]")]);
        let cell = PersistentCell::new("k", storage, Vec::<u32>::new());
        assert_eq!(cell.get(), &vec![7, 8, 9]);
    }

    #[test]
    fn test_malformed_falls_back_to_initial() {
        let storage = memory(&[("k", "{oops")]);
        let cell = PersistentCell::new("k", storage, vec![1u32]);

        assert_eq!(cell.get(), &vec![1]);
        assert!(cell.is_hydrated());
    }

    #[test]
    fn test_producer_called_at_most_once() {
        let calls = Cell::new(0);
        let produce = || {
            calls.set(calls.get() + 1);
            42u32
        };

        let cell = PersistentCell::with_producer("k", memory(&[]), produce);
        assert_eq!(*cell.get(), 42);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_producer_skipped_when_stored() {
        let calls = Cell::new(0);
        let cell = PersistentCell::with_producer("k", memory(&[("k", "5")]), || {
            calls.set(calls.get() + 1);
            0u32
        });

        assert_eq!(*cell.get(), 5);
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_set_writes_immediately() {
        let storage = memory(&[]);
        let mut cell = PersistentCell::new("k", storage.clone(), 0u32);

        cell.set(3);
        cell.set(4);

        assert_eq!(*cell.get(), 4);
        assert_eq!(storage.read("k").unwrap().as_deref(), Some("4"));
        assert_eq!(storage.write_count(), 2);
    }

    #[test]
    fn test_write_failure_keeps_value_and_reports() {
        let storage = Arc::new(MemoryStorage::new().with_quota(2));
        let mut cell = PersistentCell::new("k", storage.clone(), String::new());
        let mut errors = cell.errors();

        cell.set("much too long".to_string());

        assert_eq!(cell.get(), "much too long");
        let err = errors.try_recv().unwrap();
        assert_eq!(err.key, "k");
        assert!(err.message.contains("Quota exceeded"));
        assert_eq!(storage.read("k").unwrap(), None);
    }

    #[test]
    fn test_unavailable_then_rehydrate() {
        let storage = memory(&[("k", "[3]")]);
        storage.set_available(false);

        let mut cell = PersistentCell::new("k", storage.clone(), Vec::<u32>::new());
        assert!(!cell.is_hydrated());
        assert!(cell.get().is_empty());

        // Still unavailable: nothing happens.
        assert!(!cell.rehydrate());
        assert!(!cell.is_hydrated());

        storage.set_available(true);
        assert!(cell.rehydrate());
        assert_eq!(cell.get(), &vec![3]);

        // Runs once.
        storage.write("k", "[4]").unwrap();
        assert!(!cell.rehydrate());
        assert_eq!(cell.get(), &vec![3]);
    }

    #[test]
    fn test_rehydrate_keeps_local_changes() {
        let storage = memory(&[("k", "[3]")]);
        storage.set_available(false);

        let mut cell = PersistentCell::new("k", storage.clone(), Vec::<u32>::new());
        cell.set(vec![9]);

        storage.set_available(true);
        assert!(!cell.rehydrate());
        assert_eq!(cell.get(), &vec![9]);
        assert_eq!(storage.read("k").unwrap().as_deref(), Some("[9]"));
    }

    #[tokio::test]
    async fn test_deferred_writes_coalesce() {
        let storage = memory(&[]);
        let handle = WriteBehind::new(storage.clone(), Duration::from_secs(60)).start();
        let mut cell = PersistentCell::new("k", storage.clone(), 0u32)
            .with_write_back(WriteBack::Deferred(handle));

        cell.set(1);
        cell.set(2);
        cell.set(3);
        assert_eq!(storage.write_count(), 0);

        cell.flush().await.unwrap();
        assert_eq!(storage.read("k").unwrap().as_deref(), Some("3"));
        assert_eq!(storage.write_count(), 1);
    }

    #[tokio::test]
    async fn test_deferred_falls_back_when_worker_stopped() {
        let storage = memory(&[]);
        let handle = WriteBehind::new(storage.clone(), Duration::from_secs(60)).start();
        handle.shutdown().await.unwrap();

        let mut cell = PersistentCell::new("k", storage.clone(), 0u32)
            .with_write_back(WriteBack::Deferred(handle));
        cell.set(8);

        assert_eq!(storage.read("k").unwrap().as_deref(), Some("8"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_set_right_after_shutdown_reaches_storage() {
        for i in 0..500u32 {
            let storage = memory(&[]);
            let handle = WriteBehind::new(storage.clone(), Duration::from_secs(60)).start();
            let mut cell = PersistentCell::new("k", storage.clone(), 0u32)
                .with_write_back(WriteBack::Deferred(handle.clone()));
            let mut errors = cell.errors();

            cell.set(1);
            handle.shutdown().await.unwrap();
            cell.set(i + 2);

            let expected = (i + 2).to_string();
            assert_eq!(storage.read("k").unwrap().as_deref(), Some(expected.as_str()));
            assert!(errors.try_recv().is_err());
        }
    }
}
