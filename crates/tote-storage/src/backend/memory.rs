//! In-process storage backend.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use super::Storage;
use crate::error::{StorageError, StorageResult};

/// `HashMap`-backed storage.
///
/// Besides plain storage it can simulate the two failure modes a real
/// environment has: being unavailable (e.g. before the host environment is
/// ready) and running out of quota.
#[derive(Debug)]
pub struct MemoryStorage {
    inner: Mutex<MemoryInner>,
}

#[derive(Debug)]
struct MemoryInner {
    entries: HashMap<String, String>,
    available: bool,
    /// Maximum total bytes across all values.
    quota: Option<usize>,
    writes: usize,
}

impl MemoryStorage {
    /// Creates an empty, available store with no quota.
    pub fn new() -> Self {
        MemoryStorage {
            inner: Mutex::new(MemoryInner {
                entries: HashMap::new(),
                available: true,
                quota: None,
                writes: 0,
            }),
        }
    }

    /// Creates a store pre-populated with `entries`.
    pub fn with_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let storage = Self::new();
        storage.lock().entries = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        storage
    }

    /// Limits the total size of stored values, in bytes.
    #[must_use]
    pub fn with_quota(self, bytes: usize) -> Self {
        self.lock().quota = Some(bytes);
        self
    }

    /// Makes every read and write fail with `Unavailable` until re-enabled.
    pub fn set_available(&self, available: bool) {
        self.lock().available = available;
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> usize {
        self.lock().writes
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for MemoryStorage {
    fn read(&self, key: &str) -> StorageResult<Option<String>> {
        let inner = self.lock();
        if !inner.available {
            return Err(StorageError::Unavailable("memory storage disabled".into()));
        }
        Ok(inner.entries.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut inner = self.lock();
        if !inner.available {
            return Err(StorageError::Unavailable("memory storage disabled".into()));
        }

        if let Some(quota) = inner.quota {
            let others: usize = inner
                .entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(_, v)| v.len())
                .sum();
            let needed = others + value.len();
            if needed > quota {
                return Err(StorageError::QuotaExceeded {
                    key: key.to_string(),
                    needed,
                    quota,
                });
            }
        }

        inner.entries.insert(key.to_string(), value.to_string());
        inner.writes += 1;
        debug!(key = %key, bytes = value.len(), "Memory storage write");
        Ok(())
    }
}
