//! # Write-Behind Flusher
//!
//! Coalesces rapid successive writes and flushes only the latest value per
//! key.
//!
//! ## Flush Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Write-Behind Worker                                │
//! │                                                                         │
//! │   cell.set(A) ──► schedule(key, A) ─┐                                   │
//! │   cell.set(B) ──► schedule(key, B) ─┼──► pending[key] = C               │
//! │   cell.set(C) ──► schedule(key, C) ─┘        │                          │
//! │                                              │  (A and B are dropped)   │
//! │                                              ▼                          │
//! │   ┌──────────────────────────────────────────────────────────────┐     │
//! │   │ Flush triggers                                                │     │
//! │   │  • coalesce window elapsed since the first pending change     │     │
//! │   │  • handle.flush().await                                       │     │
//! │   │  • handle.shutdown().await / every handle dropped             │     │
//! │   └──────────────────────────────────────────────────────────────┘     │
//! │                                              │                          │
//! │                                              ▼                          │
//! │                              storage.write(key, C)                      │
//! │                              failure → PersistError on the cell's       │
//! │                                        error channel                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Last-write-wins: a pending value is only ever replaced by a newer one, and
//! a flush drains the map before writing, so an older value can never be
//! written after a newer one for the same key.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::backend::Storage;
use crate::error::{PersistError, StorageError, StorageResult};

// =============================================================================
// Constants
// =============================================================================

/// Default coalesce window in milliseconds.
pub const DEFAULT_COALESCE_WINDOW_MS: u64 = 50;

// =============================================================================
// Pending Write
// =============================================================================

#[derive(Debug)]
struct PendingWrite {
    value: String,
    /// Error channel of the cell that scheduled the write.
    errors: broadcast::Sender<PersistError>,
    /// How many earlier values this one replaced.
    superseded: u32,
}

#[derive(Debug)]
enum WriteCommand {
    Schedule {
        key: String,
        value: String,
        errors: broadcast::Sender<PersistError>,
    },
    Flush(oneshot::Sender<()>),
    Shutdown(oneshot::Sender<()>),
}

// =============================================================================
// Handle
// =============================================================================

/// Handle for feeding and controlling a running [`WriteBehind`] worker.
///
/// Cheap to clone. When every handle is dropped the worker flushes what it
/// still holds and exits.
#[derive(Debug, Clone)]
pub struct WriteBehindHandle {
    cmd_tx: mpsc::UnboundedSender<WriteCommand>,
}

impl WriteBehindHandle {
    /// Queues `value` for `key`, replacing any pending value for that key.
    ///
    /// Never blocks.
    pub fn schedule(
        &self,
        key: impl Into<String>,
        value: String,
        errors: broadcast::Sender<PersistError>,
    ) -> StorageResult<()> {
        self.cmd_tx
            .send(WriteCommand::Schedule {
                key: key.into(),
                value,
                errors,
            })
            .map_err(|_| StorageError::ChannelClosed("Write-behind worker stopped".into()))
    }

    /// Writes everything pending now and waits until it is done.
    pub async fn flush(&self) -> StorageResult<()> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.cmd_tx
            .send(WriteCommand::Flush(ack_tx))
            .map_err(|_| StorageError::ChannelClosed("Write-behind worker stopped".into()))?;
        ack_rx
            .await
            .map_err(|_| StorageError::ChannelClosed("Write-behind flush dropped".into()))
    }

    /// Flushes and stops the worker.
    pub async fn shutdown(&self) -> StorageResult<()> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.cmd_tx
            .send(WriteCommand::Shutdown(ack_tx))
            .map_err(|_| StorageError::ChannelClosed("Write-behind worker stopped".into()))?;
        ack_rx
            .await
            .map_err(|_| StorageError::ChannelClosed("Write-behind shutdown dropped".into()))
    }

    /// True once the worker has exited.
    pub fn is_closed(&self) -> bool {
        self.cmd_tx.is_closed()
    }
}

// =============================================================================
// Worker
// =============================================================================

/// Background task that batches writes to one storage backend.
pub struct WriteBehind {
    storage: Arc<dyn Storage>,
    window: Duration,
    pending: HashMap<String, PendingWrite>,
}

impl WriteBehind {
    pub fn new(storage: Arc<dyn Storage>, window: Duration) -> Self {
        WriteBehind {
            storage,
            window,
            pending: HashMap::new(),
        }
    }

    /// Spawns the worker on the current tokio runtime.
    ///
    /// Must be called from within a runtime.
    pub fn start(self) -> WriteBehindHandle {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            self.run(cmd_rx).await;
        });

        WriteBehindHandle { cmd_tx }
    }

    async fn run(mut self, mut cmd_rx: mpsc::UnboundedReceiver<WriteCommand>) {
        info!(window_ms = self.window.as_millis() as u64, "Write-behind started");

        let mut deadline: Option<Instant> = None;

        loop {
            let timer = async move {
                match deadline {
                    Some(at) => sleep_until(at).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                cmd = cmd_rx.recv() => match cmd {
                    Some(WriteCommand::Schedule { key, value, errors }) => {
                        self.enqueue(key, value, errors);
                        deadline.get_or_insert_with(|| Instant::now() + self.window);
                    }
                    Some(WriteCommand::Flush(ack)) => {
                        self.flush_pending();
                        deadline = None;
                        let _ = ack.send(());
                    }
                    Some(WriteCommand::Shutdown(ack)) => {
                        info!("Write-behind shutting down");
                        // Closed before the ack, so a schedule that races the
                        // shutdown either lands here or fails and the cell
                        // writes directly.
                        cmd_rx.close();
                        let mut acks = self.drain_closed(&mut cmd_rx);
                        self.flush_pending();
                        acks.push(ack);
                        for ack in acks {
                            let _ = ack.send(());
                        }
                        break;
                    }
                    None => {
                        debug!("All write-behind handles dropped");
                        self.flush_pending();
                        break;
                    }
                },
                () = timer => {
                    self.flush_pending();
                    deadline = None;
                }
            }
        }

        info!("Write-behind stopped");
    }

    fn enqueue(&mut self, key: String, value: String, errors: broadcast::Sender<PersistError>) {
        match self.pending.get_mut(&key) {
            Some(existing) => {
                existing.value = value;
                existing.errors = errors;
                existing.superseded += 1;
                debug!(key = %key, superseded = existing.superseded, "Coalesced write");
            }
            None => {
                self.pending.insert(
                    key,
                    PendingWrite {
                        value,
                        errors,
                        superseded: 0,
                    },
                );
            }
        }
    }

    /// Takes every command queued before the channel was closed. Returns
    /// the acks to answer once the pending writes are flushed.
    fn drain_closed(
        &mut self,
        cmd_rx: &mut mpsc::UnboundedReceiver<WriteCommand>,
    ) -> Vec<oneshot::Sender<()>> {
        let mut acks = Vec::new();
        while let Ok(cmd) = cmd_rx.try_recv() {
            match cmd {
                WriteCommand::Schedule { key, value, errors } => self.enqueue(key, value, errors),
                WriteCommand::Flush(ack) | WriteCommand::Shutdown(ack) => acks.push(ack),
            }
        }
        acks
    }

    fn flush_pending(&mut self) {
        if self.pending.is_empty() {
            return;
        }

        debug!(count = self.pending.len(), "Flushing pending writes");

        for (key, write) in self.pending.drain() {
            if let Err(e) = self.storage.write(&key, &write.value) {
                warn!(key = %key, error = %e, "Deferred write failed");
                let _ = write.errors.send(PersistError::new(&key, &e));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryStorage;

    fn worker(window_ms: u64) -> (Arc<MemoryStorage>, WriteBehindHandle) {
        let storage = Arc::new(MemoryStorage::new());
        let handle = WriteBehind::new(storage.clone(), Duration::from_millis(window_ms)).start();
        (storage, handle)
    }

    fn channel() -> broadcast::Sender<PersistError> {
        broadcast::channel(8).0
    }

    #[tokio::test]
    async fn test_only_latest_value_is_written() {
        let (storage, handle) = worker(10_000);
        let errors = channel();

        for value in ["A", "B", "C"] {
            handle.schedule("k", value.to_string(), errors.clone()).unwrap();
        }
        handle.flush().await.unwrap();

        assert_eq!(storage.read("k").unwrap().as_deref(), Some("C"));
        assert_eq!(storage.write_count(), 1);
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let (storage, handle) = worker(10_000);
        let errors = channel();

        handle.schedule("a", "1".into(), errors.clone()).unwrap();
        handle.schedule("b", "2".into(), errors.clone()).unwrap();
        handle.schedule("a", "3".into(), errors).unwrap();
        handle.flush().await.unwrap();

        assert_eq!(storage.read("a").unwrap().as_deref(), Some("3"));
        assert_eq!(storage.read("b").unwrap().as_deref(), Some("2"));
        assert_eq!(storage.write_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_elapses_without_explicit_flush() {
        let (storage, handle) = worker(50);

        handle.schedule("k", "v".into(), channel()).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(storage.read("k").unwrap(), None);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(storage.read("k").unwrap().as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn test_failed_write_reported_on_channel() {
        let (storage, handle) = worker(10_000);
        let errors = channel();
        let mut rx = errors.subscribe();

        storage.set_available(false);
        handle.schedule("k", "v".into(), errors).unwrap();
        handle.flush().await.unwrap();

        let err = rx.recv().await.unwrap();
        assert_eq!(err.key, "k");
        assert!(err.message.contains("unavailable"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_schedule_after_shutdown_is_rejected() {
        for i in 0..200u32 {
            let (storage, handle) = worker(10_000);

            handle.schedule("k", "before".into(), channel()).unwrap();
            handle.shutdown().await.unwrap();
            assert_eq!(storage.read("k").unwrap().as_deref(), Some("before"), "run {i}");

            // Must fail rather than vanish into a worker that stopped reading.
            assert!(matches!(
                handle.schedule("k", "after".into(), channel()),
                Err(StorageError::ChannelClosed(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_shutdown_flushes_and_closes() {
        let (storage, handle) = worker(10_000);

        handle.schedule("k", "last".into(), channel()).unwrap();
        handle.shutdown().await.unwrap();

        assert_eq!(storage.read("k").unwrap().as_deref(), Some("last"));
        assert!(handle.is_closed());
        assert!(matches!(
            handle.schedule("k", "late".into(), channel()),
            Err(StorageError::ChannelClosed(_))
        ));
    }
}
