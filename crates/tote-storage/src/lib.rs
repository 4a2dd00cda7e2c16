//! # tote-storage: Durable Storage for Tote
//!
//! Everything between an in-memory value and durable storage.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Persistence Path                                 │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  PersistentCell<T>                                              │   │
//! │  │  read once at startup ◄──────────────┐                          │   │
//! │  │  set(v) ──► serialize ──┐            │                          │   │
//! │  └─────────────────────────┼────────────┼──────────────────────────┘   │
//! │          Immediate         │  Deferred  │                              │
//! │          ┌─────────────────┘──────┐     │                              │
//! │          │                        ▼     │                              │
//! │          │          ┌──────────────────────────┐                       │
//! │          │          │ WriteBehind (tokio task) │                       │
//! │          │          │ latest value per key     │                       │
//! │          │          └────────────┬─────────────┘                       │
//! │          ▼                       ▼      │                              │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  dyn Storage: MemoryStorage | FileStorage                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`backend`] - `Storage` trait, `MemoryStorage`, `FileStorage`
//! - [`cell`] - `PersistentCell`, the read-at-start / write-on-change holder
//! - [`write_behind`] - Coalescing flusher for deferred writes
//! - [`config`] - `ToteConfig` (TOML + environment)
//! - [`error`] - Storage error types
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use tote_storage::{MemoryStorage, PersistentCell, Storage};
//!
//! let storage = Arc::new(MemoryStorage::new());
//! let mut visits = PersistentCell::new("visits", storage.clone(), 0u32);
//! visits.set(*visits.get() + 1);
//!
//! assert_eq!(storage.read("visits").unwrap().as_deref(), Some("1"));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod backend;
pub mod cell;
pub mod config;
pub mod error;
pub mod write_behind;

// =============================================================================
// Re-exports
// =============================================================================

pub use backend::{FileStorage, MemoryStorage, Storage};
pub use cell::{PersistentCell, WriteBack};
pub use config::{BackendKind, FlushMode, PersistenceSettings, StorageSettings, ToteConfig};
pub use error::{PersistError, StorageError, StorageResult};
pub use write_behind::{WriteBehind, WriteBehindHandle, DEFAULT_COALESCE_WINDOW_MS};
