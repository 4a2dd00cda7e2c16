//! # Storage Backends
//!
//! The durable storage contract and its implementations.
//!
//! ## Storage Contract
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Durable Storage Interface                            │
//! │                                                                         │
//! │  PersistentCell / WriteBehind                                          │
//! │       │                                                                 │
//! │       │  storage.read("shopping-cart")                                 │
//! │       │  storage.write("shopping-cart", "[{\"id\":3,...}]")            │
//! │       ▼                                                                 │
//! │  dyn Storage                                                           │
//! │  ├── read(&self, key)  -> Option<String>                               │
//! │  └── write(&self, key, value)                                          │
//! │       │                                                                 │
//! │       ├──► MemoryStorage  (tests, ephemeral sessions)                  │
//! │       └──► FileStorage    (one JSON file per key)                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Values are opaque strings here; serialization is the caller's business.

mod file;
mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

use std::fmt::Debug;

use crate::error::StorageResult;

/// Key-value durable storage.
///
/// Implementations must be shareable across the store and the write-behind
/// worker, hence `Send + Sync` and `&self` methods.
pub trait Storage: Send + Sync + Debug {
    /// Reads the value stored under `key`.
    ///
    /// `Ok(None)` means the key has never been written.
    fn read(&self, key: &str) -> StorageResult<Option<String>>;

    /// Replaces the value stored under `key`.
    fn write(&self, key: &str, value: &str) -> StorageResult<()>;
}
