//! # Storage Error Types
//!
//! Error types for durable storage and configuration.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  Backend failure (io::Error, quota, unavailable)                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  StorageError (this module) ← Categorized                              │
//! │       │                                                                 │
//! │       ├──► read at startup: logged, value falls back to initial        │
//! │       │                                                                 │
//! │       └──► write: logged + PersistError on the cell's error channel    │
//! │                   (in-memory value stays authoritative)                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Durable storage and configuration errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Storage cannot be reached right now.
    ///
    /// ## When This Occurs
    /// - Running before the storage environment exists
    /// - Storage location is not a directory
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// Writing would exceed the storage quota.
    #[error("Quota exceeded writing '{key}': {needed} bytes needed, quota is {quota}")]
    QuotaExceeded {
        key: String,
        needed: usize,
        quota: usize,
    },

    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Value could not be turned into JSON.
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Write-behind worker is gone.
    #[error("Channel closed: {0}")]
    ChannelClosed(String),

    /// Configuration is invalid.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file could not be read or parsed.
    #[error("Failed to load config: {0}")]
    ConfigLoad(String),

    /// Configuration file could not be written.
    #[error("Failed to save config: {0}")]
    ConfigSave(String),
}

impl StorageError {
    /// True when the failure is about reachability rather than content.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StorageError::Unavailable(_))
    }
}

impl From<toml::de::Error> for StorageError {
    fn from(err: toml::de::Error) -> Self {
        StorageError::ConfigLoad(err.to_string())
    }
}

impl From<toml::ser::Error> for StorageError {
    fn from(err: toml::ser::Error) -> Self {
        StorageError::ConfigSave(err.to_string())
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

// =============================================================================
// Persist Error (error channel payload)
// =============================================================================

/// A failed write-back, as delivered on a cell's error channel.
///
/// Clonable so it can fan out to any number of listeners.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Failed to persist '{key}': {message}")]
pub struct PersistError {
    /// Storage key the write targeted.
    pub key: String,
    /// Rendered cause.
    pub message: String,
}

impl PersistError {
    pub fn new(key: impl Into<String>, cause: &StorageError) -> Self {
        PersistError {
            key: key.into(),
            message: cause.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = StorageError::QuotaExceeded {
            key: "shopping-cart".to_string(),
            needed: 120,
            quota: 64,
        };
        assert_eq!(
            err.to_string(),
            "Quota exceeded writing 'shopping-cart': 120 bytes needed, quota is 64"
        );
    }

    #[test]
    fn test_persist_error_from_storage_error() {
        let cause = StorageError::Unavailable("not mounted".to_string());
        let err = PersistError::new("shopping-cart", &cause);

        assert_eq!(err.key, "shopping-cart");
        assert_eq!(
            err.to_string(),
            "Failed to persist 'shopping-cart': Storage unavailable: not mounted"
        );
        assert!(cause.is_unavailable());
    }

    #[test]
    fn test_toml_error_converts() {
        let toml_err = toml::from_str::<toml::Value>("= broken").unwrap_err();
        let err: StorageError = toml_err.into();
        assert!(matches!(err, StorageError::ConfigLoad(_)));
    }
}
