//! # Error Types
//!
//! Domain-specific error types for tote-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  tote-core errors (this file)                                          │
//! │  └── CoreError        - Malformed cart or catalog data                 │
//! │                                                                         │
//! │  tote-storage errors (separate crate)                                  │
//! │  ├── StorageError     - Durable storage read/write failures            │
//! │  └── PersistError     - What the error channel carries                 │
//! │                                                                         │
//! │  Cart operations themselves never fail: unknown ids are no-ops.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::item::ProductId;

/// Errors raised while building cart or catalog values from external data.
///
/// None of these are produced by cart operations. They only occur when
/// data crosses in from outside (stored JSON, catalog files).
#[derive(Debug, Error)]
pub enum CoreError {
    /// The same product id appears twice in one line-item collection.
    ///
    /// ## When This Occurs
    /// - Hand-edited or corrupted stored cart content
    #[error("Duplicate line item for product {0}")]
    DuplicateItem(ProductId),

    /// The same product id appears twice in a catalog.
    #[error("Duplicate catalog entry for product {0}")]
    DuplicateCatalogEntry(ProductId),

    /// Catalog JSON could not be parsed.
    #[error("Failed to parse catalog: {0}")]
    CatalogParse(#[from] serde_json::Error),
}

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;
