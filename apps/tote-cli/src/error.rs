//! CLI error type.

use std::path::PathBuf;

use thiserror::Error;
use tote_core::{CoreError, ProductId};
use tote_storage::{PersistError, StorageError};

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CoreError),

    #[error("Failed to read catalog {}: {source}", path.display())]
    CatalogRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Product {0} is not in the catalog")]
    UnknownProduct(ProductId),

    /// The command ran but the cart could not be saved.
    #[error(transparent)]
    Persist(#[from] PersistError),

    #[error("Failed to encode output: {0}")]
    Output(#[from] serde_json::Error),
}

pub type CliResult<T> = Result<T, CliError>;
