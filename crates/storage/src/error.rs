//! Storage layer errors

use docrow_core::DocDbError;
use thiserror::Error;

/// Result type alias for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Errors reported by an ordered store or its iterators
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// Read or write failed
    #[error("I/O error: {0}")]
    Io(String),

    /// Stored data is inconsistent
    #[error("Data corruption: {0}")]
    Corruption(String),

    /// The store has begun teardown and rejects new work
    #[error("Store is closing")]
    Closing,

    /// Teardown gave up waiting for outstanding operations
    #[error("Teardown timed out with {outstanding} pending operations")]
    TeardownTimeout {
        /// Operations still holding a lifetime guard
        outstanding: u64,
    },
}

impl From<StorageError> for DocDbError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Closing => DocDbError::StoreClosing,
            other => DocDbError::SeekFailure(other.to_string()),
        }
    }
}
