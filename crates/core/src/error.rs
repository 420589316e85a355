//! Error types for the row reconstruction layer
//!
//! This module defines all error types surfaced by key/value decoding,
//! schema checks and the row iterator.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! Errors are `Clone` because the row iterator captures the failure of a
//! `has_next` call and hands it out again through its status accessor.

use thiserror::Error;

/// Result type alias for docrow operations
pub type DocResult<T> = std::result::Result<T, DocDbError>;

/// Error types for the row reconstruction layer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocDbError {
    /// A physical key could not be decoded as a sub-document key
    #[error("Malformed key: {0}")]
    MalformedKey(String),

    /// A physical value blob could not be decoded
    #[error("Malformed value: {0}")]
    MalformedValue(String),

    /// Key columns, projection or value types disagree with the schema
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// The underlying store reported an I/O or corruption error
    #[error("Seek failure: {0}")]
    SeekFailure(String),

    /// API misuse, e.g. consuming a row without a positioned cursor
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The lifetime guard was denied because the store is tearing down
    #[error("Store is closing")]
    StoreClosing,

    /// Configuration could not be parsed
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

impl DocDbError {
    /// Build a `MalformedKey` error
    pub fn malformed_key(msg: impl Into<String>) -> Self {
        DocDbError::MalformedKey(msg.into())
    }

    /// Build a `MalformedValue` error
    pub fn malformed_value(msg: impl Into<String>) -> Self {
        DocDbError::MalformedValue(msg.into())
    }

    /// Build a `SchemaMismatch` error
    pub fn schema_mismatch(msg: impl Into<String>) -> Self {
        DocDbError::SchemaMismatch(msg.into())
    }

    /// Build a `SeekFailure` error
    pub fn seek_failure(msg: impl Into<String>) -> Self {
        DocDbError::SeekFailure(msg.into())
    }

    /// Build an `InvalidState` error
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        DocDbError::InvalidState(msg.into())
    }

    /// Short reason code, stable across releases
    pub fn reason_code(&self) -> &'static str {
        match self {
            DocDbError::MalformedKey(_) => "malformed_key",
            DocDbError::MalformedValue(_) => "malformed_value",
            DocDbError::SchemaMismatch(_) => "schema_mismatch",
            DocDbError::SeekFailure(_) => "seek_failure",
            DocDbError::InvalidState(_) => "invalid_state",
            DocDbError::StoreClosing => "store_closing",
            DocDbError::InvalidConfig(_) => "invalid_config",
        }
    }
}
