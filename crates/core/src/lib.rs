//! Core types for docrow
//!
//! This crate defines the foundational types of the row reconstruction layer:
//! - HybridTime: MVCC write stamp and read horizon
//! - DocKey / SubDocKey: order-preserving physical key model
//! - EncodedKey: store-native primary keys and their schema-aware conversion
//! - Value: versioned cell value with TTL, tombstones and row markers
//! - PrimitiveValue: decoded column values
//! - Schema: columns, key columns and projections
//! - Error: error type shared by all crates
//! - Config: `docrow.toml` settings

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod doc_key;
pub mod encoded_key;
pub mod error;
pub mod hybrid_time;
pub mod primitive_value;
pub mod schema;
pub mod value;
pub mod value_type;

pub use config::{DocDbConfig, IteratorConfig, StoreConfig, CONFIG_FILE_NAME};
pub use doc_key::{DocKey, SubDocKey};
pub use encoded_key::EncodedKey;
pub use error::{DocDbError, DocResult};
pub use hybrid_time::HybridTime;
pub use primitive_value::PrimitiveValue;
pub use schema::{ColumnId, ColumnSchema, DataType, Schema};
pub use value::{Value, ValueKind};
pub use value_type::ValueType;
