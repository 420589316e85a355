//! Storage layer for docrow
//!
//! This crate provides the ordered key-value space the row iterator reads:
//! - OrderedStore / KvIterator: forward cursor abstraction over byte keys
//! - MemStore: BTreeMap-based store with snapshot iterators
//! - PendingOperationCounter: lifetime guard that blocks teardown while
//!   iterators are outstanding
//! - testing: fault-injecting stores for the layers above

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod mem_store;
pub mod pending_op;
pub mod testing;
pub mod traits;

pub use error::{StorageError, StorageResult};
pub use mem_store::{MemStore, MemStoreIterator};
pub use pending_op::{PendingOperationCounter, ScopedPendingOperation};
pub use traits::{KvIterator, OrderedStore};
