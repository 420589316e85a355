//! docrow - row reconstruction over an MVCC document key space
//!
//! docrow maps a flat, ordered key-value space into logical rows with a fixed
//! schema. Every physical entry is one version of one cell (or of a row-level
//! marker), stamped with a hybrid time; a scan at a read time applies MVCC
//! visibility, TTL expiry and row/column tombstones while it walks the keys.
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use docrow::{
//!     ColumnId, ColumnSchema, DataType, DocKey, DocRowwiseIterator, DocScanSpec, DocWriteBatch,
//!     HybridTime, MemStore, PrimitiveValue, RowBlock, RowwiseIterator, Schema,
//! };
//!
//! let schema = Schema::new(
//!     vec![
//!         ColumnSchema::not_null(0, "id", DataType::Int64),
//!         ColumnSchema::new(1, "name", DataType::String),
//!     ],
//!     1,
//! )?;
//!
//! let store = Arc::new(MemStore::new());
//! let row = DocKey::new(vec![PrimitiveValue::Int64(1)]);
//! let mut batch = DocWriteBatch::new();
//! batch
//!     .set_column(&row, ColumnId(1), "ann", HybridTime::from_micros(100))
//!     .delete_row(&row, HybridTime::from_micros(200));
//! batch.apply(&store)?;
//!
//! // Before the delete the row is visible.
//! let mut iter = DocRowwiseIterator::new(
//!     schema.clone(),
//!     schema.clone(),
//!     store.clone(),
//!     HybridTime::from_micros(150),
//! )?;
//! iter.init(&DocScanSpec::full())?;
//! let mut block = RowBlock::new(schema);
//! while iter.has_next() {
//!     iter.next_block(&mut block)?;
//! }
//! iter.status()?;
//! assert_eq!(block.num_rows(), 1);
//! # Ok::<(), docrow::DocDbError>(())
//! ```
//!
//! # Architecture
//!
//! - `docrow-core`: hybrid time, key and value encodings, schema, errors, config
//! - `docrow-storage`: the ordered store seam, `MemStore`, the lifetime guard
//! - `docrow-docdb`: column validity resolution and the row iterator

pub use docrow_core::*;
pub use docrow_docdb::*;
pub use docrow_storage::{
    KvIterator, MemStore, MemStoreIterator, OrderedStore, PendingOperationCounter,
    ScopedPendingOperation, StorageError, StorageResult,
};

/// Fault-injecting stores for tests
pub mod testing {
    pub use docrow_storage::testing::*;
}
