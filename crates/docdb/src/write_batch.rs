//! Document write batch
//!
//! Builds the physical entries that represent row and column mutations and
//! applies them to a `MemStore` in one step. Every mutation carries its own
//! write time; nothing is read back or merged here.

use std::time::Duration;

use docrow_core::{ColumnId, DocKey, DocResult, HybridTime, PrimitiveValue, SubDocKey, Value};
use docrow_storage::MemStore;
use tracing::debug;

/// Ordered list of physical entries to write
#[derive(Debug, Clone, Default)]
pub struct DocWriteBatch {
    entries: Vec<(Vec<u8>, Vec<u8>)>,
}

impl DocWriteBatch {
    /// Create an empty batch
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one physical entry
    pub fn put(&mut self, key: &SubDocKey, value: &Value) -> &mut Self {
        self.entries.push((key.encode(), value.encode()));
        self
    }

    /// Set a column value
    pub fn set_column(
        &mut self,
        doc_key: &DocKey,
        column: ColumnId,
        value: impl Into<PrimitiveValue>,
        write_time: HybridTime,
    ) -> &mut Self {
        let key = SubDocKey::column(doc_key.clone(), column, write_time);
        self.put(&key, &Value::primitive(value))
    }

    /// Set a column value that expires `ttl` after `write_time`
    pub fn set_column_with_ttl(
        &mut self,
        doc_key: &DocKey,
        column: ColumnId,
        value: impl Into<PrimitiveValue>,
        ttl: Duration,
        write_time: HybridTime,
    ) -> &mut Self {
        let key = SubDocKey::column(doc_key.clone(), column, write_time);
        self.put(&key, &Value::primitive(value).with_ttl(ttl))
    }

    /// Delete one column
    pub fn delete_column(&mut self, doc_key: &DocKey, column: ColumnId, write_time: HybridTime) -> &mut Self {
        let key = SubDocKey::column(doc_key.clone(), column, write_time);
        self.put(&key, &Value::tombstone())
    }

    /// Delete the whole row as of `write_time`
    pub fn delete_row(&mut self, doc_key: &DocKey, write_time: HybridTime) -> &mut Self {
        self.put(&SubDocKey::row(doc_key.clone(), write_time), &Value::tombstone())
    }

    /// Record that the row exists, independent of its columns
    pub fn insert_row_marker(&mut self, doc_key: &DocKey, write_time: HybridTime) -> &mut Self {
        self.put(&SubDocKey::row(doc_key.clone(), write_time), &Value::row_marker())
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the batch holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Encoded entries in insertion order
    pub fn entries(&self) -> &[(Vec<u8>, Vec<u8>)] {
        &self.entries
    }

    /// Write all entries to `store` atomically
    ///
    /// # Errors
    ///
    /// `StoreClosing` if the store is tearing down.
    pub fn apply(&self, store: &MemStore) -> DocResult<()> {
        store.write_batch(self.entries.iter().cloned())?;
        debug!(target: "docrow::store", entries = self.entries.len(), "Write batch applied");
        Ok(())
    }
}
