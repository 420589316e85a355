//! Row iterator over the document key space
//!
//! `DocRowwiseIterator` turns the flat, ordered physical key space into
//! logical rows of a fixed schema as of one read time.
//!
//! # State machine
//!
//! ```text
//! Uninitialized --init--> Positioned --has_next--> HasRow --next_block/next_row--> Positioned
//!                              |                                                      |
//!                              +------------- has_next (no row / error) --------------+--> Exhausted
//! any state --close/drop--> Closed
//! ```
//!
//! `has_next` is the only operation that moves the physical cursor. It
//! resolves the next existing row, caches it and leaves the cursor after
//! the row's last physical entry, so repeated calls without a consume are
//! idempotent. `next_block` and `next_row` hand the cached row out.
//!
//! # Errors
//!
//! A failure inside `has_next` is captured: the call returns `false` and
//! `status()` returns the error. `try_has_next` returns the same outcome as
//! a `DocResult<bool>`.
//!
//! # Lifetime guard
//!
//! `init` acquires a `ScopedPendingOperation` from the store before it
//! creates the physical cursor. The token is released when the scan is
//! exhausted or fails, on `close`, or on drop, whichever comes first.

use std::fmt;
use std::sync::Arc;

use docrow_core::{
    DocDbError, DocKey, DocResult, HybridTime, IteratorConfig, PrimitiveValue, Schema, SubDocKey,
};
use docrow_storage::{KvIterator, OrderedStore, ScopedPendingOperation};
use tracing::{debug, trace, warn};

use crate::resolver::{ColumnValidityResolver, Observation, ResolvedRow};
use crate::row_block::{RowBlock, ValueMap};
use crate::scan_spec::ScanBounds;
use crate::stats::IteratorStats;

/// Pull-based row iterator interface
///
/// Implementations are single-threaded; run parallel scans with separate
/// instances.
pub trait RowwiseIterator: fmt::Display {
    /// Validate the scan bounds, acquire the store and position the cursor
    fn init(&mut self, spec: &dyn ScanBounds) -> DocResult<()>;

    /// Whether another row is available
    ///
    /// Returns `false` on exhaustion and on failure; check `status()`.
    fn has_next(&mut self) -> bool;

    /// Append the current row to `block`
    fn next_block(&mut self, block: &mut RowBlock) -> DocResult<()>;

    /// Schema of the produced rows
    fn schema(&self) -> &Schema;

    /// Counters observed so far
    fn stats(&self) -> IteratorStats;
}

#[derive(Debug)]
enum CursorState {
    Uninitialized,
    Positioned,
    HasRow(ResolvedRow),
    Exhausted,
    Closed,
}

impl CursorState {
    fn name(&self) -> &'static str {
        match self {
            CursorState::Uninitialized => "uninitialized",
            CursorState::Positioned => "positioned",
            CursorState::HasRow(_) => "has-row",
            CursorState::Exhausted => "exhausted",
            CursorState::Closed => "closed",
        }
    }
}

/// Physical cursor plus the bookkeeping needed to walk it row by row
struct PhysicalCursor {
    iter: Box<dyn KvIterator>,
    exclusive_upper: Option<Vec<u8>>,
    verify_key_order: bool,
    last_key: Option<Vec<u8>>,
}

impl PhysicalCursor {
    /// Move to the next entry, checking key order if configured
    fn advance(&mut self) -> DocResult<()> {
        if self.verify_key_order {
            self.last_key = Some(self.iter.key().to_vec());
        }
        self.iter.next();
        self.check_order()
    }

    fn check_order(&self) -> DocResult<()> {
        if !self.verify_key_order || !self.iter.valid() {
            return Ok(());
        }
        match &self.last_key {
            Some(last) if self.iter.key() <= last.as_slice() => Err(DocDbError::seek_failure(format!(
                "physical keys out of order: {:02x?} after {:02x?}",
                self.iter.key(),
                last
            ))),
            _ => Ok(()),
        }
    }

    /// Resolve documents until one exists, the range ends or an error occurs
    fn next_existing_row(
        &mut self,
        schema: &Schema,
        read_time: HybridTime,
        stats: &mut IteratorStats,
    ) -> DocResult<Option<ResolvedRow>> {
        loop {
            if !self.iter.valid() {
                self.iter.status()?;
                return Ok(None);
            }

            let prefix_len = DocKey::encoded_prefix_len(self.iter.key())?;
            let doc_prefix = self.iter.key()[..prefix_len].to_vec();
            if let Some(upper) = &self.exclusive_upper {
                if doc_prefix.as_slice() >= upper.as_slice() {
                    return Ok(None);
                }
            }

            let doc_key = DocKey::decode(&doc_prefix)?;
            let mut resolver = ColumnValidityResolver::new(schema, read_time, doc_key)?;
            while self.iter.valid() && self.iter.key().starts_with(&doc_prefix) {
                stats.keys_scanned += 1;
                let key = SubDocKey::decode(self.iter.key())?;
                let observation = resolver.observe_raw(&key, self.iter.value())?;
                if observation.is_skipped_version() {
                    stats.versions_skipped += 1;
                }
                if observation != Observation::Applied {
                    trace!(target: "docrow::iter", key = %key, ?observation, "Entry not applied");
                }
                self.advance()?;
            }
            self.iter.status()?;

            stats.rows_scanned += 1;
            let row = resolver.finish();
            if row.exists() {
                return Ok(Some(row));
            }
            stats.rows_skipped += 1;
            trace!(target: "docrow::iter", doc_key = %row.doc_key(), "Row not found, skipping");
        }
    }
}

/// Row iterator over an MVCC document store
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use docrow_core::{ColumnId, ColumnSchema, DataType, DocKey, HybridTime, PrimitiveValue, Schema};
/// use docrow_docdb::{DocRowwiseIterator, DocScanSpec, DocWriteBatch, RowBlock, RowwiseIterator};
/// use docrow_storage::MemStore;
///
/// let schema = Schema::new(
///     vec![
///         ColumnSchema::not_null(0, "id", DataType::Int64),
///         ColumnSchema::new(1, "name", DataType::String),
///     ],
///     1,
/// )
/// .unwrap();
/// let store = Arc::new(MemStore::new());
/// let key = DocKey::new(vec![PrimitiveValue::Int64(7)]);
/// let mut batch = DocWriteBatch::new();
/// batch.set_column(&key, ColumnId(1), "ann", HybridTime::from_micros(10));
/// batch.apply(&store).unwrap();
///
/// let mut iter =
///     DocRowwiseIterator::new(schema.clone(), schema.clone(), store, HybridTime::MAX).unwrap();
/// iter.init(&DocScanSpec::full()).unwrap();
///
/// let mut block = RowBlock::new(schema);
/// while iter.has_next() {
///     iter.next_block(&mut block).unwrap();
/// }
/// assert!(iter.status().is_ok());
/// assert_eq!(block.value(0, "name"), Some(&PrimitiveValue::from("ann")));
/// ```
pub struct DocRowwiseIterator {
    projection: Schema,
    schema: Schema,
    projection_indexes: Vec<usize>,
    store: Arc<dyn OrderedStore>,
    read_time: HybridTime,
    config: IteratorConfig,
    state: CursorState,
    cursor: Option<PhysicalCursor>,
    guard: Option<ScopedPendingOperation>,
    status: Option<DocDbError>,
    stats: IteratorStats,
}

impl DocRowwiseIterator {
    /// Create an iterator with the default configuration
    ///
    /// # Errors
    ///
    /// `SchemaMismatch` if `projection` is not a subset of `schema`.
    pub fn new(
        projection: Schema,
        schema: Schema,
        store: Arc<dyn OrderedStore>,
        read_time: HybridTime,
    ) -> DocResult<Self> {
        Self::with_config(projection, schema, store, read_time, IteratorConfig::default())
    }

    /// Create an iterator
    pub fn with_config(
        projection: Schema,
        schema: Schema,
        store: Arc<dyn OrderedStore>,
        read_time: HybridTime,
        config: IteratorConfig,
    ) -> DocResult<Self> {
        schema.validate_projection(&projection)?;
        let projection_indexes = projection
            .columns()
            .iter()
            .map(|col| {
                schema.find_column_by_id(col.id).ok_or_else(|| {
                    DocDbError::schema_mismatch(format!("projected column {} not in schema", col.name))
                })
            })
            .collect::<DocResult<Vec<_>>>()?;

        Ok(DocRowwiseIterator {
            projection,
            schema,
            projection_indexes,
            store,
            read_time,
            config,
            state: CursorState::Uninitialized,
            cursor: None,
            guard: None,
            status: None,
            stats: IteratorStats::default(),
        })
    }

    /// The full table schema
    pub fn table_schema(&self) -> &Schema {
        &self.schema
    }

    /// Read time of this scan
    pub fn read_time(&self) -> HybridTime {
        self.read_time
    }

    /// Whether the iterator still holds its lifetime guard
    pub fn holds_guard(&self) -> bool {
        self.guard.is_some()
    }

    /// Failure captured by the last `has_next`
    ///
    /// Meaningful after `has_next` returned `false`: `Ok` means the scan is
    /// exhausted, `Err` that it failed. `close` does not change it.
    pub fn status(&self) -> DocResult<()> {
        match &self.status {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    /// `has_next` with the captured status folded into the result
    pub fn try_has_next(&mut self) -> DocResult<bool> {
        match self.state {
            CursorState::HasRow(_) => return Ok(true),
            CursorState::Exhausted => return self.status().map(|()| false),
            CursorState::Uninitialized | CursorState::Closed => {
                return Err(DocDbError::invalid_state(format!(
                    "has_next on {} iterator",
                    self.state.name()
                )))
            }
            CursorState::Positioned => {}
        }

        let outcome = match self.cursor.as_mut() {
            Some(cursor) => cursor.next_existing_row(&self.schema, self.read_time, &mut self.stats),
            None => Err(DocDbError::invalid_state("positioned iterator without a cursor")),
        };

        match outcome {
            Ok(Some(row)) => {
                self.state = CursorState::HasRow(row);
                Ok(true)
            }
            Ok(None) => {
                debug!(target: "docrow::iter", stats = ?self.stats, "Scan exhausted");
                self.finish_scan();
                Ok(false)
            }
            Err(e) => {
                warn!(target: "docrow::iter", error = %e, read_time = %self.read_time, "Scan failed");
                self.status = Some(e.clone());
                self.finish_scan();
                Err(e)
            }
        }
    }

    /// Fill `map` with the current row, keyed by projected column name
    ///
    /// # Errors
    ///
    /// `InvalidState` unless the last `has_next` returned `true`.
    pub fn next_row(&mut self, map: &mut ValueMap) -> DocResult<()> {
        let row = self.take_row()?;
        map.clear();
        for (col, value) in self.projection.columns().iter().zip(self.project(&row)) {
            map.insert(col.name.clone(), value);
        }
        Ok(())
    }

    /// Release the cursor and the lifetime guard
    ///
    /// Idempotent; also performed on drop.
    pub fn close(&mut self) {
        if matches!(self.state, CursorState::Closed) {
            return;
        }
        self.cursor = None;
        if let Some(guard) = self.guard.take() {
            guard.release();
        }
        self.state = CursorState::Closed;
        debug!(target: "docrow::iter", stats = ?self.stats, "Iterator closed");
    }

    fn finish_scan(&mut self) {
        self.cursor = None;
        self.guard = None;
        self.state = CursorState::Exhausted;
    }

    fn take_row(&mut self) -> DocResult<ResolvedRow> {
        match std::mem::replace(&mut self.state, CursorState::Positioned) {
            CursorState::HasRow(row) => {
                self.stats.rows_produced += 1;
                Ok(row)
            }
            other => {
                let err = DocDbError::invalid_state(format!(
                    "no positioned row on {} iterator; call has_next first",
                    other.name()
                ));
                self.state = other;
                Err(err)
            }
        }
    }

    fn project(&self, row: &ResolvedRow) -> Vec<PrimitiveValue> {
        self.projection_indexes
            .iter()
            .map(|&idx| row.value(idx).cloned().unwrap_or(PrimitiveValue::Null))
            .collect()
    }
}

impl RowwiseIterator for DocRowwiseIterator {
    fn init(&mut self, spec: &dyn ScanBounds) -> DocResult<()> {
        if !matches!(self.state, CursorState::Uninitialized) {
            return Err(DocDbError::invalid_state(format!(
                "init on {} iterator",
                self.state.name()
            )));
        }
        let bounds = spec.doc_bounds(&self.schema)?;

        let guard = self.store.pending_operations().try_acquire()?;
        let mut iter = self.store.new_iterator()?;
        let seek_key = bounds.seek_key();
        iter.seek(&seek_key);
        self.stats.seeks += 1;
        iter.status()?;

        debug!(
            target: "docrow::iter",
            read_time = %self.read_time,
            lower = ?bounds.lower.as_ref().map(ToString::to_string),
            upper = ?bounds.exclusive_upper.as_ref().map(ToString::to_string),
            "Iterator initialized"
        );

        if bounds.is_empty() {
            drop(iter);
            drop(guard);
            self.state = CursorState::Exhausted;
            return Ok(());
        }

        let cursor = PhysicalCursor {
            iter,
            exclusive_upper: bounds.encoded_upper(),
            verify_key_order: self.config.verify_key_order,
            last_key: None,
        };
        self.cursor = Some(cursor);
        self.guard = Some(guard);
        self.state = CursorState::Positioned;
        Ok(())
    }

    fn has_next(&mut self) -> bool {
        // A closed iterator keeps the status of the scan it finished.
        if matches!(self.state, CursorState::Closed) {
            return false;
        }
        match self.try_has_next() {
            Ok(more) => more,
            Err(e) => {
                if self.status.is_none() {
                    self.status = Some(e);
                }
                false
            }
        }
    }

    fn next_block(&mut self, block: &mut RowBlock) -> DocResult<()> {
        if block.schema().num_columns() != self.projection.num_columns() {
            return Err(DocDbError::schema_mismatch(format!(
                "row block has {} columns, projection has {}",
                block.schema().num_columns(),
                self.projection.num_columns()
            )));
        }
        let row = self.take_row()?;
        block.push_row(self.project(&row))
    }

    fn schema(&self) -> &Schema {
        &self.projection
    }

    fn stats(&self) -> IteratorStats {
        self.stats
    }
}

impl fmt::Display for DocRowwiseIterator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DocRowwiseIterator(read_time: {}, state: {}, projection: {})",
            self.read_time,
            self.state.name(),
            self.projection
        )
    }
}

impl fmt::Debug for DocRowwiseIterator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocRowwiseIterator")
            .field("read_time", &self.read_time)
            .field("state", &self.state)
            .field("holds_guard", &self.guard.is_some())
            .field("status", &self.status)
            .field("stats", &self.stats)
            .finish()
    }
}

impl Drop for DocRowwiseIterator {
    fn drop(&mut self) {
        self.close();
    }
}
