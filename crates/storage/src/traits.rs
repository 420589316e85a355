//! Ordered store abstraction
//!
//! The row iterator only needs a forward cursor over raw byte keys with
//! "seek to first key >= X", and a lifetime gate for the store instance.
//! These traits let the in-memory store be swapped for an LSM engine without
//! touching the row reconstruction layer.

use std::sync::Arc;

use crate::error::StorageResult;
use crate::pending_op::PendingOperationCounter;

/// Forward cursor over an ordered key space
///
/// Keys are visited in ascending byte order. `key` and `value` may only be
/// called while `valid` returns true.
pub trait KvIterator: Send {
    /// Position at the first key >= `target`
    fn seek(&mut self, target: &[u8]);

    /// Whether the cursor is positioned at an entry
    fn valid(&self) -> bool;

    /// Key at the cursor
    fn key(&self) -> &[u8];

    /// Value at the cursor
    fn value(&self) -> &[u8];

    /// Advance to the next key
    fn next(&mut self);

    /// Error encountered by the last positioning call, if any
    ///
    /// An invalid cursor with an `Ok` status means the key space is exhausted.
    fn status(&self) -> StorageResult<()>;
}

/// An ordered byte-key store that hands out snapshot iterators
///
/// Thread safety: iterators are created from any thread; each iterator is
/// used by one thread at a time.
pub trait OrderedStore: Send + Sync {
    /// Create a cursor over an immutable snapshot of the store
    fn new_iterator(&self) -> StorageResult<Box<dyn KvIterator>>;

    /// The counter that keeps this store alive while operations are pending
    fn pending_operations(&self) -> &Arc<PendingOperationCounter>;
}
