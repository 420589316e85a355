//! Fault injection for ordered stores
//!
//! Wraps a `MemStore` and makes it misbehave on demand, so the layers above
//! can be tested against failing seeks and failing iterator creation.
//!
//! # Fault Types
//!
//! - Iterator creation: `new_iterator` returns the injected error
//! - Cursor failure: after N positioning calls (`seek` or `next`) the cursor
//!   turns invalid and `status` reports the injected error
//! - Disorder: the cursor yields a fixed key sequence as given, which need
//!   not be ascending
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use docrow_storage::testing::FaultyStore;
//! use docrow_storage::{MemStore, OrderedStore, StorageError};
//!
//! let store = FaultyStore::new(Arc::new(MemStore::new()));
//! store.fail_after_steps(0, StorageError::Io("disk gone".into()));
//!
//! let mut iter = store.new_iterator().unwrap();
//! iter.seek(b"");
//! assert!(!iter.valid());
//! assert!(iter.status().is_err());
//! ```

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{StorageError, StorageResult};
use crate::mem_store::MemStore;
use crate::pending_op::PendingOperationCounter;
use crate::traits::{KvIterator, OrderedStore};

#[derive(Debug, Clone, Default)]
struct FaultPlan {
    creation: Option<StorageError>,
    cursor: Option<(usize, StorageError)>,
}

/// Store wrapper that injects configured failures
#[derive(Debug)]
pub struct FaultyStore {
    inner: Arc<MemStore>,
    plan: Mutex<FaultPlan>,
}

impl FaultyStore {
    /// Wrap a store with no faults armed
    pub fn new(inner: Arc<MemStore>) -> Self {
        FaultyStore {
            inner,
            plan: Mutex::new(FaultPlan::default()),
        }
    }

    /// The wrapped store
    pub fn inner(&self) -> &Arc<MemStore> {
        &self.inner
    }

    /// Make every `new_iterator` call fail with `error`
    pub fn fail_iterator_creation(&self, error: StorageError) {
        self.plan.lock().creation = Some(error);
    }

    /// Make iterators fail on positioning call number `steps + 1`
    pub fn fail_after_steps(&self, steps: usize, error: StorageError) {
        self.plan.lock().cursor = Some((steps, error));
    }

    /// Disarm all faults
    pub fn clear_faults(&self) {
        *self.plan.lock() = FaultPlan::default();
    }
}

impl OrderedStore for FaultyStore {
    fn new_iterator(&self) -> StorageResult<Box<dyn KvIterator>> {
        let plan = self.plan.lock().clone();
        if let Some(err) = plan.creation {
            return Err(err);
        }
        let inner = self.inner.new_iterator()?;
        Ok(Box::new(FaultyIterator {
            inner,
            trigger: plan.cursor,
            error: None,
        }))
    }

    fn pending_operations(&self) -> &Arc<PendingOperationCounter> {
        self.inner.pending_operations()
    }
}

struct FaultyIterator {
    inner: Box<dyn KvIterator>,
    trigger: Option<(usize, StorageError)>,
    error: Option<StorageError>,
}

impl FaultyIterator {
    /// Count one positioning call; returns false once the fault has fired
    fn step(&mut self) -> bool {
        if self.error.is_some() {
            return false;
        }
        match self.trigger.take() {
            Some((0, err)) => {
                self.error = Some(err);
                false
            }
            Some((n, err)) => {
                self.trigger = Some((n - 1, err));
                true
            }
            None => true,
        }
    }
}

impl KvIterator for FaultyIterator {
    fn seek(&mut self, target: &[u8]) {
        if self.step() {
            self.inner.seek(target);
        }
    }

    fn valid(&self) -> bool {
        self.error.is_none() && self.inner.valid()
    }

    fn key(&self) -> &[u8] {
        if self.error.is_some() {
            return &[];
        }
        self.inner.key()
    }

    fn value(&self) -> &[u8] {
        if self.error.is_some() {
            return &[];
        }
        self.inner.value()
    }

    fn next(&mut self) {
        if self.step() {
            self.inner.next();
        }
    }

    fn status(&self) -> StorageResult<()> {
        match &self.error {
            Some(err) => Err(err.clone()),
            None => self.inner.status(),
        }
    }
}

/// Store whose cursor replays a fixed entry sequence verbatim
///
/// `seek` positions at the first entry whose key is >= the target, scanning
/// in the given order. No sorting happens, so out-of-order sequences reach
/// the caller unchanged.
#[derive(Debug)]
pub struct ScriptedStore {
    entries: Arc<Vec<(Vec<u8>, Vec<u8>)>>,
    pending_ops: Arc<PendingOperationCounter>,
}

impl ScriptedStore {
    /// Create a store over `entries` in the given order
    pub fn new(entries: Vec<(Vec<u8>, Vec<u8>)>) -> Self {
        ScriptedStore {
            entries: Arc::new(entries),
            pending_ops: Arc::new(PendingOperationCounter::new()),
        }
    }
}

impl OrderedStore for ScriptedStore {
    fn new_iterator(&self) -> StorageResult<Box<dyn KvIterator>> {
        if self.pending_ops.is_closing() {
            return Err(StorageError::Closing);
        }
        Ok(Box::new(ScriptedIterator {
            entries: Arc::clone(&self.entries),
            pos: None,
        }))
    }

    fn pending_operations(&self) -> &Arc<PendingOperationCounter> {
        &self.pending_ops
    }
}

struct ScriptedIterator {
    entries: Arc<Vec<(Vec<u8>, Vec<u8>)>>,
    pos: Option<usize>,
}

impl KvIterator for ScriptedIterator {
    fn seek(&mut self, target: &[u8]) {
        self.pos = self
            .entries
            .iter()
            .position(|(k, _)| k.as_slice() >= target);
    }

    fn valid(&self) -> bool {
        self.pos.is_some_and(|p| p < self.entries.len())
    }

    fn key(&self) -> &[u8] {
        match self.pos.and_then(|p| self.entries.get(p)) {
            Some((k, _)) => k.as_slice(),
            None => &[],
        }
    }

    fn value(&self) -> &[u8] {
        match self.pos.and_then(|p| self.entries.get(p)) {
            Some((_, v)) => v.as_slice(),
            None => &[],
        }
    }

    fn next(&mut self) {
        if let Some(p) = self.pos {
            self.pos = Some(p + 1);
        }
    }

    fn status(&self) -> StorageResult<()> {
        Ok(())
    }
}
