//! MemStore: in-memory ordered store with snapshot iterators
//!
//! This module implements `OrderedStore` using:
//! - `BTreeMap<Vec<u8>, Vec<u8>>` for ordered byte keys
//! - `parking_lot::RwLock` around an `Arc` of the map
//! - copy-on-write (`Arc::make_mut`) so every iterator reads the map as it
//!   was when the iterator was created
//!
//! # Design Notes
//!
//! - **Snapshot per iterator**: cheap (one `Arc` clone); the first write
//!   after a snapshot pays for a deep clone
//! - **Teardown**: `close` rejects new guards, waits for outstanding ones up
//!   to the configured timeout, then drops the data

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use docrow_core::StoreConfig;
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::error::{StorageError, StorageResult};
use crate::pending_op::PendingOperationCounter;
use crate::traits::{KvIterator, OrderedStore};

type KeySpace = BTreeMap<Vec<u8>, Vec<u8>>;

/// In-memory ordered store
#[derive(Debug)]
pub struct MemStore {
    data: RwLock<Arc<KeySpace>>,
    pending_ops: Arc<PendingOperationCounter>,
    closed: AtomicBool,
    config: StoreConfig,
}

impl MemStore {
    /// Create an empty store with default settings
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// Create an empty store
    pub fn with_config(config: StoreConfig) -> Self {
        MemStore {
            data: RwLock::new(Arc::new(BTreeMap::new())),
            pending_ops: Arc::new(PendingOperationCounter::new()),
            closed: AtomicBool::new(false),
            config,
        }
    }

    fn check_open(&self) -> StorageResult<()> {
        if self.closed.load(Ordering::SeqCst) || self.pending_ops.is_closing() {
            return Err(StorageError::Closing);
        }
        Ok(())
    }

    /// Insert or overwrite one entry
    pub fn put(&self, key: Vec<u8>, value: Vec<u8>) -> StorageResult<()> {
        self.write_batch(std::iter::once((key, value)))
    }

    /// Apply entries atomically with respect to iterator snapshots
    pub fn write_batch<I>(&self, entries: I) -> StorageResult<()>
    where
        I: IntoIterator<Item = (Vec<u8>, Vec<u8>)>,
    {
        self.check_open()?;
        let mut data = self.data.write();
        let map = Arc::make_mut(&mut data);
        for (key, value) in entries {
            map.insert(key, value);
        }
        Ok(())
    }

    /// Remove one entry physically
    pub fn remove(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        self.check_open()?;
        let mut data = self.data.write();
        Ok(Arc::make_mut(&mut data).remove(key))
    }

    /// Number of physical entries
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Whether the store holds no entries
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Whether `close` has completed
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Tear the store down using the configured timeout
    pub fn close(&self) -> StorageResult<()> {
        self.close_with_timeout(self.config.teardown_timeout())
    }

    /// Tear the store down
    ///
    /// New lifetime guards are rejected immediately. Outstanding ones are
    /// waited for up to `timeout`; on timeout the store stays readable by
    /// their holders and `TeardownTimeout` is returned.
    pub fn close_with_timeout(&self, timeout: Duration) -> StorageResult<()> {
        self.pending_ops.begin_teardown();
        if !self.pending_ops.wait_for_idle(timeout) {
            let outstanding = self.pending_ops.count();
            warn!(target: "docrow::store", outstanding, "MemStore close timed out");
            return Err(StorageError::TeardownTimeout { outstanding });
        }
        *self.data.write() = Arc::new(BTreeMap::new());
        self.closed.store(true, Ordering::SeqCst);
        debug!(target: "docrow::store", "MemStore closed");
        Ok(())
    }
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderedStore for MemStore {
    fn new_iterator(&self) -> StorageResult<Box<dyn KvIterator>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StorageError::Closing);
        }
        let snapshot = Arc::clone(&*self.data.read());
        Ok(Box::new(MemStoreIterator::new(snapshot)))
    }

    fn pending_operations(&self) -> &Arc<PendingOperationCounter> {
        &self.pending_ops
    }
}

/// Cursor over one `MemStore` snapshot
#[derive(Debug)]
pub struct MemStoreIterator {
    snapshot: Arc<KeySpace>,
    current: Option<(Vec<u8>, Vec<u8>)>,
}

impl MemStoreIterator {
    fn new(snapshot: Arc<KeySpace>) -> Self {
        MemStoreIterator {
            snapshot,
            current: None,
        }
    }

    fn position(&mut self, lower: Bound<&[u8]>) {
        self.current = self
            .snapshot
            .range::<[u8], _>((lower, Bound::Unbounded))
            .next()
            .map(|(k, v)| (k.clone(), v.clone()));
    }
}

impl KvIterator for MemStoreIterator {
    fn seek(&mut self, target: &[u8]) {
        self.position(Bound::Included(target));
    }

    fn valid(&self) -> bool {
        self.current.is_some()
    }

    fn key(&self) -> &[u8] {
        self.current.as_ref().map_or(&[], |(k, _)| k.as_slice())
    }

    fn value(&self) -> &[u8] {
        self.current.as_ref().map_or(&[], |(_, v)| v.as_slice())
    }

    fn next(&mut self) {
        if let Some((key, _)) = self.current.take() {
            self.position(Bound::Excluded(key.as_slice()));
        }
    }

    fn status(&self) -> StorageResult<()> {
        Ok(())
    }
}
