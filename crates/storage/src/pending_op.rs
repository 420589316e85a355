//! Pending operation counter (lifetime guard)
//!
//! Keeps a store from being torn down while iterators still read from it.
//!
//! # Design
//!
//! - The operation count and the "closing" flag share one `AtomicU64`, so
//!   an acquire racing with `begin_teardown` either lands before the flag
//!   (and is waited for) or fails with `StorageError::Closing`
//! - `ScopedPendingOperation` is an RAII token; the count is decremented
//!   exactly once, when the token drops
//! - Teardown waits on a `parking_lot::Condvar` that is signalled whenever
//!   the count reaches zero
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use docrow_storage::PendingOperationCounter;
//!
//! let counter = Arc::new(PendingOperationCounter::new());
//! let token = counter.try_acquire().unwrap();
//! assert_eq!(counter.count(), 1);
//! drop(token);
//!
//! counter.begin_teardown();
//! assert!(counter.wait_for_idle(Duration::from_millis(10)));
//! assert!(counter.try_acquire().is_err());
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};

use crate::error::{StorageError, StorageResult};

const CLOSING_BIT: u64 = 1 << 63;
const COUNT_MASK: u64 = !CLOSING_BIT;

/// Process-wide count of operations that depend on one store instance
#[derive(Debug, Default)]
pub struct PendingOperationCounter {
    /// Low 63 bits: pending operations. High bit: teardown has begun.
    state: AtomicU64,
    idle_lock: Mutex<()>,
    idle: Condvar,
}

impl PendingOperationCounter {
    /// Create a counter with no pending operations
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pending operation
    ///
    /// # Errors
    ///
    /// `StorageError::Closing` once `begin_teardown` has been called.
    pub fn try_acquire(self: &Arc<Self>) -> StorageResult<ScopedPendingOperation> {
        let mut current = self.state.load(Ordering::SeqCst);
        loop {
            if current & CLOSING_BIT != 0 {
                return Err(StorageError::Closing);
            }
            match self.state.compare_exchange_weak(
                current,
                current + 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }
        Ok(ScopedPendingOperation {
            counter: Some(Arc::clone(self)),
        })
    }

    fn release(&self) {
        let prev = self.state.fetch_sub(1, Ordering::SeqCst);
        debug_assert!(prev & COUNT_MASK > 0, "pending operation released twice");
        if prev & COUNT_MASK == 1 {
            // Taking the lock orders this notify after a waiter's count check.
            let _guard = self.idle_lock.lock();
            self.idle.notify_all();
        }
    }

    /// Number of outstanding operations
    pub fn count(&self) -> u64 {
        self.state.load(Ordering::SeqCst) & COUNT_MASK
    }

    /// Whether teardown has begun
    pub fn is_closing(&self) -> bool {
        self.state.load(Ordering::SeqCst) & CLOSING_BIT != 0
    }

    /// Reject all further acquisitions
    ///
    /// Existing tokens stay valid until dropped.
    pub fn begin_teardown(&self) {
        let prev = self.state.fetch_or(CLOSING_BIT, Ordering::SeqCst);
        debug!(
            target: "docrow::guard",
            outstanding = prev & COUNT_MASK,
            "Teardown started"
        );
    }

    /// Block until no operations are pending or `timeout` elapses
    ///
    /// Returns `true` if the count reached zero.
    pub fn wait_for_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut guard = self.idle_lock.lock();
        while self.count() > 0 {
            if self.idle.wait_until(&mut guard, deadline).timed_out() {
                let outstanding = self.count();
                if outstanding > 0 {
                    warn!(
                        target: "docrow::guard",
                        outstanding,
                        "Timed out waiting for pending operations"
                    );
                    return false;
                }
            }
        }
        true
    }
}

/// RAII token for one pending operation
///
/// Dropping the token releases the operation exactly once.
pub struct ScopedPendingOperation {
    counter: Option<Arc<PendingOperationCounter>>,
}

impl ScopedPendingOperation {
    /// Release now instead of at drop
    pub fn release(mut self) {
        if let Some(counter) = self.counter.take() {
            counter.release();
        }
    }
}

impl Drop for ScopedPendingOperation {
    fn drop(&mut self) {
        if let Some(counter) = self.counter.take() {
            counter.release();
        }
    }
}

impl fmt::Debug for ScopedPendingOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedPendingOperation")
            .field("held", &self.counter.is_some())
            .finish()
    }
}
