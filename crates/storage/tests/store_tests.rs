//! Integration tests for MemStore and the lifetime guard
//!
//! - Snapshot isolation of iterators against concurrent writers
//! - Guard counting under concurrent acquire/release
//! - Teardown racing with acquisition

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use docrow_core::StoreConfig;
use docrow_storage::{KvIterator, MemStore, OrderedStore, StorageError};
use proptest::prelude::*;

// ============================================================================
// Helper Functions
// ============================================================================

fn drain(iter: &mut dyn KvIterator) -> Vec<(Vec<u8>, Vec<u8>)> {
    let mut out = Vec::new();
    iter.seek(b"");
    while iter.valid() {
        out.push((iter.key().to_vec(), iter.value().to_vec()));
        iter.next();
    }
    out
}

// ============================================================================
// Snapshots
// ============================================================================

#[test]
fn test_snapshot_unaffected_by_concurrent_writer() {
    let store = Arc::new(MemStore::new());
    for i in 0..100u32 {
        store.put(i.to_be_bytes().to_vec(), b"before".to_vec()).unwrap();
    }

    let mut iter = store.new_iterator().unwrap();
    let writer = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            for i in 0..200u32 {
                store.put(i.to_be_bytes().to_vec(), b"after".to_vec()).unwrap();
            }
        })
    };
    writer.join().unwrap();

    let seen = drain(iter.as_mut());
    assert_eq!(seen.len(), 100);
    assert!(seen.iter().all(|(_, v)| v == b"before"));
    assert_eq!(store.len(), 200);
}

// ============================================================================
// Lifetime guard
// ============================================================================

#[test]
fn test_concurrent_guards_balance() {
    let store = Arc::new(MemStore::new());
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for _ in 0..1000 {
                    let token = store.pending_operations().try_acquire().unwrap();
                    drop(token);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(store.pending_operations().count(), 0);
    store.close().unwrap();
}

#[test]
fn test_teardown_races_with_acquire() {
    let store = Arc::new(MemStore::with_config(StoreConfig {
        teardown_timeout_ms: 10_000,
    }));
    let start = Arc::new(Barrier::new(5));
    let acquired = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            let start = Arc::clone(&start);
            let acquired = Arc::clone(&acquired);
            thread::spawn(move || {
                start.wait();
                loop {
                    match store.pending_operations().try_acquire() {
                        Ok(token) => {
                            acquired.fetch_add(1, Ordering::SeqCst);
                            thread::sleep(Duration::from_micros(50));
                            drop(token);
                        }
                        Err(StorageError::Closing) => break,
                        Err(other) => panic!("unexpected {:?}", other),
                    }
                }
            })
        })
        .collect();

    start.wait();
    thread::sleep(Duration::from_millis(5));
    store.close().unwrap();

    // After close returns no token can be outstanding or acquired.
    assert_eq!(store.pending_operations().count(), 0);
    for handle in handles {
        handle.join().unwrap();
    }
    assert!(store.is_closed());
    assert!(store.is_empty());
}

#[test]
fn test_held_guard_blocks_teardown_until_released() {
    let store = Arc::new(MemStore::new());
    let token = store.pending_operations().try_acquire().unwrap();

    let releaser = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        drop(token);
    });

    store.close_with_timeout(Duration::from_secs(5)).unwrap();
    releaser.join().unwrap();
    assert!(store.is_closed());
}

// ============================================================================
// Ordering
// ============================================================================

proptest! {
    #[test]
    fn iteration_is_sorted_and_deduplicated(
        entries in prop::collection::vec((prop::collection::vec(any::<u8>(), 0..6), any::<u8>()), 0..50)
    ) {
        let store = MemStore::new();
        for (k, v) in &entries {
            store.put(k.clone(), vec![*v]).unwrap();
        }
        let mut iter = store.new_iterator().unwrap();
        let keys: Vec<Vec<u8>> = drain(iter.as_mut()).into_iter().map(|(k, _)| k).collect();
        prop_assert!(keys.windows(2).all(|w| w[0] < w[1]));
        prop_assert_eq!(keys.len(), store.len());
    }

    #[test]
    fn seek_lands_on_first_key_at_or_after(
        keys in prop::collection::btree_set(prop::collection::vec(any::<u8>(), 1..4), 1..20),
        target in prop::collection::vec(any::<u8>(), 0..4)
    ) {
        let store = MemStore::new();
        store.write_batch(keys.iter().map(|k| (k.clone(), Vec::new()))).unwrap();
        let mut iter = store.new_iterator().unwrap();
        iter.seek(&target);
        match keys.range(target.clone()..).next() {
            Some(expected) => prop_assert_eq!(iter.key(), expected.as_slice()),
            None => prop_assert!(!iter.valid()),
        }
    }
}
