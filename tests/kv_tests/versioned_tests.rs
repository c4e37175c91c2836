//! Tests for VersionedStore
//!
//! These tests verify:
//! - Version monotonicity and stale-version rejection
//! - Historical reads by version
//! - Batches: read-your-writes, conflict detection on commit, abort
//! - Cache eviction never changes results

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use partikv::kv::{ReadCache, VersionedStore, NO_VERSION};
use partikv::KvError;

use crate::common::{setup_storage, setup_versioned, GatedStorage};

// =============================================================================
// Single Writes
// =============================================================================

#[test]
fn test_fresh_key_has_no_version() {
    let (_temp, store) = setup_versioned(100);

    assert_eq!(store.get_version(b"fresh").unwrap(), NO_VERSION);
    assert_eq!(store.get_latest(b"fresh").unwrap(), None);
}

#[test]
fn test_versions_increase_by_one() {
    let (_temp, store) = setup_versioned(100);

    let mut version = NO_VERSION;
    for n in 0..10 {
        version = store.set(b"counter", format!("{}", n).as_bytes(), version).unwrap();
        assert_eq!(version, n);
    }

    assert_eq!(store.get_version(b"counter").unwrap(), 9);
    let latest = store.get_latest(b"counter").unwrap().unwrap();
    assert_eq!(latest.version, 9);
    assert_eq!(latest.value, b"9");
}

#[test]
fn test_stale_version_is_rejected_without_mutation() {
    let (_temp, store) = setup_versioned(100);
    let v0 = store.set(b"x", b"1", NO_VERSION).unwrap();

    // Reusing the version read before the first write
    let err = store.set(b"x", b"2", NO_VERSION).unwrap_err();
    assert!(matches!(
        err,
        KvError::VersionMismatch {
            expected: -1,
            actual: 0
        }
    ));
    assert!(store.set(b"x", b"2", v0 + 5).is_err());

    let latest = store.get_latest(b"x").unwrap().unwrap();
    assert_eq!((latest.version, latest.value), (0, b"1".to_vec()));
}

#[test]
fn test_history_is_readable_by_version() {
    let (_temp, store) = setup_versioned(100);
    let v0 = store.set(b"doc", b"draft", NO_VERSION).unwrap();
    let v1 = store.set(b"doc", b"final", v0).unwrap();

    assert_eq!(store.get_entry(b"doc", v0).unwrap().unwrap().value, b"draft");
    assert_eq!(store.get_entry(b"doc", v1).unwrap().unwrap().value, b"final");
    assert_eq!(store.get_entry(b"doc", v1 + 1).unwrap(), None);
    assert_eq!(store.get_entry(b"doc", -3).unwrap(), None);
}

#[test]
fn test_keys_are_independent() {
    let (_temp, store) = setup_versioned(100);
    store.set(b"a", b"1", NO_VERSION).unwrap();
    store.set(b"a", b"2", 0).unwrap();
    store.set(b"ab", b"x", NO_VERSION).unwrap();

    assert_eq!(store.get_version(b"a").unwrap(), 1);
    assert_eq!(store.get_version(b"ab").unwrap(), 0);
}

#[test]
fn test_marker_without_payload_is_reported() {
    let (_temp, storage) = setup_storage(2);
    // A version marker whose payload write never happened
    let mut marker = vec![0x01];
    marker.extend_from_slice(b"torn");
    storage.set(&marker, &0i64.to_be_bytes()).unwrap();

    let store = VersionedStore::new(storage, ReadCache::new(10));

    assert_eq!(store.get_version(b"torn").unwrap(), 0);
    assert!(matches!(
        store.get_latest(b"torn"),
        Err(KvError::MissingPayload { version: 0 })
    ));
}

#[test]
fn test_concurrent_writers_with_same_version_one_wins() {
    let (_temp, store) = setup_versioned(100);
    let barrier = Arc::new(Barrier::new(8));
    let wins = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            let wins = Arc::clone(&wins);
            thread::spawn(move || {
                barrier.wait();
                if store.set(b"race", format!("{}", t).as_bytes(), NO_VERSION).is_ok() {
                    wins.fetch_add(1, Ordering::SeqCst);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(wins.load(Ordering::SeqCst), 1);
    assert_eq!(store.get_version(b"race").unwrap(), 0);
}

// =============================================================================
// Cache
// =============================================================================

#[test]
fn test_tiny_cache_gives_same_answers() {
    for capacity in [0, 1] {
        let (_temp, store) = setup_versioned(capacity);
        for i in 0..20 {
            let key = format!("k{}", i);
            store.set(key.as_bytes(), b"a", NO_VERSION).unwrap();
            store.set(key.as_bytes(), b"b", 0).unwrap();
        }
        for i in 0..20 {
            let key = format!("k{}", i);
            assert_eq!(store.get_version(key.as_bytes()).unwrap(), 1);
            assert!(store.set(key.as_bytes(), b"c", 0).is_err());
        }
    }
}

#[test]
fn test_independent_stores_do_not_share_cache() {
    let (_t1, a) = setup_versioned(100);
    let (_t2, b) = setup_versioned(100);

    a.set(b"shared-name", b"1", NO_VERSION).unwrap();

    assert_eq!(b.get_version(b"shared-name").unwrap(), NO_VERSION);
}

// =============================================================================
// Batches
// =============================================================================

#[test]
fn test_batch_reads_its_own_writes() {
    let (_temp, store) = setup_versioned(100);
    let mut batch = store.begin_batch();

    let v0 = batch.set(b"k", b"one", NO_VERSION).unwrap();
    let v1 = batch.set(b"k", b"two", v0).unwrap();

    assert_eq!(batch.get_version(b"k").unwrap(), v1);
    assert_eq!(batch.get_latest(b"k").unwrap().unwrap().value, b"two");
    // Nothing is visible outside the batch yet
    assert_eq!(store.get_version(b"k").unwrap(), NO_VERSION);
    assert_eq!(batch.len(), 1);
}

#[test]
fn test_batch_commit_publishes_writes() {
    let (_temp, store) = setup_versioned(100);
    store.set(b"existing", b"old", NO_VERSION).unwrap();
    // Warm the cache so commit has something to invalidate
    assert_eq!(store.get_version(b"existing").unwrap(), 0);

    let mut batch = store.begin_batch();
    batch.set(b"existing", b"new", 0).unwrap();
    for i in 0..10 {
        batch.set(format!("item{}", i).as_bytes(), b"x", NO_VERSION).unwrap();
    }
    batch.commit().unwrap();

    let latest = store.get_latest(b"existing").unwrap().unwrap();
    assert_eq!((latest.version, latest.value), (1, b"new".to_vec()));
    assert_eq!(store.get_entry(b"existing", 0).unwrap().unwrap().value, b"old");
    for i in 0..10 {
        assert_eq!(store.get_version(format!("item{}", i).as_bytes()).unwrap(), 0);
    }
}

#[test]
fn test_batch_commit_detects_concurrent_write() {
    let (_temp, store) = setup_versioned(100);
    let mut batch = store.begin_batch();
    batch.set(b"k", b"from-batch", NO_VERSION).unwrap();

    store.set(b"k", b"direct", NO_VERSION).unwrap();

    assert!(matches!(batch.commit(), Err(KvError::VersionMismatch { .. })));
    assert_eq!(store.get_latest(b"k").unwrap().unwrap().value, b"direct");
}

#[test]
fn test_batch_stale_version_rejected_immediately() {
    let (_temp, store) = setup_versioned(100);
    store.set(b"k", b"v", NO_VERSION).unwrap();

    let mut batch = store.begin_batch();
    assert!(matches!(
        batch.set(b"k", b"w", NO_VERSION),
        Err(KvError::VersionMismatch { .. })
    ));
    assert!(batch.is_empty());
}

#[test]
fn test_batch_abort_discards_writes() {
    let (_temp, store) = setup_versioned(100);
    let mut batch = store.begin_batch();
    batch.set(b"k", b"v", NO_VERSION).unwrap();

    batch.abort();

    assert_eq!(store.get_version(b"k").unwrap(), NO_VERSION);
}

// =============================================================================
// Reads Racing Writes
// =============================================================================

#[test]
fn test_write_during_cache_miss_is_not_hidden_by_late_fill() {
    let storage = GatedStorage::new();
    VersionedStore::new(storage.clone(), ReadCache::new(0))
        .set(b"k", b"v0", NO_VERSION)
        .unwrap();
    let store = Arc::new(VersionedStore::new(storage.clone(), ReadCache::new(100)));

    // Reader misses the cache and reads version 0 from the engine
    let pause = storage.pause_next_read();
    let reader = {
        let store = Arc::clone(&store);
        thread::spawn(move || store.get_version(b"k").unwrap())
    };
    pause.wait_reached();

    // Writer moves the key to version 1 while the read is in flight
    let writer = {
        let store = Arc::clone(&store);
        thread::spawn(move || store.set(b"k", b"v1", 0).unwrap())
    };
    thread::sleep(Duration::from_millis(50));
    pause.release();

    assert_eq!(reader.join().unwrap(), 0);
    assert_eq!(writer.join().unwrap(), 1);

    assert_eq!(store.get_version(b"k").unwrap(), 1);
    assert!(matches!(
        store.set(b"k", b"clobber", 0),
        Err(KvError::VersionMismatch { expected: 0, actual: 1 })
    ));
    assert_eq!(store.get_entry(b"k", 1).unwrap().unwrap().value, b"v1".to_vec());
}

#[test]
fn test_batch_commit_during_cache_miss_is_not_hidden_by_late_fill() {
    let storage = GatedStorage::new();
    VersionedStore::new(storage.clone(), ReadCache::new(0))
        .set(b"k", b"v0", NO_VERSION)
        .unwrap();
    let store = Arc::new(VersionedStore::new(storage.clone(), ReadCache::new(100)));

    let pause = storage.pause_next_read();
    let reader = {
        let store = Arc::clone(&store);
        thread::spawn(move || store.get_version(b"k").unwrap())
    };
    pause.wait_reached();

    let committer = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            let mut batch = store.begin_batch();
            batch.set(b"k", b"v1", 0).unwrap();
            batch.commit().unwrap();
        })
    };
    thread::sleep(Duration::from_millis(50));
    pause.release();

    assert_eq!(reader.join().unwrap(), 0);
    committer.join().unwrap();
    assert_eq!(store.get_version(b"k").unwrap(), 1);
    assert_eq!(store.get_latest(b"k").unwrap().unwrap().value, b"v1".to_vec());
}
