//! Tests for LogEngine
//!
//! These tests verify:
//! - Basic get/put and batch writes
//! - Crash recovery from the WAL
//! - Checkpoint rewrite once the WAL grows past its limit
//! - Lifecycle (close, destroy)
//! - Concurrent access patterns

use std::sync::Arc;
use std::thread;

use partikv::config::{EngineOptions, WalSyncStrategy};
use partikv::engine::{KvEngine, LogEngine, WriteBatch};
use partikv::KvError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn test_options() -> EngineOptions {
    EngineOptions {
        sync_strategy: WalSyncStrategy::EveryWrite,
        ..EngineOptions::default()
    }
}

fn setup_temp_engine() -> (TempDir, LogEngine) {
    let temp_dir = TempDir::new().unwrap();
    let engine = LogEngine::open(&temp_dir.path().join("engine"), test_options()).unwrap();
    (temp_dir, engine)
}

// =============================================================================
// Basic Operations Tests
// =============================================================================

#[test]
fn test_open_creates_directory_and_wal() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path().join("nested").join("engine");

    let engine = LogEngine::open(&dir, test_options()).unwrap();

    assert!(dir.join("wal.log").exists());
    assert_eq!(engine.dir(), dir.as_path());
    assert_eq!(engine.entry_count(), 0);
}

#[test]
fn test_put_get() {
    let (_temp, engine) = setup_temp_engine();

    engine.put(b"hello", b"world").unwrap();

    assert_eq!(engine.get(b"hello").unwrap(), Some(b"world".to_vec()));
    assert_eq!(engine.get(b"missing").unwrap(), None);
}

#[test]
fn test_put_overwrite() {
    let (_temp, engine) = setup_temp_engine();

    engine.put(b"key", b"v1").unwrap();
    engine.put(b"key", b"v2").unwrap();

    assert_eq!(engine.get(b"key").unwrap(), Some(b"v2".to_vec()));
    assert_eq!(engine.entry_count(), 1);
}

#[test]
fn test_write_batch_applies_all_writes() {
    let (_temp, engine) = setup_temp_engine();

    let mut batch = WriteBatch::new();
    batch.put(b"a".to_vec(), b"1".to_vec());
    batch.put(b"b".to_vec(), b"2".to_vec());
    batch.put(b"a".to_vec(), b"3".to_vec());
    assert_eq!(batch.len(), 3);
    engine.write(batch).unwrap();

    assert_eq!(engine.get(b"a").unwrap(), Some(b"3".to_vec()));
    assert_eq!(engine.get(b"b").unwrap(), Some(b"2".to_vec()));
}

#[test]
fn test_empty_batch_writes_nothing() {
    let (_temp, engine) = setup_temp_engine();
    let before = engine.wal_len();

    engine.write(WriteBatch::new()).unwrap();

    assert_eq!(engine.wal_len(), before);
}

// =============================================================================
// Recovery Tests
// =============================================================================

#[test]
fn test_reopen_recovers_puts_and_batches() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path().join("engine");

    {
        let engine = LogEngine::open(&dir, test_options()).unwrap();
        engine.put(b"single", b"1").unwrap();
        let mut batch = WriteBatch::new();
        batch.put(b"x".to_vec(), b"10".to_vec());
        batch.put(b"y".to_vec(), b"20".to_vec());
        engine.write(batch).unwrap();
        // Dropped without close, like a crash after the last fsync
    }

    let engine = LogEngine::open(&dir, test_options()).unwrap();
    assert_eq!(engine.get(b"single").unwrap(), Some(b"1".to_vec()));
    assert_eq!(engine.get(b"x").unwrap(), Some(b"10".to_vec()));
    assert_eq!(engine.get(b"y").unwrap(), Some(b"20".to_vec()));
}

#[test]
fn test_reopen_after_torn_tail() {
    use std::fs::OpenOptions;
    use std::io::Write;

    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path().join("engine");
    {
        let engine = LogEngine::open(&dir, test_options()).unwrap();
        engine.put(b"durable", b"yes").unwrap();
        engine.close().unwrap();
    }
    let mut wal = OpenOptions::new().append(true).open(dir.join("wal.log")).unwrap();
    wal.write_all(&[0x42; 9]).unwrap();

    let engine = LogEngine::open(&dir, test_options()).unwrap();
    assert_eq!(engine.get(b"durable").unwrap(), Some(b"yes".to_vec()));
    engine.put(b"after", b"ok").unwrap();
    assert_eq!(engine.entry_count(), 2);
}

// =============================================================================
// Checkpoint Tests
// =============================================================================

#[test]
fn test_checkpoint_compacts_wal() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path().join("engine");
    let options = EngineOptions {
        sync_strategy: WalSyncStrategy::EveryWrite,
        checkpoint_bytes: 2048,
    };

    {
        let engine = LogEngine::open(&dir, options).unwrap();
        for i in 0..500 {
            engine.put(b"hot-key", format!("value-{}", i).as_bytes()).unwrap();
        }
        // Repeated overwrites of one key never let the log grow unbounded
        assert!(engine.wal_len() <= 2048 + 256);
        assert_eq!(engine.entry_count(), 1);
    }

    let engine = LogEngine::open(&dir, options).unwrap();
    assert_eq!(engine.get(b"hot-key").unwrap(), Some(b"value-499".to_vec()));
}

// =============================================================================
// Lifecycle Tests
// =============================================================================

#[test]
fn test_operations_after_close_fail() {
    let (_temp, engine) = setup_temp_engine();
    engine.put(b"k", b"v").unwrap();

    engine.close().unwrap();
    engine.close().unwrap();

    assert!(engine.is_closed());
    assert!(matches!(engine.get(b"k"), Err(KvError::Closed)));
    assert!(matches!(engine.put(b"k", b"v"), Err(KvError::Closed)));
}

#[test]
fn test_destroy_removes_directory() {
    let (_temp, engine) = setup_temp_engine();
    engine.put(b"k", b"v").unwrap();
    let dir = engine.dir().to_path_buf();

    engine.destroy().unwrap();
    engine.destroy().unwrap();

    assert!(!dir.exists());
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_writers() {
    let (_temp, engine) = setup_temp_engine();
    let engine = Arc::new(engine);

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                for i in 0..50 {
                    let key = format!("t{}-k{}", t, i);
                    engine.put(key.as_bytes(), b"v").unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(engine.entry_count(), 200);
    assert_eq!(engine.get(b"t3-k49").unwrap(), Some(b"v".to_vec()));
}

#[test]
fn test_engine_as_trait_object() {
    let (_temp, engine) = setup_temp_engine();
    let engine: Arc<dyn KvEngine> = Arc::new(engine);

    engine.put(b"dyn", b"ok").unwrap();
    assert_eq!(engine.get(b"dyn").unwrap(), Some(b"ok".to_vec()));
}
