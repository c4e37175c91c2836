//! Tests for WAL Recovery
//!
//! These tests verify:
//! - Recovery of clean and empty logs
//! - Truncation of torn tails and corrupt entries
//! - verify() reports without modifying the file

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use partikv::config::WalSyncStrategy;
use partikv::wal::{Operation, WalEntry, WalRecovery, WalWriter};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_wal() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let wal_path = temp_dir.path().join("wal.log");
    (temp_dir, wal_path)
}

fn write_puts(path: &Path, count: usize) {
    let mut writer = WalWriter::open(path, WalSyncStrategy::EveryWrite).unwrap();
    for i in 0..count {
        writer
            .append(Operation::Put {
                key: format!("key{}", i).into_bytes(),
                value: format!("value{}", i).into_bytes(),
            })
            .unwrap();
    }
}

fn entry_bytes(lsn: u64) -> Vec<u8> {
    WalEntry::new(
        lsn,
        Operation::Put {
            key: format!("k{}", lsn).into_bytes(),
            value: b"v".to_vec(),
        },
    )
    .serialize()
    .unwrap()
}

fn append_raw(path: &Path, bytes: &[u8]) {
    let mut file = OpenOptions::new().create(true).append(true).open(path).unwrap();
    file.write_all(bytes).unwrap();
    file.sync_all().unwrap();
}

// =============================================================================
// Clean Logs
// =============================================================================

#[test]
fn test_recover_empty_file() {
    let (_temp, wal_path) = setup_temp_wal();
    File::create(&wal_path).unwrap();

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert!(entries.is_empty());
    assert_eq!(result.last_lsn, 0);
    assert!(!result.was_truncated);
}

#[test]
fn test_recover_returns_entries_in_lsn_order() {
    let (_temp, wal_path) = setup_temp_wal();
    write_puts(&wal_path, 12);

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(result.entries_recovered, 12);
    assert_eq!(result.last_lsn, 12);
    assert_eq!(result.valid_len, fs::metadata(&wal_path).unwrap().len());
    let lsns: Vec<u64> = entries.iter().map(|e| e.lsn).collect();
    assert_eq!(lsns, (1..=12).collect::<Vec<_>>());
}

#[test]
fn test_recover_mixed_operations() {
    let (_temp, wal_path) = setup_temp_wal();
    {
        let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
        writer
            .append(Operation::Put { key: b"a".to_vec(), value: b"1".to_vec() })
            .unwrap();
        writer
            .append(Operation::Batch {
                writes: vec![(b"b".to_vec(), b"2".to_vec()), (b"c".to_vec(), b"3".to_vec())],
            })
            .unwrap();
    }

    let (entries, _) = WalRecovery::recover(&wal_path).unwrap();

    assert!(matches!(entries[0].operation, Operation::Put { .. }));
    assert!(matches!(entries[1].operation, Operation::Batch { ref writes } if writes.len() == 2));
}

// =============================================================================
// Torn Tails
// =============================================================================

#[test]
fn test_partial_header_is_truncated() {
    let (_temp, wal_path) = setup_temp_wal();
    let good = entry_bytes(1);
    append_raw(&wal_path, &good);
    append_raw(&wal_path, &[0u8; 7]);

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(entries.len(), 1);
    assert_eq!(result.entries_corrupted, 0);
    assert!(result.was_truncated);
    assert_eq!(fs::metadata(&wal_path).unwrap().len(), good.len() as u64);
}

#[test]
fn test_partial_payload_is_truncated() {
    let (_temp, wal_path) = setup_temp_wal();
    append_raw(&wal_path, &entry_bytes(1));
    let second = entry_bytes(2);
    append_raw(&wal_path, &second[..second.len() - 3]);

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(entries.len(), 1);
    assert_eq!(result.last_lsn, 1);
    assert!(result.was_truncated);
}

// =============================================================================
// Corruption
// =============================================================================

#[test]
fn test_recovery_stops_at_first_corrupt_entry() {
    let (_temp, wal_path) = setup_temp_wal();
    append_raw(&wal_path, &entry_bytes(1));
    let mut bad = entry_bytes(2);
    let last = bad.len() - 1;
    bad[last] ^= 0xFF;
    append_raw(&wal_path, &bad);
    // A valid entry after the corruption is not trusted
    append_raw(&wal_path, &entry_bytes(3));

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(entries.len(), 1);
    assert_eq!(result.entries_corrupted, 1);
    assert_eq!(result.last_lsn, 1);
    assert!(result.was_truncated);
}

#[test]
fn test_writer_continues_after_recovered_tail() {
    let (_temp, wal_path) = setup_temp_wal();
    write_puts(&wal_path, 3);
    append_raw(&wal_path, &[0xAB; 5]);

    WalRecovery::recover(&wal_path).unwrap();
    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
    let lsn = writer
        .append(Operation::Put { key: b"next".to_vec(), value: b"v".to_vec() })
        .unwrap();

    assert_eq!(lsn, 4);
    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();
    assert_eq!(entries.len(), 4);
    assert!(!result.was_truncated);
}

// =============================================================================
// Verify
// =============================================================================

#[test]
fn test_verify_does_not_modify_file() {
    let (_temp, wal_path) = setup_temp_wal();
    write_puts(&wal_path, 2);
    append_raw(&wal_path, &[1, 2, 3]);
    let before = fs::metadata(&wal_path).unwrap().len();

    let result = WalRecovery::verify(&wal_path).unwrap();

    assert_eq!(result.entries_recovered, 2);
    assert!(result.was_truncated);
    assert_eq!(fs::metadata(&wal_path).unwrap().len(), before);
}

#[test]
fn test_recover_and_verify_agree() {
    let (_temp, wal_path) = setup_temp_wal();
    write_puts(&wal_path, 20);

    let (_, recovered) = WalRecovery::recover(&wal_path).unwrap();
    let verified = WalRecovery::verify(&wal_path).unwrap();

    assert_eq!(recovered, verified);
}
