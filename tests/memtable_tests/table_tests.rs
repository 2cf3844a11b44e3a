//! MemTable Tests
//!
//! Tests verify:
//! - Point reads and writes, tombstones
//! - Merge operand accumulation
//! - Size tracking
//! - Sorted snapshot iteration and clear
//! - Concurrent access

use std::sync::Arc;
use std::thread;

use splaylsm::memtable::{Entry, MemTable};

fn value(v: &[u8]) -> Option<Entry> {
    Some(Entry::Value(v.to_vec()))
}

// =============================================================================
// Basic Operations
// =============================================================================

#[test]
fn test_new_memtable_is_empty() {
    let memtable = MemTable::new();
    assert!(memtable.is_empty());
    assert_eq!(memtable.entry_count(), 0);
    assert_eq!(memtable.size(), 0);
    assert_eq!(memtable.get(b"missing"), None);
}

#[test]
fn test_put_get_and_overwrite() {
    let memtable = MemTable::new();

    memtable.put(b"key1".to_vec(), b"value1".to_vec());
    memtable.put(b"key2".to_vec(), b"value2".to_vec());
    memtable.put(b"key1".to_vec(), b"updated".to_vec());

    assert_eq!(memtable.entry_count(), 2);
    assert_eq!(memtable.get(b"key1"), value(b"updated"));
    assert_eq!(memtable.get(b"key2"), value(b"value2"));
}

#[test]
fn test_delete_leaves_tombstone() {
    let memtable = MemTable::new();

    memtable.put(b"key".to_vec(), b"value".to_vec());
    memtable.delete(b"key".to_vec());
    memtable.delete(b"never_written".to_vec());

    assert_eq!(memtable.get(b"key"), Some(Entry::Tombstone));
    assert_eq!(memtable.get(b"never_written"), Some(Entry::Tombstone));
    assert_eq!(memtable.entry_count(), 2);

    memtable.put(b"key".to_vec(), b"back".to_vec());
    assert_eq!(memtable.get(b"key"), value(b"back"));
}

#[test]
fn test_empty_key_and_value() {
    let memtable = MemTable::new();
    memtable.put(vec![], b"for_empty_key".to_vec());
    memtable.put(b"empty_value".to_vec(), vec![]);

    assert_eq!(memtable.get(b""), value(b"for_empty_key"));
    assert_eq!(memtable.get(b"empty_value"), value(b""));
}

// =============================================================================
// Merge Operands
// =============================================================================

#[test]
fn test_push_operand_accumulates_in_order() {
    let memtable = MemTable::new();

    memtable.push_operand(b"k".to_vec(), b"a".to_vec());
    memtable.push_operand(b"k".to_vec(), b"bb".to_vec());
    memtable.push_operand(b"k".to_vec(), b"ccc".to_vec());

    assert_eq!(
        memtable.get(b"k"),
        Some(Entry::Merge(vec![b"a".to_vec(), b"bb".to_vec(), b"ccc".to_vec()]))
    );
    assert_eq!(memtable.size(), 1 + 1 + 2 + 3);
}

#[test]
fn test_push_operand_replaces_base_entry() {
    let memtable = MemTable::new();

    memtable.put(b"k".to_vec(), b"value".to_vec());
    memtable.push_operand(b"k".to_vec(), b"op".to_vec());

    assert_eq!(memtable.get(b"k"), Some(Entry::Merge(vec![b"op".to_vec()])));
    assert_eq!(memtable.size(), 1 + 2);
}

#[test]
fn test_put_over_operands_resets_entry() {
    let memtable = MemTable::new();

    memtable.push_operand(b"k".to_vec(), b"op1".to_vec());
    memtable.push_operand(b"k".to_vec(), b"op2".to_vec());
    memtable.put(b"k".to_vec(), b"v".to_vec());

    assert_eq!(memtable.get(b"k"), value(b"v"));
    assert_eq!(memtable.size(), 2);
}

// =============================================================================
// Size Tracking
// =============================================================================

#[test]
fn test_size_is_key_plus_payload() {
    let memtable = MemTable::new();

    assert_eq!(memtable.put(b"key".to_vec(), b"value".to_vec()), 8);
    assert_eq!(memtable.put(b"ab".to_vec(), b"c".to_vec()), 11);
    // Overwrite replaces the old payload's share
    assert_eq!(memtable.put(b"key".to_vec(), b"v".to_vec()), 7);
    // Tombstones only count their key
    assert_eq!(memtable.delete(b"key".to_vec()), 6);
    assert_eq!(memtable.size(), 6);
}

#[test]
fn test_should_flush_threshold() {
    let memtable = MemTable::new();
    memtable.put(b"12345".to_vec(), b"12345".to_vec());

    assert!(!memtable.should_flush(11));
    assert!(memtable.should_flush(10));
    assert!(memtable.should_flush(9));
}

// =============================================================================
// Iteration and Clear
// =============================================================================

#[test]
fn test_iter_is_sorted_and_includes_every_kind() {
    let memtable = MemTable::new();
    memtable.put(b"c".to_vec(), b"3".to_vec());
    memtable.delete(b"a".to_vec());
    memtable.push_operand(b"b".to_vec(), b"op".to_vec());

    let entries = memtable.iter();
    let keys: Vec<Vec<u8>> = entries.iter().map(|(k, _)| k.clone()).collect();
    assert_eq!(keys, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
    assert_eq!(entries[0].1, Entry::Tombstone);
    assert_eq!(entries[1].1, Entry::Merge(vec![b"op".to_vec()]));
}

#[test]
fn test_iter_is_a_snapshot() {
    let memtable = MemTable::new();
    memtable.put(b"k".to_vec(), b"old".to_vec());

    let snapshot = memtable.iter();
    memtable.put(b"k".to_vec(), b"new".to_vec());

    assert_eq!(snapshot[0].1, Entry::Value(b"old".to_vec()));
}

#[test]
fn test_clear() {
    let memtable = MemTable::new();
    for i in 0..100 {
        memtable.put(format!("key{:03}", i).into_bytes(), vec![0u8; 10]);
    }
    memtable.clear();

    assert!(memtable.is_empty());
    assert_eq!(memtable.size(), 0);
    assert_eq!(memtable.get(b"key000"), None);
}

// =============================================================================
// Concurrency
// =============================================================================

#[test]
fn test_concurrent_readers_and_writers() {
    let memtable = Arc::new(MemTable::new());
    for i in 0..100 {
        memtable.put(format!("seed{:03}", i).into_bytes(), b"v".to_vec());
    }

    let mut handles = Vec::new();
    for t in 0..4 {
        let mt = Arc::clone(&memtable);
        handles.push(thread::spawn(move || {
            for i in 0..250 {
                mt.push_operand(format!("t{}", t).into_bytes(), vec![i as u8]);
                assert_eq!(mt.get(b"seed042"), Some(Entry::Value(b"v".to_vec())));
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    for t in 0..4 {
        match memtable.get(format!("t{}", t).as_bytes()) {
            Some(Entry::Merge(operands)) => assert_eq!(operands.len(), 250),
            other => panic!("Expected operand list, got {:?}", other),
        }
    }
    // 100 seeds of 7 + 1 bytes, four keys of 2 + 250 bytes
    assert_eq!(memtable.size(), 100 * 8 + 4 * (2 + 250));
}
