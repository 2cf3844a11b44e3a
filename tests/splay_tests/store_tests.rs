//! SplayStore end to end: insert, read-triggered promotion, compaction
//! interplay and lifecycle

use std::fs;

use splaylsm::splay::{SplayStore, Tag, LEGACY_SENTINEL};
use splaylsm::{Config, SplayError};
use tempfile::TempDir;

use super::{
    merged_by_compaction, raw, record, setup_temp_store, setup_temp_store_with, store_config,
    stored_tag,
};

// =============================================================================
// Basic Operations
// =============================================================================

#[test]
fn test_insert_then_get() {
    let (_temp, store) = setup_temp_store();

    store.insert(b"a", b"1").unwrap();

    assert_eq!(store.get(b"a").unwrap(), Some(b"1".to_vec()));
    assert_eq!(raw(&store, b"a"), Some(record(false, false, b"1")));
}

#[test]
fn test_insert_overwrites_and_delete_removes() {
    let (_temp, store) = setup_temp_store();

    store.insert(b"a", b"1").unwrap();
    store.insert(b"a", b"2").unwrap();
    assert_eq!(store.get(b"a").unwrap(), Some(b"2".to_vec()));

    store.delete(b"a").unwrap();
    assert_eq!(store.get(b"a").unwrap(), None);
}

#[test]
fn test_empty_payload_round_trips() {
    let (_temp, store) = setup_temp_store();

    store.insert(b"k", b"").unwrap();

    assert_eq!(store.get(b"k").unwrap(), Some(Vec::new()));
    assert_eq!(raw(&store, b"k"), Some(vec![0x00]));
}

#[test]
fn test_absent_key_reads_none_without_writing() {
    let (_temp, store) = setup_temp_store();

    assert_eq!(store.get(b"missing").unwrap(), None);

    assert_eq!(store.engine().stats().puts, 0);
    assert_eq!(store.engine().memtable_entry_count(), 0);
    assert_eq!(store.stats().reads, 1);
    assert_eq!(store.stats().hits, 0);
}

#[test]
fn test_empty_stored_value_is_a_consistency_fault() {
    let (_temp, store) = setup_temp_store();

    store.engine().put(b"k", &[]).unwrap();

    let err = store.get(b"k").unwrap_err();
    assert!(matches!(err, SplayError::Consistency { .. }));
    assert_eq!(store.stats().consistency_faults, 1);
}

// =============================================================================
// Promotion
// =============================================================================

#[test]
fn test_merge_in_memtable_promotes_on_read() {
    let (_temp, store) = setup_temp_store();

    store.insert(b"k", b"v1").unwrap();
    store.engine().merge(b"k", &record(false, false, b"v2")).unwrap();
    assert_eq!(raw(&store, b"k"), Some(record(false, true, b"v2")));

    assert_eq!(store.get(b"k").unwrap(), Some(b"v2".to_vec()));

    assert_eq!(stored_tag(&store, b"k"), Tag::promoted());
    assert_eq!(raw(&store, b"k"), Some(record(true, false, b"v2")));
    assert_eq!(store.stats().promotions, 1);
}

#[test]
fn test_merging_a_record_with_itself_marks_merged() {
    let (_temp, store) = setup_temp_store();

    store.insert(b"1", b"abc").unwrap();
    let current = raw(&store, b"1").unwrap();
    store.engine().merge(b"1", &current).unwrap();

    assert!(stored_tag(&store, b"1").is_merged());
    assert_eq!(raw(&store, b"1"), Some(record(false, true, b"abc")));

    assert_eq!(store.get(b"1").unwrap(), Some(b"abc".to_vec()));
    assert_eq!(stored_tag(&store, b"1"), Tag::promoted());
    assert_eq!(store.stats().promotions, 1);
}

#[test]
fn test_single_merge_operand_is_not_promoted() {
    let (_temp, store) = setup_temp_store();

    store.engine().merge(b"k", &record(false, false, b"only")).unwrap();
    let puts_before = store.engine().stats().puts;

    assert_eq!(store.get(b"k").unwrap(), Some(b"only".to_vec()));
    assert_eq!(store.engine().stats().puts, puts_before);
    assert_eq!(store.stats().promotions, 0);
}

#[test]
fn test_compaction_marks_merged_and_read_promotes() {
    let (_temp, store) = setup_temp_store();

    merged_by_compaction(&store, b"hot", b"old", b"new");

    assert_eq!(store.engine().memtable_entry_count(), 0);
    assert_eq!(raw(&store, b"hot"), Some(record(false, true, b"new")));

    let puts_before = store.engine().stats().puts;
    assert_eq!(store.get(b"hot").unwrap(), Some(b"new".to_vec()));

    // The fresh copy sits in the memtable, at the top of the tree
    assert_eq!(store.engine().stats().puts, puts_before + 1);
    assert_eq!(store.engine().memtable_entry_count(), 1);
    assert_eq!(stored_tag(&store, b"hot"), Tag::promoted());
}

#[test]
fn test_promotion_is_idempotent() {
    let (_temp, store) = setup_temp_store();

    merged_by_compaction(&store, b"hot", b"old", b"new");
    store.get(b"hot").unwrap();
    let puts_after_first = store.engine().stats().puts;

    for _ in 0..10 {
        assert_eq!(store.get(b"hot").unwrap(), Some(b"new".to_vec()));
    }

    assert_eq!(store.engine().stats().puts, puts_after_first);
    assert_eq!(store.stats().promotions, 1);
    assert_eq!(store.stats().reads, 11);
}

#[test]
fn test_single_generation_compaction_does_not_mark_merged() {
    let (_temp, store) = setup_temp_store();

    store.insert(b"cold", b"v").unwrap();
    store.engine().compact_all().unwrap();

    assert_eq!(stored_tag(&store, b"cold"), Tag::empty());
    store.get(b"cold").unwrap();
    assert_eq!(store.stats().promotions, 0);
}

#[test]
fn test_promoted_key_is_merged_again_by_next_compaction() {
    let (_temp, store) = setup_temp_store();

    merged_by_compaction(&store, b"hot", b"old", b"new");
    store.get(b"hot").unwrap();
    assert_eq!(stored_tag(&store, b"hot"), Tag::promoted());

    // The promoted copy and the compacted record fold together
    store.engine().compact_all().unwrap();
    assert_eq!(raw(&store, b"hot"), Some(record(true, true, b"new")));

    assert_eq!(store.get(b"hot").unwrap(), Some(b"new".to_vec()));
    assert_eq!(store.stats().promotions, 2);
}

#[test]
fn test_failed_write_back_still_returns_value() {
    let (_temp, store) = setup_temp_store();
    merged_by_compaction(&store, b"hot", b"old", b"new");

    // A directory where the next flush builds its table makes that flush fail
    let engine = store.engine();
    let blocker = engine.storage_dir().join(format!(
        "sstable_{:06}_L0.sst.tmp",
        engine.storage().next_sstable_id()
    ));
    fs::create_dir(&blocker).unwrap();
    store.insert(b"other", b"x").unwrap();
    assert!(engine.flush().is_err());
    assert!(engine.writes_halted());

    assert_eq!(store.get(b"hot").unwrap(), Some(b"new".to_vec()));
    let stats = store.stats();
    assert_eq!(stats.promotion_failures, 1);
    assert_eq!(stats.promotions, 0);
    assert!(stored_tag(&store, b"hot").is_merged());

    // Once a flush goes through, the next read promotes
    fs::remove_dir(&blocker).unwrap();
    engine.flush().unwrap();
    assert!(!engine.writes_halted());

    assert_eq!(store.get(b"hot").unwrap(), Some(b"new".to_vec()));
    assert_eq!(stored_tag(&store, b"hot"), Tag::promoted());
    assert_eq!(store.stats().promotions, 1);
    assert_eq!(store.get(b"other").unwrap(), Some(b"x".to_vec()));
}

#[test]
fn test_disabled_store_never_promotes() {
    let (_temp, store) = setup_temp_store_with(false);
    assert!(!store.policy().is_enabled());

    merged_by_compaction(&store, b"k", b"old", b"new");
    let puts_before = store.engine().stats().puts;

    assert_eq!(store.get(b"k").unwrap(), Some(b"new".to_vec()));
    assert_eq!(store.engine().stats().puts, puts_before);
    assert!(stored_tag(&store, b"k").is_merged());
}

// =============================================================================
// Garbage Removal
// =============================================================================

#[test]
fn test_compaction_removes_legacy_sentinel() {
    let (_temp, store) = setup_temp_store();

    store.engine().put(b"legacy", LEGACY_SENTINEL).unwrap();
    store.insert(b"live", b"v").unwrap();
    assert!(matches!(
        store.get(b"legacy"),
        Err(SplayError::Consistency { .. })
    ));

    store.engine().compact_all().unwrap();

    assert_eq!(raw(&store, b"legacy"), None);
    assert_eq!(store.get(b"legacy").unwrap(), None);
    assert_eq!(store.get(b"live").unwrap(), Some(b"v".to_vec()));
    assert_eq!(store.engine().stats().filtered, 1);
}

#[test]
fn test_untagged_puts_do_not_wedge_compaction() {
    let (_temp, store) = setup_temp_store();

    store.engine().put(b"old", b"raw-1").unwrap();
    store.engine().flush().unwrap();
    store.engine().put(b"old", b"raw-2").unwrap();
    store.insert(b"live", b"v").unwrap();

    store.engine().compact_all().unwrap();

    // The newest put survives as is, and level 0 drains
    assert_eq!(store.engine().level_counts()[0], 0);
    assert_eq!(raw(&store, b"old"), Some(b"raw-2".to_vec()));
    assert!(matches!(
        store.get(b"old"),
        Err(SplayError::Consistency { .. })
    ));
    assert_eq!(store.get(b"live").unwrap(), Some(b"v".to_vec()));

    // Later compactions keep going
    store.insert(b"live", b"v2").unwrap();
    store.engine().compact_all().unwrap();
    assert_eq!(store.engine().level_counts()[0], 0);
    assert_eq!(store.get(b"live").unwrap(), Some(b"v2".to_vec()));
}

// =============================================================================
// Lifecycle
// =============================================================================

#[test]
fn test_close_and_reopen_keeps_data_and_tags() {
    let temp_dir = TempDir::new().unwrap();
    {
        let store = SplayStore::open(temp_dir.path(), store_config(true)).unwrap();
        merged_by_compaction(&store, b"hot", b"old", b"new");
        store.insert(b"plain", b"p").unwrap();
        store.get(b"hot").unwrap();
        store.close().unwrap();
    }

    let store = SplayStore::open(temp_dir.path(), store_config(true)).unwrap();
    assert_eq!(store.path(), temp_dir.path());
    assert_eq!(stored_tag(&store, b"hot"), Tag::promoted());
    assert_eq!(store.get(b"plain").unwrap(), Some(b"p".to_vec()));
    assert_eq!(store.get(b"hot").unwrap(), Some(b"new".to_vec()));
    assert_eq!(store.stats().promotions, 0);
}

#[test]
fn test_open_uses_path_over_config_data_dir() {
    let temp_dir = TempDir::new().unwrap();
    let elsewhere = temp_dir.path().join("elsewhere");
    let target = temp_dir.path().join("store");
    let config = Config::builder().data_dir(&elsewhere).build();

    let store = SplayStore::open(&target, config).unwrap();

    assert_eq!(store.engine().data_dir(), target.as_path());
    assert!(target.join("wal.log").exists());
    assert!(!elsewhere.exists());
}

#[test]
fn test_open_default() {
    let temp_dir = TempDir::new().unwrap();
    let store = SplayStore::open_default(temp_dir.path()).unwrap();

    assert!(store.policy().is_enabled());
    store.insert(b"k", b"v").unwrap();
    assert_eq!(store.get(b"k").unwrap(), Some(b"v".to_vec()));
}

#[test]
fn test_open_failure_reports_path() {
    let temp_dir = TempDir::new().unwrap();
    let not_a_dir = temp_dir.path().join("file");
    fs::write(&not_a_dir, b"occupied").unwrap();

    match SplayStore::open(&not_a_dir, store_config(true)) {
        Err(SplayError::Open { path, .. }) => assert_eq!(path, not_a_dir),
        Err(other) => panic!("Expected open error, got {:?}", other),
        Ok(_) => panic!("Expected open to fail"),
    }
}

#[test]
fn test_open_rejects_invalid_config() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder().memtable_size_bytes(0).build();

    match SplayStore::open(temp_dir.path(), config) {
        Err(SplayError::Open { source, .. }) => {
            assert!(matches!(*source, SplayError::Config(_)))
        }
        Err(other) => panic!("Expected open error, got {:?}", other),
        Ok(_) => panic!("Expected open to fail"),
    }
}
