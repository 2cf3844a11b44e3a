//! Splay layer tests
//!
//! Tagged record codec, the garbage filter and merge resolver on their own,
//! the read policy, and the store end to end on top of a real engine.

mod merge_tests;
mod store_tests;

use splaylsm::splay::{decode_tagged, encode_tagged, Tag};
use splaylsm::{Config, SplayStore};
use tempfile::TempDir;

// =============================================================================
// Shared Helpers
// =============================================================================

/// Store that never compacts on its own and syncs every write
pub fn setup_temp_store() -> (TempDir, SplayStore) {
    setup_temp_store_with(true)
}

pub fn setup_temp_store_with(splay: bool) -> (TempDir, SplayStore) {
    let temp_dir = TempDir::new().unwrap();
    let store = SplayStore::open(temp_dir.path(), store_config(splay)).unwrap();
    (temp_dir, store)
}

pub fn store_config(splay: bool) -> Config {
    Config::builder()
        .wal_sync_strategy(splaylsm::WalSyncStrategy::EveryWrite)
        .level_fanout_multiplier(100)
        .background_compaction(false)
        .splay_enabled(splay)
        .build()
}

/// Stored record for `key`, bypassing the policy
pub fn raw(store: &SplayStore, key: &[u8]) -> Option<Vec<u8>> {
    store.engine().get(key).unwrap()
}

/// Tag of the stored record for `key`
pub fn stored_tag(store: &SplayStore, key: &[u8]) -> Tag {
    let record = raw(store, key).expect("key should be stored");
    decode_tagged(&record).unwrap().0
}

/// Leave `key` with a compaction-merged record holding `value`
///
/// Two generations land in separate tables, then a full compaction folds
/// them into one.
pub fn merged_by_compaction(store: &SplayStore, key: &[u8], older: &[u8], value: &[u8]) {
    store.insert(key, older).unwrap();
    store.engine().flush().unwrap();
    store.insert(key, value).unwrap();
    store.engine().compact_all().unwrap();
}

pub fn record(splayed: bool, merged: bool, payload: &[u8]) -> Vec<u8> {
    encode_tagged(Tag::new(splayed, merged), payload)
}
