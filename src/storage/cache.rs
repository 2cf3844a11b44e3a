//! Block Cache
//!
//! Byte-budgeted LRU cache of decoded SSTable records, shared by every open
//! reader. Keys are `(table id, entry offset)`; table ids are never reused, so
//! entries of deleted tables simply age out (or are evicted eagerly).

use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use lru::LruCache;
use parking_lot::Mutex;

/// Fixed per-entry bookkeeping charge on top of the payload
const ENTRY_OVERHEAD: usize = 32;

/// A cached SSTable record body
#[derive(Debug, Clone)]
pub struct CachedRecord {
    /// Record kind byte as stored on disk
    pub kind: u8,
    /// Raw value bytes (empty for tombstones)
    pub payload: Bytes,
}

impl CachedRecord {
    fn charge(&self) -> usize {
        self.payload.len() + ENTRY_OVERHEAD
    }
}

struct CacheState {
    lru: LruCache<(u64, u64), CachedRecord>,
    used_bytes: usize,
}

/// Shared LRU cache with a byte budget
pub struct BlockCache {
    state: Mutex<CacheState>,
    capacity_bytes: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl BlockCache {
    /// Create a cache holding at most `capacity_bytes` of records
    ///
    /// Returns `None` for a zero budget (cache disabled).
    pub fn new(capacity_bytes: usize) -> Option<Self> {
        if capacity_bytes == 0 {
            return None;
        }
        Some(Self {
            state: Mutex::new(CacheState {
                lru: LruCache::unbounded(),
                used_bytes: 0,
            }),
            capacity_bytes,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        })
    }

    pub fn get(&self, table_id: u64, offset: u64) -> Option<CachedRecord> {
        let mut state = self.state.lock();
        match state.lru.get(&(table_id, offset)) {
            Some(record) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(record.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Insert a record, evicting least recently used records over budget
    pub fn insert(&self, table_id: u64, offset: u64, record: CachedRecord) {
        let charge = record.charge();
        if charge > self.capacity_bytes {
            return;
        }

        let mut state = self.state.lock();
        if let Some(old) = state.lru.put((table_id, offset), record) {
            state.used_bytes -= old.charge();
        }
        state.used_bytes += charge;

        while state.used_bytes > self.capacity_bytes {
            match state.lru.pop_lru() {
                Some((_, evicted)) => state.used_bytes -= evicted.charge(),
                None => break,
            }
        }
    }

    /// Drop every record belonging to a table (after the table is deleted)
    pub fn evict_table(&self, table_id: u64) {
        let mut state = self.state.lock();
        let keys: Vec<(u64, u64)> = state
            .lru
            .iter()
            .filter(|((id, _), _)| *id == table_id)
            .map(|(k, _)| *k)
            .collect();
        for key in keys {
            if let Some(evicted) = state.lru.pop(&key) {
                state.used_bytes -= evicted.charge();
            }
        }
    }

    /// Bytes currently charged against the budget
    pub fn used_bytes(&self) -> usize {
        self.state.lock().used_bytes
    }

    pub fn capacity_bytes(&self) -> usize {
        self.capacity_bytes
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}
