//! MemTable implementation
//!
//! BTreeMap-based memtable with RwLock for concurrency.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;

use super::Entry;

/// In-memory table for recent writes
///
/// Size is approximate: key bytes plus payload bytes of every entry.
pub struct MemTable {
    data: RwLock<BTreeMap<Vec<u8>, Entry>>,
    size: AtomicUsize,
}

impl MemTable {
    /// Create a new empty MemTable
    pub fn new() -> Self {
        Self {
            data: RwLock::new(BTreeMap::new()),
            size: AtomicUsize::new(0),
        }
    }

    /// Get the entry for a key (read lock)
    pub fn get(&self, key: &[u8]) -> Option<Entry> {
        self.data.read().get(key).cloned()
    }

    /// Put a key-value pair (write lock), returning the new table size
    pub fn put(&self, key: Vec<u8>, value: Vec<u8>) -> usize {
        self.replace(key, Entry::Value(value))
    }

    /// Delete a key (write lock, inserts tombstone), returning the new table size
    pub fn delete(&self, key: Vec<u8>) -> usize {
        self.replace(key, Entry::Tombstone)
    }

    /// Append a merge operand to the key's pending operand list
    ///
    /// The caller folds operands into an existing value or tombstone before
    /// calling this; a base entry here is replaced by a fresh operand list.
    pub fn push_operand(&self, key: Vec<u8>, operand: Vec<u8>) -> usize {
        let mut data = self.data.write();
        if let Some(Entry::Merge(operands)) = data.get_mut(&key) {
            let added = operand.len();
            operands.push(operand);
            return self.size.fetch_add(added, Ordering::SeqCst) + added;
        }
        self.replace_locked(&mut data, key, Entry::Merge(vec![operand]))
    }

    fn replace(&self, key: Vec<u8>, entry: Entry) -> usize {
        let mut data = self.data.write();
        self.replace_locked(&mut data, key, entry)
    }

    fn replace_locked(
        &self,
        data: &mut BTreeMap<Vec<u8>, Entry>,
        key: Vec<u8>,
        entry: Entry,
    ) -> usize {
        let added = key.len() + entry.payload_size();
        let removed = data
            .get(&key)
            .map(|old| key.len() + old.payload_size())
            .unwrap_or(0);
        data.insert(key, entry);

        // Adjust under the write lock so concurrent writers see a consistent total
        let before = self.size.fetch_add(added, Ordering::SeqCst);
        self.size.fetch_sub(removed, Ordering::SeqCst);
        before + added - removed
    }

    /// Get approximate size in bytes
    pub fn size(&self) -> usize {
        self.size.load(Ordering::SeqCst)
    }

    /// Get entry count
    pub fn entry_count(&self) -> usize {
        self.data.read().len()
    }

    /// Whether the table holds no entries
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Check if should flush (size >= limit)
    pub fn should_flush(&self, size_limit: usize) -> bool {
        self.size() >= size_limit
    }

    /// Snapshot of all entries in sorted key order (for flush)
    pub fn iter(&self) -> Vec<(Vec<u8>, Entry)> {
        self.data
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Clear all entries (after successful flush)
    pub fn clear(&self) {
        let mut data = self.data.write();
        data.clear();
        self.size.store(0, Ordering::SeqCst);
    }
}

impl Default for MemTable {
    fn default() -> Self {
        Self::new()
    }
}
