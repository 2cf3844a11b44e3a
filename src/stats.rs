//! Engine counters
//!
//! Lock-free counters bumped on the write, flush and compaction paths, plus a
//! plain snapshot struct for callers.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub struct EngineMetrics {
    puts: AtomicU64,
    merges: AtomicU64,
    deletes: AtomicU64,
    flushes: AtomicU64,
    compactions: AtomicU64,
    merge_calls: AtomicU64,
    merge_failures: AtomicU64,
    filtered: AtomicU64,
}

/// Point-in-time copy of the engine counters
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub puts: u64,
    pub merges: u64,
    pub deletes: u64,
    pub flushes: u64,
    pub compactions: u64,
    /// Merge operator invocations (full and partial)
    pub merge_calls: u64,
    /// Merge operator invocations that produced no record
    pub merge_failures: u64,
    /// Records and operands removed by the compaction filter
    pub filtered: u64,
    /// Live tables per level, level 0 first
    pub tables_per_level: Vec<usize>,
}

impl EngineStats {
    pub fn total_tables(&self) -> usize {
        self.tables_per_level.iter().sum()
    }
}

impl EngineMetrics {
    pub fn snapshot(&self, tables_per_level: Vec<usize>) -> EngineStats {
        EngineStats {
            puts: self.puts.load(Ordering::Relaxed),
            merges: self.merges.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            compactions: self.compactions.load(Ordering::Relaxed),
            merge_calls: self.merge_calls.load(Ordering::Relaxed),
            merge_failures: self.merge_failures.load(Ordering::Relaxed),
            filtered: self.filtered.load(Ordering::Relaxed),
            tables_per_level,
        }
    }

    fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn put(&self) {
        Self::inc(&self.puts);
    }

    pub(crate) fn merge(&self) {
        Self::inc(&self.merges);
    }

    pub(crate) fn delete(&self) {
        Self::inc(&self.deletes);
    }

    pub(crate) fn flush(&self) {
        Self::inc(&self.flushes);
    }

    pub(crate) fn compaction(&self) {
        Self::inc(&self.compactions);
    }

    pub(crate) fn merge_call(&self) {
        Self::inc(&self.merge_calls);
    }

    pub(crate) fn merge_failure(&self) {
        Self::inc(&self.merge_failures);
    }

    pub(crate) fn filtered(&self) {
        Self::inc(&self.filtered);
    }
}
