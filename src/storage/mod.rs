//! Storage Module
//!
//! Persistent, leveled storage layer built from immutable SSTables.
//!
//! ## Responsibilities
//! - Persist memtable flushes as sorted level-0 tables
//! - Point lookups that gather a key's versions across levels
//! - Leveled compaction, run inline or on a background worker
//! - Shared block cache for table reads
//!
//! See [`sstable`] for the on-disk table format and [`StorageManager`] for
//! the level layout.

mod cache;
mod compaction;
mod manager;
pub mod sstable;
mod worker;

pub use cache::{BlockCache, CachedRecord};
pub use compaction::CompactionOutcome;
pub use manager::StorageManager;
pub use sstable::{SSTable, SSTableBuilder, SSTableIterator, SSTableReader};
pub use worker::CompactionWorker;
