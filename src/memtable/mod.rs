//! MemTable Module
//!
//! In-memory data structure for recent writes.
//!
//! ## Responsibilities
//! - Fast reads and writes in memory
//! - Single-writer/multi-reader access pattern
//! - Track size for flush triggers
//! - Ordered iteration for SSTable creation
//!
//! ## Data Structure Choice
//! BTreeMap wrapped in RwLock:
//! - Ordered keys (required for SSTable generation)
//! - One entry per key; merge operands that cannot be folded yet are
//!   accumulated on the entry in arrival order

mod table;

pub use table::MemTable;

/// One version of a key, as held by the memtable or a single SSTable
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    /// A live value
    Value(Vec<u8>),

    /// Merge operands not yet folded into a base value, oldest first
    Merge(Vec<Vec<u8>>),

    /// A tombstone (deleted key)
    Tombstone,
}

impl Entry {
    /// Payload bytes held by this entry (keys excluded)
    pub fn payload_size(&self) -> usize {
        match self {
            Entry::Value(v) => v.len(),
            Entry::Merge(operands) => operands.iter().map(Vec::len).sum(),
            Entry::Tombstone => 0,
        }
    }

    /// Whether this entry hides everything older than it
    pub fn is_base(&self) -> bool {
        !matches!(self, Entry::Merge(_))
    }
}
