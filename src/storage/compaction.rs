//! Compaction
//!
//! Merges every table of one level with the table of the level below it into
//! a single new table.
//!
//! ## Responsibilities
//! - K-way merge of input tables in key order (binary heap)
//! - Group each key's versions newest first and resolve them through the
//!   merge operator and compaction filter
//! - Drop tombstones once nothing older can exist below the output
//!
//! ## Ordering
//! Inputs are ranked newest first: level-0 tables by descending id, then the
//! level's own tables, then the table already sitting in the output level.
//! For equal keys the lower rank is the newer version.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

use crate::error::Result;
use crate::extension::Extensions;
use crate::memtable::Entry;
use crate::resolve;
use crate::stats::EngineMetrics;

use super::sstable::{SSTableBuilder, SSTableIterator, SSTableReader};

/// Inputs and target of one compaction, captured under the manifest lock
pub(crate) struct CompactionPlan {
    /// Level being compacted
    pub level: usize,
    /// Tables from `level` and `level + 1`, newest first
    pub inputs: Vec<Arc<SSTableReader>>,
    /// Id reserved for the output table
    pub output_id: u64,
    /// No table exists below the output level
    pub bottommost: bool,
}

impl CompactionPlan {
    pub fn output_level(&self) -> usize {
        self.level + 1
    }

    pub fn input_ids(&self) -> Vec<u64> {
        self.inputs.iter().map(|t| t.id()).collect()
    }

    pub fn input_bytes(&self) -> u64 {
        self.inputs.iter().map(|t| t.file_size()).sum()
    }
}

/// Counts reported by a finished merge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompactionOutcome {
    pub entries_read: u64,
    pub entries_written: u64,
}

struct HeapItem {
    key: Vec<u8>,
    rank: usize,
    entry: Entry,
}

// BinaryHeap is a max-heap: invert so the smallest key, then the newest
// input, comes out first.
impl Ord for HeapItem {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .key
            .cmp(&self.key)
            .then_with(|| other.rank.cmp(&self.rank))
    }
}

impl PartialOrd for HeapItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for HeapItem {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.rank == other.rank
    }
}

impl Eq for HeapItem {}

/// Merge the plan's inputs into `builder`
pub(crate) fn merge_into(
    plan: &CompactionPlan,
    builder: &mut SSTableBuilder,
    ext: &Extensions,
    metrics: &EngineMetrics,
) -> Result<CompactionOutcome> {
    let mut sources: Vec<SSTableIterator> = plan
        .inputs
        .iter()
        .map(|t| t.iter())
        .collect::<Result<_>>()?;

    let mut heap = BinaryHeap::with_capacity(sources.len());
    for (rank, source) in sources.iter_mut().enumerate() {
        push_next(&mut heap, source, rank)?;
    }

    let mut outcome = CompactionOutcome::default();

    while let Some(first) = heap.pop() {
        let key = first.key;
        let mut chain = vec![first.entry];
        push_next(&mut heap, &mut sources[first.rank], first.rank)?;

        while heap.peek().map(|next| next.key == key).unwrap_or(false) {
            if let Some(next) = heap.pop() {
                chain.push(next.entry);
                push_next(&mut heap, &mut sources[next.rank], next.rank)?;
            }
        }

        outcome.entries_read += chain.len() as u64;
        if let Some(entry) =
            resolve::compact_chain(plan.level, &key, chain, plan.bottommost, ext, metrics)?
        {
            builder.add_entry(&key, &entry)?;
            outcome.entries_written += 1;
        }
    }

    Ok(outcome)
}

fn push_next(
    heap: &mut BinaryHeap<HeapItem>,
    source: &mut SSTableIterator,
    rank: usize,
) -> Result<()> {
    if let Some(item) = source.next() {
        let (key, entry) = item?;
        heap.push(HeapItem { key, rank, entry });
    }
    Ok(())
}
