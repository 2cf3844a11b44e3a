//! Extension points
//!
//! Hooks the engine calls back into while it reads and compacts:
//! a merge operator that folds merge operands (and optionally superseded
//! puts) into one value, and a compaction filter that can drop records.
//!
//! Both run on foreground reads and on the background compaction thread,
//! possibly concurrently and more than once for the same input. They must
//! be pure functions of their arguments.

use std::fmt;
use std::sync::Arc;

/// Folds a key's pending merge operands into a single value
pub trait MergeOperator: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Combine an optional base value with operands (oldest first)
    ///
    /// `None` means the inputs could not be merged; the engine reports
    /// the failure and never persists a result for it.
    fn full_merge(
        &self,
        key: &[u8],
        existing: Option<&[u8]>,
        operands: &[&[u8]],
    ) -> Option<Vec<u8>>;

    /// Combine adjacent operands into one operand, without a base value
    ///
    /// `None` keeps the operands as they are.
    fn partial_merge(&self, _key: &[u8], _operands: &[&[u8]]) -> Option<Vec<u8>> {
        None
    }

    /// Whether compaction should route superseded put generations through
    /// `full_merge` (oldest as `existing`, newer ones as operands) instead of
    /// discarding them
    fn folds_overwrites(&self) -> bool {
        false
    }
}

/// Verdict of a compaction filter for one record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterDecision {
    Keep,
    Remove,
}

/// Decides which records survive compaction
pub trait CompactionFilter: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Called for every stored value seen by a compaction at `level`
    /// (the level being compacted)
    fn filter(&self, level: usize, key: &[u8], value: &[u8]) -> FilterDecision;

    /// Called for every pending merge operand seen by a compaction
    fn filter_merge_operand(&self, _level: usize, _key: &[u8], _operand: &[u8]) -> FilterDecision {
        FilterDecision::Keep
    }
}

/// Extensions installed into an engine at open
#[derive(Clone, Default)]
pub struct Extensions {
    pub merge_operator: Option<Arc<dyn MergeOperator>>,
    pub compaction_filter: Option<Arc<dyn CompactionFilter>>,
}

impl Extensions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_merge_operator(mut self, op: Arc<dyn MergeOperator>) -> Self {
        self.merge_operator = Some(op);
        self
    }

    pub fn with_compaction_filter(mut self, filter: Arc<dyn CompactionFilter>) -> Self {
        self.compaction_filter = Some(filter);
        self
    }

    /// Whether compaction folds older puts through the merge operator
    pub fn folds_overwrites(&self) -> bool {
        self.merge_operator
            .as_ref()
            .map(|op| op.folds_overwrites())
            .unwrap_or(false)
    }
}

impl fmt::Debug for Extensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extensions")
            .field("merge_operator", &self.merge_operator.as_ref().map(|op| op.name()))
            .field(
                "compaction_filter",
                &self.compaction_filter.as_ref().map(|filter| filter.name()),
            )
            .finish()
    }
}
