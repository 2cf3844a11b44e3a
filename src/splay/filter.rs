//! Garbage filter
//!
//! Compaction filter that removes legacy placeholder values. Everything else,
//! including values that fail to decode, is kept: only the read path reports
//! malformed records.

use crate::extension::{CompactionFilter, FilterDecision};

use super::codec::LEGACY_SENTINEL;

/// Drops values equal to [`LEGACY_SENTINEL`]
#[derive(Debug, Clone, Copy, Default)]
pub struct SplayFilter;

impl SplayFilter {
    fn decide(level: usize, key: &[u8], value: &[u8]) -> FilterDecision {
        if value == LEGACY_SENTINEL {
            tracing::trace!(
                "Removing legacy placeholder for {:?} at L{}",
                String::from_utf8_lossy(key),
                level
            );
            FilterDecision::Remove
        } else {
            FilterDecision::Keep
        }
    }
}

impl CompactionFilter for SplayFilter {
    fn name(&self) -> &str {
        "SplayFilter"
    }

    fn filter(&self, level: usize, key: &[u8], value: &[u8]) -> FilterDecision {
        Self::decide(level, key, value)
    }

    fn filter_merge_operand(&self, level: usize, key: &[u8], operand: &[u8]) -> FilterDecision {
        Self::decide(level, key, operand)
    }
}
