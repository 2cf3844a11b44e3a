//! Merge resolver
//!
//! Merge operator that collapses a key's record generations into one tagged
//! record. The payload of the most recent well-formed generation wins; the
//! `merged` bit is raised whenever two or more well-formed generations were
//! combined, which is how the read path learns that a compaction touched the
//! key since its last promotion.
//!
//! The rule only looks at the newest generation and at a count, so splitting
//! a sequence into partial merges and merging the results gives the same
//! record as merging it in one go.

use crate::extension::MergeOperator;

use super::codec::{decode_tagged, encode_tagged, LEGACY_SENTINEL};

/// Tag-aware merge operator for splayed records
#[derive(Debug, Clone, Copy, Default)]
pub struct SplayMerge;

impl SplayMerge {
    /// Fold generations given oldest first
    fn fold<'a>(key: &[u8], generations: impl Iterator<Item = &'a [u8]>) -> Option<Vec<u8>> {
        let mut well_formed = 0usize;
        let mut newest = None;

        for raw in generations {
            if raw == LEGACY_SENTINEL {
                tracing::warn!(
                    "Skipping legacy placeholder while merging {:?}",
                    String::from_utf8_lossy(key)
                );
                continue;
            }
            match decode_tagged(raw) {
                Ok(record) => {
                    well_formed += 1;
                    newest = Some(record);
                }
                Err(e) => {
                    tracing::warn!(
                        "Skipping malformed record while merging {:?}: {}",
                        String::from_utf8_lossy(key),
                        e
                    );
                }
            }
        }

        let (tag, payload) = newest?;
        let tag = if well_formed >= 2 { tag.with_merged(true) } else { tag };
        Some(encode_tagged(tag, payload))
    }
}

impl MergeOperator for SplayMerge {
    fn name(&self) -> &str {
        "SplayMerge"
    }

    fn full_merge(&self, key: &[u8], existing: Option<&[u8]>, operands: &[&[u8]]) -> Option<Vec<u8>> {
        Self::fold(key, existing.into_iter().chain(operands.iter().copied()))
    }

    fn partial_merge(&self, key: &[u8], operands: &[&[u8]]) -> Option<Vec<u8>> {
        Self::fold(key, operands.iter().copied())
    }

    fn folds_overwrites(&self) -> bool {
        true
    }
}
