//! Version chain resolution
//!
//! A key's versions are gathered newest first: the memtable entry, then one
//! entry per table from level 0 down. This module turns such a chain into
//! what a reader sees, or into the single entry a compaction writes.

use crate::error::{Result, SplayError};
use crate::extension::{Extensions, FilterDecision};
use crate::memtable::Entry;
use crate::stats::EngineMetrics;

/// Whether a chain gathered so far already hides everything older
pub(crate) fn chain_complete(chain: &[Entry]) -> bool {
    chain.last().map(Entry::is_base).unwrap_or(false)
}

/// Resolve a chain (newest first) to the value a reader sees
///
/// The newest put or delete wins. Merge operands on top of it are folded
/// with `full_merge`.
pub(crate) fn read_chain(
    key: &[u8],
    chain: Vec<Entry>,
    ext: &Extensions,
    metrics: &EngineMetrics,
) -> Result<Option<Vec<u8>>> {
    let mut operands_newest_first: Vec<Vec<u8>> = Vec::new();
    let mut existing = None;

    for entry in chain {
        match entry {
            Entry::Value(v) if operands_newest_first.is_empty() => return Ok(Some(v)),
            Entry::Tombstone if operands_newest_first.is_empty() => return Ok(None),
            Entry::Value(v) => {
                existing = Some(v);
                break;
            }
            Entry::Tombstone => break,
            Entry::Merge(ops) => operands_newest_first.extend(ops.into_iter().rev()),
        }
    }

    if operands_newest_first.is_empty() {
        return Ok(None);
    }

    operands_newest_first.reverse();
    let merged = full_merge(key, existing.as_deref(), &operands_newest_first, ext, metrics)?;
    Ok(Some(merged))
}

/// Resolve a chain (newest first) to the entry a compaction writes
///
/// - The compaction filter sees every value and every operand. A removed
///   value behaves like a tombstone for everything older.
/// - With `folds_overwrites`, older puts are folded as generations rather
///   than dropped: the oldest becomes `existing`, newer ones operands. If
///   that fold fails, the newest put wins as it would without folding; only
///   real merge operands can fail a compaction.
/// - Tombstones survive unless the output is the bottommost level.
/// - Operand-only chains above the bottommost level are partially merged.
///
/// Returns `None` when nothing needs to be written for the key.
pub(crate) fn compact_chain(
    level: usize,
    key: &[u8],
    chain: Vec<Entry>,
    bottommost: bool,
    ext: &Extensions,
    metrics: &EngineMetrics,
) -> Result<Option<Entry>> {
    let folds = ext.folds_overwrites();
    let filter = ext.compaction_filter.as_deref();

    let mut operands_newest_first: Vec<Vec<u8>> = Vec::new();
    let mut existing: Option<Vec<u8>> = None;
    let mut saw_value = false;
    let mut saw_tombstone = false;
    // Newest surviving put and how many real operands sit above it
    let mut newest_put: Option<(Vec<u8>, usize)> = None;
    let mut folded_puts = 0usize;

    for entry in chain {
        match entry {
            Entry::Merge(ops) => {
                if let Some(newer) = existing.take() {
                    operands_newest_first.push(newer);
                    folded_puts += 1;
                }
                for op in ops.into_iter().rev() {
                    let removed = filter
                        .map(|f| f.filter_merge_operand(level, key, &op) == FilterDecision::Remove)
                        .unwrap_or(false);
                    if removed {
                        metrics.filtered();
                    } else {
                        operands_newest_first.push(op);
                    }
                }
            }
            Entry::Value(v) => {
                let removed = filter
                    .map(|f| f.filter(level, key, &v) == FilterDecision::Remove)
                    .unwrap_or(false);
                if removed {
                    metrics.filtered();
                    saw_tombstone = true;
                    break;
                }
                if let Some(newer) = existing.take() {
                    operands_newest_first.push(newer);
                    folded_puts += 1;
                }
                if folds && newest_put.is_none() {
                    newest_put = Some((v.clone(), operands_newest_first.len()));
                }
                existing = Some(v);
                saw_value = true;
                if !folds {
                    break;
                }
            }
            Entry::Tombstone => {
                saw_tombstone = true;
                break;
            }
        }
    }

    let terminated = bottommost || saw_tombstone || saw_value;

    if operands_newest_first.is_empty() {
        return Ok(match existing {
            Some(v) => Some(Entry::Value(v)),
            None if saw_tombstone && !bottommost => Some(Entry::Tombstone),
            None => None,
        });
    }

    operands_newest_first.reverse();
    let operands = operands_newest_first;

    if terminated {
        return match full_merge(key, existing.as_deref(), &operands, ext, metrics) {
            Ok(merged) => Ok(Some(Entry::Value(merged))),
            Err(SplayError::MergeFailed { .. }) if folded_puts > 0 => {
                let (base, above) = newest_put.unwrap_or_default();
                tracing::debug!(
                    "Overwrite fold failed for {:?}, keeping newest put",
                    String::from_utf8_lossy(key)
                );
                if above == 0 {
                    return Ok(Some(Entry::Value(base)));
                }
                let real = &operands[operands.len() - above..];
                let merged = full_merge(key, Some(base.as_slice()), real, ext, metrics)?;
                Ok(Some(Entry::Value(merged)))
            }
            Err(e) => Err(e),
        };
    }

    // Operand-only chain above the bottommost level: older tables may still
    // hold a base value, so only operands can be combined here.
    if operands.len() >= 2 {
        if let Some(op) = &ext.merge_operator {
            let refs: Vec<&[u8]> = operands.iter().map(Vec::as_slice).collect();
            metrics.merge_call();
            if let Some(combined) = op.partial_merge(key, &refs) {
                return Ok(Some(Entry::Merge(vec![combined])));
            }
        }
    }
    Ok(Some(Entry::Merge(operands)))
}

pub(crate) fn full_merge(
    key: &[u8],
    existing: Option<&[u8]>,
    operands: &[Vec<u8>],
    ext: &Extensions,
    metrics: &EngineMetrics,
) -> Result<Vec<u8>> {
    let op = ext
        .merge_operator
        .as_ref()
        .ok_or_else(|| SplayError::MergeOperatorMissing { key: key.to_vec() })?;

    let refs: Vec<&[u8]> = operands.iter().map(Vec::as_slice).collect();
    metrics.merge_call();
    match op.full_merge(key, existing, &refs) {
        Some(v) => Ok(v),
        None => {
            metrics.merge_failure();
            tracing::warn!(
                "Merge operator {} produced no value for key {:?} ({} operands)",
                op.name(),
                String::from_utf8_lossy(key),
                operands.len()
            );
            Err(SplayError::MergeFailed { key: key.to_vec() })
        }
    }
}
