//! Splay policy
//!
//! Read path of the store. A record whose `merged` bit is set has been moved
//! down by a compaction since it was last read; writing it back with
//! `{merged: 0, splayed: 1}` lands a fresh copy in the memtable, at the top
//! of the tree. Records without the bit are returned without any write, so
//! repeated reads of a hot key cost nothing extra.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::engine::Engine;
use crate::error::{Result, SplayError};

use super::codec::{decode_tagged, encode_tagged, DecodeError, Tag};

/// Read-path counters
#[derive(Default)]
pub struct SplayMetrics {
    reads: AtomicU64,
    hits: AtomicU64,
    promotions: AtomicU64,
    promotion_failures: AtomicU64,
    consistency_faults: AtomicU64,
}

/// Point-in-time copy of the read-path counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SplayStats {
    pub reads: u64,
    /// Reads that found a value
    pub hits: u64,
    /// Successful promotion write-backs
    pub promotions: u64,
    /// Promotion write-backs the engine rejected
    pub promotion_failures: u64,
    /// Stored values that were not well-formed tagged records
    pub consistency_faults: u64,
}

impl SplayStats {
    pub fn hit_rate(&self) -> f64 {
        if self.reads == 0 {
            return 0.0;
        }
        self.hits as f64 / self.reads as f64
    }
}

impl SplayMetrics {
    pub fn snapshot(&self) -> SplayStats {
        SplayStats {
            reads: self.reads.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            promotions: self.promotions.load(Ordering::Relaxed),
            promotion_failures: self.promotion_failures.load(Ordering::Relaxed),
            consistency_faults: self.consistency_faults.load(Ordering::Relaxed),
        }
    }

    fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// What a read should do with a fetched record
#[derive(Debug, PartialEq, Eq)]
pub struct ReadDecision<'a> {
    /// Payload to hand to the caller
    pub payload: &'a [u8],
    /// Record to write back under the same key, if the read promotes
    pub write_back: Option<Vec<u8>>,
}

/// Decides, per read, whether a record gets promoted
#[derive(Debug, Clone, Copy)]
pub struct SplayPolicy {
    enabled: bool,
}

impl SplayPolicy {
    /// `enabled == false` never promotes (tags are still stripped)
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Decode a stored record and decide on promotion
    ///
    /// Pure: touches neither the engine nor the counters.
    pub fn evaluate<'a>(
        &self,
        raw: &'a [u8],
    ) -> std::result::Result<ReadDecision<'a>, DecodeError> {
        let (tag, payload) = decode_tagged(raw)?;
        let write_back = if self.enabled && tag.is_merged() {
            Some(encode_tagged(Tag::promoted(), payload))
        } else {
            None
        };
        Ok(ReadDecision {
            payload,
            write_back,
        })
    }

    /// Read `key` through `engine`, promoting it when needed
    ///
    /// 1. Absent keys return `None` without any write.
    /// 2. Undecodable records are consistency faults, never user data.
    /// 3. Merged records are written back as `{merged: 0, splayed: 1}`; a
    ///    failed write-back is logged and counted, and the value is still
    ///    returned.
    pub fn get(
        &self,
        engine: &Engine,
        metrics: &SplayMetrics,
        key: &[u8],
    ) -> Result<Option<Vec<u8>>> {
        SplayMetrics::inc(&metrics.reads);

        let raw = match engine.get(key)? {
            Some(raw) => raw,
            None => return Ok(None),
        };

        let decision = match self.evaluate(&raw) {
            Ok(decision) => decision,
            Err(source) => {
                SplayMetrics::inc(&metrics.consistency_faults);
                tracing::error!(
                    "Stored value for {:?} is not a tagged record: {}",
                    String::from_utf8_lossy(key),
                    source
                );
                return Err(SplayError::Consistency {
                    key: key.to_vec(),
                    source,
                });
            }
        };

        SplayMetrics::inc(&metrics.hits);
        let value = decision.payload.to_vec();

        if let Some(record) = decision.write_back {
            match engine.put(key, &record) {
                Ok(()) => {
                    SplayMetrics::inc(&metrics.promotions);
                    tracing::debug!("Promoted {:?}", String::from_utf8_lossy(key));
                }
                Err(e) => {
                    SplayMetrics::inc(&metrics.promotion_failures);
                    tracing::warn!(
                        "Promotion write-back for {:?} failed: {}",
                        String::from_utf8_lossy(key),
                        e
                    );
                }
            }
        }

        Ok(Some(value))
    }
}
