//! SSTable Module
//!
//! Sorted String Table - immutable on-disk sorted key-value storage.
//!
//! ## File Format (v2)
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ Header (14 bytes)                                       │
//! │   Magic: "SPLS" (4) | Version: u16 (2) | Count: u64 (8) │
//! ├─────────────────────────────────────────────────────────┤
//! │ Data Block (variable)                                   │
//! │   [KeyLen: u32][Kind: u8][ValLen: u32][Key][Value]      │
//! │   ... repeated for each entry ...                       │
//! │   Kind 0 = value, 1 = tombstone (ValLen 0),             │
//! │   2 = merge operands: [Count: u32]([Len: u32][Bytes])*  │
//! ├─────────────────────────────────────────────────────────┤
//! │ Index Block (variable)                                  │
//! │   [KeyLen: u32][Offset: u64][Key]                       │
//! │   ... repeated for each entry ...                       │
//! ├─────────────────────────────────────────────────────────┤
//! │ Footer (16 bytes)                                       │
//! │   IndexOffset: u64 (8) | DataCRC: u32 (4) | Padding (4) │
//! └─────────────────────────────────────────────────────────┘
//! ```

mod builder;
mod iterator;
mod reader;

use std::path::PathBuf;

pub use builder::SSTableBuilder;
pub use iterator::SSTableIterator;
pub use reader::SSTableReader;

use crate::error::{Result, SplayError};
use crate::memtable::Entry;

// =============================================================================
// Shared Constants (used by builder, reader, iterator)
// =============================================================================

/// Magic bytes identifying a SplayLSM SSTable file
pub(crate) const MAGIC: &[u8; 4] = b"SPLS";

/// Current SSTable format version
pub(crate) const VERSION: u16 = 2;

/// Header size: Magic (4) + Version (2) + EntryCount (8) = 14 bytes
pub(crate) const HEADER_SIZE: u64 = 14;

/// Footer size: IndexOffset (8) + DataCRC (4) + Padding (4) = 16 bytes
pub(crate) const FOOTER_SIZE: u64 = 16;

/// Per-entry header: KeyLen (4) + Kind (1) + ValLen (4)
pub(crate) const ENTRY_HEADER_SIZE: usize = 9;

pub(crate) const KIND_VALUE: u8 = 0;
pub(crate) const KIND_TOMBSTONE: u8 = 1;
pub(crate) const KIND_MERGE: u8 = 2;

// =============================================================================
// Record Body Encoding
// =============================================================================

/// Split an entry into its on-disk kind byte and value bytes
pub(crate) fn encode_record(entry: &Entry) -> (u8, Vec<u8>) {
    match entry {
        Entry::Value(v) => (KIND_VALUE, v.clone()),
        Entry::Tombstone => (KIND_TOMBSTONE, Vec::new()),
        Entry::Merge(operands) => {
            let size = 4 + operands.iter().map(|op| 4 + op.len()).sum::<usize>();
            let mut buf = Vec::with_capacity(size);
            buf.extend_from_slice(&(operands.len() as u32).to_le_bytes());
            for op in operands {
                buf.extend_from_slice(&(op.len() as u32).to_le_bytes());
                buf.extend_from_slice(op);
            }
            (KIND_MERGE, buf)
        }
    }
}

/// Rebuild an entry from its kind byte and value bytes
pub(crate) fn decode_record(kind: u8, value: &[u8]) -> Result<Entry> {
    match kind {
        KIND_VALUE => Ok(Entry::Value(value.to_vec())),
        KIND_TOMBSTONE => Ok(Entry::Tombstone),
        KIND_MERGE => {
            let count = read_u32(value, 0)? as usize;
            let mut operands = Vec::with_capacity(count.min(1024));
            let mut pos = 4;
            for _ in 0..count {
                let len = read_u32(value, pos)? as usize;
                pos += 4;
                let operand = value.get(pos..pos + len).ok_or_else(|| {
                    SplayError::Storage("merge operand overruns record".to_string())
                })?;
                operands.push(operand.to_vec());
                pos += len;
            }
            Ok(Entry::Merge(operands))
        }
        other => Err(SplayError::Storage(format!(
            "unknown SSTable record kind {}",
            other
        ))),
    }
}

/// Parse a data-block entry header into (key length, kind, value length)
pub(crate) fn parse_entry_header(header: &[u8; ENTRY_HEADER_SIZE]) -> (usize, u8, usize) {
    let key_len = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
    let val_len = u32::from_le_bytes([header[5], header[6], header[7], header[8]]);
    (key_len as usize, header[4], val_len as usize)
}

fn read_u32(buf: &[u8], pos: usize) -> Result<u32> {
    buf.get(pos..pos + 4)
        .and_then(|b| b.try_into().ok())
        .map(u32::from_le_bytes)
        .ok_or_else(|| SplayError::Storage("truncated merge record".to_string()))
}

// =============================================================================
// SSTable Metadata
// =============================================================================

/// SSTable metadata returned by the builder and tracked per level
#[derive(Debug, Clone)]
pub struct SSTable {
    /// Path to the SSTable file
    pub path: PathBuf,
    /// Number of entries in this SSTable
    pub entry_count: u64,
    /// Smallest key (for range filtering)
    pub min_key: Vec<u8>,
    /// Largest key (for range filtering)
    pub max_key: Vec<u8>,
    /// File size in bytes
    pub file_size: u64,
}

impl SSTable {
    /// Get the number of entries
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    /// Quick check if a key might be in this SSTable (range check)
    /// Returns false if key is definitely outside [min_key, max_key]
    pub fn might_contain(&self, key: &[u8]) -> bool {
        self.entry_count > 0 && key >= self.min_key.as_slice() && key <= self.max_key.as_slice()
    }
}
