//! SSTable Reader
//!
//! Opens SSTable files and provides O(log n) key lookups via in-memory index.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;

use crate::error::{Result, SplayError};
use crate::memtable::Entry;
use crate::storage::cache::{BlockCache, CachedRecord};

use super::iterator::SSTableIterator;
use super::{
    decode_record, parse_entry_header, ENTRY_HEADER_SIZE, FOOTER_SIZE, HEADER_SIZE, MAGIC,
    VERSION,
};

/// Buffer size for table reads when direct I/O is off
const READ_BUFFER_SIZE: usize = 8 * 1024;

/// Reader for SSTable files with in-memory index for O(log n) lookups
///
/// Lookups take `&self`: the file handle sits behind a mutex so that many
/// readers can share one `Arc<SSTableReader>`.
pub struct SSTableReader {
    /// Table id (from the file name), used as the block cache namespace
    id: u64,
    path: PathBuf,
    /// File handle for point lookups
    file: Mutex<BufReader<File>>,
    /// In-memory index: key → file offset
    index: BTreeMap<Vec<u8>, u64>,
    entry_count: u64,
    /// Index block starting offset (end of the data block)
    index_offset: u64,
    data_crc: u32,
    file_size: u64,
    cache: Option<Arc<BlockCache>>,
}

impl SSTableReader {
    /// Open an SSTable for reading, without a block cache
    ///
    /// Loads the entire index into memory for fast lookups.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with(path, 0, None, false)
    }

    /// Open an SSTable with an explicit id, optional shared cache, and read mode
    ///
    /// With `direct_io` the lookup handle is unbuffered: every lookup reads
    /// exactly the bytes of one entry.
    pub fn open_with(
        path: &Path,
        id: u64,
        cache: Option<Arc<BlockCache>>,
        direct_io: bool,
    ) -> Result<Self> {
        let mut file = File::open(path)?;
        let file_size = file.metadata()?.len();

        if file_size < HEADER_SIZE + FOOTER_SIZE {
            return Err(SplayError::Storage(format!(
                "SSTable {} too short: {} bytes",
                path.display(),
                file_size
            )));
        }

        // Header
        let mut header = [0u8; HEADER_SIZE as usize];
        file.read_exact(&mut header)?;

        if &header[0..4] != MAGIC {
            return Err(SplayError::Storage(format!(
                "Invalid SSTable magic: expected SPLS, got {:?}",
                &header[0..4]
            )));
        }

        let version = u16::from_le_bytes([header[4], header[5]]);
        if version != VERSION {
            return Err(SplayError::Storage(format!(
                "Unsupported SSTable version: {}",
                version
            )));
        }

        let mut count_bytes = [0u8; 8];
        count_bytes.copy_from_slice(&header[6..14]);
        let entry_count = u64::from_le_bytes(count_bytes);

        // Footer
        file.seek(SeekFrom::End(-(FOOTER_SIZE as i64)))?;
        let mut footer = [0u8; FOOTER_SIZE as usize];
        file.read_exact(&mut footer)?;

        let mut offset_bytes = [0u8; 8];
        offset_bytes.copy_from_slice(&footer[0..8]);
        let index_offset = u64::from_le_bytes(offset_bytes);
        let data_crc = u32::from_le_bytes([footer[8], footer[9], footer[10], footer[11]]);

        if index_offset < HEADER_SIZE || index_offset > file_size - FOOTER_SIZE {
            return Err(SplayError::Storage(format!(
                "SSTable {} has invalid index offset {}",
                path.display(),
                index_offset
            )));
        }

        // Index block: [key_len(4)][offset(8)][key]
        let index_block_size = file_size - FOOTER_SIZE - index_offset;
        let mut index_data = vec![0u8; index_block_size as usize];
        file.seek(SeekFrom::Start(index_offset))?;
        file.read_exact(&mut index_data)?;
        let index = parse_index(&index_data, path)?;

        if index.len() as u64 != entry_count {
            return Err(SplayError::Storage(format!(
                "SSTable {} index holds {} keys, header says {}",
                path.display(),
                index.len(),
                entry_count
            )));
        }

        file.seek(SeekFrom::Start(0))?;
        let capacity = if direct_io { 0 } else { READ_BUFFER_SIZE };

        Ok(Self {
            id,
            path: path.to_path_buf(),
            file: Mutex::new(BufReader::with_capacity(capacity, file)),
            index,
            entry_count,
            index_offset,
            data_crc,
            file_size,
            cache,
        })
    }

    /// Get the entry for a key, O(log n) via the in-memory index
    ///
    /// Returns:
    /// - `Ok(Some(entry))` : key present in this table (value, operands or tombstone)
    /// - `Ok(None)` : key not in this SSTable
    pub fn get(&self, key: &[u8]) -> Result<Option<Entry>> {
        let offset = match self.index.get(key) {
            Some(&off) => off,
            None => return Ok(None),
        };

        if let Some(cache) = &self.cache {
            if let Some(record) = cache.get(self.id, offset) {
                return decode_record(record.kind, &record.payload).map(Some);
            }
        }

        let (kind, value) = {
            let mut file = self.file.lock();
            file.seek(SeekFrom::Start(offset))?;

            let mut header = [0u8; ENTRY_HEADER_SIZE];
            file.read_exact(&mut header)?;
            let (key_len, kind, val_len) = parse_entry_header(&header);

            // Skip the key (we already know it matches)
            file.seek(SeekFrom::Current(key_len as i64))?;

            let mut value = vec![0u8; val_len];
            file.read_exact(&mut value)?;
            (kind, value)
        };

        let entry = decode_record(kind, &value)?;
        if let Some(cache) = &self.cache {
            cache.insert(
                self.id,
                offset,
                CachedRecord {
                    kind,
                    payload: Bytes::from(value),
                },
            );
        }
        Ok(Some(entry))
    }

    /// Recompute the data block checksum and compare it with the footer
    pub fn verify(&self) -> Result<()> {
        let mut file = BufReader::new(File::open(&self.path)?);
        file.seek(SeekFrom::Start(HEADER_SIZE))?;

        let mut hasher = crc32fast::Hasher::new();
        let mut remaining = self.index_offset - HEADER_SIZE;
        let mut buf = vec![0u8; 64 * 1024];
        while remaining > 0 {
            let chunk = remaining.min(buf.len() as u64) as usize;
            file.read_exact(&mut buf[..chunk])?;
            hasher.update(&buf[..chunk]);
            remaining -= chunk as u64;
        }

        let actual = hasher.finalize();
        if actual != self.data_crc {
            return Err(SplayError::ChecksumMismatch {
                path: self.path.clone(),
                expected: self.data_crc,
                actual,
            });
        }
        Ok(())
    }

    /// Get entry count
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size of the table file in bytes
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Get the minimum key in this SSTable (for range filtering)
    pub fn min_key(&self) -> Option<&[u8]> {
        self.index.keys().next().map(|k| k.as_slice())
    }

    /// Get the maximum key in this SSTable (for range filtering)
    pub fn max_key(&self) -> Option<&[u8]> {
        self.index.keys().next_back().map(|k| k.as_slice())
    }

    /// Quick check if a key might be in this SSTable (range check)
    /// Returns false only if the key is definitely outside [min_key, max_key]
    pub fn might_contain(&self, key: &[u8]) -> bool {
        match (self.min_key(), self.max_key()) {
            (Some(min), Some(max)) => key >= min && key <= max,
            _ => false, // Empty SSTable
        }
    }

    /// Create an iterator over all entries (for compaction, debugging)
    ///
    /// The iterator reads through its own file handle, so lookups can
    /// continue while a compaction scans the table.
    pub fn iter(&self) -> Result<SSTableIterator> {
        let file = File::open(&self.path)?;
        SSTableIterator::new(BufReader::new(file), self.index_offset)
    }
}

fn parse_index(data: &[u8], path: &Path) -> Result<BTreeMap<Vec<u8>, u64>> {
    let truncated = || {
        SplayError::Storage(format!("SSTable {} has a truncated index", path.display()))
    };

    let mut index = BTreeMap::new();
    let mut pos = 0;
    while pos < data.len() {
        let len_bytes = data.get(pos..pos + 4).ok_or_else(truncated)?;
        let key_len =
            u32::from_le_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]]) as usize;
        pos += 4;

        let off_bytes = data.get(pos..pos + 8).ok_or_else(truncated)?;
        let mut offset = [0u8; 8];
        offset.copy_from_slice(off_bytes);
        pos += 8;

        let key = data.get(pos..pos + key_len).ok_or_else(truncated)?;
        pos += key_len;

        index.insert(key.to_vec(), u64::from_le_bytes(offset));
    }
    Ok(index)
}
