//! WAL Entry definitions
//!
//! Defines the structure of individual WAL log entries and their framing.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SplayError};

/// Header size: LSN (8) + CRC (4) + Len (4) = 16 bytes
pub const HEADER_SIZE: usize = 16;

/// Upper bound on a single entry's payload; anything larger is a torn length field
pub const MAX_PAYLOAD_SIZE: u32 = 256 * 1024 * 1024;

/// A single entry in the WAL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalEntry {
    /// Log Sequence Number - monotonically increasing
    pub lsn: u64,

    /// The operation to perform
    pub operation: Operation,

    /// Timestamp (unix millis) when entry was created
    pub timestamp: u64,
}

/// Operations that can be logged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// Put a key-value pair
    Put { key: Vec<u8>, value: Vec<u8> },

    /// Queue a merge operand for a key
    Merge { key: Vec<u8>, operand: Vec<u8> },

    /// Delete a key
    Delete { key: Vec<u8> },
}

impl Operation {
    /// The key this operation targets
    pub fn key(&self) -> &[u8] {
        match self {
            Operation::Put { key, .. } => key,
            Operation::Merge { key, .. } => key,
            Operation::Delete { key } => key,
        }
    }
}

/// Parsed fixed-size entry header
#[derive(Debug, Clone, Copy)]
pub(crate) struct EntryHeader {
    pub lsn: u64,
    pub crc: u32,
    pub len: u32,
}

impl EntryHeader {
    pub(crate) fn parse(bytes: &[u8; HEADER_SIZE]) -> Self {
        let mut lsn = [0u8; 8];
        let mut crc = [0u8; 4];
        let mut len = [0u8; 4];
        lsn.copy_from_slice(&bytes[0..8]);
        crc.copy_from_slice(&bytes[8..12]);
        len.copy_from_slice(&bytes[12..16]);
        Self {
            lsn: u64::from_le_bytes(lsn),
            crc: u32::from_le_bytes(crc),
            len: u32::from_le_bytes(len),
        }
    }
}

impl WalEntry {
    /// Create an entry stamped with the current wall-clock time
    pub fn new(lsn: u64, operation: Operation) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            lsn,
            operation,
            timestamp,
        }
    }

    /// Serialize to the on-disk framing: header followed by bincode payload
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let payload = bincode::serialize(&(&self.operation, self.timestamp))
            .map_err(|e| SplayError::Serialization(e.to_string()))?;

        if payload.len() > MAX_PAYLOAD_SIZE as usize {
            return Err(SplayError::WalWrite(format!(
                "entry payload of {} bytes exceeds the {} byte limit",
                payload.len(),
                MAX_PAYLOAD_SIZE
            )));
        }

        let len = payload.len() as u32;
        let crc = compute_crc(self.lsn, len, &payload);

        let mut bytes = Vec::with_capacity(HEADER_SIZE + payload.len());
        bytes.extend_from_slice(&self.lsn.to_le_bytes());
        bytes.extend_from_slice(&crc.to_le_bytes());
        bytes.extend_from_slice(&len.to_le_bytes());
        bytes.extend_from_slice(&payload);
        Ok(bytes)
    }

    /// Deserialize one entry from the front of `bytes`, verifying its CRC
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(SplayError::WalCorruption(format!(
                "truncated header: {} bytes, need {}",
                bytes.len(),
                HEADER_SIZE
            )));
        }

        let mut header_bytes = [0u8; HEADER_SIZE];
        header_bytes.copy_from_slice(&bytes[..HEADER_SIZE]);
        let header = EntryHeader::parse(&header_bytes);

        let end = HEADER_SIZE + header.len as usize;
        if header.len > MAX_PAYLOAD_SIZE || bytes.len() < end {
            return Err(SplayError::WalCorruption(format!(
                "truncated payload at lsn {}: {} bytes declared, {} available",
                header.lsn,
                header.len,
                bytes.len() - HEADER_SIZE
            )));
        }

        Self::from_parts(header, &bytes[HEADER_SIZE..end])
    }

    /// Rebuild an entry from a parsed header and its payload bytes
    pub(crate) fn from_parts(header: EntryHeader, payload: &[u8]) -> Result<Self> {
        let actual = compute_crc(header.lsn, header.len, payload);
        if actual != header.crc {
            return Err(SplayError::WalCorruption(format!(
                "CRC mismatch at lsn {}: expected {:#010x}, got {:#010x}",
                header.lsn, header.crc, actual
            )));
        }

        let (operation, timestamp): (Operation, u64) = bincode::deserialize(payload)
            .map_err(|e| SplayError::WalCorruption(format!("undecodable payload: {}", e)))?;

        Ok(Self {
            lsn: header.lsn,
            operation,
            timestamp,
        })
    }

    /// Exact number of bytes `serialize` will produce
    pub fn serialized_size(&self) -> Result<usize> {
        let payload = bincode::serialized_size(&(&self.operation, self.timestamp))
            .map_err(|e| SplayError::Serialization(e.to_string()))?;
        Ok(HEADER_SIZE + payload as usize)
    }
}

/// CRC over LSN, length and payload so a torn header is caught as well
fn compute_crc(lsn: u64, len: u32, payload: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&lsn.to_le_bytes());
    hasher.update(&len.to_le_bytes());
    hasher.update(payload);
    hasher.finalize()
}
