//! Error types for SplayLSM
//!
//! Provides a unified error type for all operations, engine and splay layer alike.

use std::path::PathBuf;

use thiserror::Error;

use crate::splay::DecodeError;

/// Result type alias using SplayError
pub type Result<T> = std::result::Result<T, SplayError>;

/// Unified error type for SplayLSM operations
#[derive(Debug, Error)]
pub enum SplayError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Lifecycle Errors
    // -------------------------------------------------------------------------
    #[error("Failed to open store at {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: Box<SplayError>,
    },

    // -------------------------------------------------------------------------
    // WAL Errors
    // -------------------------------------------------------------------------
    #[error("WAL corruption detected: {0}")]
    WalCorruption(String),

    #[error("WAL write failed: {0}")]
    WalWrite(String),

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Writes halted after a failed flush: {0}")]
    WritesHalted(String),

    #[error("SSTable checksum mismatch in {}: expected {expected:#010x}, got {actual:#010x}", path.display())]
    ChecksumMismatch {
        path: PathBuf,
        expected: u32,
        actual: u32,
    },

    // -------------------------------------------------------------------------
    // Merge Errors
    // -------------------------------------------------------------------------
    #[error("Merge operator could not combine operands for key {key:?}")]
    MergeFailed { key: Vec<u8> },

    #[error("Merge operands present for key {key:?} but no merge operator is installed")]
    MergeOperatorMissing { key: Vec<u8> },

    // -------------------------------------------------------------------------
    // Consistency Errors
    // -------------------------------------------------------------------------
    #[error("Consistency fault for key {key:?}: {source}")]
    Consistency {
        key: Vec<u8>,
        #[source]
        source: DecodeError,
    },

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}
