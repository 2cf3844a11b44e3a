//! # SplayLSM
//!
//! A log-structured key-value store that keeps frequently read keys near the
//! top of the tree, the way a splay tree moves accessed nodes to the root:
//! - Write-Ahead Logging (WAL) for durability
//! - Leveled SSTables with background compaction
//! - Merge operator and compaction filter extension points
//! - Read-triggered promotion of keys that compactions pushed down
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       SplayStore                             │
//! │        insert / get / delete  (tagged records)               │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │           SplayPolicy (write-back)
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                        Engine                                │
//! │            (Single Writer / Multi Reader)                    │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │     WAL     │          │  MemTable   │
//!   │  (Append)   │          │  (RwLock)   │
//!   └─────────────┘          └──────┬──────┘
//!                                   │ flush
//!                                   ▼
//!                           ┌─────────────┐     SplayMerge
//!                           │  L0 .. Ln   │ ◄── SplayFilter
//!                           │ (SSTables)  │     (compaction)
//!                           └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod wal;
pub mod memtable;
pub mod storage;
pub mod extension;
mod resolve;
pub mod stats;
pub mod engine;

pub mod splay;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{Result, SplayError};
pub use config::{Config, ConfigBuilder, WalSyncStrategy};
pub use engine::Engine;
pub use extension::{CompactionFilter, Extensions, FilterDecision, MergeOperator};
pub use splay::{SplayStats, SplayStore};
pub use stats::EngineStats;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of SplayLSM
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
