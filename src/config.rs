//! Configuration for SplayLSM
//!
//! Centralized configuration with defaults matching the splaying experiments:
//! small memtables and a fanout of two so that entries sink through the
//! levels quickly and promotion has something to undo.

use std::path::PathBuf;

use crate::error::{Result, SplayError};

/// Main configuration for a SplayLSM instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all data files (WAL, SSTables, etc.)
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── wal.log          (write-ahead log)
    ///     └── sstables/        (SSTable files, one level tag per file)
    pub data_dir: PathBuf,

    // -------------------------------------------------------------------------
    // WAL Configuration
    // -------------------------------------------------------------------------
    /// Sync strategy: how often to fsync WAL
    pub wal_sync_strategy: WalSyncStrategy,

    // -------------------------------------------------------------------------
    // MemTable Configuration
    // -------------------------------------------------------------------------
    /// Max size of memtable before flush (in bytes)
    pub memtable_size_bytes: usize,

    // -------------------------------------------------------------------------
    // Read Path Configuration
    // -------------------------------------------------------------------------
    /// Budget of the shared block cache (in bytes). 0 disables the cache.
    pub block_cache_bytes: usize,

    /// Bypass userspace read buffering on SSTable lookups
    pub direct_io: bool,

    // -------------------------------------------------------------------------
    // Leveling Configuration
    // -------------------------------------------------------------------------
    /// Size ratio between adjacent levels; also the L0 file-count trigger
    pub level_fanout_multiplier: usize,

    /// Total number of levels, L0 included
    pub num_levels: usize,

    /// Run compactions on a background thread (otherwise inline after flush)
    pub background_compaction: bool,

    // -------------------------------------------------------------------------
    // Splay Configuration
    // -------------------------------------------------------------------------
    /// Promote merged entries on read. When off, reads never write back.
    pub splay_enabled: bool,
}

/// WAL sync strategy
#[derive(Debug, Clone, Copy)]
pub enum WalSyncStrategy {
    /// fsync after every write (safest, slowest)
    EveryWrite,

    /// fsync after N uncommitted entries (balanced durability/performance)
    EveryNEntries { count: usize },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./splaylsm_data"),
            wal_sync_strategy: WalSyncStrategy::EveryNEntries { count: 100 },
            memtable_size_bytes: 128 * 1024, // 128 KB
            block_cache_bytes: 128 * 1024,   // 128 KB
            direct_io: true,
            level_fanout_multiplier: 2,
            num_levels: 7,
            background_compaction: true,
            splay_enabled: true,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.memtable_size_bytes == 0 {
            return Err(SplayError::Config(
                "memtable_size_bytes must be greater than zero".to_string(),
            ));
        }
        if self.level_fanout_multiplier < 2 {
            return Err(SplayError::Config(format!(
                "level_fanout_multiplier must be at least 2, got {}",
                self.level_fanout_multiplier
            )));
        }
        if self.num_levels < 2 {
            return Err(SplayError::Config(format!(
                "num_levels must be at least 2, got {}",
                self.num_levels
            )));
        }
        Ok(())
    }

    /// Size budget of level `level` (>= 1) before it is pushed down
    ///
    /// L1 holds `multiplier * memtable` bytes, each deeper level `multiplier`
    /// times the one above it.
    pub fn max_bytes_for_level(&self, level: usize) -> u64 {
        let base = (self.level_fanout_multiplier * self.memtable_size_bytes) as u64;
        let exponent = level.saturating_sub(1) as u32;
        base.saturating_mul((self.level_fanout_multiplier as u64).saturating_pow(exponent))
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all storage)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the WAL sync strategy
    pub fn wal_sync_strategy(mut self, strategy: WalSyncStrategy) -> Self {
        self.config.wal_sync_strategy = strategy;
        self
    }

    /// Set the memtable size limit (in bytes)
    pub fn memtable_size_bytes(mut self, size: usize) -> Self {
        self.config.memtable_size_bytes = size;
        self
    }

    /// Set the block cache budget (in bytes, 0 disables)
    pub fn block_cache_bytes(mut self, size: usize) -> Self {
        self.config.block_cache_bytes = size;
        self
    }

    /// Enable or disable unbuffered SSTable reads
    pub fn direct_io(mut self, enabled: bool) -> Self {
        self.config.direct_io = enabled;
        self
    }

    /// Set the level fanout multiplier
    pub fn level_fanout_multiplier(mut self, multiplier: usize) -> Self {
        self.config.level_fanout_multiplier = multiplier;
        self
    }

    /// Set the number of levels
    pub fn num_levels(mut self, levels: usize) -> Self {
        self.config.num_levels = levels;
        self
    }

    /// Run compactions on a background thread or inline
    pub fn background_compaction(mut self, enabled: bool) -> Self {
        self.config.background_compaction = enabled;
        self
    }

    /// Enable or disable read-triggered promotion
    pub fn splay_enabled(mut self, enabled: bool) -> Self {
        self.config.splay_enabled = enabled;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
