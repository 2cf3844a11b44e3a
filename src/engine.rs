//! Engine Module
//!
//! The core storage engine that coordinates all components.
//!
//! ## Responsibilities
//! - Coordinate WAL, MemTable, and Storage
//! - Handle concurrent read/write access
//! - Trigger flushes when MemTable is full, and compactions after flushes
//! - Manage crash recovery on startup
//! - Call the installed merge operator and compaction filter

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::config::Config;
use crate::error::{Result, SplayError};
use crate::extension::Extensions;
use crate::memtable::{Entry, MemTable};
use crate::resolve;
use crate::stats::{EngineMetrics, EngineStats};
use crate::storage::{CompactionWorker, StorageManager};
use crate::wal::{Operation, WalRecovery, WalWriter};

/// What a merge does to the memtable, decided before it is logged
enum StagedMerge {
    /// Operand folded onto a memtable value or tombstone
    Replace(Vec<u8>),
    /// Operand queued behind whatever the memtable holds
    Append,
}

/// The main storage engine
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
///
/// - **Writes** (put/merge/delete/flush): Serialized by `write_lock`
///   - Only ONE write operation at a time
///   - Must acquire: write_lock → WAL → memtable → storage (write)
///
/// - **Reads** (get): Concurrent
///   - No write_lock needed
///   - `flush_lock` (read side) keeps a flush from moving the memtable into
///     level 0 halfway through a lookup
///   - SSTable readers use interior mutability, so lookups share the level set
///
/// - **Compaction**: background worker thread (or inline after flush),
///   serialized inside the storage manager
///
/// A failed flush halts put/merge/delete until a later `flush()` succeeds;
/// reads keep working.
pub struct Engine {
    /// Engine configuration
    config: Config,

    /// Directory for all data files (SSTables)
    storage_dir: PathBuf,

    /// Write-ahead log for durability (exclusive access needed)
    wal: Mutex<WalWriter>,

    /// In-memory table for recent writes (internal RwLock)
    memtable: MemTable,

    /// Persistent storage manager, shared with the compaction worker
    storage: Arc<StorageManager>,

    extensions: Extensions,

    metrics: Arc<EngineMetrics>,

    /// Background compaction thread, if enabled
    worker: Mutex<Option<CompactionWorker>>,

    /// Serializes write operations (put/merge/delete/flush)
    write_lock: Mutex<()>,

    /// Held for writing while a flush swaps the memtable into level 0
    flush_lock: RwLock<()>,

    /// Set by a failed flush, cleared by the next successful one
    write_halt: Mutex<Option<String>>,

    closed: AtomicBool,
}

impl Engine {
    // =========================================================================
    // Internal Path Constants
    // =========================================================================
    const WAL_FILENAME: &'static str = "wal.log";
    const SSTABLE_DIR: &'static str = "sstables";

    /// Open or create an engine with the given config and no extensions
    pub fn open(config: Config) -> Result<Self> {
        Self::open_with_extensions(config, Extensions::default())
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        let mut config = Config::default();
        config.data_dir = path.to_path_buf();
        Self::open(config)
    }

    /// Open or create an engine with a merge operator and/or compaction filter
    ///
    /// On startup:
    /// 1. Validate config, create data directories
    /// 2. Load existing SSTables (repairing interrupted compactions)
    /// 3. Replay the WAL into the memtable, flush it, truncate the WAL
    /// 4. Start the compaction worker
    pub fn open_with_extensions(config: Config, extensions: Extensions) -> Result<Self> {
        config.validate()?;
        fs::create_dir_all(&config.data_dir)?;

        // Paths are derived from data_dir, not configurable
        let storage_dir = config.data_dir.join(Self::SSTABLE_DIR);
        let wal_path = config.data_dir.join(Self::WAL_FILENAME);
        fs::create_dir_all(&storage_dir)?;

        let storage = Arc::new(StorageManager::open_with_config(&storage_dir, &config)?);
        let memtable = MemTable::new();
        let metrics = Arc::new(EngineMetrics::default());

        let mut recovered = 0;
        if wal_path.exists() {
            let (entries, result) = WalRecovery::recover(&wal_path)?;
            if result.entries_recovered > 0 || result.entries_corrupted > 0 {
                tracing::info!(
                    "WAL recovery: {} entries recovered, {} corrupted, last_lsn={}",
                    result.entries_recovered,
                    result.entries_corrupted,
                    result.last_lsn
                );
            }
            recovered = result.entries_recovered;

            for entry in entries {
                match entry.operation {
                    Operation::Put { key, value } => {
                        memtable.put(key, value);
                    }
                    Operation::Merge { key, operand } => {
                        let staged = Self::stage_merge(&memtable, &extensions, &metrics, &key, &operand)
                            .unwrap_or_else(|e| {
                                tracing::warn!(
                                    "Replayed merge for {:?} left unresolved: {}",
                                    String::from_utf8_lossy(&key),
                                    e
                                );
                                StagedMerge::Append
                            });
                        Self::apply_merge(&memtable, key, operand, staged);
                    }
                    Operation::Delete { key } => {
                        memtable.delete(key);
                    }
                }
            }
        }

        let mut wal = WalWriter::open(&wal_path, config.wal_sync_strategy)?;

        // Make recovered data durable in an SSTable, then drop it from the log
        if !memtable.is_empty() {
            tracing::info!("Flushing {} recovered entries to SSTable", memtable.entry_count());
            storage.flush(&memtable)?;
            memtable.clear();
            metrics.flush();
        }
        wal.truncate()?;

        let worker = if config.background_compaction {
            Some(CompactionWorker::spawn(
                Arc::clone(&storage),
                extensions.clone(),
                Arc::clone(&metrics),
            )?)
        } else {
            None
        };

        tracing::info!(
            "Opened engine at {} ({} tables, {} WAL entries replayed, {:?})",
            config.data_dir.display(),
            storage.sstable_count(),
            recovered,
            extensions
        );

        let engine = Self {
            config,
            storage_dir,
            wal: Mutex::new(wal),
            memtable,
            storage,
            extensions,
            metrics,
            worker: Mutex::new(worker),
            write_lock: Mutex::new(()),
            flush_lock: RwLock::new(()),
            write_halt: Mutex::new(None),
            closed: AtomicBool::new(false),
        };

        // Recovered tables may have left a level over budget
        engine.after_flush();
        Ok(engine)
    }

    /// Get a value by key
    ///
    /// Search order:
    /// 1. MemTable (most recent writes)
    /// 2. SSTables, level 0 newest to oldest, then deeper levels
    ///
    /// Merge operands found on the way are folded with the merge operator.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let mut chain = Vec::new();
        {
            let _flush_guard = self.flush_lock.read();
            if let Some(entry) = self.memtable.get(key) {
                chain.push(entry);
            }
            self.storage.collect_chain(key, &mut chain)?;
        }
        resolve::read_chain(key, chain, &self.extensions, &self.metrics)
    }

    /// Put a key-value pair
    ///
    /// Steps:
    /// 1. Acquire write lock
    /// 2. Write to WAL (durability)
    /// 3. Write to MemTable
    /// 4. Check if flush needed
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let _write_guard = self.write_lock.lock();
        self.check_writable()?;

        self.wal.lock().append(Operation::Put {
            key: key.to_vec(),
            value: value.to_vec(),
        })?;

        let new_size = self.memtable.put(key.to_vec(), value.to_vec());
        self.metrics.put();

        if new_size >= self.config.memtable_size_bytes {
            self.flush_internal()?;
        }

        Ok(())
    }

    /// Record a merge operand for a key
    ///
    /// An operand landing on a value or tombstone in the memtable is folded
    /// right away; otherwise it waits for a read or compaction to resolve it.
    /// Fails without logging anything if no merge operator is installed or
    /// the fold fails.
    pub fn merge(&self, key: &[u8], operand: &[u8]) -> Result<()> {
        if self.extensions.merge_operator.is_none() {
            return Err(SplayError::MergeOperatorMissing { key: key.to_vec() });
        }

        let _write_guard = self.write_lock.lock();
        self.check_writable()?;

        let staged = Self::stage_merge(&self.memtable, &self.extensions, &self.metrics, key, operand)?;

        self.wal.lock().append(Operation::Merge {
            key: key.to_vec(),
            operand: operand.to_vec(),
        })?;

        let new_size = Self::apply_merge(&self.memtable, key.to_vec(), operand.to_vec(), staged);
        self.metrics.merge();

        if new_size >= self.config.memtable_size_bytes {
            self.flush_internal()?;
        }

        Ok(())
    }

    /// Delete a key
    ///
    /// Steps:
    /// 1. Acquire write lock
    /// 2. Write tombstone to WAL
    /// 3. Write tombstone to MemTable
    /// 4. Check if flush needed
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        let _write_guard = self.write_lock.lock();
        self.check_writable()?;

        self.wal.lock().append(Operation::Delete { key: key.to_vec() })?;

        let new_size = self.memtable.delete(key.to_vec());
        self.metrics.delete();

        if new_size >= self.config.memtable_size_bytes {
            self.flush_internal()?;
        }

        Ok(())
    }

    /// Flush memtable to disk (public API)
    ///
    /// Forces a flush regardless of memtable size. Also the way to resume
    /// writes after a failed flush.
    pub fn flush(&self) -> Result<()> {
        let _write_guard = self.write_lock.lock();
        self.flush_internal()
    }

    /// Flush, then push every level down into the deepest populated level
    ///
    /// Runs on the calling thread. Returns the number of compactions run.
    pub fn compact_all(&self) -> Result<usize> {
        self.flush()?;
        self.storage.compact_all(&self.extensions, &self.metrics)
    }

    /// Check the data checksums of every live SSTable
    pub fn verify_tables(&self) -> Result<usize> {
        self.storage.verify_all()
    }

    /// Snapshot of the engine counters
    pub fn stats(&self) -> EngineStats {
        self.metrics.snapshot(self.storage.level_counts())
    }

    /// Close the engine gracefully
    ///
    /// Flushes any pending data, stops background compaction and syncs the WAL
    pub fn close(self) -> Result<()> {
        self.shutdown()
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Internal flush implementation (called with write lock held)
    fn flush_internal(&self) -> Result<()> {
        if self.memtable.is_empty() {
            return Ok(());
        }

        {
            let _flush_guard = self.flush_lock.write();
            let table = match self.storage.flush(&self.memtable) {
                Ok(table) => table,
                Err(e) => {
                    tracing::error!("Flush failed, halting writes: {}", e);
                    *self.write_halt.lock() = Some(e.to_string());
                    return Err(e);
                }
            };
            self.memtable.clear();
            tracing::debug!(
                "Flushed {} entries ({} bytes) to {}",
                table.entry_count,
                table.file_size,
                table.path.display()
            );
        }

        // Entries are durable in the SSTable now
        self.wal.lock().truncate()?;
        self.metrics.flush();
        if self.write_halt.lock().take().is_some() {
            tracing::info!("Flush succeeded, writes resumed");
        }

        self.after_flush();
        Ok(())
    }

    fn check_writable(&self) -> Result<()> {
        match self.write_halt.lock().as_ref() {
            Some(reason) => Err(SplayError::WritesHalted(reason.clone())),
            None => Ok(()),
        }
    }

    /// Whether a failed flush is currently rejecting writes
    pub fn writes_halted(&self) -> bool {
        self.write_halt.lock().is_some()
    }

    /// Hand pending compactions to the worker, or run them inline
    fn after_flush(&self) {
        if let Some(worker) = self.worker.lock().as_ref() {
            worker.schedule();
            return;
        }
        if let Err(e) = self.storage.compact_pending(&self.extensions, &self.metrics) {
            tracing::error!("Inline compaction failed: {}", e);
        }
    }

    fn stage_merge(
        memtable: &MemTable,
        extensions: &Extensions,
        metrics: &EngineMetrics,
        key: &[u8],
        operand: &[u8],
    ) -> Result<StagedMerge> {
        let existing = match memtable.get(key) {
            Some(Entry::Value(v)) => Some(v),
            Some(Entry::Tombstone) => None,
            Some(Entry::Merge(_)) | None => return Ok(StagedMerge::Append),
        };
        let merged = resolve::full_merge(
            key,
            existing.as_deref(),
            &[operand.to_vec()],
            extensions,
            metrics,
        )?;
        Ok(StagedMerge::Replace(merged))
    }

    fn apply_merge(memtable: &MemTable, key: Vec<u8>, operand: Vec<u8>, staged: StagedMerge) -> usize {
        match staged {
            StagedMerge::Replace(value) => memtable.put(key, value),
            StagedMerge::Append => memtable.push_operand(key, operand),
        }
    }

    fn shutdown(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        self.flush()?;

        if let Some(mut worker) = self.worker.lock().take() {
            worker.shutdown()?;
        }

        self.wal.lock().sync()?;
        tracing::info!("Closed engine at {}", self.config.data_dir.display());
        Ok(())
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Get the storage directory path (where SSTables are stored)
    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    /// Get the current memtable size
    pub fn memtable_size(&self) -> usize {
        self.memtable.size()
    }

    /// Get the memtable entry count
    pub fn memtable_entry_count(&self) -> usize {
        self.memtable.entry_count()
    }

    /// Get the number of SSTables
    pub fn sstable_count(&self) -> usize {
        self.storage.sstable_count()
    }

    /// Number of SSTables per level, level 0 first
    pub fn level_counts(&self) -> Vec<usize> {
        self.storage.level_counts()
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    /// Direct access to the storage layer (tooling and tests)
    pub fn storage(&self) -> &StorageManager {
        &self.storage
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            tracing::error!("Engine shutdown on drop failed: {}", e);
        }
    }
}
