//! Storage Manager
//!
//! Manages the leveled set of SSTables and coordinates flushes and compactions.
//!
//! ## Responsibilities
//! - Discover existing SSTables on startup and repair interrupted compactions
//! - Gather a key's versions newest → oldest for reads
//! - Create new level-0 SSTables from MemTable flushes
//! - Pick, run and install compactions
//!
//! ## Layout
//! ```text
//! L0: sstable_000009_L0.sst  sstable_000008_L0.sst   (newest first, may overlap)
//! L1: sstable_000007_L1.sst                          (at most one table)
//! L2: sstable_000004_L2.sst
//! ...
//! ```
//!
//! Ids are allocated under the manifest lock together with the compaction
//! input snapshot, so a table with a lower id than the table one level below
//! it has already been merged into that table.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::config::Config;
use crate::error::{Result, SplayError};
use crate::extension::Extensions;
use crate::memtable::{Entry, MemTable};
use crate::resolve;
use crate::stats::EngineMetrics;

use super::cache::BlockCache;
use super::compaction::{self, CompactionOutcome, CompactionPlan};
use super::{SSTable, SSTableBuilder, SSTableReader};

const TABLE_PREFIX: &str = "sstable_";
const TABLE_SUFFIX: &str = ".sst";
const TMP_SUFFIX: &str = ".tmp";

/// Manages the storage layer
///
/// ## Concurrency:
/// - `levels`: RwLock (lookups share it, installs take it exclusively)
/// - `manifest_lock`: id allocation + level changes that must be atomic with it
/// - `compaction_lock`: one compaction at a time
/// - All methods use `&self`
pub struct StorageManager {
    /// Directory where SSTables are stored
    data_dir: PathBuf,

    config: Config,

    /// Open readers per level; level 0 ordered newest → oldest
    levels: RwLock<Vec<Vec<Arc<SSTableReader>>>>,

    /// Next ID for creating new SSTables
    next_sstable_id: AtomicU64,

    manifest_lock: Mutex<()>,
    compaction_lock: Mutex<()>,

    cache: Option<Arc<BlockCache>>,
}

impl StorageManager {
    /// Open or create storage in the given directory with default settings
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_config(path, &Config::default())
    }

    /// Open or create storage in the given directory
    ///
    /// On startup:
    /// 1. Create directory if it doesn't exist
    /// 2. Remove unfinished `*.tmp` tables
    /// 3. Delete tables already merged into the level below
    /// 4. Open readers for the rest (loads indexes into RAM)
    pub fn open_with_config(path: &Path, config: &Config) -> Result<Self> {
        fs::create_dir_all(path)?;

        let num_levels = config.num_levels;
        let mut found: Vec<Vec<u64>> = vec![Vec::new(); num_levels];

        for entry in fs::read_dir(path)? {
            let file_path = entry?.path();
            if !file_path.is_file() {
                continue;
            }

            let name = file_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            if name.starts_with(TABLE_PREFIX) && name.ends_with(TMP_SUFFIX) {
                tracing::warn!("Removing unfinished SSTable {}", name);
                fs::remove_file(&file_path)?;
                continue;
            }

            if let Some((id, level)) = Self::parse_table_name(&name) {
                if level >= num_levels {
                    return Err(SplayError::Storage(format!(
                        "{} belongs to level {} but only {} levels are configured",
                        name, level, num_levels
                    )));
                }
                found[level].push(id);
            }
        }

        let max_id = found.iter().flatten().copied().max();

        for (level, id) in Self::superseded_tables(&mut found) {
            tracing::warn!(
                "Removing SSTable {} at L{} left behind by an interrupted compaction",
                id,
                level
            );
            fs::remove_file(Self::table_path_with_dir(path, id, level))?;
        }

        let cache = BlockCache::new(config.block_cache_bytes).map(Arc::new);

        let mut levels = Vec::with_capacity(num_levels);
        for (level, ids) in found.iter_mut().enumerate() {
            // Newest first
            ids.sort_unstable_by(|a, b| b.cmp(a));
            let mut tables = Vec::with_capacity(ids.len());
            for &id in ids.iter() {
                let table_path = Self::table_path_with_dir(path, id, level);
                tables.push(Arc::new(SSTableReader::open_with(
                    &table_path,
                    id,
                    cache.clone(),
                    config.direct_io,
                )?));
            }
            levels.push(tables);
        }

        let next_id = max_id.map(|id| id + 1).unwrap_or(1);

        Ok(Self {
            data_dir: path.to_path_buf(),
            config: config.clone(),
            levels: RwLock::new(levels),
            next_sstable_id: AtomicU64::new(next_id),
            manifest_lock: Mutex::new(()),
            compaction_lock: Mutex::new(()),
            cache,
        })
    }

    /// Remove and return tables that a finished compaction already replaced
    ///
    /// A table is superseded when a table one level below carries a higher
    /// id, or when a level ≥ 1 holds a newer table than it.
    fn superseded_tables(found: &mut [Vec<u64>]) -> Vec<(usize, u64)> {
        let mut removed = Vec::new();

        for level in 0..found.len() {
            let newest_below = found.get(level + 1).and_then(|ids| ids.iter().copied().max());
            let newest_here = found[level].iter().copied().max();

            found[level].retain(|&id| {
                let merged_below = newest_below.map(|below| id < below).unwrap_or(false);
                let replaced_here = level > 0 && newest_here.map(|n| id < n).unwrap_or(false);
                if merged_below || replaced_here {
                    removed.push((level, id));
                    false
                } else {
                    true
                }
            });
        }

        removed
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Append the key's versions, newest → oldest, until a value or tombstone
    ///
    /// Entries already in `chain` (e.g. from the memtable) count as newer.
    pub fn collect_chain(&self, key: &[u8], chain: &mut Vec<Entry>) -> Result<()> {
        if resolve::chain_complete(chain) {
            return Ok(());
        }

        let levels = self.levels.read();
        for table in levels.iter().flatten() {
            // Skip SSTable if key is outside its range (O(1) check)
            if !table.might_contain(key) {
                continue;
            }
            if let Some(entry) = table.get(key)? {
                let is_base = entry.is_base();
                chain.push(entry);
                if is_base {
                    break;
                }
            }
        }
        Ok(())
    }

    /// Get a value by key without any extensions installed
    ///
    /// Returns:
    /// - `Ok(Some(value))` : newest version is a value
    /// - `Ok(None)` : key not found, or found tombstone (deleted)
    /// - `Err(MergeOperatorMissing)` : pending merge operands
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let mut chain = Vec::new();
        self.collect_chain(key, &mut chain)?;
        resolve::read_chain(key, chain, &Extensions::default(), &EngineMetrics::default())
    }

    // =========================================================================
    // Flush
    // =========================================================================

    /// Flush a MemTable to a new level-0 SSTable
    pub fn flush(&self, memtable: &MemTable) -> Result<SSTable> {
        if memtable.is_empty() {
            return Err(SplayError::Storage(
                "Cannot flush empty MemTable".to_string(),
            ));
        }

        // Held across build and insert: a compaction snapshot either sees
        // this table or reserves its output id after it.
        let _manifest = self.manifest_lock.lock();

        let id = self.next_sstable_id.fetch_add(1, Ordering::SeqCst);
        let entries = memtable.iter();
        let metadata = self.write_table(id, 0, |builder| {
            for (key, entry) in &entries {
                builder.add_entry(key, entry)?;
            }
            Ok(())
        })?;

        let reader = self.open_reader(&metadata.path, id)?;
        self.levels.write()[0].insert(0, Arc::new(reader));

        tracing::debug!(
            "Flushed memtable to L0 table {} ({} entries, {} bytes)",
            id,
            metadata.entry_count,
            metadata.file_size
        );
        Ok(metadata)
    }

    // =========================================================================
    // Compaction
    // =========================================================================

    /// The shallowest level that is over its budget, if any
    ///
    /// Level 0 is over budget once it holds `level_fanout_multiplier` tables;
    /// deeper levels once their bytes exceed `max_bytes_for_level`.
    pub fn pick_compaction_level(&self) -> Option<usize> {
        let levels = self.levels.read();
        if levels[0].len() >= self.config.level_fanout_multiplier {
            return Some(0);
        }
        (1..levels.len() - 1).find(|&level| {
            let size: u64 = levels[level].iter().map(|t| t.file_size()).sum();
            size > self.config.max_bytes_for_level(level)
        })
    }

    /// Run compactions until every level is within budget
    ///
    /// Returns the number of compactions performed.
    pub fn compact_pending(&self, ext: &Extensions, metrics: &EngineMetrics) -> Result<usize> {
        let mut performed = 0;
        while let Some(level) = self.pick_compaction_level() {
            if self.compact_level(level, ext, metrics)?.is_none() {
                break;
            }
            performed += 1;
        }
        Ok(performed)
    }

    /// Push every level down into the deepest non-empty level (at least L1)
    pub fn compact_all(&self, ext: &Extensions, metrics: &EngineMetrics) -> Result<usize> {
        let deepest = {
            let levels = self.levels.read();
            levels
                .iter()
                .rposition(|tables| !tables.is_empty())
                .unwrap_or(0)
                .max(1)
        };

        let mut performed = 0;
        for level in 0..deepest {
            if self.compact_level(level, ext, metrics)?.is_some() {
                performed += 1;
            }
        }
        Ok(performed)
    }

    /// Merge all tables of `level` with the table of `level + 1`
    ///
    /// Returns `None` when the level is empty or is the last level.
    pub fn compact_level(
        &self,
        level: usize,
        ext: &Extensions,
        metrics: &EngineMetrics,
    ) -> Result<Option<CompactionOutcome>> {
        let _compaction = self.compaction_lock.lock();

        let plan = match self.plan_compaction(level) {
            Some(plan) => plan,
            None => return Ok(None),
        };
        let output_level = plan.output_level();

        let mut outcome = CompactionOutcome::default();
        let metadata = self.write_table(plan.output_id, output_level, |builder| {
            outcome = compaction::merge_into(&plan, builder, ext, metrics)?;
            Ok(())
        })?;
        let reader = Arc::new(self.open_reader(&metadata.path, plan.output_id)?);

        // Install
        let input_ids = plan.input_ids();
        {
            let _manifest = self.manifest_lock.lock();
            let mut levels = self.levels.write();
            levels[level].retain(|t| !input_ids.contains(&t.id()));
            levels[output_level].retain(|t| !input_ids.contains(&t.id()));
            levels[output_level].push(reader);
        }

        for table in &plan.inputs {
            if let Err(e) = fs::remove_file(table.path()) {
                tracing::warn!(
                    "Failed to delete compacted SSTable {}: {}",
                    table.path().display(),
                    e
                );
            }
            if let Some(cache) = &self.cache {
                cache.evict_table(table.id());
            }
        }

        metrics.compaction();
        tracing::debug!(
            "Compacted L{} -> L{}: {} tables ({} bytes) into table {} ({} bytes), {} entries read, {} written{}",
            level,
            output_level,
            input_ids.len(),
            plan.input_bytes(),
            plan.output_id,
            metadata.file_size,
            outcome.entries_read,
            outcome.entries_written,
            if plan.bottommost { ", bottommost" } else { "" }
        );
        Ok(Some(outcome))
    }

    fn plan_compaction(&self, level: usize) -> Option<CompactionPlan> {
        let _manifest = self.manifest_lock.lock();
        let levels = self.levels.read();

        if level + 1 >= levels.len() || levels[level].is_empty() {
            return None;
        }

        let mut inputs = levels[level].clone();
        inputs.extend(levels[level + 1].iter().cloned());
        let bottommost = levels[level + 2..].iter().all(|tables| tables.is_empty());
        let output_id = self.next_sstable_id.fetch_add(1, Ordering::SeqCst);

        Some(CompactionPlan {
            level,
            inputs,
            output_id,
            bottommost,
        })
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Get the number of SSTables across all levels
    pub fn sstable_count(&self) -> usize {
        self.levels.read().iter().map(Vec::len).sum()
    }

    /// Number of tables in each level, level 0 first
    pub fn level_counts(&self) -> Vec<usize> {
        self.levels.read().iter().map(Vec::len).collect()
    }

    /// Total file bytes in one level
    pub fn level_size(&self, level: usize) -> u64 {
        self.levels
            .read()
            .get(level)
            .map(|tables| tables.iter().map(|t| t.file_size()).sum())
            .unwrap_or(0)
    }

    /// Check the data checksum of every live table
    ///
    /// Returns the number of tables verified.
    pub fn verify_all(&self) -> Result<usize> {
        let tables: Vec<Arc<SSTableReader>> =
            self.levels.read().iter().flatten().cloned().collect();
        for table in &tables {
            table.verify()?;
        }
        Ok(tables.len())
    }

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Get the next SSTable ID (for testing/debugging)
    pub fn next_sstable_id(&self) -> u64 {
        self.next_sstable_id.load(Ordering::SeqCst)
    }

    /// The shared block cache, when enabled
    pub fn block_cache(&self) -> Option<&BlockCache> {
        self.cache.as_deref()
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Build a table at a temporary path and rename it into place
    fn write_table<F>(&self, id: u64, level: usize, fill: F) -> Result<SSTable>
    where
        F: FnOnce(&mut SSTableBuilder) -> Result<()>,
    {
        let final_path = self.table_path(id, level);
        let tmp_path = Self::tmp_path(&final_path);

        let result: Result<SSTable> = (|| {
            let mut builder = SSTableBuilder::new(&tmp_path)?;
            fill(&mut builder)?;
            let metadata = builder.finish()?;
            fs::rename(&tmp_path, &final_path)?;
            Ok(metadata)
        })();

        match result {
            Ok(mut metadata) => {
                metadata.path = final_path;
                Ok(metadata)
            }
            Err(e) => {
                let _ = fs::remove_file(&tmp_path);
                Err(e)
            }
        }
    }

    fn open_reader(&self, path: &Path, id: u64) -> Result<SSTableReader> {
        SSTableReader::open_with(path, id, self.cache.clone(), self.config.direct_io)
    }

    fn table_path(&self, id: u64, level: usize) -> PathBuf {
        Self::table_path_with_dir(&self.data_dir, id, level)
    }

    /// "sstable_000042_L1.sst"
    fn table_path_with_dir(dir: &Path, id: u64, level: usize) -> PathBuf {
        dir.join(format!("{}{:06}_L{}{}", TABLE_PREFIX, id, level, TABLE_SUFFIX))
    }

    fn tmp_path(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_owned();
        name.push(TMP_SUFFIX);
        PathBuf::from(name)
    }

    /// "sstable_000042_L1.sst" → Some((42, 1))
    fn parse_table_name(name: &str) -> Option<(u64, usize)> {
        let stem = name.strip_prefix(TABLE_PREFIX)?.strip_suffix(TABLE_SUFFIX)?;
        let (id, level) = stem.split_once("_L")?;
        Some((id.parse().ok()?, level.parse().ok()?))
    }
}
