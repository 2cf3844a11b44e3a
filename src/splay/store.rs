//! Store facade
//!
//! `SplayStore` owns one engine with the splay merge operator and compaction
//! filter installed. Callers only ever see untagged payloads:
//!
//! ```text
//! insert(k, v) ──► engine.put(k, [0x00] ‖ v)
//! get(k)       ──► engine.get(k) ──► SplayPolicy ──► v
//!                                        │
//!                                        └─► engine.put(k, [0x01] ‖ v)   (merged bit was set)
//! ```
//!
//! Dropping the store releases the engine the same way `close` does, but
//! only `close` reports errors.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::Config;
use crate::engine::Engine;
use crate::error::{Result, SplayError};
use crate::extension::Extensions;

use super::codec::{encode_tagged, Tag};
use super::filter::SplayFilter;
use super::merge::SplayMerge;
use super::policy::{SplayMetrics, SplayPolicy, SplayStats};

/// Key-value store that promotes recently compacted keys on read
pub struct SplayStore {
    engine: Engine,
    policy: SplayPolicy,
    metrics: SplayMetrics,
    path: PathBuf,
}

impl SplayStore {
    /// Open (or create) a store at `path`
    ///
    /// `config.data_dir` is replaced by `path`; every other knob is passed
    /// to the engine as is.
    pub fn open(path: impl AsRef<Path>, config: Config) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut config = config;
        config.data_dir = path.clone();
        let policy = SplayPolicy::new(config.splay_enabled);

        let extensions = Extensions::new()
            .with_merge_operator(Arc::new(SplayMerge))
            .with_compaction_filter(Arc::new(SplayFilter));

        let engine = Engine::open_with_extensions(config, extensions).map_err(|e| {
            tracing::error!("Failed to open store at {}: {}", path.display(), e);
            SplayError::Open {
                path: path.clone(),
                source: Box::new(e),
            }
        })?;

        tracing::info!(
            "Opened splay store at {} (splaying {})",
            path.display(),
            if policy.is_enabled() { "on" } else { "off" }
        );

        Ok(Self {
            engine,
            policy,
            metrics: SplayMetrics::default(),
            path,
        })
    }

    /// Open with the default configuration
    pub fn open_default(path: impl AsRef<Path>) -> Result<Self> {
        Self::open(path, Config::default())
    }

    /// Store `value` under `key` with a cleared tag
    pub fn insert(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.engine.put(key, &encode_tagged(Tag::empty(), value))
    }

    /// Read `key`, promoting it if a compaction merged it since the last read
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.policy.get(&self.engine, &self.metrics, key)
    }

    pub fn delete(&self, key: &[u8]) -> Result<()> {
        self.engine.delete(key)
    }

    /// Flush, stop background compaction and sync the WAL
    pub fn close(self) -> Result<()> {
        let Self { engine, metrics, path, .. } = self;
        let stats = metrics.snapshot();
        tracing::info!(
            "Closing splay store at {} ({} reads, {} promotions)",
            path.display(),
            stats.reads,
            stats.promotions
        );
        engine.close()
    }

    /// Read-path counters
    pub fn stats(&self) -> SplayStats {
        self.metrics.snapshot()
    }

    pub fn policy(&self) -> SplayPolicy {
        self.policy
    }

    /// Underlying engine, for tooling and tests
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
