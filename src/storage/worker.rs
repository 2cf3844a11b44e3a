//! Background compaction worker
//!
//! One thread that runs pending compactions whenever a flush signals it.

use std::sync::Arc;
use std::thread;

use crossbeam::channel::{self, Receiver, Sender, TrySendError};

use crate::error::{Result, SplayError};
use crate::extension::Extensions;
use crate::stats::EngineMetrics;

use super::StorageManager;

pub(crate) enum WorkerMessage {
    Compact,
    Shutdown,
}

/// Handle to the background compaction thread
pub struct CompactionWorker {
    sender: Sender<WorkerMessage>,
    handle: Option<thread::JoinHandle<()>>,
}

impl CompactionWorker {
    pub fn spawn(
        storage: Arc<StorageManager>,
        ext: Extensions,
        metrics: Arc<EngineMetrics>,
    ) -> Result<Self> {
        // A single slot: a queued Compact already covers any later request
        let (sender, receiver) = channel::bounded(1);

        let handle = thread::Builder::new()
            .name("splaylsm-compaction".to_string())
            .spawn(move || Self::run(receiver, storage, ext, metrics))?;

        Ok(Self {
            sender,
            handle: Some(handle),
        })
    }

    /// Ask the worker to run compactions; coalesces with a pending request
    pub fn schedule(&self) {
        match self.sender.try_send(WorkerMessage::Compact) {
            Ok(()) | Err(TrySendError::Full(_)) => {}
            Err(TrySendError::Disconnected(_)) => {
                tracing::warn!("Compaction worker is gone; request dropped");
            }
        }
    }

    /// Stop the worker and wait for an in-flight compaction to finish
    pub fn shutdown(&mut self) -> Result<()> {
        let handle = match self.handle.take() {
            Some(handle) => handle,
            None => return Ok(()),
        };

        // Blocks while a Compact is queued; the worker drains it first
        let _ = self.sender.send(WorkerMessage::Shutdown);
        handle
            .join()
            .map_err(|_| SplayError::Storage("compaction worker panicked".to_string()))
    }

    fn run(
        receiver: Receiver<WorkerMessage>,
        storage: Arc<StorageManager>,
        ext: Extensions,
        metrics: Arc<EngineMetrics>,
    ) {
        tracing::debug!("Compaction worker started");
        for message in receiver.iter() {
            match message {
                WorkerMessage::Compact => match storage.compact_pending(&ext, &metrics) {
                    Ok(0) => {}
                    Ok(n) => tracing::debug!("Background compaction ran {} job(s)", n),
                    Err(e) => tracing::error!("Background compaction failed: {}", e),
                },
                WorkerMessage::Shutdown => break,
            }
        }
        tracing::debug!("Compaction worker stopped");
    }
}

impl Drop for CompactionWorker {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            tracing::error!("Compaction worker shutdown failed: {}", e);
        }
    }
}
