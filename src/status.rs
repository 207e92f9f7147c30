//! Indexing run state shared between the indexing task and its observers.

use std::sync::{
    Arc,
    RwLock,
    atomic::{AtomicBool, Ordering},
};

use serde::Serialize;

use crate::{
    error::{Error, Result},
    indexer::IndexSummary,
};

/// Where the indexing task currently is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum IndexingStatus {
    #[default]
    Idle,
    Running {
        current_file: Option<String>,
        /// 1-based ordinal of the file being processed; 0 while scanning.
        progress: usize,
        total: usize,
    },
    Completed {
        summary: IndexSummary,
    },
    Failed {
        error: String,
    },
}

/// JSON view of an [`IndexingStatus`], shaped for the status endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub is_indexing: bool,
    pub current_file: Option<String>,
    pub progress: usize,
    pub total: usize,
    pub last_result: Option<serde_json::Value>,
}

impl IndexingStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, IndexingStatus::Running { .. })
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        match self {
            IndexingStatus::Idle => StatusSnapshot {
                is_indexing: false,
                current_file: None,
                progress: 0,
                total: 0,
                last_result: None,
            },
            IndexingStatus::Running {
                current_file,
                progress,
                total,
            } => StatusSnapshot {
                is_indexing: true,
                current_file: current_file.clone(),
                progress: *progress,
                total: *total,
                last_result: None,
            },
            IndexingStatus::Completed { summary } => StatusSnapshot {
                is_indexing: false,
                current_file: None,
                progress: summary.total_files,
                total: summary.total_files,
                last_result: serde_json::to_value(summary).ok(),
            },
            IndexingStatus::Failed { error } => StatusSnapshot {
                is_indexing: false,
                current_file: None,
                progress: 0,
                total: 0,
                last_result: Some(serde_json::json!({ "error": error })),
            },
        }
    }
}

/// Cheaply cloneable handle to the shared indexing status.
///
/// Observers read snapshots with [`StatusHandle::get`]. Only the holder of
/// the [`RunGuard`] returned by [`StatusHandle::try_start`] updates it.
#[derive(Debug, Clone, Default)]
pub struct StatusHandle {
    status: Arc<RwLock<IndexingStatus>>,
    running: Arc<AtomicBool>,
}

impl StatusHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current status.
    pub fn get(&self) -> IndexingStatus {
        match self.status.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Claim the single indexing slot.
    ///
    /// Fails with [`Error::IndexingInProgress`] while another run holds it.
    pub fn try_start(&self) -> Result<RunGuard> {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| Error::IndexingInProgress)?;

        let guard = RunGuard {
            handle: self.clone(),
        };
        guard.set(IndexingStatus::Running {
            current_file: None,
            progress: 0,
            total: 0,
        });
        Ok(guard)
    }

    fn set(&self, status: IndexingStatus) {
        match self.status.write() {
            Ok(mut guard) => *guard = status,
            Err(poisoned) => *poisoned.into_inner() = status,
        }
    }
}

/// Exclusive right to run an indexing pass and update the status.
///
/// Dropping the guard frees the slot. A guard dropped while the status still
/// says `Running` (a panic in the run) records the run as failed.
#[derive(Debug)]
pub struct RunGuard {
    handle: StatusHandle,
}

impl RunGuard {
    pub fn set(&self, status: IndexingStatus) {
        self.handle.set(status);
    }

    pub fn progress(&self, current_file: &str, progress: usize, total: usize) {
        self.set(IndexingStatus::Running {
            current_file: Some(current_file.to_string()),
            progress,
            total,
        });
    }

    /// Record the outcome of the run.
    pub fn finish(self, outcome: &Result<IndexSummary>) {
        self.set(match outcome {
            Ok(summary) => IndexingStatus::Completed {
                summary: summary.clone(),
            },
            Err(e) => IndexingStatus::Failed {
                error: e.to_string(),
            },
        });
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if self.handle.get().is_running() {
            self.handle.set(IndexingStatus::Failed {
                error: "indexing run aborted".into(),
            });
        }
        self.handle.running.store(false, Ordering::SeqCst);
    }
}
