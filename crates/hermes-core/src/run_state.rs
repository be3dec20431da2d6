//! Run bookkeeping: the overlap guard and the last observable run outcome.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;

/// How a finished run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    Succeeded { results: usize },
    Failed { kind: String, reason: String },
}

impl RunOutcome {
    pub fn failed(error: &AppError) -> Self {
        RunOutcome::Failed {
            kind: error.kind().to_string(),
            reason: error.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Succeeded { .. })
    }
}

/// One finished run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunRecord {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: RunOutcome,
}

/// Point-in-time copy of the tracker, suitable for serving.
#[derive(Debug, Clone, Serialize)]
pub struct RunStatus {
    pub running: bool,
    pub runs_started: u64,
    pub runs_succeeded: u64,
    pub runs_failed: u64,
    pub runs_skipped: u64,
    pub last_run: Option<RunRecord>,
}

/// Shared run state. At most one run may hold the guard at a time.
#[derive(Debug, Default)]
pub struct RunTracker {
    in_progress: AtomicBool,
    started: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
    last: RwLock<Option<RunRecord>>,
}

impl RunTracker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Claim the run slot. Returns `None` (and counts a skip) if a run is
    /// already in progress.
    pub fn try_begin(self: &Arc<Self>) -> Option<RunGuard> {
        if self
            .in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            self.skipped.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        self.started.fetch_add(1, Ordering::AcqRel);
        Some(RunGuard {
            tracker: Arc::clone(self),
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
        })
    }

    pub fn is_running(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    /// Number of runs that have claimed the slot so far.
    pub fn runs_started(&self) -> u64 {
        self.started.load(Ordering::Acquire)
    }

    pub fn last_run(&self) -> Option<RunRecord> {
        self.last
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn status(&self) -> RunStatus {
        RunStatus {
            running: self.is_running(),
            runs_started: self.runs_started(),
            runs_succeeded: self.succeeded.load(Ordering::Relaxed),
            runs_failed: self.failed.load(Ordering::Relaxed),
            runs_skipped: self.skipped.load(Ordering::Relaxed),
            last_run: self.last_run(),
        }
    }

    fn record(&self, record: RunRecord) {
        if record.outcome.is_success() {
            self.succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
        *self
            .last
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(record);
    }
}

/// Held for the duration of a run; releases the slot on drop.
#[derive(Debug)]
pub struct RunGuard {
    tracker: Arc<RunTracker>,
    run_id: Uuid,
    started_at: DateTime<Utc>,
}

impl RunGuard {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Record the outcome and release the slot.
    pub fn finish(self, outcome: RunOutcome) -> RunRecord {
        let record = RunRecord {
            run_id: self.run_id,
            started_at: self.started_at,
            finished_at: Utc::now(),
            outcome,
        };
        self.tracker.record(record.clone());
        record
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.tracker.in_progress.store(false, Ordering::Release);
    }
}
