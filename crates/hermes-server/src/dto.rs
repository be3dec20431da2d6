use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use hermes_core::models::{ExtractionResult, Snapshot};
use hermes_core::run_state::{RunOutcome, RunRecord, RunStatus};

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct SnapshotResponse {
    /// Catalog metadata
    pub info: serde_json::Value,
    /// One entry per catalog target, in catalog order
    pub results: Vec<ResultResponse>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ResultResponse {
    pub name: String,
    pub request: RequestResponse,
    /// Parsed page body, or `{"rawText": ...}` when it was not JSON
    pub data: serde_json::Value,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct RequestResponse {
    pub method: String,
    pub url: String,
}

impl From<&ExtractionResult> for ResultResponse {
    fn from(result: &ExtractionResult) -> Self {
        Self {
            name: result.name.clone(),
            request: RequestResponse {
                method: result.request.method.to_string(),
                url: result.request.url.clone(),
            },
            data: result.data.clone(),
        }
    }
}

impl From<&Snapshot> for SnapshotResponse {
    fn from(snapshot: &Snapshot) -> Self {
        Self {
            info: snapshot.info.clone(),
            results: snapshot.results.iter().map(Into::into).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Run status
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct StatusResponse {
    pub running: bool,
    pub runs_started: u64,
    pub runs_succeeded: u64,
    pub runs_failed: u64,
    pub runs_skipped: u64,
    pub targets: usize,
    pub last_run: Option<RunRecordResponse>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct RunRecordResponse {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// `succeeded` or `failed`
    pub status: String,
    pub results: Option<usize>,
    pub error_kind: Option<String>,
    pub reason: Option<String>,
}

impl From<RunRecord> for RunRecordResponse {
    fn from(record: RunRecord) -> Self {
        let (status, results, error_kind, reason) = match record.outcome {
            RunOutcome::Succeeded { results } => ("succeeded", Some(results), None, None),
            RunOutcome::Failed { kind, reason } => ("failed", None, Some(kind), Some(reason)),
        };
        Self {
            run_id: record.run_id,
            started_at: record.started_at,
            finished_at: record.finished_at,
            status: status.to_string(),
            results,
            error_kind,
            reason,
        }
    }
}

impl StatusResponse {
    pub fn new(status: RunStatus, targets: usize) -> Self {
        Self {
            running: status.running,
            runs_started: status.runs_started,
            runs_succeeded: status.runs_succeeded,
            runs_failed: status.runs_failed,
            runs_skipped: status.runs_skipped,
            targets,
            last_run: status.last_run.map(Into::into),
        }
    }
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
}
