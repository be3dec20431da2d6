use std::sync::Arc;

use hermes_core::{Catalog, RunTracker, SnapshotReader};
use hermes_db::{Database, SnapshotRepository};

/// Shared application state, available to all route handlers via `State<Arc<AppState>>`.
pub struct AppState {
    pub db: Database,
    pub catalog: Arc<Catalog>,
    /// Cache-first read path over the snapshot store.
    pub snapshots: SnapshotReader<SnapshotRepository>,
    /// Shared with the engine driving the scheduled runs.
    pub runs: Arc<RunTracker>,
}
