use std::sync::Arc;

use crate::cache::SnapshotCache;
use crate::catalog::Catalog;
use crate::error::AppError;
use crate::models::Snapshot;
use crate::run_state::RunTracker;
use crate::traits::SnapshotStore;

/// Read path for the current snapshot: cache first, then the store.
#[derive(Clone)]
pub struct SnapshotReader<S: SnapshotStore> {
    catalog: Arc<Catalog>,
    cache: SnapshotCache,
    store: S,
    runs: Arc<RunTracker>,
}

impl<S: SnapshotStore> SnapshotReader<S> {
    /// `runs` must be the tracker shared with the engine writing `store`.
    pub fn new(
        catalog: Arc<Catalog>,
        cache: SnapshotCache,
        store: S,
        runs: Arc<RunTracker>,
    ) -> Self {
        Self {
            catalog,
            cache,
            store,
            runs,
        }
    }

    /// Current snapshot, or `None` if nothing has been extracted yet.
    ///
    /// A cache hit is returned as is. Otherwise the snapshot is rebuilt from
    /// the stored results. It is installed into the cache only if no run was
    /// in progress or started while the store was read: mid-run the store
    /// holds a prefix of an unfinished run, which is served but never cached.
    /// Store errors are returned without touching the cache.
    pub async fn get_snapshot(&self) -> Result<Option<Arc<Snapshot>>, AppError> {
        if let Some(snapshot) = self.cache.get().await {
            return Ok(Some(snapshot));
        }

        let runs_before = self.runs.runs_started();
        let idle_before = !self.runs.is_running();

        let results = self.store.list().await?;
        if results.is_empty() {
            tracing::debug!("No stored results, snapshot unavailable");
            return Ok(None);
        }

        let snapshot = Arc::new(Snapshot::assemble(self.catalog.info().clone(), results));
        let settled = idle_before
            && !self.runs.is_running()
            && self.runs.runs_started() == runs_before;
        if settled {
            tracing::info!(results = snapshot.results.len(), "Rebuilt snapshot from store");
            self.cache.install(snapshot.clone()).await;
        } else {
            tracing::debug!(
                results = snapshot.results.len(),
                "Run in progress, serving stored results without caching"
            );
        }

        Ok(Some(snapshot))
    }
}
