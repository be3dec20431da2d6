use std::sync::Arc;

use moka::future::Cache;

use crate::models::Snapshot;

/// Single-slot holder of the most recently assembled snapshot.
///
/// Created once per process and shared (by clone) between the extraction
/// engine, which overwrites it after every successful run, and the read path,
/// which fills it lazily from the store. Entries never expire.
#[derive(Clone)]
pub struct SnapshotCache {
    slot: Cache<(), Arc<Snapshot>>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self {
            slot: Cache::builder().max_capacity(1).build(),
        }
    }

    pub async fn get(&self) -> Option<Arc<Snapshot>> {
        self.slot.get(&()).await
    }

    /// Replace the cached snapshot.
    pub async fn install(&self, snapshot: Arc<Snapshot>) {
        self.slot.insert((), snapshot).await;
    }
}

impl Default for SnapshotCache {
    fn default() -> Self {
        Self::new()
    }
}
