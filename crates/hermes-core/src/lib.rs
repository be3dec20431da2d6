pub mod cache;
pub mod catalog;
pub mod engine;
pub mod error;
pub mod models;
pub mod reader;
pub mod rewriter;
pub mod run_state;
pub mod scheduler;
pub mod traits;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use cache::SnapshotCache;
pub use catalog::{Catalog, FormField, HttpMethod, Target};
pub use engine::{ExtractionEngine, Refresh, RunEvent, RunReporter, TracingRunReporter};
pub use error::AppError;
pub use models::{ExtractionResult, RequestInfo, Snapshot, compute_hash, parse_body};
pub use reader::SnapshotReader;
pub use rewriter::{RequestDescriptor, RequestOverrides, RequestRewriter, RewriteDecision};
pub use run_state::{RunOutcome, RunRecord, RunStatus, RunTracker};
pub use scheduler::RefreshScheduler;
pub use traits::{Browser, BrowserSession, NullStore, SnapshotStore};
