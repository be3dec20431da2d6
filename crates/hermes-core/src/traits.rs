use std::future::Future;

use crate::error::AppError;
use crate::models::ExtractionResult;
use crate::rewriter::RequestRewriter;

/// Launches browser sessions with request interception enabled.
pub trait Browser: Send + Sync {
    type Session: BrowserSession;

    /// Open a session. Every request the session issues for its whole
    /// lifetime must be routed through `rewriter`.
    fn open_session(
        &self,
        rewriter: RequestRewriter,
    ) -> impl Future<Output = Result<Self::Session, AppError>> + Send;
}

/// A single browser page owned by one run.
pub trait BrowserSession: Send {
    /// Navigate to `url` and wait until the page has settled.
    fn navigate(&mut self, url: &str) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Text content of the rendered `<body>` (empty if there is none).
    fn body_text(&mut self) -> impl Future<Output = Result<String, AppError>> + Send;

    fn close(self) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// Durable storage for the results of the most recent run.
pub trait SnapshotStore: Send + Sync + Clone {
    /// Delete every stored result. Returns the number removed.
    fn clear(&self) -> impl Future<Output = Result<u64, AppError>> + Send;

    fn insert(&self, result: &ExtractionResult)
    -> impl Future<Output = Result<(), AppError>> + Send;

    /// All stored results, oldest `fetched_at` first (insertion order on ties).
    fn list(&self) -> impl Future<Output = Result<Vec<ExtractionResult>, AppError>> + Send;
}

/// A no-op SnapshotStore for one-shot runs that should not touch the database.
#[derive(Debug, Clone)]
pub struct NullStore;

impl SnapshotStore for NullStore {
    async fn clear(&self) -> Result<u64, AppError> {
        Ok(0)
    }

    async fn insert(&self, _result: &ExtractionResult) -> Result<(), AppError> {
        Ok(())
    }

    async fn list(&self) -> Result<Vec<ExtractionResult>, AppError> {
        Ok(vec![])
    }
}
