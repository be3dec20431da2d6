use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use uuid::Uuid;

use crate::cache::SnapshotCache;
use crate::catalog::Catalog;
use crate::error::AppError;
use crate::models::{ExtractionResult, Snapshot, parse_body};
use crate::rewriter::RequestRewriter;
use crate::run_state::{RunOutcome, RunRecord, RunTracker};
use crate::traits::{Browser, BrowserSession, SnapshotStore};

/// Events emitted during a run for monitoring/logging.
#[derive(Debug, Clone)]
pub enum RunEvent<'a> {
    Started {
        run_id: Uuid,
        targets: usize,
    },
    StoreCleared {
        removed: u64,
    },
    TargetFetched {
        name: &'a str,
        bytes: usize,
        raw_text: bool,
    },
    Completed {
        run_id: Uuid,
        results: usize,
        elapsed_ms: u128,
    },
    Failed {
        run_id: Uuid,
        error: &'a AppError,
    },
    Skipped,
}

/// Trait for receiving run events (decoupled logging).
pub trait RunReporter: Send + Sync {
    fn report(&self, event: RunEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingRunReporter;

impl RunReporter for TracingRunReporter {
    fn report(&self, event: RunEvent<'_>) {
        match event {
            RunEvent::Started { run_id, targets } => {
                tracing::info!(%run_id, %targets, "Extraction run started");
            }
            RunEvent::StoreCleared { removed } => {
                tracing::debug!(%removed, "Cleared previous run from store");
            }
            RunEvent::TargetFetched {
                name,
                bytes,
                raw_text,
            } => {
                if raw_text {
                    tracing::info!(%name, %bytes, "Fetched target (not JSON, kept as raw text)");
                } else {
                    tracing::info!(%name, %bytes, "Fetched target");
                }
            }
            RunEvent::Completed {
                run_id,
                results,
                elapsed_ms,
            } => {
                tracing::info!(%run_id, %results, %elapsed_ms, "Extraction run completed");
            }
            RunEvent::Failed { run_id, error } => {
                if error.is_extraction_failure() {
                    tracing::warn!(%run_id, kind = error.kind(), %error, "Extraction run failed");
                } else {
                    tracing::error!(%run_id, kind = error.kind(), %error, "Extraction run failed");
                }
            }
            RunEvent::Skipped => {
                tracing::warn!("Previous run still in progress, skipping this one");
            }
        }
    }
}

/// Result of asking the engine to refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Refresh {
    Ran(RunRecord),
    /// Another run held the guard.
    Skipped,
}

/// Drives a browser session through the catalog and publishes the snapshot.
///
/// Generic over the browser and the store so runs can be exercised without
/// Chromium or PostgreSQL.
pub struct ExtractionEngine<B, S>
where
    B: Browser,
    S: SnapshotStore,
{
    browser: B,
    store: S,
    catalog: Arc<Catalog>,
    cache: SnapshotCache,
    tracker: Arc<RunTracker>,
}

impl<B, S> ExtractionEngine<B, S>
where
    B: Browser,
    S: SnapshotStore,
{
    pub fn new(
        browser: B,
        store: S,
        catalog: Arc<Catalog>,
        cache: SnapshotCache,
        tracker: Arc<RunTracker>,
    ) -> Self {
        Self {
            browser,
            store,
            catalog,
            cache,
            tracker,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn tracker(&self) -> &Arc<RunTracker> {
        &self.tracker
    }

    /// Run once unless another run is in progress, recording the outcome.
    ///
    /// Failures are reported and recorded, never propagated: the cache keeps
    /// its previous value and the next refresh tries again.
    pub async fn refresh<R: RunReporter>(&self, reporter: &R) -> Refresh {
        let Some(guard) = self.tracker.try_begin() else {
            reporter.report(RunEvent::Skipped);
            return Refresh::Skipped;
        };

        let run_id = guard.run_id();
        let started = Instant::now();
        reporter.report(RunEvent::Started {
            run_id,
            targets: self.catalog.len(),
        });

        let outcome = match self.run(reporter).await {
            Ok(snapshot) => {
                reporter.report(RunEvent::Completed {
                    run_id,
                    results: snapshot.results.len(),
                    elapsed_ms: started.elapsed().as_millis(),
                });
                RunOutcome::Succeeded {
                    results: snapshot.results.len(),
                }
            }
            Err(error) => {
                reporter.report(RunEvent::Failed {
                    run_id,
                    error: &error,
                });
                RunOutcome::failed(&error)
            }
        };

        Refresh::Ran(guard.finish(outcome))
    }

    /// One full extraction run.
    ///
    /// 1. Open a browser session routed through the request rewriter
    /// 2. Clear the store
    /// 3. For each target in order: navigate, read body, parse, persist
    /// 4. Close the session
    /// 5. Install the assembled snapshot into the cache
    ///
    /// On error the remaining targets are skipped, results already persisted
    /// stay in the store and the cache is not touched.
    pub async fn run<R: RunReporter>(&self, reporter: &R) -> Result<Arc<Snapshot>, AppError> {
        let rewriter = RequestRewriter::new(self.catalog.clone());
        let mut session = self.browser.open_session(rewriter).await?;

        let results = match self.extract_all(&mut session, reporter).await {
            Ok(results) => results,
            Err(e) => {
                if let Err(close_err) = session.close().await {
                    tracing::warn!(error = %close_err, "Failed to close browser session");
                }
                return Err(e);
            }
        };

        session.close().await?;

        let snapshot = Arc::new(Snapshot::assemble(self.catalog.info().clone(), results));
        self.cache.install(snapshot.clone()).await;

        Ok(snapshot)
    }

    async fn extract_all<R: RunReporter>(
        &self,
        session: &mut B::Session,
        reporter: &R,
    ) -> Result<Vec<ExtractionResult>, AppError> {
        let removed = self.store.clear().await?;
        reporter.report(RunEvent::StoreCleared { removed });

        let mut results = Vec::with_capacity(self.catalog.len());
        for target in self.catalog.targets() {
            session.navigate(target.url()).await?;
            let body = session.body_text().await?;

            let result = ExtractionResult::new(target, parse_body(&body), Utc::now());
            reporter.report(RunEvent::TargetFetched {
                name: target.name(),
                bytes: body.len(),
                raw_text: result.is_raw_text(),
            });

            self.store.insert(&result).await?;
            results.push(result);
        }

        Ok(results)
    }
}
