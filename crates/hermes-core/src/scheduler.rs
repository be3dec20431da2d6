use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::engine::{ExtractionEngine, RunReporter};
use crate::traits::{Browser, SnapshotStore};

/// Triggers a refresh immediately and then every `interval`.
///
/// Each tick spawns its run so the timer keeps its cadence; a tick that
/// fires while the previous run is still going is skipped by the engine's
/// run guard.
pub struct RefreshScheduler<B, S>
where
    B: Browser,
    S: SnapshotStore,
{
    engine: Arc<ExtractionEngine<B, S>>,
    interval: Duration,
}

impl<B, S> RefreshScheduler<B, S>
where
    B: Browser + 'static,
    S: SnapshotStore + 'static,
{
    pub fn new(engine: Arc<ExtractionEngine<B, S>>, interval: Duration) -> Self {
        Self { engine, interval }
    }

    /// Run until `cancel_token` is cancelled, then wait for the in-flight
    /// run (if any) to finish.
    pub async fn run<R>(&self, cancel_token: CancellationToken, reporter: Arc<R>)
    where
        R: RunReporter + 'static,
    {
        tracing::info!(interval_secs = self.interval.as_secs(), "Refresh scheduler started");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut runs = JoinSet::new();

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let engine = Arc::clone(&self.engine);
                    let reporter = Arc::clone(&reporter);
                    runs.spawn(async move {
                        engine.refresh(reporter.as_ref()).await;
                    });
                }
                Some(joined) = runs.join_next(), if !runs.is_empty() => {
                    if let Err(e) = joined {
                        tracing::error!(error = %e, "Refresh task panicked");
                    }
                }
                () = cancel_token.cancelled() => break,
            }
        }

        tracing::info!(in_flight = runs.len(), "Refresh scheduler shutting down");
        while let Some(joined) = runs.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Refresh task panicked");
            }
        }
        tracing::info!("Refresh scheduler stopped");
    }
}
