use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use hermes_client::ChromiumBrowser;
use hermes_core::{
    ExtractionEngine, RefreshScheduler, RunTracker, SnapshotCache, SnapshotReader,
    TracingRunReporter,
};
use hermes_db::{Database, DatabaseConfig};
use hermes_server::config::ServerConfig;
use hermes_server::routes;
use hermes_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("hermes_server=info".parse()?)
                .add_directive("hermes_core=info".parse()?)
                .add_directive("hermes_client=info".parse()?),
        )
        .with_target(false)
        .init();

    let config = ServerConfig::from_env()?;
    let catalog = Arc::new(config.load_catalog()?);
    tracing::info!(targets = catalog.len(), "Catalog loaded");

    let db = Database::connect(&DatabaseConfig::from_env()?).await?;
    db.migrate().await?;

    let cache = SnapshotCache::new();
    let tracker = RunTracker::new();

    let browser = ChromiumBrowser::with_timeout(config.navigation_timeout);
    let engine = Arc::new(ExtractionEngine::new(
        browser,
        db.snapshot_repo(),
        catalog.clone(),
        cache.clone(),
        tracker.clone(),
    ));

    let cancel = CancellationToken::new();
    let scheduler = RefreshScheduler::new(engine, config.refresh_interval);
    let scheduler_handle = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            scheduler.run(cancel, Arc::new(TracingRunReporter)).await;
        })
    };

    let state = Arc::new(AppState {
        snapshots: SnapshotReader::new(
            catalog.clone(),
            cache,
            db.snapshot_repo(),
            tracker.clone(),
        ),
        db,
        catalog,
        runs: tracker,
    });

    let app = routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = config.addr();
    tracing::info!("Starting server on {addr}");
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .await?;

    cancel.cancel();
    if let Err(e) = scheduler_handle.await {
        tracing::error!(error = %e, "Scheduler task panicked");
    }

    Ok(())
}

async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install CTRL+C handler");
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        () = ctrl_c => tracing::info!("Shutdown signal received"),
        () = cancel.cancelled() => {}
    }
    cancel.cancel();
}
