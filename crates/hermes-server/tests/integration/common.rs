use std::sync::Arc;

use axum::Router;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use testcontainers::core::{ContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage, ImageExt};

use hermes_core::testutil::{MockBrowser, test_catalog};
use hermes_core::{Catalog, ExtractionEngine, RunTracker, SnapshotCache, SnapshotReader};
use hermes_db::{Database, SnapshotRepository};
use hermes_server::routes;
use hermes_server::state::AppState;

const MIGRATIONS: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS snapshot_results (
        id BIGSERIAL PRIMARY KEY,
        name VARCHAR NOT NULL,
        method VARCHAR(10) NOT NULL,
        url VARCHAR NOT NULL,
        data JSON NOT NULL,
        data_hash VARCHAR(64) NOT NULL,
        fetched_at TIMESTAMPTZ NOT NULL
    )"#,
    r#"CREATE INDEX IF NOT EXISTS idx_snapshot_results_fetched_at
        ON snapshot_results(fetched_at, id)"#,
];

/// Router plus handles on everything it shares with the refresh engine.
pub struct TestApp {
    pub router: Router,
    pub pool: PgPool,
    pub repo: SnapshotRepository,
    pub cache: SnapshotCache,
    pub tracker: Arc<RunTracker>,
    pub catalog: Arc<Catalog>,
    _container: ContainerAsync<GenericImage>,
}

impl TestApp {
    /// An engine writing to the same store, cache and tracker the router reads.
    pub fn engine(&self, browser: MockBrowser) -> ExtractionEngine<MockBrowser, SnapshotRepository> {
        ExtractionEngine::new(
            browser,
            self.repo.clone(),
            self.catalog.clone(),
            self.cache.clone(),
            self.tracker.clone(),
        )
    }
}

/// Spin up a PostgreSQL container and return the test app.
pub async fn setup_test_app() -> TestApp {
    let container = GenericImage::new("postgres", "16")
        .with_exposed_port(ContainerPort::Tcp(5432))
        .with_wait_for(WaitFor::message_on_stderr(
            "database system is ready to accept connections",
        ))
        .with_env_var("POSTGRES_PASSWORD", "postgres")
        .with_env_var("POSTGRES_DB", "hermes_test")
        .start()
        .await
        .expect("Failed to start PostgreSQL container");

    let host = container.get_host().await.expect("Failed to get host");
    let port = container
        .get_host_port_ipv4(5432)
        .await
        .expect("Failed to get port");

    let url = format!("postgresql://postgres:postgres@{host}:{port}/hermes_test");

    let pool = retry_connect(&url).await;

    for migration in MIGRATIONS {
        sqlx::query(migration)
            .execute(&pool)
            .await
            .expect("Failed to run migration");
    }

    let db = Database::from_pool(pool.clone());
    let repo = db.snapshot_repo();
    let catalog = test_catalog();
    let cache = SnapshotCache::new();
    let tracker = RunTracker::new();

    let state = Arc::new(AppState {
        snapshots: SnapshotReader::new(
            catalog.clone(),
            cache.clone(),
            repo.clone(),
            tracker.clone(),
        ),
        db,
        catalog: catalog.clone(),
        runs: tracker.clone(),
    });

    TestApp {
        router: routes::router(state),
        pool,
        repo,
        cache,
        tracker,
        catalog,
        _container: container,
    }
}

async fn retry_connect(url: &str) -> PgPool {
    for _ in 0..30 {
        if let Ok(pool) = PgPoolOptions::new().max_connections(5).connect(url).await {
            return pool;
        }
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    }
    panic!("Failed to connect to test database");
}
