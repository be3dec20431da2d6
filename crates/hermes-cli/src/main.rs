use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use hermes_client::ChromiumBrowser;
use hermes_core::{
    Catalog, ExtractionEngine, NullStore, RunTracker, Snapshot, SnapshotCache, SnapshotReader,
    SnapshotStore, TracingRunReporter,
};
use hermes_db::{Database, DatabaseConfig};

#[derive(Parser)]
#[command(name = "hermes", version, about = "Browser-driven API snapshot extractor")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one extraction pass over the catalog and print the snapshot
    Run {
        /// Postman v2.1 collection to use instead of the built-in catalog
        #[arg(short, long, env = "HERMES_CATALOG")]
        catalog: Option<PathBuf>,

        /// Navigation timeout per target, in seconds
        #[arg(
            short,
            long,
            env = "HERMES_NAVIGATION_TIMEOUT_SECS",
            default_value_t = 30,
            value_parser = clap::value_parser!(u64).range(1..)
        )]
        timeout: u64,

        /// Chrome/Chromium binary to launch
        #[arg(long, env = "CHROME_BIN")]
        chrome: Option<PathBuf>,

        /// Replace the stored snapshot (requires DATABASE_URL)
        #[arg(long, default_value_t = false)]
        save: bool,
    },

    /// Print the snapshot currently held in the database
    Show {
        /// Catalog whose metadata heads the snapshot
        #[arg(short, long, env = "HERMES_CATALOG")]
        catalog: Option<PathBuf>,
    },

    /// List the targets of a catalog
    Targets {
        #[arg(short, long, env = "HERMES_CATALOG")]
        catalog: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("hermes_core=info".parse()?)
                .add_directive("hermes_client=info".parse()?),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            catalog,
            timeout,
            chrome,
            save,
        } => {
            let catalog = Arc::new(load_catalog(catalog.as_deref())?);
            let mut browser = ChromiumBrowser::with_timeout(Duration::from_secs(timeout));
            if let Some(chrome) = chrome {
                browser = browser.with_executable(chrome);
            }

            let snapshot = if save {
                let db = connect_db().await?;
                cmd_run(browser, db.snapshot_repo(), catalog).await?
            } else {
                cmd_run(browser, NullStore, catalog).await?
            };
            print_snapshot(&snapshot)?;
        }
        Commands::Show { catalog } => {
            let catalog = Arc::new(load_catalog(catalog.as_deref())?);
            let db = connect_db().await?;
            cmd_show(catalog, &db).await?;
        }
        Commands::Targets { catalog } => {
            let catalog = load_catalog(catalog.as_deref())?;
            cmd_targets(&catalog);
        }
    }

    Ok(())
}

/// Load the catalog at `path`, or the built-in one.
fn load_catalog(path: Option<&Path>) -> Result<Catalog> {
    let catalog = match path {
        Some(path) => Catalog::from_file(path)
            .with_context(|| format!("Failed to load catalog {}", path.display()))?,
        None => Catalog::builtin()?,
    };
    Ok(catalog)
}

/// Connect to PostgreSQL using DATABASE_URL and apply migrations.
async fn connect_db() -> Result<Database> {
    let config = DatabaseConfig::from_env().context("Required for --save and show")?;
    let db = Database::connect(&config).await?;
    db.migrate().await?;
    Ok(db)
}

async fn cmd_run<S: SnapshotStore>(
    browser: ChromiumBrowser,
    store: S,
    catalog: Arc<Catalog>,
) -> Result<Arc<Snapshot>> {
    tracing::info!(targets = catalog.len(), "Starting extraction run");

    let engine = ExtractionEngine::new(
        browser,
        store,
        catalog,
        SnapshotCache::new(),
        RunTracker::new(),
    );
    let snapshot = engine.run(&TracingRunReporter).await?;

    tracing::info!(results = snapshot.results.len(), "Extraction complete");
    Ok(snapshot)
}

async fn cmd_show(catalog: Arc<Catalog>, db: &Database) -> Result<()> {
    let reader = SnapshotReader::new(
        catalog,
        SnapshotCache::new(),
        db.snapshot_repo(),
        RunTracker::new(),
    );

    match reader.get_snapshot().await? {
        Some(snapshot) => print_snapshot(&snapshot)?,
        None => eprintln!("No snapshot stored yet. Run `hermes run --save` first."),
    }
    Ok(())
}

fn cmd_targets(catalog: &Catalog) {
    println!("{:<24} {:<8} {:<6} URL", "NAME", "METHOD", "FIELDS");
    println!("{}", "-".repeat(80));
    for target in catalog.targets() {
        println!(
            "{:<24} {:<8} {:<6} {}",
            target.name(),
            target.method().as_str(),
            target.enabled_fields().count(),
            target.url()
        );
    }
}

fn print_snapshot(snapshot: &Snapshot) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(snapshot)?);
    Ok(())
}
