use std::path::PathBuf;
use std::time::Duration;

use hermes_core::{AppError, Catalog};

const DEFAULT_PORT: u16 = 4000;
const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 3600;
const DEFAULT_NAVIGATION_TIMEOUT_SECS: u64 = 30;

/// Server and scheduler settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    pub refresh_interval: Duration,
    pub navigation_timeout: Duration,
    /// Postman collection to load instead of the built-in catalog.
    pub catalog_path: Option<PathBuf>,
}

impl ServerConfig {
    /// Read configuration from environment variables.
    ///
    /// - `HERMES_PORT` (default 4000)
    /// - `HERMES_REFRESH_INTERVAL_SECS` (default 3600)
    /// - `HERMES_NAVIGATION_TIMEOUT_SECS` (default 30)
    /// - `HERMES_CATALOG` (optional)
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let port = match lookup("HERMES_PORT") {
            None => DEFAULT_PORT,
            Some(raw) => raw.parse().map_err(|_| {
                AppError::ConfigError(format!("Invalid HERMES_PORT '{raw}': must be a port number"))
            })?,
        };

        let refresh_interval = positive_secs(
            &lookup,
            "HERMES_REFRESH_INTERVAL_SECS",
            DEFAULT_REFRESH_INTERVAL_SECS,
        )?;
        let navigation_timeout = positive_secs(
            &lookup,
            "HERMES_NAVIGATION_TIMEOUT_SECS",
            DEFAULT_NAVIGATION_TIMEOUT_SECS,
        )?;

        let catalog_path = lookup("HERMES_CATALOG")
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            port,
            refresh_interval,
            navigation_timeout,
            catalog_path,
        })
    }

    pub fn addr(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }

    /// The configured catalog file, or the built-in catalog.
    pub fn load_catalog(&self) -> Result<Catalog, AppError> {
        match &self.catalog_path {
            Some(path) => Catalog::from_file(path),
            None => Catalog::builtin(),
        }
    }
}

fn positive_secs(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: u64,
) -> Result<Duration, AppError> {
    let secs = match lookup(key) {
        None => default,
        Some(raw) => {
            let parsed: u64 = raw.parse().map_err(|_| {
                AppError::ConfigError(format!(
                    "Invalid {key} '{raw}': must be a positive integer"
                ))
            })?;
            if parsed == 0 {
                return Err(AppError::ConfigError(format!("{key} must be at least 1")));
            }
            parsed
        }
    };
    Ok(Duration::from_secs(secs))
}
