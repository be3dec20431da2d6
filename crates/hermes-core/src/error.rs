use thiserror::Error;

/// Application-wide error types for Hermes.
#[derive(Error, Debug)]
pub enum AppError {
    /// Launching the browser or opening a session failed.
    #[error("Browser error: {0}")]
    BrowserError(String),

    /// Navigating a session to a target URL failed.
    #[error("Navigation to {url} failed: {message}")]
    NavigationError { url: String, message: String },

    /// Reading the rendered page content failed.
    #[error("Evaluation error: {0}")]
    EvaluationError(String),

    /// A catalog could not be built or loaded.
    #[error("Catalog error: {0}")]
    CatalogError(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Operation timed out.
    #[error("Timed out after {0} seconds")]
    Timeout(u64),

    /// Database operation failed.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Missing or invalid configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl AppError {
    /// Stable snake_case label for logs, run records and API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::BrowserError(_) => "browser_error",
            AppError::NavigationError { .. } => "navigation_error",
            AppError::EvaluationError(_) => "evaluation_error",
            AppError::CatalogError(_) => "catalog_error",
            AppError::SerializationError(_) => "serialization_error",
            AppError::Timeout(_) => "timeout",
            AppError::DatabaseError(_) => "database_error",
            AppError::ConfigError(_) => "config_error",
        }
    }

    /// Returns true for failures of the extraction side of a run
    /// (browser, navigation, evaluation) as opposed to storage failures.
    pub fn is_extraction_failure(&self) -> bool {
        matches!(
            self,
            AppError::BrowserError(_)
                | AppError::NavigationError { .. }
                | AppError::EvaluationError(_)
                | AppError::Timeout(_)
        )
    }
}
