use chrono::{DateTime, Utc};
use hermes_core::catalog::HttpMethod;
use hermes_core::error::AppError;
use hermes_core::models::{ExtractionResult, RequestInfo};
use sqlx::{PgPool, Pool, Postgres};

/// The `snapshot_results` table: the results of the most recent run.
#[derive(Clone)]
pub struct SnapshotRepository {
    pool: Pool<Postgres>,
}

impl SnapshotRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Delete every stored result. Returns the number of rows removed.
    pub async fn clear(&self) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM snapshot_results")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(result.rows_affected())
    }

    /// Insert one result. `data` is sent as text and cast to `json`, so
    /// strings containing NUL characters are stored as well.
    pub async fn insert(&self, result: &ExtractionResult) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO snapshot_results (name, method, url, data, data_hash, fetched_at)
            VALUES ($1, $2, $3, $4::json, $5, $6)
            "#,
        )
        .bind(&result.name)
        .bind(result.request.method.as_str())
        .bind(&result.request.url)
        .bind(result.data.to_string())
        .bind(result.data_hash())
        .bind(result.fetched_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    /// All stored results, oldest first. Rows fetched at the same instant
    /// keep their insertion order.
    pub async fn list(&self) -> Result<Vec<ExtractionResult>, AppError> {
        let rows = sqlx::query_as::<_, SnapshotRow>(
            r#"
            SELECT name, method, url, data, fetched_at
            FROM snapshot_results
            ORDER BY fetched_at ASC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    pub async fn count(&self) -> Result<i64, AppError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM snapshot_results")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        Ok(row.0)
    }

    /// Check database connectivity.
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        Ok(())
    }
}

// -- Internal row type for sqlx deserialization --

#[derive(sqlx::FromRow)]
struct SnapshotRow {
    name: String,
    method: String,
    url: String,
    data: serde_json::Value,
    fetched_at: DateTime<Utc>,
}

impl TryFrom<SnapshotRow> for ExtractionResult {
    type Error = AppError;

    fn try_from(row: SnapshotRow) -> Result<Self, Self::Error> {
        let method: HttpMethod = row.method.parse().map_err(|e| {
            AppError::DatabaseError(format!("Corrupt row for '{}': {e}", row.name))
        })?;

        Ok(ExtractionResult {
            name: row.name,
            request: RequestInfo {
                method,
                url: row.url,
            },
            data: row.data,
            fetched_at: row.fetched_at,
        })
    }
}

// -- Trait implementation --

impl hermes_core::traits::SnapshotStore for SnapshotRepository {
    async fn clear(&self) -> Result<u64, AppError> {
        SnapshotRepository::clear(self).await
    }

    async fn insert(&self, result: &ExtractionResult) -> Result<(), AppError> {
        SnapshotRepository::insert(self, result).await
    }

    async fn list(&self) -> Result<Vec<ExtractionResult>, AppError> {
        SnapshotRepository::list(self).await
    }
}
