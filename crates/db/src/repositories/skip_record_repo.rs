//! Repository for the `skipped_transcodes` table.

use crate::models::skip_record::{SkipMetadata, SkipRecord};
use crate::DbPool;

/// Column list for `skipped_transcodes` SELECT queries.
const COLUMNS: &str = "file_path, reason, metadata, created_at";

/// Provides query operations for skip records.
pub struct SkipRecordRepo;

impl SkipRecordRepo {
    /// Insert or replace the record for `file_path`, refreshing `created_at`.
    pub async fn upsert(
        pool: &DbPool,
        file_path: &str,
        reason: &str,
        metadata: &SkipMetadata,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO skipped_transcodes (file_path, reason, metadata, created_at) \
             VALUES (?, ?, ?, CURRENT_TIMESTAMP) \
             ON CONFLICT(file_path) DO UPDATE SET \
                 reason = excluded.reason, \
                 metadata = excluded.metadata, \
                 created_at = CURRENT_TIMESTAMP",
        )
        .bind(file_path)
        .bind(reason)
        .bind(metadata.to_json())
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn find_by_path(
        pool: &DbPool,
        file_path: &str,
    ) -> Result<Option<SkipRecord>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM skipped_transcodes WHERE file_path = ?");
        sqlx::query_as::<_, SkipRecord>(&query)
            .bind(file_path)
            .fetch_optional(pool)
            .await
    }

    /// Delete the record for `file_path`. Returns whether a row was removed.
    pub async fn delete_by_path(pool: &DbPool, file_path: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM skipped_transcodes WHERE file_path = ?")
            .bind(file_path)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Remove every record. Returns the number of rows deleted.
    pub async fn clear(pool: &DbPool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM skipped_transcodes")
            .execute(pool)
            .await?;
        tracing::debug!(deleted = result.rows_affected(), "Skip records cleared");
        Ok(result.rows_affected())
    }

    pub async fn count(pool: &DbPool) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM skipped_transcodes")
            .fetch_one(pool)
            .await?;
        Ok(count)
    }
}
