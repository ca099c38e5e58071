//! Execution history: a bounded per-Run record, backed by `sqlx`+SQLite.
//!
//! Supplemental (SPEC_FULL §4.9): the original persists a history row per
//! Run for the HTTP surface's execution-history endpoint. Writes are
//! best-effort and logged on failure, never on the hot path.

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history store error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

#[derive(Debug, Clone)]
pub struct HistoryRecord {
    pub run_id: String,
    pub query: String,
    pub result: String,
    pub step_count: u32,
    pub completed_at: DateTime<Utc>,
    pub status: String,
}

const TRUNCATED_RESULT_CHARS: usize = 2_000;

pub struct HistoryStore {
    pool: SqlitePool,
}

impl HistoryStore {
    pub async fn connect(database_url: &str) -> Result<Self, HistoryError> {
        let pool = SqlitePoolOptions::new().max_connections(4).connect(database_url).await?;
        sqlx::query(
            r"CREATE TABLE IF NOT EXISTS execution_history (
                run_id TEXT PRIMARY KEY,
                query TEXT NOT NULL,
                result TEXT NOT NULL,
                step_count INTEGER NOT NULL,
                completed_at TEXT NOT NULL,
                status TEXT NOT NULL
            )",
        )
        .execute(&pool)
        .await?;
        Ok(Self { pool })
    }

    /// Best-effort write; failures are logged, never propagated to the
    /// orchestrator's critical path.
    pub async fn record(&self, record: HistoryRecord) {
        let truncated: String = record.result.chars().take(TRUNCATED_RESULT_CHARS).collect();
        let result = sqlx::query(
            "INSERT OR REPLACE INTO execution_history (run_id, query, result, step_count, completed_at, status) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.run_id)
        .bind(&record.query)
        .bind(&truncated)
        .bind(record.step_count)
        .bind(record.completed_at.to_rfc3339())
        .bind(&record.status)
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            warn!("failed to persist execution history for run {}: {e}", record.run_id);
        }
    }

    pub async fn recent(&self, limit: i64) -> Result<Vec<HistoryRecord>, HistoryError> {
        let rows = sqlx::query(
            "SELECT run_id, query, result, step_count, completed_at, status FROM execution_history ORDER BY completed_at DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let completed_at: String = row.try_get("completed_at").ok()?;
                Some(HistoryRecord {
                    run_id: row.try_get("run_id").ok()?,
                    query: row.try_get("query").ok()?,
                    result: row.try_get("result").ok()?,
                    step_count: row.try_get::<i64, _>("step_count").ok()? as u32,
                    completed_at: DateTime::parse_from_rfc3339(&completed_at).ok()?.with_timezone(&Utc),
                    status: row.try_get("status").ok()?,
                })
            })
            .collect())
    }
}
