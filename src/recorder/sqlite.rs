//! SQLite-backed submission history

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::info;

use super::{NewSubmission, SubmissionRecord, SubmissionRecorder};
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct SqliteRecorder {
    pool: SqlitePool,
}

impl SqliteRecorder {
    /// Connect to `database_url` (e.g. `sqlite://judge.db`), creating the file and
    /// running migrations as needed
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        info!("Connected to submission database at {}", database_url);
        Self::with_pool(pool).await
    }

    /// Private in-memory database (one connection, so every query sees the same data)
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl SubmissionRecorder for SqliteRecorder {
    async fn record(&self, submission: NewSubmission) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO submissions (problem_id, code, output, error, is_correct, analysis, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(submission.problem_id)
        .bind(&submission.code)
        .bind(&submission.output)
        .bind(&submission.error)
        .bind(submission.is_correct)
        .bind(&submission.analysis)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn history(&self, problem_id: i64, limit: u32) -> Result<Vec<SubmissionRecord>> {
        let records = sqlx::query_as::<_, SubmissionRecord>(
            r#"
            SELECT id, problem_id, code, output, error, is_correct, analysis, created_at
            FROM submissions
            WHERE problem_id = ?
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(problem_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }
}
