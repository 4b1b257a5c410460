//! Submission history
//!
//! Append-only record of judged submissions, queried per problem, newest first.

pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::core::Verdict;
use crate::error::Result;

pub use sqlite::SqliteRecorder;

/// Number of entries shown in a problem's history
pub const DEFAULT_HISTORY_LIMIT: u32 = 5;

/// Submission to append
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSubmission {
    pub problem_id: i64,
    pub code: String,
    pub output: String,
    /// Empty on success, otherwise the verdict summary
    pub error: String,
    pub is_correct: bool,
    pub analysis: String,
}

impl NewSubmission {
    pub fn from_verdict(problem_id: i64, code: &str, verdict: &Verdict) -> Self {
        Self {
            problem_id,
            code: code.to_string(),
            output: verdict.first_output().to_string(),
            error: verdict.error().to_string(),
            is_correct: verdict.is_correct(),
            analysis: String::new(),
        }
    }
}

/// Stored submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SubmissionRecord {
    pub id: i64,
    pub problem_id: i64,
    pub code: String,
    pub output: String,
    pub error: String,
    pub is_correct: bool,
    pub analysis: String,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait SubmissionRecorder: Send + Sync {
    /// Append a submission; the timestamp is assigned here
    async fn record(&self, submission: NewSubmission) -> Result<()>;

    /// Most recent submissions for a problem, newest first
    async fn history(&self, problem_id: i64, limit: u32) -> Result<Vec<SubmissionRecord>>;
}

/// In-process recorder, used when no database is configured
#[derive(Debug, Default)]
pub struct MemoryRecorder {
    records: RwLock<Vec<SubmissionRecord>>,
}

impl MemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SubmissionRecorder for MemoryRecorder {
    async fn record(&self, submission: NewSubmission) -> Result<()> {
        let mut records = self.records.write().await;
        let id = records.len() as i64 + 1;
        records.push(SubmissionRecord {
            id,
            problem_id: submission.problem_id,
            code: submission.code,
            output: submission.output,
            error: submission.error,
            is_correct: submission.is_correct,
            analysis: submission.analysis,
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn history(&self, problem_id: i64, limit: u32) -> Result<Vec<SubmissionRecord>> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .rev()
            .filter(|r| r.problem_id == problem_id)
            .take(limit as usize)
            .cloned()
            .collect())
    }
}
