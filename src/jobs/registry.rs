//! Per-job state tracking
//!
//! Each job moves `queued -> running -> done | failed`. Many jobs may be active at once.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{JudgeError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Running,
    Done,
    Failed,
}

impl JobState {
    pub fn is_finished(&self) -> bool {
        matches!(self, JobState::Done | JobState::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobState::Queued => "queued",
            JobState::Running => "running",
            JobState::Done => "done",
            JobState::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// Snapshot of one job's state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatus {
    pub job_id: String,
    pub state: JobState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<String, JobStatus>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job as queued.
    ///
    /// Returns `false` if a job with this id is already queued or running.
    /// A finished id may be reused.
    pub async fn enqueue(&self, job_id: &str) -> bool {
        let mut jobs = self.jobs.write().await;
        if let Some(existing) = jobs.get(job_id) {
            if !existing.state.is_finished() {
                return false;
            }
        }
        jobs.insert(job_id.to_string(), status(job_id, JobState::Queued, None));
        true
    }

    pub async fn start(&self, job_id: &str) -> Result<JobStatus> {
        self.transition(job_id, JobState::Queued, JobState::Running, None)
            .await
    }

    pub async fn complete(&self, job_id: &str) -> Result<JobStatus> {
        self.transition(job_id, JobState::Running, JobState::Done, None)
            .await
    }

    /// Mark a job failed; queued jobs may fail before they start
    pub async fn fail(&self, job_id: &str, message: impl Into<String>) -> Result<JobStatus> {
        let mut jobs = self.jobs.write().await;
        let entry = jobs
            .get_mut(job_id)
            .ok_or_else(|| JudgeError::UnknownJob(job_id.to_string()))?;

        if entry.state.is_finished() {
            return Err(JudgeError::InvalidTransition {
                job_id: job_id.to_string(),
                from: entry.state,
                to: JobState::Failed,
            });
        }

        *entry = status(job_id, JobState::Failed, Some(message.into()));
        Ok(entry.clone())
    }

    pub async fn status(&self, job_id: &str) -> Option<JobStatus> {
        self.jobs.read().await.get(job_id).cloned()
    }

    pub async fn state(&self, job_id: &str) -> Option<JobState> {
        self.jobs.read().await.get(job_id).map(|s| s.state)
    }

    /// Number of queued or running jobs
    pub async fn active_count(&self) -> usize {
        self.jobs
            .read()
            .await
            .values()
            .filter(|s| !s.state.is_finished())
            .count()
    }

    /// Drop finished jobs last updated more than `max_age` ago; returns how many
    pub async fn prune_finished(&self, max_age: Duration) -> usize {
        let cutoff = Utc::now() - max_age;
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|_, s| !(s.state.is_finished() && s.updated_at <= cutoff));
        before - jobs.len()
    }

    async fn transition(
        &self,
        job_id: &str,
        from: JobState,
        to: JobState,
        message: Option<String>,
    ) -> Result<JobStatus> {
        let mut jobs = self.jobs.write().await;
        let entry = jobs
            .get_mut(job_id)
            .ok_or_else(|| JudgeError::UnknownJob(job_id.to_string()))?;

        if entry.state != from {
            return Err(JudgeError::InvalidTransition {
                job_id: job_id.to_string(),
                from: entry.state,
                to,
            });
        }

        *entry = status(job_id, to, message);
        Ok(entry.clone())
    }
}

fn status(job_id: &str, state: JobState, message: Option<String>) -> JobStatus {
    JobStatus {
        job_id: job_id.to_string(),
        state,
        message,
        updated_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::block_on;

    #[test]
    fn test_lifecycle() {
        block_on(async {
            let registry = JobRegistry::new();
            assert!(registry.enqueue("a").await);
            assert_eq!(registry.state("a").await, Some(JobState::Queued));

            registry.start("a").await.unwrap();
            assert_eq!(registry.active_count().await, 1);

            let done = registry.complete("a").await.unwrap();
            assert_eq!(done.state, JobState::Done);
            assert_eq!(registry.active_count().await, 0);
        });
    }

    #[test]
    fn test_duplicate_active_job_rejected() {
        block_on(async {
            let registry = JobRegistry::new();
            assert!(registry.enqueue("a").await);
            assert!(!registry.enqueue("a").await);

            registry.start("a").await.unwrap();
            assert!(!registry.enqueue("a").await);

            registry.fail("a", "boom").await.unwrap();
            assert!(registry.enqueue("a").await);
        });
    }

    #[test]
    fn test_concurrent_jobs_tracked_independently() {
        block_on(async {
            let registry = JobRegistry::new();
            registry.enqueue("a").await;
            registry.enqueue("b").await;
            registry.start("a").await.unwrap();
            registry.start("b").await.unwrap();
            registry.complete("b").await.unwrap();

            assert_eq!(registry.state("a").await, Some(JobState::Running));
            assert_eq!(registry.state("b").await, Some(JobState::Done));
        });
    }

    #[test]
    fn test_invalid_transitions() {
        block_on(async {
            let registry = JobRegistry::new();
            assert!(matches!(
                registry.start("missing").await,
                Err(JudgeError::UnknownJob(id)) if id == "missing"
            ));

            registry.enqueue("a").await;
            assert!(matches!(
                registry.complete("a").await,
                Err(JudgeError::InvalidTransition { from: JobState::Queued, to: JobState::Done, .. })
            ));

            let failed = registry.fail("a", "bad language").await.unwrap();
            assert_eq!(failed.message.as_deref(), Some("bad language"));
            assert!(registry.fail("a", "again").await.is_err());
            assert!(registry.start("a").await.is_err());
        });
    }

    #[test]
    fn test_prune_finished() {
        block_on(async {
            let registry = JobRegistry::new();
            registry.enqueue("done").await;
            registry.start("done").await.unwrap();
            registry.complete("done").await.unwrap();
            registry.enqueue("waiting").await;

            assert_eq!(registry.prune_finished(Duration::hours(1)).await, 0);
            assert_eq!(registry.prune_finished(Duration::zero()).await, 1);
            assert!(registry.status("done").await.is_none());
            assert!(registry.status("waiting").await.is_some());
        });
    }
}
