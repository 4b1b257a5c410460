pub mod registry;

use crate::judger::JudgeJob;
use serde::{Deserialize, Serialize};

pub use registry::{JobRegistry, JobState, JobStatus};

/// Worker job enum - represents different types of jobs the worker can process
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "job_type")]
pub enum WorkerJob {
    /// Judge a user submission
    #[serde(rename = "judge")]
    Judge(JudgeJob),
}

impl WorkerJob {
    pub fn job_id(&self) -> &str {
        match self {
            WorkerJob::Judge(job) => &job.job_id,
        }
    }
}
