//! Worker configuration
//!
//! Loaded from environment variables (a `.env` file is read first by the binary).

use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{JudgeError, Result};
use crate::recorder::DEFAULT_HISTORY_LIMIT;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Redis connection URL (default: redis://localhost:6379)
    pub redis_url: String,
    /// Submission database; history is kept in memory when unset
    pub database_url: Option<String>,
    /// Language used for jobs that do not name one (default: python)
    pub default_language: String,
    /// Maximum number of submissions judged at the same time (default: 4)
    pub max_concurrent_jobs: usize,
    /// Parent directory for per-run temp dirs (system temp dir if unset)
    pub scratch_dir: Option<PathBuf>,
    /// Entries returned by history queries (default: 5)
    pub history_limit: u32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            database_url: None,
            default_language: "python".to_string(),
            max_concurrent_jobs: 4,
            scratch_dir: None,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

impl WorkerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let max_concurrent_jobs = match non_empty("JUDGE_MAX_CONCURRENT_JOBS") {
            Some(raw) => parse_number::<usize>("JUDGE_MAX_CONCURRENT_JOBS", &raw)?,
            None => defaults.max_concurrent_jobs,
        };
        if max_concurrent_jobs == 0 {
            return Err(JudgeError::Config(
                "JUDGE_MAX_CONCURRENT_JOBS must be at least 1".to_string(),
            ));
        }

        let history_limit = match non_empty("JUDGE_HISTORY_LIMIT") {
            Some(raw) => parse_number::<u32>("JUDGE_HISTORY_LIMIT", &raw)?,
            None => defaults.history_limit,
        };

        Ok(Self {
            redis_url: non_empty("REDIS_URL").unwrap_or(defaults.redis_url),
            database_url: non_empty("DATABASE_URL"),
            default_language: non_empty("JUDGE_LANGUAGE").unwrap_or(defaults.default_language),
            max_concurrent_jobs,
            scratch_dir: non_empty("JUDGE_SCRATCH_DIR").map(PathBuf::from),
            history_limit,
        })
    }
}

fn parse_number<T: FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| JudgeError::Config(format!("{} must be a number, got {:?}", key, raw)))
}
