//! Runner module - Execution abstraction layer
//!
//! This module provides a unified interface for running one submission against one input:
//! - `ProcessRunner`: subprocess-per-call with a wall-clock deadline (no OS confinement)
//!
//! A hardened isolation backend can implement [`Runner`] without touching the judger.
//!
//! The runner module does NOT:
//! - Compare outputs or determine verdicts
//! - Retry failed executions
//! - Know about test cases or problems

pub mod process;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Execution status (raw, no verdict interpretation)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Program exited with code 0
    Success,
    /// Nonzero exit code or killed by a signal
    RuntimeError,
    /// Wall-clock deadline exceeded, process was killed
    Timeout,
    /// Infrastructure fault unrelated to the submitted code
    SystemError,
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExecutionStatus::Success => "success",
            ExecutionStatus::RuntimeError => "runtime_error",
            ExecutionStatus::Timeout => "timeout",
            ExecutionStatus::SystemError => "system_error",
        };
        write!(f, "{}", s)
    }
}

/// Outcome of running a submission once
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub stdout: String,
    pub stderr: String,
    pub status: ExecutionStatus,
}

impl ExecutionResult {
    pub fn success(stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
            status: ExecutionStatus::Success,
        }
    }

    pub fn runtime_error(stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
            status: ExecutionStatus::RuntimeError,
        }
    }

    /// Deadline exceeded; `stdout` holds whatever was flushed before the kill
    pub fn timeout(stdout: impl Into<String>, limit: Duration) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: format!("Error: Execution Timeout ({}s limit).", limit.as_secs()),
            status: ExecutionStatus::Timeout,
        }
    }

    pub fn system_error(cause: impl fmt::Display) -> Self {
        Self {
            stdout: String::new(),
            stderr: format!("System Error: {}", cause),
            status: ExecutionStatus::SystemError,
        }
    }

    /// Check if execution was successful (exited with code 0)
    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Success
    }
}

/// Runner trait for executing submissions
///
/// Implementations must never fail: infrastructure faults are reported as
/// [`ExecutionStatus::SystemError`].
#[async_trait]
pub trait Runner: Send + Sync {
    /// Run `code` with `input` as its whole stdin, killing it after `timeout`
    async fn run(&self, code: &str, input: &str, timeout: Duration) -> ExecutionResult;
}

// Re-exports
pub use process::ProcessRunner;
