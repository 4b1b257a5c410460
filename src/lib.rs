//! Submission judge: runs untrusted programs against test cases and reports verdicts.

pub mod config;
pub mod core;
pub mod error;
pub mod jobs;
pub mod judger;
pub mod languages;
pub mod recorder;
pub mod redis_manager;
pub mod runner;

pub use crate::core::{normalize, JudgeResponse, Verdict};
pub use error::{JudgeError, Result};
pub use judger::{evaluate, TestCase, TimeLimit};
pub use runner::{ExecutionResult, ExecutionStatus, ProcessRunner, Runner};
