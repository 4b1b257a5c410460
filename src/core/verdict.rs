use serde::{Deserialize, Serialize};

use crate::runner::{ExecutionResult, ExecutionStatus};

/// `expected` value reported when every case passed
pub const ALL_PASSED: &str = "All Passed";

/// `expected` value reported when the first case did not run to a successful exit
pub const RUNTIME_ERROR: &str = "Runtime Error";

/// First mismatching case of a judging run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureDetail {
    /// 1-based case index
    pub case_index: usize,
    /// Input as stored (escapes not expanded)
    pub input: String,
    pub actual_normalized: String,
    pub expected_normalized: String,
}

/// The first case failed outright, so no case was scored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbortedRun {
    pub status: ExecutionStatus,
    pub stderr: String,
}

/// Aggregate judging outcome for one submission.
///
/// Constructed only by the judger; `is_correct` always equals
/// `passed_cases == total_cases`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verdict {
    is_correct: bool,
    passed_cases: usize,
    total_cases: usize,
    first_output: String,
    failure_detail: Option<FailureDetail>,
    aborted: Option<AbortedRun>,
    summary: String,
}

impl Verdict {
    /// Fail-fast verdict: the first case did not exit successfully
    pub(crate) fn first_case_failed(total_cases: usize, first_run: ExecutionResult) -> Self {
        let summary = if first_run.stderr.trim().is_empty() {
            format!("{} ({})", RUNTIME_ERROR, first_run.status)
        } else {
            first_run.stderr.clone()
        };

        Self {
            is_correct: false,
            passed_cases: 0,
            total_cases,
            first_output: first_run.stdout,
            failure_detail: None,
            aborted: Some(AbortedRun {
                status: first_run.status,
                stderr: first_run.stderr,
            }),
            summary,
        }
    }

    /// Verdict after every case ran
    pub(crate) fn completed(
        passed_cases: usize,
        total_cases: usize,
        first_output: String,
        failure_detail: Option<FailureDetail>,
    ) -> Self {
        debug_assert!(passed_cases <= total_cases);
        let is_correct = passed_cases == total_cases;
        let summary = summarize(passed_cases, total_cases, failure_detail.as_ref());

        Self {
            is_correct,
            passed_cases,
            total_cases,
            first_output,
            failure_detail,
            aborted: None,
            summary,
        }
    }

    pub fn is_correct(&self) -> bool {
        self.is_correct
    }

    pub fn passed_cases(&self) -> usize {
        self.passed_cases
    }

    pub fn total_cases(&self) -> usize {
        self.total_cases
    }

    /// Stdout of the first case
    pub fn first_output(&self) -> &str {
        &self.first_output
    }

    pub fn failure_detail(&self) -> Option<&FailureDetail> {
        self.failure_detail.as_ref()
    }

    pub fn aborted(&self) -> Option<&AbortedRun> {
        self.aborted.as_ref()
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    /// Error text for callers: empty when correct
    pub fn error(&self) -> &str {
        if self.is_correct {
            ""
        } else {
            &self.summary
        }
    }

    /// `"All Passed"`, the sentinel `"Runtime Error"`, or the first failing case's
    /// normalized expected output
    pub fn expected(&self) -> &str {
        if self.is_correct {
            ALL_PASSED
        } else if self.aborted.is_some() {
            RUNTIME_ERROR
        } else {
            self.failure_detail
                .as_ref()
                .map(|d| d.expected_normalized.as_str())
                .unwrap_or_default()
        }
    }

    pub fn to_response(&self) -> JudgeResponse {
        JudgeResponse {
            output: self.first_output.clone(),
            is_correct: self.is_correct,
            error: self.error().to_string(),
            expected: self.expected().to_string(),
        }
    }
}

fn summarize(passed: usize, total: usize, failure: Option<&FailureDetail>) -> String {
    if passed == total {
        return format!("Passed: {}/{}.", passed, total);
    }

    let mut summary = format!("Failed. Passed: {}/{}.", passed, total);
    if let Some(detail) = failure {
        summary.push_str(&format!(
            "\nFailed at case {}.\nInput: {}\nYour output: {}\nExpected output: {}",
            detail.case_index, detail.input, detail.actual_normalized, detail.expected_normalized
        ));
    }
    summary
}

/// Response payload consumed by the HTTP layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgeResponse {
    pub output: String,
    pub is_correct: bool,
    pub error: String,
    pub expected: String,
}
