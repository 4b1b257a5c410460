//! Judger module for processing submission judge jobs
//!
//! This module handles the core judging logic for user submissions:
//! running the program once per test case and comparing normalized outputs.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::core::{expand_newline_escapes, normalize, FailureDetail, JudgeResponse, Verdict};
use crate::recorder::{NewSubmission, SubmissionRecorder};
use crate::runner::Runner;

/// Time limit used when a problem has none (or a non-positive one)
pub const DEFAULT_TIME_LIMIT_SECS: u64 = 2;

/// One input / expected-output pair
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    /// Program input; literal `\n` sequences stand for line breaks
    #[serde(default)]
    pub input: String,
    #[serde(default, rename = "output", alias = "expected_output")]
    pub expected_output: String,
}

impl TestCase {
    pub fn new(input: impl Into<String>, expected_output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            expected_output: expected_output.into(),
        }
    }
}

/// Wall-clock limit per execution, in whole seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeLimit(u64);

impl TimeLimit {
    /// Non-positive values fall back to the default
    pub fn from_secs(secs: i64) -> Self {
        if secs <= 0 {
            Self::default()
        } else {
            Self(secs as u64)
        }
    }

    pub fn from_option(secs: Option<i64>) -> Self {
        secs.map(Self::from_secs).unwrap_or_default()
    }

    pub fn secs(&self) -> u64 {
        self.0
    }

    pub fn as_duration(&self) -> Duration {
        Duration::from_secs(self.0)
    }
}

impl Default for TimeLimit {
    fn default() -> Self {
        Self(DEFAULT_TIME_LIMIT_SECS)
    }
}

/// Judge a submission against ordered test cases.
///
/// Cases run sequentially, each exactly once. If the first case does not exit
/// successfully, judging stops immediately with the "Runtime Error" sentinel.
/// Otherwise every case runs and only the first mismatch is kept.
pub async fn evaluate<R>(
    runner: &R,
    code: &str,
    test_cases: &[TestCase],
    time_limit: TimeLimit,
) -> Verdict
where
    R: Runner + ?Sized,
{
    let fallback = [TestCase::default()];
    let cases: &[TestCase] = if test_cases.is_empty() {
        debug!("No test cases given, judging against empty input");
        &fallback
    } else {
        test_cases
    };

    let total_cases = cases.len();
    let mut passed_cases = 0;
    let mut first_output = String::new();
    let mut failure_detail: Option<FailureDetail> = None;

    info!(
        "Judging submission: {} test case(s), time limit {}s",
        total_cases,
        time_limit.secs()
    );

    for (idx, case) in cases.iter().enumerate() {
        let input = expand_newline_escapes(&case.input);
        let result = runner.run(code, &input, time_limit.as_duration()).await;

        if idx == 0 {
            first_output = result.stdout.clone();
            if !result.is_success() {
                warn!("First test case ended with {}, skipping the rest", result.status);
                return Verdict::first_case_failed(total_cases, result);
            }
        }

        let actual = normalize(&result.stdout);
        let expected = normalize(&case.expected_output);

        if actual == expected {
            passed_cases += 1;
        } else {
            debug!("Test case {} failed ({})", idx + 1, result.status);
            if failure_detail.is_none() {
                failure_detail = Some(FailureDetail {
                    case_index: idx + 1,
                    input: case.input.clone(),
                    actual_normalized: actual,
                    expected_normalized: expected,
                });
            }
        }
    }

    info!("Judging finished: {}/{} passed", passed_cases, total_cases);

    Verdict::completed(passed_cases, total_cases, first_output, failure_detail)
}

/// Job received from the Redis queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeJob {
    pub job_id: String,
    pub problem_id: i64,
    pub code: String,
    /// Language name or alias; the worker default when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Seconds; absent, zero or negative means the default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_limit: Option<i64>,
    #[serde(default)]
    pub test_cases: Vec<TestCase>,
}

impl JudgeJob {
    pub fn time_limit(&self) -> TimeLimit {
        TimeLimit::from_option(self.time_limit)
    }
}

/// Result of judging a submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeResult {
    pub job_id: String,
    pub problem_id: i64,
    #[serde(flatten)]
    pub response: JudgeResponse,
    pub passed_cases: usize,
    pub total_cases: usize,
    /// Worker-side failure unrelated to the submission (e.g., history not saved)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl JudgeResult {
    pub fn from_verdict(job: &JudgeJob, verdict: &Verdict) -> Self {
        Self {
            job_id: job.job_id.clone(),
            problem_id: job.problem_id,
            response: verdict.to_response(),
            passed_cases: verdict.passed_cases(),
            total_cases: verdict.total_cases(),
            error_message: None,
        }
    }

    /// Result for a job that could not be judged at all
    pub fn system_error(job: &JudgeJob, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            job_id: job.job_id.clone(),
            problem_id: job.problem_id,
            response: JudgeResponse {
                output: String::new(),
                is_correct: false,
                error: format!("System Error: {}", message),
                expected: String::new(),
            },
            passed_cases: 0,
            total_cases: job.test_cases.len().max(1),
            error_message: Some(message),
        }
    }
}

/// Judge a job and record the submission exactly once
pub async fn process_judge_job<R>(
    job: &JudgeJob,
    runner: &R,
    recorder: &dyn SubmissionRecorder,
) -> JudgeResult
where
    R: Runner + ?Sized,
{
    let verdict = evaluate(runner, &job.code, &job.test_cases, job.time_limit()).await;
    let mut result = JudgeResult::from_verdict(job, &verdict);

    let submission = NewSubmission::from_verdict(job.problem_id, &job.code, &verdict);
    if let Err(e) = recorder.record(submission).await {
        error!("Failed to record submission for job {}: {}", job.job_id, e);
        result.error_message = Some(format!("Failed to record submission: {}", e));
    }

    info!(
        "Job summary: job_id={}, problem_id={}, correct={}, passed={}/{}",
        job.job_id,
        job.problem_id,
        verdict.is_correct(),
        verdict.passed_cases(),
        verdict.total_cases()
    );

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ALL_PASSED, RUNTIME_ERROR};
    use crate::error::{JudgeError, Result};
    use crate::recorder::{MemoryRecorder, SubmissionRecord};
    use crate::runner::testing::{shell_language, CountingRunner};
    use crate::runner::{ExecutionResult, ExecutionStatus, ProcessRunner};
    use async_trait::async_trait;
    use std::time::Instant;

    const ECHO: &str = "read x\necho \"$x\"\n";

    fn shell_runner() -> ProcessRunner {
        ProcessRunner::new(shell_language())
    }

    #[test]
    fn test_time_limit_defaults() {
        assert_eq!(TimeLimit::from_secs(5).secs(), 5);
        assert_eq!(TimeLimit::from_secs(0).secs(), DEFAULT_TIME_LIMIT_SECS);
        assert_eq!(TimeLimit::from_secs(-3).secs(), DEFAULT_TIME_LIMIT_SECS);
        assert_eq!(TimeLimit::from_option(None).secs(), DEFAULT_TIME_LIMIT_SECS);
        assert_eq!(TimeLimit::from_option(Some(1)).as_duration(), Duration::from_secs(1));
    }

    #[test]
    fn test_job_deserializes_wire_format() {
        let job: JudgeJob = serde_json::from_str(
            r#"{"job_id":"j1","problem_id":7,"code":"print(1)",
                "test_cases":[{"input":"3","output":"60"},{"input":"4","expected_output":"80"}]}"#,
        )
        .unwrap();

        assert_eq!(job.language, None);
        assert_eq!(job.time_limit().secs(), DEFAULT_TIME_LIMIT_SECS);
        assert_eq!(job.test_cases, vec![TestCase::new("3", "60"), TestCase::new("4", "80")]);
    }

    #[tokio::test]
    async fn test_echo_program_is_correct() {
        let verdict = evaluate(
            &shell_runner(),
            ECHO,
            &[TestCase::new("5", "5")],
            TimeLimit::from_secs(5),
        )
        .await;

        assert!(verdict.is_correct());
        assert_eq!(verdict.passed_cases(), 1);
        assert_eq!(verdict.total_cases(), 1);
        assert_eq!(verdict.first_output(), "5\n");
        assert_eq!(verdict.expected(), ALL_PASSED);
        assert_eq!(verdict.error(), "");
    }

    #[tokio::test]
    async fn test_first_case_failure_stops_judging() {
        let runner = CountingRunner::new(|_| {
            ExecutionResult::runtime_error("", "ValueError: invalid literal\n")
        });
        let cases = [TestCase::new("3", "60"), TestCase::new("4", "80")];

        let verdict = evaluate(&runner, "boom", &cases, TimeLimit::default()).await;

        assert_eq!(runner.calls(), 1);
        assert!(!verdict.is_correct());
        assert_eq!(verdict.passed_cases(), 0);
        assert_eq!(verdict.total_cases(), 2);
        assert_eq!(verdict.expected(), RUNTIME_ERROR);
        assert_eq!(verdict.error(), "ValueError: invalid literal\n");
        assert!(verdict.failure_detail().is_none());
    }

    #[tokio::test]
    async fn test_crashing_program_with_real_process() {
        let cases = [TestCase::new("3", "60"), TestCase::new("4", "80")];
        let verdict = evaluate(
            &shell_runner(),
            "echo 'Traceback: boom' >&2\nexit 1\n",
            &cases,
            TimeLimit::from_secs(5),
        )
        .await;

        let response = verdict.to_response();
        assert!(!response.is_correct);
        assert_eq!(response.expected, RUNTIME_ERROR);
        assert_eq!(response.error, "Traceback: boom\n");
        assert_eq!(verdict.passed_cases(), 0);
    }

    #[tokio::test]
    async fn test_first_case_timeout_fails_fast() {
        let cases = [TestCase::new("1", "1"), TestCase::new("2", "2")];
        let started = Instant::now();
        let verdict = evaluate(
            &shell_runner(),
            "while :; do :; done\n",
            &cases,
            TimeLimit::from_secs(1),
        )
        .await;

        assert!(started.elapsed() < Duration::from_secs(3));
        assert_eq!(verdict.aborted().unwrap().status, ExecutionStatus::Timeout);
        assert_eq!(verdict.expected(), RUNTIME_ERROR);
        assert!(verdict.error().contains("Execution Timeout (1s limit)"));
    }

    #[tokio::test]
    async fn test_middle_mismatch_is_reported() {
        let runner = CountingRunner::new(|input| match input {
            "2" => ExecutionResult::success("wrong\n", ""),
            other => ExecutionResult::success(format!("{}\n", other), ""),
        });
        let cases = [
            TestCase::new("1", "1"),
            TestCase::new("2", "2"),
            TestCase::new("3", "3"),
        ];

        let verdict = evaluate(&runner, "echo", &cases, TimeLimit::default()).await;

        assert_eq!(runner.calls(), 3);
        assert_eq!(verdict.passed_cases(), 2);
        assert_eq!(verdict.total_cases(), 3);
        assert!(!verdict.is_correct());
        let detail = verdict.failure_detail().unwrap();
        assert_eq!(detail.case_index, 2);
        assert_eq!(detail.actual_normalized, "wrong");
        assert_eq!(detail.expected_normalized, "2");
        assert_eq!(verdict.expected(), "2");
    }

    #[tokio::test]
    async fn test_only_first_mismatch_is_kept() {
        let runner = CountingRunner::new(|_| ExecutionResult::success("0", ""));
        let cases = [
            TestCase::new("a", "1"),
            TestCase::new("b", "2"),
            TestCase::new("c", "0"),
        ];

        let verdict = evaluate(&runner, "x", &cases, TimeLimit::default()).await;

        // First case mismatched but exited successfully, so judging continues.
        assert_eq!(runner.calls(), 3);
        assert_eq!(verdict.passed_cases(), 1);
        assert_eq!(verdict.failure_detail().unwrap().case_index, 1);
        assert_eq!(verdict.first_output(), "0");
    }

    #[tokio::test]
    async fn test_later_failures_are_mismatches() {
        let runner = CountingRunner::new(|input| match input {
            "1" => ExecutionResult::success("1", ""),
            _ => ExecutionResult::timeout("", Duration::from_secs(2)),
        });
        let cases = [TestCase::new("1", "1"), TestCase::new("2", "2")];

        let verdict = evaluate(&runner, "x", &cases, TimeLimit::default()).await;

        assert_eq!(runner.calls(), 2);
        assert!(verdict.aborted().is_none());
        assert_eq!(verdict.passed_cases(), 1);
        assert_eq!(verdict.failure_detail().unwrap().case_index, 2);
    }

    #[tokio::test]
    async fn test_inputs_are_expanded_but_reported_raw() {
        let runner = CountingRunner::new(|_| ExecutionResult::success("7", ""));
        let cases = [TestCase::new("1", "7"), TestCase::new(r"3\n4", "12")];

        let verdict = evaluate(&runner, "x", &cases, TimeLimit::default()).await;

        assert_eq!(runner.inputs(), vec!["1".to_string(), "3\n4".to_string()]);
        let detail = verdict.failure_detail().unwrap();
        assert_eq!(detail.input, r"3\n4");
        assert!(verdict.summary().contains("Input: 3\\n4"));
    }

    #[tokio::test]
    async fn test_normalized_comparison() {
        let runner = CountingRunner::new(|_| ExecutionResult::success("a\r\nb\r\n  ", ""));
        let cases = [TestCase::new("", "```\na\nb\n```")];

        let verdict = evaluate(&runner, "x", &cases, TimeLimit::default()).await;
        assert!(verdict.is_correct());
    }

    #[tokio::test]
    async fn test_empty_case_list_uses_degenerate_case() {
        let silent = CountingRunner::new(|_| ExecutionResult::success("", ""));
        let verdict = evaluate(&silent, "pass", &[], TimeLimit::default()).await;
        assert_eq!(silent.inputs(), vec![String::new()]);
        assert!(verdict.is_correct());
        assert_eq!(verdict.total_cases(), 1);

        let chatty = CountingRunner::new(|_| ExecutionResult::success("hi", ""));
        let verdict = evaluate(&chatty, "print('hi')", &[], TimeLimit::default()).await;
        assert!(!verdict.is_correct());
        assert_eq!(verdict.failure_detail().unwrap().expected_normalized, "");
    }

    #[tokio::test]
    async fn test_concurrent_evaluations_match_sequential() {
        let runner = shell_runner();
        let double = "read x\necho $((x * 2))\n";
        let cases_a = [TestCase::new("5", "5"), TestCase::new("6", "7")];
        let cases_b = [TestCase::new("5", "10"), TestCase::new("6", "12")];
        let limit = TimeLimit::from_secs(5);

        let seq_a = evaluate(&runner, ECHO, &cases_a, limit).await;
        let seq_b = evaluate(&runner, double, &cases_b, limit).await;

        let (par_a, par_b) = tokio::join!(
            evaluate(&runner, ECHO, &cases_a, limit),
            evaluate(&runner, double, &cases_b, limit),
        );

        assert_eq!(par_a, seq_a);
        assert_eq!(par_b, seq_b);
        assert_eq!(seq_a.passed_cases(), 1);
        assert!(seq_b.is_correct());
    }

    fn job(test_cases: Vec<TestCase>) -> JudgeJob {
        JudgeJob {
            job_id: "job-1".to_string(),
            problem_id: 42,
            code: "code".to_string(),
            language: None,
            time_limit: Some(1),
            test_cases,
        }
    }

    #[tokio::test]
    async fn test_process_judge_job_records_once() {
        let recorder = MemoryRecorder::new();
        let runner = CountingRunner::new(|_| ExecutionResult::success("5", ""));

        let result =
            process_judge_job(&job(vec![TestCase::new("5", "5")]), &runner, &recorder).await;

        assert!(result.response.is_correct);
        assert_eq!(result.response.expected, ALL_PASSED);
        assert!(result.error_message.is_none());

        let history = recorder.history(42, 5).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].output, "5");
        assert_eq!(history[0].error, "");
        assert!(history[0].is_correct);
    }

    #[tokio::test]
    async fn test_process_judge_job_records_failure_summary() {
        let recorder = MemoryRecorder::new();
        let runner = CountingRunner::new(|_| ExecutionResult::success("4", ""));

        let result = process_judge_job(
            &job(vec![TestCase::new("1", "4"), TestCase::new("2", "8")]),
            &runner,
            &recorder,
        )
        .await;

        let history = recorder.history(42, 5).await.unwrap();
        assert_eq!(history.len(), 1);
        assert!(!history[0].is_correct);
        assert_eq!(history[0].error, result.response.error);
        assert!(history[0].error.starts_with("Failed. Passed: 1/2."));
        assert_eq!(result.response.expected, "8");
    }

    struct BrokenRecorder;

    #[async_trait]
    impl SubmissionRecorder for BrokenRecorder {
        async fn record(&self, _submission: NewSubmission) -> Result<()> {
            Err(JudgeError::Config("history store offline".to_string()))
        }

        async fn history(&self, _problem_id: i64, _limit: u32) -> Result<Vec<SubmissionRecord>> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn test_recording_failure_keeps_verdict() {
        let runner = CountingRunner::new(|_| ExecutionResult::success("5", ""));
        let result =
            process_judge_job(&job(vec![TestCase::new("5", "5")]), &runner, &BrokenRecorder)
                .await;

        assert!(result.response.is_correct);
        assert!(result
            .error_message
            .unwrap()
            .contains("history store offline"));
    }
}
