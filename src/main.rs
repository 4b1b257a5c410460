use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use judge::config::WorkerConfig;
use judge::jobs::{JobRegistry, JobStatus, WorkerJob};
use judge::judger::{process_judge_job, JudgeJob, JudgeResult};
use judge::languages;
use judge::recorder::{MemoryRecorder, SqliteRecorder, SubmissionRecorder};
use judge::redis_manager::RedisManager;
use judge::runner::ProcessRunner;

/// How long a single BLPOP waits before the loop gets a chance to do housekeeping
const POP_WAIT: Duration = Duration::from_secs(5);
const PRUNE_INTERVAL: Duration = Duration::from_secs(60);
/// Finished jobs stay visible in the registry this long
const REGISTRY_RETENTION_SECS: i64 = 3600;

struct Worker {
    config: WorkerConfig,
    registry: JobRegistry,
    recorder: Arc<dyn SubmissionRecorder>,
    results: RedisManager,
}

impl Worker {
    async fn handle_judge_job(&self, job: JudgeJob) {
        let job_id = job.job_id.clone();
        match self.registry.start(&job_id).await {
            Ok(status) => self.publish_status(&status).await,
            Err(e) => {
                error!("Cannot start job {}: {}", job_id, e);
                return;
            }
        }

        let language = job
            .language
            .clone()
            .unwrap_or_else(|| self.config.default_language.clone());

        let result = match languages::require_language(&language) {
            Ok(language) => {
                let mut runner = ProcessRunner::new(language);
                if let Some(dir) = &self.config.scratch_dir {
                    runner = runner.with_scratch_root(dir);
                }
                process_judge_job(&job, &runner, self.recorder.as_ref()).await
            }
            Err(e) => {
                warn!("Rejecting job {}: {}", job_id, e);
                JudgeResult::system_error(&job, e.to_string())
            }
        };

        let mut results = self.results.clone();
        let mut failure = result.error_message.clone();

        if let Err(e) = results.store_judge_result(&result).await {
            error!("Failed to store judge result for job {}: {:#}", job_id, e);
            failure.get_or_insert_with(|| format!("Failed to store judge result: {:#}", e));
        }

        if failure.is_none() {
            self.refresh_history(&mut results, job.problem_id).await;
        }

        let status = match failure {
            None => self.registry.complete(&job_id).await,
            Some(message) => self.registry.fail(&job_id, message).await,
        };
        match status {
            Ok(status) => {
                info!(
                    "Judge job completed: job_id={}, state={}, correct={}",
                    job_id, status.state, result.response.is_correct
                );
                self.publish_status(&status).await;
            }
            Err(e) => warn!("Failed to finish job {}: {}", job_id, e),
        }
    }

    async fn refresh_history(&self, results: &mut RedisManager, problem_id: i64) {
        match self
            .recorder
            .history(problem_id, self.config.history_limit)
            .await
        {
            Ok(records) => {
                if let Err(e) = results.store_history(problem_id, &records).await {
                    warn!("Failed to cache history for problem {}: {:#}", problem_id, e);
                }
            }
            Err(e) => warn!("Failed to load history for problem {}: {}", problem_id, e),
        }
    }

    async fn publish_status(&self, status: &JobStatus) {
        let mut results = self.results.clone();
        if let Err(e) = results.publish_status(status).await {
            warn!("Failed to publish status of job {}: {:#}", status.job_id, e);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("judge=info".parse()?)
                .add_directive("judge_worker=info".parse()?),
        )
        .init();

    dotenvy::dotenv().ok();

    let config = WorkerConfig::from_env().context("Invalid worker configuration")?;

    languages::init_languages()?;
    languages::require_language(&config.default_language)
        .context("Default language is not configured")?;
    info!(
        "Loaded languages: {}",
        languages::get_supported_languages().join(", ")
    );

    info!("Starting Judge Worker...");

    let recorder: Arc<dyn SubmissionRecorder> = match &config.database_url {
        Some(url) => Arc::new(
            SqliteRecorder::connect(url)
                .await
                .context("Failed to open submission database")?,
        ),
        None => {
            warn!("DATABASE_URL not set, submission history is kept in memory only");
            Arc::new(MemoryRecorder::new())
        }
    };

    let mut queue = RedisManager::connect(&config.redis_url).await?;
    let results = RedisManager::connect(&config.redis_url).await?;

    let permits = Arc::new(Semaphore::new(config.max_concurrent_jobs));
    info!(
        "Judging up to {} submissions concurrently",
        config.max_concurrent_jobs
    );

    let worker = Arc::new(Worker {
        config,
        registry: JobRegistry::new(),
        recorder,
        results,
    });

    let retention = chrono::Duration::seconds(REGISTRY_RETENTION_SECS);
    let mut last_prune = Instant::now();

    info!("Waiting for jobs...");

    loop {
        if last_prune.elapsed() >= PRUNE_INTERVAL {
            let pruned = worker.registry.prune_finished(retention).await;
            if pruned > 0 {
                info!("Pruned {} finished job(s) from the registry", pruned);
            }
            last_prune = Instant::now();
        }

        let Some(job) = queue.pop_job(POP_WAIT).await? else {
            continue;
        };

        match job {
            WorkerJob::Judge(job) => {
                info!(
                    "Received judge job: job_id={}, problem_id={}, test_cases={}",
                    job.job_id,
                    job.problem_id,
                    job.test_cases.len()
                );

                if !worker.registry.enqueue(&job.job_id).await {
                    warn!("Job {} is already queued or running, ignoring", job.job_id);
                    continue;
                }
                if let Some(status) = worker.registry.status(&job.job_id).await {
                    worker.publish_status(&status).await;
                }

                let permit = permits
                    .clone()
                    .acquire_owned()
                    .await
                    .context("Job semaphore closed")?;
                let worker = Arc::clone(&worker);
                tokio::spawn(async move {
                    worker.handle_judge_job(job).await;
                    drop(permit);
                });
            }
        }
    }
}
