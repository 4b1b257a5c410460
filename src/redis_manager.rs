//! Redis Manager - Centralized Redis connection and operations
//!
//! This module handles all Redis-related operations including:
//! - Job queue operations (BLPOP)
//! - Result storage and publishing
//! - Job status and submission history snapshots for the web layer

use std::time::Duration;

use anyhow::{Context, Result};
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use serde::Serialize;
use tracing::{info, warn};

use crate::jobs::{JobStatus, WorkerJob};
use crate::judger::JudgeResult;
use crate::recorder::SubmissionRecord;

/// Redis key constants
pub mod keys {
    /// Judge job queue key
    pub const JUDGE_QUEUE: &str = "judge:queue";

    /// Judge result key prefix (for polling)
    pub const JUDGE_RESULT_PREFIX: &str = "judge:result:";

    /// Judge result channel (for pub/sub)
    pub const JUDGE_RESULT_CHANNEL: &str = "judge:results";

    /// Job status key prefix (for polling)
    pub const JOB_STATUS_PREFIX: &str = "judge:status:";

    /// Job status channel (for pub/sub)
    pub const JOB_STATUS_CHANNEL: &str = "judge:status";

    /// Recent submissions per problem
    pub const HISTORY_PREFIX: &str = "judge:history:";
}

const RESULT_EXPIRY_SECS: u64 = 3600; // 1 hour
const RECONNECT_DELAY: Duration = Duration::from_secs(3);

/// Redis connection wrapper.
///
/// BLPOP blocks the whole multiplexed connection, so use one manager for popping
/// jobs and a separate one (cloned freely) for results.
#[derive(Clone)]
pub struct RedisManager {
    client: redis::Client,
    conn: MultiplexedConnection,
}

impl RedisManager {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url).context("Failed to create Redis client")?;
        let conn = get_connection_with_retry(&client).await?;
        info!("Connected to Redis at {}", redis_url);

        Ok(Self { client, conn })
    }

    /// Wait up to `wait` for the next job from the queue.
    ///
    /// Returns `Ok(None)` when nothing arrived in time. Malformed payloads are
    /// logged and skipped. Automatically reconnects on connection failure.
    pub async fn pop_job(&mut self, wait: Duration) -> Result<Option<WorkerJob>> {
        let result: Option<(String, String)> =
            match self.conn.blpop(keys::JUDGE_QUEUE, wait.as_secs_f64()).await {
                Ok(res) => res,
                Err(e) => {
                    warn!("Redis BLPOP failed: {}. Reconnecting...", e);
                    self.reconnect().await?;
                    return Ok(None);
                }
            };

        let Some((_, job_data)) = result else {
            return Ok(None);
        };

        match serde_json::from_str::<WorkerJob>(&job_data) {
            Ok(job) => Ok(Some(job)),
            Err(e) => {
                warn!("Failed to parse job data: {}. Data: {}", e, job_data);
                Ok(None)
            }
        }
    }

    /// Store a judge result with a 1-hour expiration and publish it
    pub async fn store_judge_result(&mut self, result: &JudgeResult) -> Result<()> {
        self.store_result(
            &format!("{}{}", keys::JUDGE_RESULT_PREFIX, result.job_id),
            Some(keys::JUDGE_RESULT_CHANNEL),
            result,
        )
        .await
    }

    /// Store and publish a job state change
    pub async fn publish_status(&mut self, status: &JobStatus) -> Result<()> {
        self.store_result(
            &format!("{}{}", keys::JOB_STATUS_PREFIX, status.job_id),
            Some(keys::JOB_STATUS_CHANNEL),
            status,
        )
        .await
    }

    /// Replace the cached recent-submission window for a problem
    pub async fn store_history(
        &mut self,
        problem_id: i64,
        records: &[SubmissionRecord],
    ) -> Result<()> {
        self.store_result(
            &format!("{}{}", keys::HISTORY_PREFIX, problem_id),
            None,
            &records,
        )
        .await
    }

    /// Internal helper to store and publish a result
    async fn store_result<T: Serialize>(
        &mut self,
        key: &str,
        channel: Option<&str>,
        result: &T,
    ) -> Result<()> {
        let json = serde_json::to_string(result)?;

        // Try to store, reconnect on failure
        if let Err(e) = self
            .conn
            .set_ex::<_, _, ()>(key, &json, RESULT_EXPIRY_SECS)
            .await
        {
            warn!("Failed to store {}: {}. Reconnecting...", key, e);
            self.reconnect().await?;
            self.conn
                .set_ex::<_, _, ()>(key, &json, RESULT_EXPIRY_SECS)
                .await
                .with_context(|| format!("Failed to store {}", key))?;
        }

        // Publish to channel (ignore errors as there may be no subscribers)
        if let Some(chan) = channel {
            let _ = self.conn.publish::<_, _, ()>(chan, &json).await;
        }

        Ok(())
    }

    async fn reconnect(&mut self) -> Result<()> {
        self.conn = get_connection_with_retry(&self.client).await?;
        Ok(())
    }
}

/// Get a Redis connection with retry logic
async fn get_connection_with_retry(client: &redis::Client) -> Result<MultiplexedConnection> {
    loop {
        match client.get_multiplexed_async_connection().await {
            Ok(conn) => return Ok(conn),
            Err(e) => {
                warn!(
                    "Failed to connect to Redis: {}. Retrying in {} seconds...",
                    e,
                    RECONNECT_DELAY.as_secs()
                );
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
}
