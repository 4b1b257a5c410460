//! Error types shared across the judge library

use thiserror::Error;

use crate::jobs::JobState;

#[derive(Error, Debug)]
pub enum JudgeError {
    #[error("Failed to stage submission: {0}")]
    Staging(#[source] std::io::Error),

    #[error("Failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to wait for process: {0}")]
    Wait(#[source] std::io::Error),

    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("Empty run command for language `{0}`")]
    EmptyCommand(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown job: {0}")]
    UnknownJob(String),

    #[error("Job {job_id} cannot move from {from} to {to}")]
    InvalidTransition {
        job_id: String,
        from: JobState,
        to: JobState,
    },
}

pub type Result<T> = std::result::Result<T, JudgeError>;
