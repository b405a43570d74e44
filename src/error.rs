use thiserror::Error;

use crate::core::JobStatus;

#[derive(Error, Debug)]
pub enum CsubatchError {
    #[error("Invalid job: {0}")]
    InvalidJob(String),

    #[error("Invalid status transition {from} -> {to} for job {job}")]
    InvalidTransition {
        job: String,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Unknown scheduling policy: {0}")]
    InvalidPolicy(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CsubatchError>;
