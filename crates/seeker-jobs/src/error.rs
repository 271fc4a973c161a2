//! Error types for the job subsystem.

use thiserror::Error;

/// Errors that can occur in job operations.
#[derive(Debug, Error)]
pub enum JobError {
    /// Job id is unknown or the job was evicted
    #[error("job not found: {job_id}")]
    NotFound {
        /// The requested job id
        job_id: String,
    },

    /// Scan input failed validation
    #[error("invalid scan input: {0}")]
    InvalidInput(String),

    /// Engine-internal invariant violation
    #[error("internal job error: {0}")]
    Internal(String),
}

/// Result type for job operations.
pub type Result<T> = std::result::Result<T, JobError>;
