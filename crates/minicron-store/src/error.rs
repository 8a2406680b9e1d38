//! Store errors.

use minicron_core::CronError;
use thiserror::Error;

/// Store error types.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No job with the given id.
    #[error("Job not found: {0}")]
    NotFound(String),

    /// A job with the given id already exists.
    #[error("Job already exists: {0}")]
    Conflict(String),

    /// The job's cron expression is invalid or unschedulable.
    #[error(transparent)]
    Validation(#[from] CronError),

    /// A non-expression field failed validation.
    #[error("Invalid job: {0}")]
    InvalidJob(String),

    /// Underlying filesystem failure.
    #[error("Storage IO error: {0}")]
    Io(String),

    /// Snapshot or log entry (de)serialization failure.
    #[error("Serialization error: {0}")]
    Serialize(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = StoreError::NotFound("job-1".to_string());
        assert!(err.to_string().contains("job-1"));
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_validation_from_cron_error() {
        let cron_err = CronError::invalid("bad", "expected 5 fields, got 1");
        let err: StoreError = cron_err.into();
        assert!(matches!(err, StoreError::Validation(_)));
        assert!(err.to_string().contains("bad"));
    }
}
