use minicron_store::StoreError;
use thiserror::Error;

/// Errors surfaced by the scheduler.
#[derive(Error, Debug)]
pub enum SchedulerError {
    /// A manual trigger was rejected because the job is already executing.
    #[error("Job is already running: {0}")]
    AlreadyRunning(String),

    /// The worker pool has no free slot for another execution.
    #[error("Worker pool is saturated ({0} concurrent executions)")]
    Saturated(usize),

    /// Store access failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}
