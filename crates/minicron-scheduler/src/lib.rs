//! Scheduling loop for minicron.
//!
//! The [`Scheduler`] polls the job store on a fixed interval, fires jobs
//! whose `next_run_at` has passed, and records every execution in the log
//! store. Concurrency is bounded by a worker pool; a job never overlaps
//! with itself.

pub mod error;
pub mod scheduler;

pub use error::SchedulerError;
pub use scheduler::{Scheduler, SchedulerConfig, SchedulerStatus};
