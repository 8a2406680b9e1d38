//! # minicron Core
//!
//! Cron expression engine and job data model.
//!
//! ## Features
//!
//! - 5-field cron expressions parsed once into per-field membership sets
//! - Next-occurrence computation with the classic DOM/DOW OR rule
//! - `JobRecord` / `ExecutionLogEntry` entities shared by store,
//!   scheduler and API

pub mod cron;
pub mod error;
pub mod job;

pub use cron::CronExpression;
pub use error::CronError;
pub use job::{ExecutionLogEntry, JobRecord, RunStatus, TriggerKind};
