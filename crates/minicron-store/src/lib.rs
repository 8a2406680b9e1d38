//! # minicron Store
//!
//! Persistence for jobs and execution logs.
//!
//! ## Features
//!
//! - `JobStore` trait with file-backed and in-memory implementations
//! - Atomic snapshot writes (staging file + rename), single writer path
//! - Append-only JSONL execution logs per job, retained after job delete

pub mod error;
pub mod job_store;
pub mod log_store;

pub use error::StoreError;
pub use job_store::{FileJobStore, JobStore, JobUpdate, MemoryJobStore};
pub use log_store::{FileLogStore, LogStore, MemoryLogStore};
