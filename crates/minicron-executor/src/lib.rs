//! # minicron Executor
//!
//! Runs one opaque job command with a timeout and bounded output
//! capture. A failing or timing-out command is data in the result;
//! only infrastructure failures (spawn, reap) surface as errors.

mod exec;

pub use exec::{ExecError, ExecutionResult, Executor};
