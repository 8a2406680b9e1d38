//! # minicron Config
//!
//! Configuration management for the minicron service.

mod error;
mod loader;
mod schema;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::*;
