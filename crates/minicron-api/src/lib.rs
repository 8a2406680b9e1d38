//! HTTP API for minicron.
//!
//! Exposes job CRUD, manual triggering and execution log retrieval
//! over JSON. Every mutating call is synchronous with the underlying
//! store write: a success response describes state that is already
//! durable.

pub mod error;
pub mod routes;
pub mod server;
pub mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use server::{ApiServer, ServerConfig};
pub use state::AppState;
