//! Shared state handed to every route handler.

use std::sync::Arc;
use std::time::Instant;

use minicron_scheduler::Scheduler;
use minicron_store::{JobStore, LogStore};

/// Application state: the stores and the scheduler, shared by all
/// handlers. The scheduler and the API write through the same store
/// instance, so their read-modify-write cycles never interleave.
pub struct AppState {
    pub store: Arc<dyn JobStore>,
    pub logs: Arc<dyn LogStore>,
    pub scheduler: Arc<Scheduler>,
    pub started_at: Instant,
}

impl AppState {
    /// Create state over the given stores and scheduler.
    pub fn new(
        store: Arc<dyn JobStore>,
        logs: Arc<dyn LogStore>,
        scheduler: Arc<Scheduler>,
    ) -> Self {
        Self {
            store,
            logs,
            scheduler,
            started_at: Instant::now(),
        }
    }

    /// Seconds since this state was created.
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
