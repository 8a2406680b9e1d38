//! Poll-based scheduler.
//!
//! Executions run on a bounded worker pool. The due check is driven
//! entirely by each job's persisted `next_run_at`; occurrences missed
//! while the process was down are never backfilled.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{watch, Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use minicron_core::{CronExpression, ExecutionLogEntry, JobRecord, RunStatus, TriggerKind};
use minicron_executor::Executor;
use minicron_store::{JobStore, LogStore, StoreError};

use crate::error::SchedulerError;

/// Scheduler tuning knobs.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Poll interval for the due check.
    pub poll_interval: Duration,
    /// Upper bound on simultaneously executing jobs.
    pub max_concurrent_runs: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            max_concurrent_runs: 8,
        }
    }
}

/// Point-in-time scheduler summary, served over the API.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub total_jobs: usize,
    pub enabled_jobs: usize,
    pub running_jobs: usize,
    pub available_slots: usize,
    pub poll_interval_secs: u64,
}

/// Polls the job store and executes due jobs.
///
/// A job is fired when it is enabled, its `next_run_at` has passed and
/// it is not already executing in this process. An occurrence that
/// arrives while the previous run is still in flight is skipped, not
/// queued; the finished run recomputes `next_run_at` from its own
/// completion time.
pub struct Scheduler {
    store: Arc<dyn JobStore>,
    logs: Arc<dyn LogStore>,
    executor: Executor,
    config: SchedulerConfig,
    running: Arc<Mutex<HashSet<String>>>,
    slots: Arc<Semaphore>,
}

impl Scheduler {
    /// Create a scheduler over the given stores and executor.
    pub fn new(
        store: Arc<dyn JobStore>,
        logs: Arc<dyn LogStore>,
        executor: Executor,
        config: SchedulerConfig,
    ) -> Self {
        let slots = Arc::new(Semaphore::new(config.max_concurrent_runs));
        Self {
            store,
            logs,
            executor,
            config,
            running: Arc::new(Mutex::new(HashSet::new())),
            slots,
        }
    }

    /// Startup reconciliation.
    ///
    /// A record persisted as `Running` means a previous process died
    /// mid-execution; it is marked `Failed`. Any enabled job whose
    /// `next_run_at` already passed (or is missing) gets a fresh
    /// occurrence computed from now, skipping everything missed while
    /// the process was down.
    pub async fn recover(&self) -> Result<(), SchedulerError> {
        let now = Utc::now();
        for job in self.store.list().await? {
            let interrupted = job.last_status == Some(RunStatus::Running);
            let stale_next = job.enabled && job.next_run_at.is_none_or(|next| next < now);
            if !interrupted && !stale_next {
                continue;
            }

            if interrupted {
                info!(job_id = %job.id, "Found execution interrupted by a previous shutdown, marking failed");
            }

            let next = next_occurrence(&job, now);
            let result = self
                .store
                .apply(
                    &job.id,
                    Box::new(move |record| {
                        if interrupted {
                            record.last_status = Some(RunStatus::Failed);
                        }
                        record.next_run_at = next;
                    }),
                )
                .await;
            if let Err(e) = result {
                error!(job_id = %job.id, "Failed to persist recovery state: {}", e);
            }
        }
        Ok(())
    }

    /// Run the poll loop until `shutdown` flips to true.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!(
            poll_interval = ?self.config.poll_interval,
            max_concurrent = self.config.max_concurrent_runs,
            "Scheduler started"
        );

        if let Err(e) = self.recover().await {
            error!("Startup recovery failed: {}", e);
        }

        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => self.tick().await,
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Scheduler stopping");
                        break;
                    }
                }
            }
        }
    }

    /// One due-check pass over the whole store.
    pub async fn tick(&self) {
        let now = Utc::now();
        let jobs = match self.store.list().await {
            Ok(jobs) => jobs,
            Err(e) => {
                error!("Failed to load jobs for poll tick: {}", e);
                return;
            }
        };

        for job in jobs {
            if !job.is_due(now) {
                continue;
            }
            let id = job.id.clone();
            match self.fire(job, TriggerKind::Scheduler).await {
                Ok(()) => {}
                Err(SchedulerError::AlreadyRunning(_)) => {
                    info!(job_id = %id, "Previous run still in progress, skipping this occurrence");
                }
                Err(SchedulerError::Saturated(limit)) => {
                    warn!(job_id = %id, "All {} execution slots busy, skipping this occurrence", limit);
                }
                Err(e) => error!(job_id = %id, "Failed to start job: {}", e),
            }
        }
    }

    /// Trigger one execution immediately, outside the schedule.
    ///
    /// Returns as soon as the execution is admitted; the run itself
    /// proceeds in the background. Manual runs obey the same overlap
    /// and pool limits as scheduled ones.
    pub async fn run_now(&self, id: &str) -> Result<(), SchedulerError> {
        let job = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        self.fire(job, TriggerKind::Manual).await
    }

    /// Current scheduler summary.
    pub async fn status(&self) -> Result<SchedulerStatus, SchedulerError> {
        let jobs = self.store.list().await?;
        let running_jobs = self.running.lock().await.len();
        Ok(SchedulerStatus {
            total_jobs: jobs.len(),
            enabled_jobs: jobs.iter().filter(|job| job.enabled).count(),
            running_jobs,
            available_slots: self.slots.available_permits(),
            poll_interval_secs: self.config.poll_interval.as_secs(),
        })
    }

    /// Admit one execution: claim the overlap guard and a pool slot,
    /// then hand off to a background task.
    async fn fire(&self, job: JobRecord, trigger: TriggerKind) -> Result<(), SchedulerError> {
        let permit = {
            let mut running = self.running.lock().await;
            if running.contains(&job.id) {
                return Err(SchedulerError::AlreadyRunning(job.id));
            }
            let permit = self
                .slots
                .clone()
                .try_acquire_owned()
                .map_err(|_| SchedulerError::Saturated(self.config.max_concurrent_runs))?;
            running.insert(job.id.clone());
            permit
        };

        tokio::spawn(execute(
            Arc::clone(&self.store),
            Arc::clone(&self.logs),
            self.executor.clone(),
            Arc::clone(&self.running),
            job,
            trigger,
            permit,
        ));
        Ok(())
    }
}

/// Next occurrence for a job, or `None` when it is disabled or its
/// expression no longer yields one.
fn next_occurrence(job: &JobRecord, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if !job.enabled {
        return None;
    }
    match CronExpression::parse(&job.cron_expression).and_then(|expr| expr.next_after(after)) {
        Ok(next) => Some(next),
        Err(e) => {
            warn!(job_id = %job.id, "Cannot compute next occurrence: {}", e);
            None
        }
    }
}

/// One full execution: persist the running state, run the command,
/// append the log entry, persist the outcome, release the overlap
/// guard. Never propagates errors; every failure is logged and the
/// guard is always released.
async fn execute(
    store: Arc<dyn JobStore>,
    logs: Arc<dyn LogStore>,
    executor: Executor,
    running: Arc<Mutex<HashSet<String>>>,
    job: JobRecord,
    trigger: TriggerKind,
    _permit: OwnedSemaphorePermit,
) {
    let started_at = Utc::now();
    info!(job_id = %job.id, name = %job.name, ?trigger, "Starting job execution");

    match store
        .apply(&job.id, Box::new(move |record| record.mark_running(started_at)))
        .await
    {
        Ok(_) => {}
        Err(StoreError::NotFound(_)) => {
            debug!(job_id = %job.id, "Job deleted before execution could start");
            running.lock().await.remove(&job.id);
            return;
        }
        // The outcome write below retries the snapshot; keep going.
        Err(e) => warn!(job_id = %job.id, "Failed to persist running state: {}", e),
    }

    let outcome = executor.run(&job.command).await;
    let finished_at = Utc::now();

    let (status, exit_code, stdout_excerpt, stderr_excerpt, duration_ms) = match outcome {
        Ok(result) => (
            result.status(),
            result.exit_code,
            result.stdout,
            result.stderr,
            result.duration.as_millis() as u64,
        ),
        Err(e) => {
            warn!(job_id = %job.id, "Execution failed before the command could run: {}", e);
            (
                RunStatus::Failed,
                None,
                String::new(),
                e.to_string(),
                (finished_at - started_at).num_milliseconds().max(0) as u64,
            )
        }
    };

    let entry = ExecutionLogEntry {
        job_id: job.id.clone(),
        started_at,
        finished_at,
        status,
        exit_code,
        stdout_excerpt,
        stderr_excerpt,
        duration_ms,
        triggered_by: trigger,
    };
    if let Err(e) = logs.append(&entry).await {
        error!(job_id = %job.id, "Failed to append execution log: {}", e);
    }

    // Re-read the record: expression or enabled flag may have changed
    // while the command ran, and the job may be gone entirely.
    match store.get(&job.id).await {
        Ok(Some(current)) => {
            let next = next_occurrence(&current, finished_at);
            if let Err(e) = store
                .apply(&job.id, Box::new(move |record| record.mark_finished(status, next)))
                .await
            {
                error!(job_id = %job.id, "Failed to persist run outcome: {}", e);
            }
        }
        Ok(None) => {
            debug!(job_id = %job.id, "Job deleted during execution, keeping its log entries");
        }
        Err(e) => error!(job_id = %job.id, "Failed to reload job after execution: {}", e),
    }

    info!(job_id = %job.id, ?status, duration_ms, "Job execution finished");
    running.lock().await.remove(&job.id);
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
