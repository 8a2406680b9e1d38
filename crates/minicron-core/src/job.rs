//! Job record and execution log entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outcome of the most recent (or current) execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Execution is in flight.
    Running,
    /// Command exited zero.
    Success,
    /// Command exited non-zero or could not be spawned.
    Failed,
    /// Command was killed on timeout.
    TimedOut,
}

/// What caused an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    /// Fired by the scheduler's poll loop.
    Scheduler,
    /// Fired by a run-now API call.
    Manual,
}

/// A persisted scheduled job.
///
/// `id` is immutable once created. `last_run_at`, `last_status`,
/// `next_run_at` and `run_count` are written only by the scheduler;
/// the remaining fields are caller-mutable through the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    /// Unique job ID.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// 5-field cron expression; validated before every persist.
    pub cron_expression: String,
    /// Opaque command string handed to the executor verbatim.
    pub command: String,
    /// Optional description.
    #[serde(default)]
    pub description: String,
    /// Whether the scheduler considers this job at all.
    pub enabled: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
    /// Start of the most recent execution.
    pub last_run_at: Option<DateTime<Utc>>,
    /// Outcome of the most recent execution.
    pub last_status: Option<RunStatus>,
    /// Next scheduled occurrence (derived from the expression).
    pub next_run_at: Option<DateTime<Utc>>,
    /// Number of executions started so far.
    #[serde(default)]
    pub run_count: u64,
}

impl JobRecord {
    /// Create a new record with defaults for the scheduler-owned fields.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        cron_expression: impl Into<String>,
        command: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            cron_expression: cron_expression.into(),
            command: command.into(),
            description: String::new(),
            enabled: true,
            created_at: now,
            updated_at: now,
            last_run_at: None,
            last_status: None,
            next_run_at: None,
            run_count: 0,
        }
    }

    /// Generate a fresh unique job id.
    pub fn generate_id() -> String {
        format!("cron-{}", Uuid::new_v4())
    }

    /// Add a description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the enabled flag.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Whether the job should fire at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.enabled && self.next_run_at.is_some_and(|next| next <= now)
    }

    /// Record the start of an execution.
    pub fn mark_running(&mut self, started_at: DateTime<Utc>) {
        self.last_run_at = Some(started_at);
        self.last_status = Some(RunStatus::Running);
        self.run_count += 1;
    }

    /// Record the end of an execution and the recomputed next occurrence.
    pub fn mark_finished(&mut self, status: RunStatus, next_run_at: Option<DateTime<Utc>>) {
        self.last_status = Some(status);
        self.next_run_at = next_run_at;
    }
}

/// One immutable execution record, appended per run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionLogEntry {
    /// Job this entry belongs to. Entries outlive job deletion.
    pub job_id: String,
    /// Execution start.
    pub started_at: DateTime<Utc>,
    /// Execution end.
    pub finished_at: DateTime<Utc>,
    /// Final status (never `Running`).
    pub status: RunStatus,
    /// Process exit code; `None` when the process was killed on timeout
    /// or never spawned.
    pub exit_code: Option<i32>,
    /// Captured stdout, truncated to the configured cap.
    pub stdout_excerpt: String,
    /// Captured stderr, truncated to the configured cap.
    pub stderr_excerpt: String,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
    /// What caused this execution.
    pub triggered_by: TriggerKind,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_job_record_new() {
        let job = JobRecord::new("job-1", "news", "0 6 * * *", "fetch-news");
        assert_eq!(job.id, "job-1");
        assert!(job.enabled);
        assert_eq!(job.run_count, 0);
        assert!(job.last_status.is_none());
        assert!(job.next_run_at.is_none());
    }

    #[test]
    fn test_generate_id_unique() {
        assert_ne!(JobRecord::generate_id(), JobRecord::generate_id());
    }

    #[test]
    fn test_is_due() {
        let now = Utc::now();
        let mut job = JobRecord::new("j", "n", "* * * * *", "true");

        assert!(!job.is_due(now));

        job.next_run_at = Some(now - Duration::minutes(1));
        assert!(job.is_due(now));

        job.enabled = false;
        assert!(!job.is_due(now));

        job.enabled = true;
        job.next_run_at = Some(now + Duration::minutes(1));
        assert!(!job.is_due(now));
    }

    #[test]
    fn test_run_lifecycle() {
        let now = Utc::now();
        let mut job = JobRecord::new("j", "n", "* * * * *", "true");

        job.mark_running(now);
        assert_eq!(job.last_status, Some(RunStatus::Running));
        assert_eq!(job.last_run_at, Some(now));
        assert_eq!(job.run_count, 1);

        let next = now + Duration::minutes(1);
        job.mark_finished(RunStatus::Success, Some(next));
        assert_eq!(job.last_status, Some(RunStatus::Success));
        assert_eq!(job.next_run_at, Some(next));
    }

    #[test]
    fn test_serde_round_trip() {
        let job = JobRecord::new("job-1", "news", "0 6 * * *", "fetch-news")
            .with_description("morning news digest");
        let json = serde_json::to_string(&job).unwrap();
        let back: JobRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, job.id);
        assert_eq!(back.description, "morning news digest");
        assert_eq!(back.cron_expression, "0 6 * * *");
    }

    #[test]
    fn test_run_status_serde_names() {
        assert_eq!(
            serde_json::to_string(&RunStatus::TimedOut).unwrap(),
            "\"timed_out\""
        );
        assert_eq!(
            serde_json::to_string(&TriggerKind::Manual).unwrap(),
            "\"manual\""
        );
    }
}
