//! Job persistence store.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use minicron_core::{CronExpression, JobRecord};

use crate::error::StoreError;

/// Caller-mutable fields of a job. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobUpdate {
    pub name: Option<String>,
    pub cron_expression: Option<String>,
    pub command: Option<String>,
    pub description: Option<String>,
    pub enabled: Option<bool>,
}

/// In-place mutation applied under the store's writer lock.
pub type JobMutation = Box<dyn FnOnce(&mut JobRecord) + Send>;

/// Job store trait for persistence.
///
/// All mutations funnel through one writer path per implementation;
/// readers observe the latest committed snapshot.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Create a job. Fails with `Conflict` on a duplicate id and with
    /// `Validation` on a bad expression; nothing is persisted on failure.
    async fn create(&self, job: JobRecord) -> Result<JobRecord, StoreError>;

    /// Load a job by ID.
    async fn get(&self, id: &str) -> Result<Option<JobRecord>, StoreError>;

    /// Load all jobs.
    async fn list(&self) -> Result<Vec<JobRecord>, StoreError>;

    /// Apply caller-mutable field changes. A changed expression is
    /// re-validated and `next_run_at` recomputed before anything is
    /// written.
    async fn update(&self, id: &str, update: JobUpdate) -> Result<JobRecord, StoreError>;

    /// Delete a job. Repeated deletes keep returning `NotFound`.
    async fn delete(&self, id: &str) -> Result<(), StoreError>;

    /// Serialized read-modify-write for the scheduler's bookkeeping
    /// fields (`last_run_at`, `last_status`, `next_run_at`, `run_count`).
    async fn apply(&self, id: &str, mutation: JobMutation) -> Result<JobRecord, StoreError>;
}

/// Validate the expression and stamp `next_run_at` before a persist.
/// Disabled jobs carry no next occurrence.
fn validate_and_stamp(job: &mut JobRecord, now: DateTime<Utc>) -> Result<(), StoreError> {
    if job.id.trim().is_empty() {
        return Err(StoreError::InvalidJob("id must not be empty".to_string()));
    }
    if job.name.trim().is_empty() {
        return Err(StoreError::InvalidJob("name must not be empty".to_string()));
    }
    if job.command.trim().is_empty() {
        return Err(StoreError::InvalidJob(
            "command must not be empty".to_string(),
        ));
    }

    let expr = CronExpression::parse(&job.cron_expression)?;
    job.next_run_at = if job.enabled {
        Some(expr.next_after(now)?)
    } else {
        None
    };
    Ok(())
}

/// Fold an update into an existing record. Re-enabling or changing the
/// expression recomputes `next_run_at` from now, never from the past
/// (missed occurrences are not backfilled).
fn apply_update(
    job: &mut JobRecord,
    update: JobUpdate,
    now: DateTime<Utc>,
) -> Result<(), StoreError> {
    let was_enabled = job.enabled;
    let old_expression = job.cron_expression.clone();

    if let Some(name) = update.name {
        job.name = name;
    }
    if let Some(expr) = update.cron_expression {
        job.cron_expression = expr;
    }
    if let Some(command) = update.command {
        job.command = command;
    }
    if let Some(description) = update.description {
        job.description = description;
    }
    if let Some(enabled) = update.enabled {
        job.enabled = enabled;
    }

    let expression_changed = job.cron_expression != old_expression;
    let reenabled = job.enabled && !was_enabled;

    if expression_changed || reenabled || !job.enabled {
        validate_and_stamp(job, now)?;
    } else {
        // Unchanged schedule: still refuse to persist an invalid record.
        CronExpression::parse(&job.cron_expression)?;
    }

    job.updated_at = now;
    Ok(())
}

/// In-memory job store for testing.
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<String, JobRecord>>,
}

impl MemoryJobStore {
    /// Create a new memory store.
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryJobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self, mut job: JobRecord) -> Result<JobRecord, StoreError> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.id) {
            return Err(StoreError::Conflict(job.id));
        }
        validate_and_stamp(&mut job, Utc::now())?;
        jobs.insert(job.id.clone(), job.clone());
        Ok(job)
    }

    async fn get(&self, id: &str) -> Result<Option<JobRecord>, StoreError> {
        let jobs = self.jobs.read().await;
        Ok(jobs.get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<JobRecord>, StoreError> {
        let jobs = self.jobs.read().await;
        let mut all: Vec<JobRecord> = jobs.values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(all)
    }

    async fn update(&self, id: &str, update: JobUpdate) -> Result<JobRecord, StoreError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        let mut candidate = job.clone();
        apply_update(&mut candidate, update, Utc::now())?;
        *job = candidate.clone();
        Ok(candidate)
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let mut jobs = self.jobs.write().await;
        jobs.remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn apply(&self, id: &str, mutation: JobMutation) -> Result<JobRecord, StoreError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        mutation(job);
        job.updated_at = Utc::now();
        Ok(job.clone())
    }
}

/// On-disk snapshot layout, one file for the whole store.
#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    version: String,
    last_update: DateTime<Utc>,
    jobs: HashMap<String, JobRecord>,
}

const SNAPSHOT_VERSION: &str = "1.0";
const SNAPSHOT_FILE: &str = "jobs.json";

/// File system based job store.
///
/// The whole store is one JSON snapshot. Every commit writes a staging
/// file next to it and renames it into place, so a crash mid-write
/// leaves either the old snapshot or the new one, never a torn file.
pub struct FileJobStore {
    path: PathBuf,
    jobs: RwLock<HashMap<String, JobRecord>>,
}

impl FileJobStore {
    /// Open (or initialize) the store under `data_dir`.
    pub async fn new(data_dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir)
            .await
            .map_err(|e| StoreError::Io(format!("Failed to create data directory: {}", e)))?;

        let path = data_dir.join(SNAPSHOT_FILE);
        let jobs = Self::load_snapshot(&path).await?;
        info!("Job store opened at {:?} ({} jobs)", path, jobs.len());

        Ok(Self {
            path,
            jobs: RwLock::new(jobs),
        })
    }

    async fn load_snapshot(path: &PathBuf) -> Result<HashMap<String, JobRecord>, StoreError> {
        if !path.exists() {
            return Ok(HashMap::new());
        }

        let content = fs::read_to_string(path)
            .await
            .map_err(|e| StoreError::Io(format!("Failed to read snapshot: {}", e)))?;

        match serde_json::from_str::<Snapshot>(&content) {
            Ok(snapshot) => Ok(snapshot.jobs),
            Err(e) => {
                warn!("Unreadable job snapshot at {:?}: {}; starting empty", path, e);
                Ok(HashMap::new())
            }
        }
    }

    /// Commit the given state: serialize, write staging file, rename.
    async fn persist(&self, jobs: &HashMap<String, JobRecord>) -> Result<(), StoreError> {
        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION.to_string(),
            last_update: Utc::now(),
            jobs: jobs.clone(),
        };

        let content = serde_json::to_string_pretty(&snapshot)
            .map_err(|e| StoreError::Serialize(format!("Failed to serialize snapshot: {}", e)))?;

        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, content)
            .await
            .map_err(|e| StoreError::Io(format!("Failed to write staging snapshot: {}", e)))?;
        fs::rename(&staging, &self.path)
            .await
            .map_err(|e| StoreError::Io(format!("Failed to commit snapshot: {}", e)))?;

        debug!("Committed {} jobs to {:?}", jobs.len(), self.path);
        Ok(())
    }
}

#[async_trait]
impl JobStore for FileJobStore {
    async fn create(&self, mut job: JobRecord) -> Result<JobRecord, StoreError> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.id) {
            return Err(StoreError::Conflict(job.id));
        }
        validate_and_stamp(&mut job, Utc::now())?;

        jobs.insert(job.id.clone(), job.clone());
        if let Err(e) = self.persist(&jobs).await {
            // Roll back the in-memory state so the caller sees the
            // store exactly as durable.
            jobs.remove(&job.id);
            return Err(e);
        }
        Ok(job)
    }

    async fn get(&self, id: &str) -> Result<Option<JobRecord>, StoreError> {
        let jobs = self.jobs.read().await;
        Ok(jobs.get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<JobRecord>, StoreError> {
        let jobs = self.jobs.read().await;
        let mut all: Vec<JobRecord> = jobs.values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(all)
    }

    async fn update(&self, id: &str, update: JobUpdate) -> Result<JobRecord, StoreError> {
        let mut jobs = self.jobs.write().await;
        let current = jobs
            .get(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        let mut candidate = current.clone();
        apply_update(&mut candidate, update, Utc::now())?;

        let previous = jobs.insert(id.to_string(), candidate.clone());
        if let Err(e) = self.persist(&jobs).await {
            if let Some(previous) = previous {
                jobs.insert(id.to_string(), previous);
            }
            return Err(e);
        }
        Ok(candidate)
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let mut jobs = self.jobs.write().await;
        let Some(previous) = jobs.remove(id) else {
            return Err(StoreError::NotFound(id.to_string()));
        };

        if let Err(e) = self.persist(&jobs).await {
            jobs.insert(id.to_string(), previous);
            return Err(e);
        }
        Ok(())
    }

    async fn apply(&self, id: &str, mutation: JobMutation) -> Result<JobRecord, StoreError> {
        let mut jobs = self.jobs.write().await;
        let current = jobs
            .get(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        let mut candidate = current.clone();
        mutation(&mut candidate);
        candidate.updated_at = Utc::now();

        let previous = jobs.insert(id.to_string(), candidate.clone());
        if let Err(e) = self.persist(&jobs).await {
            if let Some(previous) = previous {
                jobs.insert(id.to_string(), previous);
            }
            return Err(e);
        }
        Ok(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use minicron_core::RunStatus;
    use tempfile::TempDir;

    fn sample_job(id: &str) -> JobRecord {
        JobRecord::new(id, "daily news", "0 6 * * *", "fetch-news --digest")
            .with_description("morning digest")
    }

    #[tokio::test]
    async fn test_create_and_get_round_trip() {
        let store = MemoryJobStore::new();
        let created = store.create(sample_job("job-1")).await.unwrap();
        assert!(created.next_run_at.is_some());

        let got = store.get("job-1").await.unwrap().unwrap();
        assert_eq!(got.name, "daily news");
        assert_eq!(got.cron_expression, "0 6 * * *");
        assert_eq!(got.command, "fetch-news --digest");
        assert_eq!(got.description, "morning digest");
        assert!(got.enabled);
    }

    #[tokio::test]
    async fn test_create_duplicate_id_conflicts() {
        let store = MemoryJobStore::new();
        store.create(sample_job("job-1")).await.unwrap();

        let err = store.create(sample_job("job-1")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_create_invalid_expression_persists_nothing() {
        let store = MemoryJobStore::new();
        let mut job = sample_job("job-1");
        job.cron_expression = "99 * * * *".to_string();

        let err = store.create(job).await.unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        assert!(store.get("job-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_empty_command_rejected() {
        let store = MemoryJobStore::new();
        let mut job = sample_job("job-1");
        job.command = "  ".to_string();
        let err = store.create(job).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidJob(_)));
    }

    #[tokio::test]
    async fn test_update_revalidates_expression() {
        let store = MemoryJobStore::new();
        store.create(sample_job("job-1")).await.unwrap();

        let err = store
            .update(
                "job-1",
                JobUpdate {
                    cron_expression: Some("not a cron".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));

        // Failed update leaves the record untouched.
        let job = store.get("job-1").await.unwrap().unwrap();
        assert_eq!(job.cron_expression, "0 6 * * *");
    }

    #[tokio::test]
    async fn test_reenable_computes_future_next_run() {
        let store = MemoryJobStore::new();
        store.create(sample_job("job-1")).await.unwrap();

        let disabled = store
            .update(
                "job-1",
                JobUpdate {
                    enabled: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(disabled.next_run_at.is_none());

        let reenabled = store
            .update(
                "job-1",
                JobUpdate {
                    enabled: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(reenabled.next_run_at.unwrap() > Utc::now());
    }

    #[tokio::test]
    async fn test_delete_twice_returns_not_found() {
        let store = MemoryJobStore::new();
        store.create(sample_job("job-1")).await.unwrap();

        store.delete("job-1").await.unwrap();
        let err = store.delete("job-1").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_apply_mutation() {
        let store = MemoryJobStore::new();
        store.create(sample_job("job-1")).await.unwrap();

        let now = Utc::now();
        let job = store
            .apply("job-1", Box::new(move |job| job.mark_running(now)))
            .await
            .unwrap();
        assert_eq!(job.last_status, Some(RunStatus::Running));
        assert_eq!(job.run_count, 1);
    }

    #[tokio::test]
    async fn test_file_store_survives_reopen() {
        let dir = TempDir::new().unwrap();

        {
            let store = FileJobStore::new(dir.path()).await.unwrap();
            store.create(sample_job("job-1")).await.unwrap();
            store.create(sample_job("job-2")).await.unwrap();
        }

        let store = FileJobStore::new(dir.path()).await.unwrap();
        let jobs = store.list().await.unwrap();
        assert_eq!(jobs.len(), 2);
        let job = store.get("job-1").await.unwrap().unwrap();
        assert_eq!(job.command, "fetch-news --digest");
    }

    #[tokio::test]
    async fn test_file_store_no_staging_residue() {
        let dir = TempDir::new().unwrap();
        let store = FileJobStore::new(dir.path()).await.unwrap();
        store.create(sample_job("job-1")).await.unwrap();

        assert!(dir.path().join("jobs.json").exists());
        assert!(!dir.path().join("jobs.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_file_store_corrupt_snapshot_starts_empty() {
        let dir = TempDir::new().unwrap();
        tokio::fs::write(dir.path().join("jobs.json"), "{ not json")
            .await
            .unwrap();

        let store = FileJobStore::new(dir.path()).await.unwrap();
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_store_delete_idempotent_not_found() {
        let dir = TempDir::new().unwrap();
        let store = FileJobStore::new(dir.path()).await.unwrap();
        store.create(sample_job("job-1")).await.unwrap();

        store.delete("job-1").await.unwrap();
        assert!(matches!(
            store.delete("job-1").await.unwrap_err(),
            StoreError::NotFound(_)
        ));
    }
}
