//! Execution log persistence.
//!
//! One append-only JSONL file per job id. Entries are immutable once
//! written and kept after the job itself is deleted, until an explicit
//! purge.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use minicron_core::ExecutionLogEntry;

use crate::error::StoreError;

/// Execution log store trait.
#[async_trait]
pub trait LogStore: Send + Sync {
    /// Append one closed execution record.
    async fn append(&self, entry: &ExecutionLogEntry) -> Result<(), StoreError>;

    /// Entries for a job, newest first, paginated.
    async fn list(
        &self,
        job_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ExecutionLogEntry>, StoreError>;

    /// Remove all entries for a job.
    async fn purge(&self, job_id: &str) -> Result<(), StoreError>;
}

/// In-memory log store for testing.
pub struct MemoryLogStore {
    entries: Mutex<HashMap<String, Vec<ExecutionLogEntry>>>,
}

impl MemoryLogStore {
    /// Create a new memory store.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryLogStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LogStore for MemoryLogStore {
    async fn append(&self, entry: &ExecutionLogEntry) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().await;
        entries
            .entry(entry.job_id.clone())
            .or_default()
            .push(entry.clone());
        Ok(())
    }

    async fn list(
        &self,
        job_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ExecutionLogEntry>, StoreError> {
        let entries = self.entries.lock().await;
        let Some(all) = entries.get(job_id) else {
            return Ok(Vec::new());
        };
        Ok(all
            .iter()
            .rev()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn purge(&self, job_id: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().await;
        entries.remove(job_id);
        Ok(())
    }
}

/// File system based log store.
pub struct FileLogStore {
    dir: PathBuf,
    // Serializes appends so concurrent executions never interleave lines.
    writer: Mutex<()>,
}

impl FileLogStore {
    /// Open (or initialize) the log directory under `data_dir`.
    pub async fn new(data_dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = data_dir.into().join("logs");
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| StoreError::Io(format!("Failed to create logs directory: {}", e)))?;
        Ok(Self {
            dir,
            writer: Mutex::new(()),
        })
    }

    fn log_path(&self, job_id: &str) -> PathBuf {
        self.dir.join(format!("{}.jsonl", sanitize_id(job_id)))
    }
}

/// Keep job ids safe to use as file names.
fn sanitize_id(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[async_trait]
impl LogStore for FileLogStore {
    async fn append(&self, entry: &ExecutionLogEntry) -> Result<(), StoreError> {
        let line = serde_json::to_string(entry)
            .map_err(|e| StoreError::Serialize(format!("Failed to serialize log entry: {}", e)))?;

        let _guard = self.writer.lock().await;
        let path = self.log_path(&entry.job_id);
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| StoreError::Io(format!("Failed to open log file: {}", e)))?;

        file.write_all(format!("{}\n", line).as_bytes())
            .await
            .map_err(|e| StoreError::Io(format!("Failed to append log entry: {}", e)))?;
        file.flush()
            .await
            .map_err(|e| StoreError::Io(format!("Failed to flush log file: {}", e)))?;

        debug!("Appended log entry for job '{}'", entry.job_id);
        Ok(())
    }

    async fn list(
        &self,
        job_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ExecutionLogEntry>, StoreError> {
        let path = self.log_path(job_id);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&path)
            .await
            .map_err(|e| StoreError::Io(format!("Failed to read log file: {}", e)))?;

        let mut entries = Vec::new();
        for line in content.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<ExecutionLogEntry>(line) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    warn!("Skipping unreadable log line in {:?}: {}", path, e);
                }
            }
        }

        Ok(entries
            .into_iter()
            .rev()
            .skip(offset)
            .take(limit)
            .collect())
    }

    async fn purge(&self, job_id: &str) -> Result<(), StoreError> {
        let path = self.log_path(job_id);
        if path.exists() {
            fs::remove_file(&path)
                .await
                .map_err(|e| StoreError::Io(format!("Failed to purge log file: {}", e)))?;
            debug!("Purged log for job '{}'", job_id);
        }
        Ok(())
    }
}
