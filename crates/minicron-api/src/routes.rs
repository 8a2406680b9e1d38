//! HTTP route definitions and handlers.
//!
//! ```text
//! /api/cronjobs
//!   POST   /api/cronjobs            - Create job (201)
//!   GET    /api/cronjobs            - List jobs
//!   GET    /api/cronjobs/{id}       - Get job
//!   PUT    /api/cronjobs/{id}       - Update job
//!   DELETE /api/cronjobs/{id}       - Delete job (204)
//!   POST   /api/cronjobs/{id}/run   - Trigger immediately (202)
//!   GET    /api/cronjobs/{id}/logs  - Execution log, newest first
//!
//! /api/scheduler/status - Scheduler summary
//! /health               - Liveness and uptime
//! ```

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::info;

use minicron_core::{ExecutionLogEntry, JobRecord};
use minicron_store::JobUpdate;

use crate::error::ApiError;
use crate::state::AppState;

/// Body for POST /api/cronjobs. A missing `id` gets one generated.
#[derive(Debug, Deserialize)]
pub struct CreateJobRequest {
    pub id: Option<String>,
    pub name: String,
    pub cron_expression: String,
    pub command: String,
    #[serde(default)]
    pub description: String,
    pub enabled: Option<bool>,
}

/// Response for listing jobs.
#[derive(Debug, Serialize)]
pub struct JobListResponse {
    pub count: usize,
    pub jobs: Vec<JobRecord>,
}

/// Pagination for the log listing.
#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    #[serde(default = "default_log_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

fn default_log_limit() -> usize {
    50
}

/// Response for the log listing.
#[derive(Debug, Serialize)]
pub struct LogListResponse {
    pub count: usize,
    pub entries: Vec<ExecutionLogEntry>,
}

/// Build the full router over the shared state.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/cronjobs", post(create_job))
        .route("/api/cronjobs", get(list_jobs))
        .route("/api/cronjobs/{id}", get(get_job))
        .route("/api/cronjobs/{id}", put(update_job))
        .route("/api/cronjobs/{id}", delete(delete_job))
        .route("/api/cronjobs/{id}/run", post(run_job))
        .route("/api/cronjobs/{id}/logs", get(list_job_logs))
        .route("/api/scheduler/status", get(scheduler_status))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Create a new job.
///
/// POST /api/cronjobs
async fn create_job(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateJobRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = req.id.unwrap_or_else(JobRecord::generate_id);
    info!("Creating cron job {} ({} @ {})", id, req.name, req.cron_expression);

    let record = JobRecord::new(id, req.name, req.cron_expression, req.command)
        .with_description(req.description)
        .with_enabled(req.enabled.unwrap_or(true));
    let created = state.store.create(record).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// List all jobs.
///
/// GET /api/cronjobs
async fn list_jobs(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let jobs = state.store.list().await?;
    Ok(Json(JobListResponse {
        count: jobs.len(),
        jobs,
    }))
}

/// Get a job by id.
///
/// GET /api/cronjobs/{id}
async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let job = state
        .store
        .get(&id)
        .await?
        .ok_or(ApiError::NotFound(id))?;
    Ok(Json(job))
}

/// Update caller-mutable fields of a job.
///
/// PUT /api/cronjobs/{id}
async fn update_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(update): Json<JobUpdate>,
) -> Result<impl IntoResponse, ApiError> {
    info!("Updating cron job {}", id);
    let updated = state.store.update(&id, update).await?;
    Ok(Json(updated))
}

/// Delete a job. Its execution log is kept.
///
/// DELETE /api/cronjobs/{id}
async fn delete_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    info!("Deleting cron job {}", id);
    state.store.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Trigger one execution immediately, outside the schedule. The
/// response is returned as soon as the run is admitted; the command
/// itself finishes in the background.
///
/// POST /api/cronjobs/{id}/run
async fn run_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    info!("Manual trigger for cron job {}", id);
    state.scheduler.run_now(&id).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "status": "accepted", "job_id": id })),
    ))
}

/// Execution log for a job, newest first.
///
/// Entries outlive job deletion, so the listing answers as long as
/// either the job or any of its entries still exist.
///
/// GET /api/cronjobs/{id}/logs
async fn list_job_logs(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<LogsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let entries = state.logs.list(&id, query.limit, query.offset).await?;
    if entries.is_empty() && state.store.get(&id).await?.is_none() {
        return Err(ApiError::NotFound(id));
    }
    Ok(Json(LogListResponse {
        count: entries.len(),
        entries,
    }))
}

/// Scheduler summary.
///
/// GET /api/scheduler/status
async fn scheduler_status(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let status = state.scheduler.status().await?;
    Ok(Json(status))
}

/// Liveness and uptime.
///
/// GET /health
async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_seconds": state.uptime_seconds(),
    }))
}

#[cfg(test)]
#[path = "routes_tests.rs"]
mod tests;
