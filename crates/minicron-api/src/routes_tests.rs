use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use minicron_executor::Executor;
use minicron_scheduler::{Scheduler, SchedulerConfig};
use minicron_store::{JobStore, LogStore, MemoryJobStore, MemoryLogStore};

use super::*;

fn test_router() -> Router {
    let store: Arc<dyn JobStore> = Arc::new(MemoryJobStore::new());
    let logs: Arc<dyn LogStore> = Arc::new(MemoryLogStore::new());
    let scheduler = Arc::new(Scheduler::new(
        store.clone(),
        logs.clone(),
        Executor::new(Duration::from_secs(5), 64 * 1024),
        SchedulerConfig {
            poll_interval: Duration::from_secs(30),
            max_concurrent_runs: 2,
        },
    ));
    let state = Arc::new(AppState::new(store, logs, scheduler));
    create_router(state)
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&json).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

fn sample_job(id: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "name": "daily news",
        "cron_expression": "0 6 * * *",
        "command": "echo news",
        "description": "morning digest"
    })
}

#[tokio::test]
async fn test_create_job_returns_created_record() {
    let app = test_router();
    let (status, body) = send(&app, "POST", "/api/cronjobs", Some(sample_job("job-1"))).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["id"], "job-1");
    assert_eq!(body["name"], "daily news");
    assert_eq!(body["enabled"], true);
    assert!(body["next_run_at"].is_string());
    assert_eq!(body["run_count"], 0);
}

#[tokio::test]
async fn test_create_job_generates_id_when_missing() {
    let app = test_router();
    let mut job = sample_job("ignored");
    job.as_object_mut().unwrap().remove("id");

    let (status, body) = send(&app, "POST", "/api/cronjobs", Some(job)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body["id"].as_str().unwrap().starts_with("cron-"));
}

#[tokio::test]
async fn test_create_job_invalid_expression_rejected() {
    let app = test_router();
    let mut job = sample_job("job-1");
    job["cron_expression"] = serde_json::json!("99 * * * *");

    let (status, body) = send(&app, "POST", "/api/cronjobs", Some(job)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_kind"], "validation_error");
    assert!(body["message"].is_string());

    // Nothing was persisted.
    let (status, _) = send(&app, "GET", "/api/cronjobs/job-1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_job_duplicate_id_conflicts() {
    let app = test_router();
    send(&app, "POST", "/api/cronjobs", Some(sample_job("job-1"))).await;

    let (status, body) = send(&app, "POST", "/api/cronjobs", Some(sample_job("job-1"))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error_kind"], "conflict");
}

#[tokio::test]
async fn test_list_jobs() {
    let app = test_router();
    send(&app, "POST", "/api/cronjobs", Some(sample_job("job-1"))).await;
    send(&app, "POST", "/api/cronjobs", Some(sample_job("job-2"))).await;

    let (status, body) = send(&app, "GET", "/api/cronjobs", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
    assert_eq!(body["jobs"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_get_job_not_found() {
    let app = test_router();
    let (status, body) = send(&app, "GET", "/api/cronjobs/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error_kind"], "not_found");
}

#[tokio::test]
async fn test_update_job() {
    let app = test_router();
    send(&app, "POST", "/api/cronjobs", Some(sample_job("job-1"))).await;

    let (status, body) = send(
        &app,
        "PUT",
        "/api/cronjobs/job-1",
        Some(serde_json::json!({ "name": "evening news", "enabled": false })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "evening news");
    assert_eq!(body["enabled"], false);
    assert!(body["next_run_at"].is_null());
}

#[tokio::test]
async fn test_update_job_invalid_expression_rejected() {
    let app = test_router();
    send(&app, "POST", "/api/cronjobs", Some(sample_job("job-1"))).await;

    let (status, body) = send(
        &app,
        "PUT",
        "/api/cronjobs/job-1",
        Some(serde_json::json!({ "cron_expression": "not a cron" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_kind"], "validation_error");
}

#[tokio::test]
async fn test_delete_job_then_not_found() {
    let app = test_router();
    send(&app, "POST", "/api/cronjobs", Some(sample_job("job-1"))).await;

    let (status, _) = send(&app, "DELETE", "/api/cronjobs/job-1", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(&app, "DELETE", "/api/cronjobs/job-1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error_kind"], "not_found");
}

#[tokio::test]
async fn test_run_now_accepted() {
    let app = test_router();
    send(&app, "POST", "/api/cronjobs", Some(sample_job("job-1"))).await;

    let (status, body) = send(&app, "POST", "/api/cronjobs/job-1/run", None).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "accepted");
    assert_eq!(body["job_id"], "job-1");
}

#[tokio::test]
async fn test_run_now_unknown_job() {
    let app = test_router();
    let (status, body) = send(&app, "POST", "/api/cronjobs/nope/run", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error_kind"], "not_found");
}

#[tokio::test]
async fn test_run_now_while_running_conflicts() {
    let app = test_router();
    let mut job = sample_job("job-1");
    job["command"] = serde_json::json!("sleep 30");
    send(&app, "POST", "/api/cronjobs", Some(job)).await;

    let (status, _) = send(&app, "POST", "/api/cronjobs/job-1/run", None).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let (status, body) = send(&app, "POST", "/api/cronjobs/job-1/run", None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error_kind"], "conflict");
}

#[tokio::test]
async fn test_logs_unknown_job_not_found() {
    let app = test_router();
    let (status, body) = send(&app, "GET", "/api/cronjobs/nope/logs", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error_kind"], "not_found");
}

#[tokio::test]
async fn test_logs_after_manual_run() {
    let app = test_router();
    send(&app, "POST", "/api/cronjobs", Some(sample_job("job-1"))).await;
    send(&app, "POST", "/api/cronjobs/job-1/run", None).await;

    // The run is asynchronous; poll until its entry lands.
    for _ in 0..100 {
        let (status, body) = send(&app, "GET", "/api/cronjobs/job-1/logs", None).await;
        assert_eq!(status, StatusCode::OK);
        if body["count"] == 1 {
            let entry = &body["entries"][0];
            assert_eq!(entry["job_id"], "job-1");
            assert_eq!(entry["status"], "success");
            assert_eq!(entry["triggered_by"], "manual");
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("manual run never produced a log entry");
}

#[tokio::test]
async fn test_logs_empty_for_existing_job() {
    let app = test_router();
    send(&app, "POST", "/api/cronjobs", Some(sample_job("job-1"))).await;

    let (status, body) = send(&app, "GET", "/api/cronjobs/job-1/logs", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn test_scheduler_status() {
    let app = test_router();
    send(&app, "POST", "/api/cronjobs", Some(sample_job("job-1"))).await;

    let (status, body) = send(&app, "GET", "/api/scheduler/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_jobs"], 1);
    assert_eq!(body["enabled_jobs"], 1);
    assert_eq!(body["available_slots"], 2);
}

#[tokio::test]
async fn test_health() {
    let app = test_router();
    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
}
