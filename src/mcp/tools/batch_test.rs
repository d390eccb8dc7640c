//! Tests for batch MCP tools

use std::sync::Arc;
use std::time::Duration;

use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, ErrorCode, RawContent};
use serde_json::json;
use tempfile::TempDir;

use crate::backend::fake::{Method, ScriptedBackend, http, ok, questions_json};
use crate::backend::BackendRoutes;
use crate::batch::{BatchOrchestrator, OutputSink, PollPolicy, load_items};
use crate::mcp::tools::batch::*;

const STATUS: &str = "/api/questions/batch/job-7/status";
const RESULTS: &str = "/api/questions/batch/job-7/results";

fn build(backend: ScriptedBackend, dir: &TempDir) -> (Arc<ScriptedBackend>, BatchTools<ScriptedBackend>) {
    let backend = Arc::new(backend);
    let orchestrator = BatchOrchestrator::new(backend.clone(), BackendRoutes::default());
    let tools = BatchTools::new(
        Arc::new(orchestrator),
        Arc::new(OutputSink::new(dir.path())),
        PollPolicy::new(Duration::from_secs(5), Duration::from_secs(60)),
    );
    (backend, tools)
}

fn text(result: &CallToolResult) -> &str {
    match &result.content[0].raw {
        RawContent::Text(text) => text.text.as_str(),
        _ => panic!("Expected text content"),
    }
}

fn saved_path(output: &str) -> std::path::PathBuf {
    let line = output
        .lines()
        .find_map(|l| l.strip_prefix("Saved to: "))
        .expect("output names the saved file");
    std::path::PathBuf::from(line)
}

fn generate_params(count: usize) -> GenerateBatchParams {
    GenerateBatchParams {
        certification: "aws-saa-c03".to_string(),
        domains: Some(vec!["Design Secure Architectures".to_string()]),
        count,
        complexity: Some("medium".to_string()),
        experience: None,
        tags: None,
        format: None,
        wait: None,
        max_wait_seconds: None,
    }
}

fn queued_backend() -> ScriptedBackend {
    ScriptedBackend::new(|call, n| match (call.method, call.path.as_str()) {
        (Method::Post, _) => ok(json!({"success": true, "batchId": "job-7"})),
        (Method::Get, STATUS) if n == 0 => ok(json!({"status": "in_progress"})),
        (Method::Get, STATUS) => ok(json!({"status": "ended"})),
        (Method::Get, RESULTS) => ok(json!({"questions": questions_json(6, "Design Secure Architectures")})),
        _ => http(404, json!(null)),
    })
}

#[tokio::test(start_paused = true)]
async fn test_generate_waits_and_saves() {
    let dir = TempDir::new().unwrap();
    let (backend, tools) = build(queued_backend(), &dir);

    let result = tools
        .generate_questions_batch(Parameters(generate_params(6)))
        .await
        .expect("generation should succeed");
    let output = text(&result);

    assert!(output.starts_with("Generated 6 aws-saa-c03 questions (job job-7)"));
    assert!(output.contains("Design Secure Architectures: 6"));
    let path = saved_path(output);
    assert!(path.starts_with(dir.path()));
    assert_eq!(load_items(&path).unwrap().len(), 6);
    assert_eq!(backend.count(Method::Get, STATUS), 2);
}

#[tokio::test]
async fn test_generate_without_waiting_returns_job_id() {
    let dir = TempDir::new().unwrap();
    let (backend, tools) = build(queued_backend(), &dir);

    let mut params = generate_params(6);
    params.wait = Some(false);
    let result = tools
        .generate_questions_batch(Parameters(params))
        .await
        .unwrap();

    assert!(text(&result).contains("Batch job job-7 submitted"));
    assert_eq!(backend.calls().len(), 1);
    assert_eq!(std::fs::read_dir(dir.path()).map(|d| d.count()).unwrap_or(0), 0);
}

#[tokio::test]
async fn test_generate_synchronous_reply_saves_sql() {
    let dir = TempDir::new().unwrap();
    let (_, tools) = build(
        ScriptedBackend::new(|_, _| ok(json!({"questions": questions_json(2, "Security")}))),
        &dir,
    );

    let mut params = generate_params(2);
    params.format = Some("sql".to_string());
    let result = tools
        .generate_questions_batch(Parameters(params))
        .await
        .unwrap();

    let path = saved_path(text(&result));
    assert_eq!(path.extension().unwrap(), "sql");
    assert!(
        path.file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("aws-saa-c03_design-secure-architectures_2q_")
    );
}

#[tokio::test]
async fn test_invalid_input_maps_to_invalid_params() {
    let dir = TempDir::new().unwrap();
    let (backend, tools) = build(queued_backend(), &dir);

    let err = tools
        .generate_questions_batch(Parameters(generate_params(0)))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::INVALID_PARAMS);

    let mut params = generate_params(1);
    params.format = Some("csv".to_string());
    let err = tools
        .generate_questions_batch(Parameters(params))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
    assert!(backend.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_expired_job_is_internal_error_with_job_id() {
    let dir = TempDir::new().unwrap();
    let (_, tools) = build(
        ScriptedBackend::new(|_, _| ok(json!({"status": "expired"}))),
        &dir,
    );

    let err = tools
        .resume_batch(Parameters(ResumeBatchParams {
            job_id: "job-7".to_string(),
            format: None,
            max_wait_seconds: None,
        }))
        .await
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::INTERNAL_ERROR);
    assert_eq!(err.message, "batch_expired");
    let data = err.data.unwrap();
    assert_eq!(data["job_id"], "job-7");
    assert_eq!(data["resumable"], false);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_is_resumable() {
    let dir = TempDir::new().unwrap();
    let (_, tools) = build(
        ScriptedBackend::new(|_, _| ok(json!({"status": "in_progress"}))),
        &dir,
    );

    let err = tools
        .resume_batch(Parameters(ResumeBatchParams {
            job_id: "job-7".to_string(),
            format: None,
            max_wait_seconds: Some(12),
        }))
        .await
        .unwrap_err();

    assert_eq!(err.message, "batch_timeout");
    assert_eq!(err.data.unwrap()["resumable"], true);
}

#[tokio::test]
async fn test_check_status_reports_each_signal() {
    let dir = TempDir::new().unwrap();
    let cases = [
        (ok(json!({"status": "in_progress"})), "is in_progress"),
        (ok(json!({"status": "ended"})), "has completed"),
        (ok(json!({"status": "failed", "error": "quota"})), "ended with status 'failed': quota"),
        (http(500, json!(null)), "currently unavailable"),
    ];

    for (reply, expected) in cases {
        let (_, tools) = build(ScriptedBackend::new(move |_, _| reply.clone()), &dir);
        let result = tools
            .check_batch_status(Parameters(CheckBatchStatusParams {
                job_id: "job-7".to_string(),
            }))
            .await
            .unwrap();
        assert!(text(&result).contains(expected), "{}", text(&result));
    }
}

#[tokio::test]
async fn test_check_status_rejects_bad_job_id() {
    let dir = TempDir::new().unwrap();
    let (backend, tools) = build(queued_backend(), &dir);

    let err = tools
        .check_batch_status(Parameters(CheckBatchStatusParams {
            job_id: "../etc".to_string(),
        }))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
    assert!(backend.calls().is_empty());
}
