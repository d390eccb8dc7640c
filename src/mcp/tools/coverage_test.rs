//! Tests for coverage MCP tools

use std::collections::BTreeMap;
use std::sync::Arc;

use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, ErrorCode, RawContent};
use serde_json::json;

use crate::backend::BackendRoutes;
use crate::backend::fake::{Method, ScriptedBackend, http, ok};
use crate::coverage::ProfileRegistry;
use crate::mcp::tools::coverage::*;

fn build(backend: ScriptedBackend) -> (Arc<ScriptedBackend>, CoverageTools<ScriptedBackend>) {
    let backend = Arc::new(backend);
    let tools = CoverageTools::new(
        backend.clone(),
        BackendRoutes::default(),
        Arc::new(ProfileRegistry::builtin()),
    );
    (backend, tools)
}

fn text(result: &CallToolResult) -> &str {
    match &result.content[0].raw {
        RawContent::Text(text) => text.text.as_str(),
        _ => panic!("Expected text content"),
    }
}

fn params(counts: Option<BTreeMap<String, i64>>) -> AnalyzeCoverageParams {
    AnalyzeCoverageParams {
        profile: "aws-clf-c02".to_string(),
        total_target: 50,
        counts,
        certification: None,
    }
}

#[tokio::test]
async fn test_analyze_with_supplied_counts() {
    let (backend, tools) = build(ScriptedBackend::new(|_, _| http(500, json!(null))));
    let counts = BTreeMap::from([
        ("Cloud Concepts".to_string(), 12),
        ("Security and Compliance".to_string(), 3),
    ]);

    let result = tools.analyze_coverage(Parameters(params(Some(counts)))).await.unwrap();
    let output = text(&result);

    assert!(output.starts_with("Coverage for aws-clf-c02: 15 of 50 questions (30%)"));
    assert!(output.contains("Security and Compliance: 12 more needed"));
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn test_analyze_fetches_counts_when_omitted() {
    let (backend, tools) = build(ScriptedBackend::new(|_, _| {
        ok(json!({"domains": {"Cloud Concepts": 12, "Billing, Pricing, and Support": 9}}))
    }));

    let result = tools.analyze_coverage(Parameters(params(None))).await.unwrap();
    let output = text(&result);

    assert!(output.contains("Over target:"));
    assert!(output.contains("Billing, Pricing, and Support: 3 surplus"));
    assert_eq!(backend.count(Method::Get, "/api/questions/stats/domains"), 1);
}

#[tokio::test]
async fn test_analyze_error_mapping() {
    let (_, tools) = build(ScriptedBackend::new(|_, _| http(503, json!(null))));

    let mut unknown = params(Some(BTreeMap::new()));
    unknown.profile = "gcp-ace".to_string();
    let err = tools.analyze_coverage(Parameters(unknown)).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
    assert_eq!(err.message, "unknown_profile");

    let mut zero = params(Some(BTreeMap::new()));
    zero.total_target = 0;
    let err = tools.analyze_coverage(Parameters(zero)).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::INVALID_PARAMS);

    let err = tools.analyze_coverage(Parameters(params(None))).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::INTERNAL_ERROR);
    assert_eq!(err.message, "malformed_counts");
}

#[tokio::test]
async fn test_list_profiles() {
    let (_, tools) = build(ScriptedBackend::new(|_, _| ok(json!({}))));

    let result = tools.list_coverage_profiles().await.unwrap();
    let output = text(&result);

    assert!(output.contains("aws-saa-c03: AWS Certified Solutions Architect - Associate"));
    assert!(output.contains("  - Design Secure Architectures (30%)"));
    assert!(output.contains("aws-soa-c02"));
}
