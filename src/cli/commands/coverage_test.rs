use std::collections::BTreeMap;

use serde_json::json;
use tempfile::TempDir;

use crate::backend::BackendRoutes;
use crate::backend::fake::{ScriptedBackend, ok, questions_json};
use crate::batch::{BatchMetadata, GeneratedItem, GenerationRequest, OutputFormat, OutputSink};
use crate::cli::commands::coverage::*;
use crate::cli::error::{CliError, CliResult};
use crate::coverage::{CoverageError, ProfileRegistry};

fn pairs(raw: &[&str]) -> Vec<String> {
    raw.iter().map(|s| s.to_string()).collect()
}

fn no_backend() -> CliResult<ScriptedBackend> {
    panic!("backend should not be contacted")
}

#[test]
fn test_parse_count_pairs() {
    let counts = parse_count_pairs(&pairs(&["Cloud Concepts=12", " Billing, Pricing, and Support = 4"])).unwrap();

    assert_eq!(counts.get("Cloud Concepts"), Some(&12));
    assert_eq!(counts.get("Billing, Pricing, and Support"), Some(&4));
}

#[test]
fn test_parse_count_pairs_rejects_bad_input() {
    for bad in [&["Cloud Concepts"][..], &["Cloud Concepts=many"][..], &["A=1", "A=2"][..]] {
        assert!(matches!(
            parse_count_pairs(&pairs(bad)),
            Err(CliError::InvalidInput { .. })
        ));
    }
}

#[test]
fn test_counts_from_files_tallies_every_file() {
    let dir = TempDir::new().unwrap();
    let sink = OutputSink::new(dir.path());
    let metadata = BatchMetadata::from_request(&GenerationRequest::new("aws-clf-c02", 3));

    let security: Vec<GeneratedItem> =
        serde_json::from_value(questions_json(3, "Security and Compliance")).unwrap();
    let concepts: Vec<GeneratedItem> =
        serde_json::from_value(questions_json(2, "Cloud Concepts")).unwrap();
    let first = sink.persist(&security, &metadata, OutputFormat::Json).unwrap();
    let second = sink.persist(&concepts, &metadata, OutputFormat::Sql).unwrap();

    let counts = counts_from_files(&[first, second]).unwrap();

    assert_eq!(
        counts,
        BTreeMap::from([
            ("Cloud Concepts".to_string(), 2),
            ("Security and Compliance".to_string(), 3),
        ])
    );
}

#[tokio::test]
async fn test_observed_counts_only_fetches_for_backend_source() {
    let routes = BackendRoutes::default();

    let from_pairs = observed_counts(&CountSource::Pairs(pairs(&["Cloud Concepts=1"])), no_backend, &routes)
        .await
        .unwrap();
    assert_eq!(from_pairs.len(), 1);

    let backend = ScriptedBackend::new(|_, _| ok(json!({"data": {"domains": {"Cloud Concepts": 7}}})));
    let source = CountSource::Backend {
        certification: "aws-clf-c02".to_string(),
    };
    let fetched = observed_counts(&source, || Ok(backend), &routes).await.unwrap();
    assert_eq!(fetched.get("Cloud Concepts"), Some(&7));
}

#[test]
fn test_coverage_table_report() {
    let registry = ProfileRegistry::builtin();
    let counts = BTreeMap::from([
        ("cloud concepts".to_string(), 24),
        ("Security and Compliance".to_string(), 10),
        ("Networking".to_string(), 2),
    ]);

    let output = coverage(&registry, "AWS-CLF-C02", 100, &counts, "table").unwrap();

    assert!(output.starts_with("Coverage for aws-clf-c02: 36 of 100 questions (36%)"));
    assert!(output.contains("╭"));
    assert!(output.contains("Security and Compliance: 20 more needed"));
    assert!(output.contains("Not in profile:\n  - Networking: 2"));
}

#[test]
fn test_coverage_json_report() {
    let registry = ProfileRegistry::builtin();
    let counts = BTreeMap::from([("Cloud Concepts".to_string(), 40)]);

    let output = coverage(&registry, "aws-clf-c02", 100, &counts, "json").unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();

    assert_eq!(parsed["overall_percentage"], 40);
    assert_eq!(parsed["over"][0]["category"], "Cloud Concepts");
    assert_eq!(parsed["over"][0]["count"], 16);
}

#[test]
fn test_coverage_errors() {
    let registry = ProfileRegistry::builtin();
    let counts = BTreeMap::new();

    assert!(matches!(
        coverage(&registry, "nope", 100, &counts, "table"),
        Err(CliError::Coverage(CoverageError::UnknownProfile { .. }))
    ));
    assert!(matches!(
        coverage(&registry, "aws-clf-c02", 0, &counts, "table"),
        Err(CliError::Coverage(CoverageError::InvalidTotal))
    ));
}

#[test]
fn test_list_profiles() {
    let registry = ProfileRegistry::builtin();

    let table = list_profiles(&registry, "table").unwrap();
    assert!(table.contains("aws-saa-c03"));
    assert!(table.contains("Profile"));

    let json_output = list_profiles(&registry, "json").unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&json_output).unwrap();
    assert_eq!(parsed.as_array().unwrap().len(), registry.len());
}
