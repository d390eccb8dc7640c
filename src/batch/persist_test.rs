use chrono::{TimeZone, Utc};
use serde_json::json;
use tempfile::TempDir;

use crate::backend::fake::questions_json;
use crate::batch::error::BatchError;
use crate::batch::models::{GeneratedItem, GenerationRequest};
use crate::batch::persist::*;

fn items(count: usize) -> Vec<GeneratedItem> {
    serde_json::from_value(questions_json(count, "Design Secure Architectures")).unwrap()
}

fn fixed_clock() -> MockClock {
    let mut clock = MockClock::new();
    clock
        .expect_now()
        .returning(|| Utc.with_ymd_and_hms(2025, 3, 1, 10, 15, 0).unwrap());
    clock
}

fn metadata() -> BatchMetadata {
    let mut request = GenerationRequest::new("aws-saa-c03", 3);
    request.domains = vec!["Design Secure Architectures".to_string()];
    request.tags = vec!["s3".to_string()];
    BatchMetadata {
        job_id: Some("msgbatch_01".to_string()),
        request: Some(request),
    }
}

#[test]
fn test_output_format_parsing() {
    assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
    assert_eq!("sql".parse::<OutputFormat>().unwrap(), OutputFormat::Sql);
    assert!("csv".parse::<OutputFormat>().is_err());
    assert_eq!(
        OutputFormat::from_path(std::path::Path::new("a/b.sql")),
        Some(OutputFormat::Sql)
    );
}

#[test]
fn test_persist_json_creates_directory_and_names_file() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("nested").join("batches");
    let sink = OutputSink::with_clock(&dir, fixed_clock());

    let path = sink.persist(&items(3), &metadata(), OutputFormat::Json).unwrap();

    assert!(path.starts_with(&dir));
    let name = path.file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("msgbatch_01_3q_20250301T101500_"), "{name}");
    assert!(name.ends_with(".json"));

    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(written["metadata"]["job_id"], "msgbatch_01");
    assert_eq!(written["metadata"]["certification"], "aws-saa-c03");
    assert_eq!(written["metadata"]["question_count"], 3);
    assert_eq!(written["metadata"]["tags"], json!(["s3"]));
    assert_eq!(written["questions"][0]["correct_answers"], json!([0]));
}

#[test]
fn test_same_second_writes_never_overwrite() {
    let temp = TempDir::new().unwrap();
    let sink = OutputSink::with_clock(temp.path(), fixed_clock());
    let batch = items(2);

    let first = sink.persist(&batch, &metadata(), OutputFormat::Json).unwrap();
    let second = sink.persist(&batch, &metadata(), OutputFormat::Json).unwrap();
    let third = sink.persist(&batch, &metadata(), OutputFormat::Json).unwrap();

    assert_ne!(first, second);
    assert_ne!(second, third);
    assert!(second.to_string_lossy().ends_with("-1.json"));
    assert!(third.to_string_lossy().ends_with("-2.json"));
    assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 3);
}

#[test]
fn test_stem_falls_back_to_request_parameters() {
    let temp = TempDir::new().unwrap();
    let sink = OutputSink::with_clock(temp.path(), fixed_clock());
    let mut meta = metadata();
    meta.job_id = None;

    let path = sink.persist(&items(1), &meta, OutputFormat::Sql).unwrap();
    let name = path.file_name().unwrap().to_string_lossy().to_string();
    assert!(
        name.starts_with("aws-saa-c03_design-secure-architectures_1q_"),
        "{name}"
    );
    assert!(name.ends_with(".sql"));

    let path = sink
        .persist(&items(1), &BatchMetadata::default(), OutputFormat::Json)
        .unwrap();
    let name = path.file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("batch_1q_"), "{name}");
}

#[test]
fn test_job_id_is_sanitized_for_filenames() {
    let temp = TempDir::new().unwrap();
    let sink = OutputSink::with_clock(temp.path(), fixed_clock());
    let meta = BatchMetadata {
        job_id: Some("a:b*c".to_string()),
        request: None,
    };

    let path = sink.persist(&items(1), &meta, OutputFormat::Json).unwrap();
    assert_eq!(path.parent().unwrap(), temp.path());
    let name = path.file_name().unwrap().to_string_lossy().to_string();
    assert!(!name.contains(':') && !name.contains('*'), "{name}");
}

#[test]
fn test_load_items_reads_both_formats() {
    let temp = TempDir::new().unwrap();
    let sink = OutputSink::with_clock(temp.path(), fixed_clock());
    let batch = items(4);

    for format in [OutputFormat::Json, OutputFormat::Sql] {
        let path = sink.persist(&batch, &metadata(), format).unwrap();
        assert_eq!(load_items(&path).unwrap(), batch);
    }
}

#[test]
fn test_load_items_rejects_unknown_extension() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("questions.txt");
    std::fs::write(&path, "[]").unwrap();

    let err = load_items(&path).unwrap_err();
    assert!(matches!(err, BatchError::ReadOutput { .. }));
}

#[test]
fn test_unwritable_directory_is_persist_error() {
    let temp = TempDir::new().unwrap();
    let blocker = temp.path().join("file");
    std::fs::write(&blocker, "x").unwrap();
    let sink = OutputSink::with_clock(blocker.join("sub"), fixed_clock());

    let err = sink
        .persist(&items(1), &metadata(), OutputFormat::Json)
        .unwrap_err();
    assert!(matches!(err, BatchError::Persist { .. }));
}
