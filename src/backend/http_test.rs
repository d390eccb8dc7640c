use std::time::Duration;

use serde_json::json;

use crate::backend::http::*;

// Initialize crypto provider once for all tests
fn init_crypto() {
    let _ = rustls::crypto::ring::default_provider().install_default();
}

#[test]
fn test_new_trims_trailing_slash() {
    init_crypto();
    let backend = HttpJobBackend::new("http://custom:8080/", Duration::from_secs(5)).unwrap();
    assert_eq!(backend.base_url(), "http://custom:8080");
}

#[test]
fn test_url_joins_paths() {
    init_crypto();
    let backend = HttpJobBackend::new("http://explicit:7777", Duration::from_secs(5)).unwrap();
    assert_eq!(
        backend.url("/api/questions/batch"),
        "http://explicit:7777/api/questions/batch"
    );
    assert_eq!(
        backend.url("api/questions/batch"),
        "http://explicit:7777/api/questions/batch"
    );
}

#[test]
fn test_decode_body_json() {
    assert_eq!(
        decode_body(r#"{"status":"in_progress"}"#),
        json!({"status": "in_progress"})
    );
}

#[test]
fn test_decode_body_keeps_plain_text() {
    assert_eq!(
        decode_body("Cannot GET /api/batch/x/results\n"),
        json!("Cannot GET /api/batch/x/results")
    );
}

#[test]
fn test_decode_body_empty_is_null() {
    assert_eq!(decode_body("   "), serde_json::Value::Null);
}

// Note: network behaviour is exercised through the scripted backend in the
// orchestrator tests.
