//! Classification of backend replies.
//!
//! The backend's status API is unreliable: it can answer 404/500 for jobs
//! that are alive, omit the status field, or tuck the status under a nested
//! object. Every reply is folded into a small set of signals here so the
//! polling loop never inspects raw bodies.

use serde_json::Value;
use tracing::warn;

use super::models::{GeneratedItem, JobStatus};

/// How a failure-terminal job ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Expired,
    Cancelled,
    Failed,
}

/// Terminal outcome reported by the status endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Terminal {
    Succeeded,
    Failed {
        kind: FailureKind,
        status: JobStatus,
        detail: Option<String>,
    },
}

/// Classified reply from the status endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendSignal {
    Terminal(Terminal),
    NonTerminal(JobStatus),
    /// The status endpoint gave no usable answer; says nothing about the job.
    Unreachable(String),
}

/// Classify a status-endpoint reply.
///
/// Non-2xx replies and bodies without a recognizable status are
/// `Unreachable`: the status endpoint is known to fail for live jobs.
pub fn classify_backend_signal(http_status: u16, body: &Value) -> BackendSignal {
    if !(200..300).contains(&http_status) {
        let reason = match error_message(body).or_else(|| text_body(body)) {
            Some(message) => format!("status endpoint returned HTTP {http_status}: {message}"),
            None => format!("status endpoint returned HTTP {http_status}"),
        };
        return BackendSignal::Unreachable(reason);
    }

    let Some(raw) = status_field(body) else {
        return BackendSignal::Unreachable("status response carried no status".to_string());
    };

    match JobStatus::parse(raw) {
        Some(status) if status.is_success() => BackendSignal::Terminal(Terminal::Succeeded),
        Some(status) if status.is_failure() => BackendSignal::Terminal(Terminal::Failed {
            kind: match status {
                JobStatus::Expired => FailureKind::Expired,
                JobStatus::Cancelled => FailureKind::Cancelled,
                _ => FailureKind::Failed,
            },
            status,
            detail: error_message(body),
        }),
        Some(status) => BackendSignal::NonTerminal(status),
        None => BackendSignal::Unreachable(format!("unrecognized job status '{raw}'")),
    }
}

/// Classified reply from a results endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultsSignal {
    Items(Vec<GeneratedItem>),
    Failed {
        /// The body itself carried an error (`success: false` or `error`),
        /// as opposed to a bare HTTP failure.
        explicit: bool,
        /// The message reads as "job gone" rather than "job broke".
        expired: bool,
        status: String,
        detail: String,
    },
    Malformed(String),
}

/// Classify a results-endpoint reply.
pub fn classify_results(http_status: u16, body: &Value) -> ResultsSignal {
    let explicit = has_error_signal(body);
    let success = (200..300).contains(&http_status);

    if explicit || !success {
        let detail = error_message(body)
            .or_else(|| text_body(body))
            .unwrap_or_else(|| format!("HTTP {http_status}"));
        let empty_status = body
            .get("status")
            .is_some_and(|s| s.is_null() || s.as_str().is_some_and(|s| s.trim().is_empty()));
        return ResultsSignal::Failed {
            explicit,
            expired: empty_status || is_expired_message(&detail),
            status: status_field(body)
                .map(str::to_string)
                .unwrap_or_else(|| {
                    if success {
                        "error".to_string()
                    } else {
                        format!("http_{http_status}")
                    }
                }),
            detail,
        };
    }

    match items_field(body) {
        Some(items) => ResultsSignal::Items(parse_items(items)),
        None => ResultsSignal::Malformed("response carried no question list".to_string()),
    }
}

/// Message fragments that mean the job no longer exists at the backend.
const EXPIRED_MARKERS: [&str; 9] = [
    "expired",
    "does not exist",
    "doesn't exist",
    "is invalid",
    "invalid batch",
    "invalid job",
    "empty status",
    "no status",
    "status is empty",
];

/// True when an error message describes an expired or unknown job.
pub fn is_expired_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    EXPIRED_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// `success: false` or a non-empty `error` field.
pub(crate) fn has_error_signal(body: &Value) -> bool {
    body.get("success").and_then(Value::as_bool) == Some(false) || error_field(body).is_some()
}

/// Best human-readable error text in a body.
pub(crate) fn error_message(body: &Value) -> Option<String> {
    error_field(body).or_else(|| {
        if body.get("success").and_then(Value::as_bool) == Some(false) {
            non_empty_str(body.get("message"))
        } else {
            None
        }
    })
}

fn error_field(body: &Value) -> Option<String> {
    match body.get("error")? {
        Value::String(s) => non_empty(s),
        Value::Object(obj) => {
            non_empty_str(obj.get("message")).or_else(|| non_empty_str(obj.get("type")))
        }
        Value::Null | Value::Bool(false) => None,
        other => Some(other.to_string()),
    }
}

/// Status string, looked up at the top level or under `batch`/`data`.
pub(crate) fn status_field(body: &Value) -> Option<&str> {
    ["status", "processing_status", "processingStatus"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str))
        .or_else(|| {
            ["batch", "data"]
                .iter()
                .find_map(|key| body.get(*key).and_then(status_field))
        })
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Question list under any of the keys the backend has used.
pub(crate) fn items_field(body: &Value) -> Option<&Value> {
    ["questions", "items", "results"]
        .iter()
        .find_map(|key| body.get(*key).filter(|v| v.is_array()))
        .or_else(|| body.get("data").and_then(items_field))
}

/// Job id under any of the keys the backend has used.
pub(crate) fn job_id_field(body: &Value) -> Option<String> {
    ["batchId", "batch_id", "jobId", "job_id", "id"]
        .iter()
        .find_map(|key| match body.get(*key)? {
            Value::String(s) => non_empty(s),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .or_else(|| {
            ["batch", "data"]
                .iter()
                .find_map(|key| body.get(*key).and_then(job_id_field))
        })
}

/// Decode a question array, dropping entries that are not usable questions.
pub(crate) fn parse_items(value: &Value) -> Vec<GeneratedItem> {
    let Some(entries) = value.as_array() else {
        return Vec::new();
    };

    entries
        .iter()
        .enumerate()
        .filter_map(|(index, entry)| {
            match serde_json::from_value::<GeneratedItem>(entry.clone()) {
                Ok(item) => match item.validate() {
                    Ok(()) => Some(item),
                    Err(reason) => {
                        warn!(index, %reason, "dropping invalid question from backend");
                        None
                    }
                },
                Err(e) => {
                    warn!(index, error = %e, "dropping undecodable question from backend");
                    None
                }
            }
        })
        .collect()
}

fn text_body(body: &Value) -> Option<String> {
    body.as_str().and_then(non_empty)
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value.and_then(Value::as_str).and_then(non_empty)
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
