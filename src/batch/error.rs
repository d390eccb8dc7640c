//! Batch orchestration error types.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use super::models::JobStatus;
use crate::backend::BackendError;

/// Errors surfaced by the batch orchestrator and output sink.
#[derive(Error, Diagnostic, Debug)]
pub enum BatchError {
    #[error("Malformed response from {endpoint}: {detail}")]
    #[diagnostic(
        code(qbank::batch::malformed_response),
        help(
            "The backend returned data in an unexpected shape. This might indicate a version mismatch."
        )
    )]
    MalformedResponse { endpoint: String, detail: String },

    #[error("Batch job {job_id} failed with status '{status}'{}", detail_suffix(.detail))]
    #[diagnostic(code(qbank::batch::job_failed))]
    JobFailed {
        job_id: String,
        status: String,
        detail: Option<String>,
    },

    #[error("Batch job {job_id} has expired or no longer exists at the backend{}", detail_suffix(.detail))]
    #[diagnostic(
        code(qbank::batch::expired),
        help(
            "Batch results are only retained for a limited time. Submit a new batch to regenerate these questions."
        )
    )]
    Expired {
        job_id: String,
        detail: Option<String>,
    },

    #[error("Timed out after {waited_secs}s waiting for batch job {job_id} (last status: {}){}", status_label(.last_status), detail_suffix(.last_error))]
    #[diagnostic(
        code(qbank::batch::timeout),
        help("The job may still complete. Resume it later with the same job id.")
    )]
    Timeout {
        job_id: String,
        waited_secs: u64,
        last_status: Option<JobStatus>,
        last_error: Option<String>,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Transport(#[from] BackendError),

    #[error("Invalid request: {message}")]
    #[diagnostic(code(qbank::batch::invalid_request))]
    InvalidRequest { message: String },

    #[error("Failed to write batch output {}: {source}", .path.display())]
    #[diagnostic(code(qbank::batch::persist))]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read batch output {}: {detail}", .path.display())]
    #[diagnostic(code(qbank::batch::read_output))]
    ReadOutput { path: PathBuf, detail: String },

    #[error("Failed to encode batch data: {0}")]
    #[diagnostic(code(qbank::batch::encode))]
    Encode(#[from] serde_json::Error),
}

impl BatchError {
    /// The backend reported the job as failed (including expiry).
    pub fn is_job_failure(&self) -> bool {
        matches!(self, Self::JobFailed { .. } | Self::Expired { .. })
    }

    /// Waiting again with the same job id may still succeed.
    pub fn is_resumable(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    pub fn job_id(&self) -> Option<&str> {
        match self {
            Self::JobFailed { job_id, .. }
            | Self::Expired { job_id, .. }
            | Self::Timeout { job_id, .. } => Some(job_id),
            _ => None,
        }
    }
}

fn detail_suffix(detail: &Option<String>) -> String {
    match detail {
        Some(d) if !d.is_empty() => format!(": {d}"),
        _ => String::new(),
    }
}

fn status_label(status: &Option<JobStatus>) -> String {
    status
        .map(|s| s.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
