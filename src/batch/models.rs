//! Batch job domain types.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use tokio::time::Instant;
use tracing::warn;

use super::error::BatchError;

/// Upper bound on a single generation request.
pub const MAX_REQUEST_COUNT: usize = 1000;

/// Job status as reported by the backend.
///
/// `ended`/`completed` collapse into [`JobStatus::Completed`] and
/// `failed`/`error` into [`JobStatus::Failed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Validating,
    InProgress,
    Completed,
    Expired,
    Cancelled,
    Failed,
}

impl JobStatus {
    /// Parse a backend status string. Unknown strings yield `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "pending" => Some(Self::Pending),
            "validating" => Some(Self::Validating),
            "in_progress" => Some(Self::InProgress),
            "ended" | "completed" => Some(Self::Completed),
            "expired" => Some(Self::Expired),
            "cancelled" | "canceled" => Some(Self::Cancelled),
            "failed" | "error" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Validating => "validating",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Expired => "expired",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        self.rank() == 3
    }

    pub fn is_success(self) -> bool {
        self == Self::Completed
    }

    pub fn is_failure(self) -> bool {
        matches!(self, Self::Expired | Self::Cancelled | Self::Failed)
    }

    fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Validating => 1,
            Self::InProgress => 2,
            Self::Completed | Self::Expired | Self::Cancelled | Self::Failed => 3,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bulk generation request sent to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub certification: String,
    #[serde(default)]
    pub domains: Vec<String>,
    pub count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complexity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experience: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl GenerationRequest {
    pub fn new(certification: impl Into<String>, count: usize) -> Self {
        Self {
            certification: certification.into(),
            domains: Vec::new(),
            count,
            complexity: None,
            experience: None,
            tags: Vec::new(),
        }
    }

    pub fn validate(&self) -> Result<(), BatchError> {
        if self.certification.trim().is_empty() {
            return Err(BatchError::InvalidRequest {
                message: "certification must not be empty".to_string(),
            });
        }
        if self.count == 0 || self.count > MAX_REQUEST_COUNT {
            return Err(BatchError::InvalidRequest {
                message: format!(
                    "count must be between 1 and {MAX_REQUEST_COUNT}, got {}",
                    self.count
                ),
            });
        }
        Ok(())
    }

    /// Same request with a different item count (used for paging).
    pub fn with_count(&self, count: usize) -> Self {
        Self {
            count,
            ..self.clone()
        }
    }
}

/// A generated certification question.
///
/// Field names on the wire follow the question-bank schema; the backend's
/// camelCase and legacy spellings are accepted when reading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedItem {
    #[serde(
        rename = "question",
        alias = "body",
        alias = "question_text",
        alias = "questionText"
    )]
    pub body: String,
    #[serde(alias = "choices")]
    pub options: Vec<String>,
    #[serde(
        rename = "correct_answers",
        alias = "correctAnswers",
        alias = "correct_answer",
        alias = "correctAnswer",
        alias = "correct",
        deserialize_with = "one_or_many"
    )]
    pub correct: Vec<usize>,
    #[serde(rename = "explanation", alias = "rationale", default)]
    pub rationale: String,
    #[serde(rename = "domain", alias = "category")]
    pub category: String,
    #[serde(rename = "difficulty", alias = "complexity", default)]
    pub complexity: String,
    #[serde(
        rename = "experience_level",
        alias = "experienceLevel",
        alias = "experience",
        default
    )]
    pub experience: String,
}

impl GeneratedItem {
    /// More than one option is correct.
    pub fn is_multiple_response(&self) -> bool {
        self.correct.len() > 1
    }

    /// Structural sanity: at least two options, at least one correct index,
    /// every index in range and no duplicates.
    pub fn validate(&self) -> Result<(), String> {
        if self.body.trim().is_empty() {
            return Err("question text is empty".to_string());
        }
        if self.options.len() < 2 {
            return Err(format!("expected at least 2 options, got {}", self.options.len()));
        }
        if self.correct.is_empty() {
            return Err("no correct answer selected".to_string());
        }
        if let Some(out) = self.correct.iter().find(|&&i| i >= self.options.len()) {
            return Err(format!(
                "correct answer index {out} is out of range for {} options",
                self.options.len()
            ));
        }
        let mut seen = self.correct.clone();
        seen.sort_unstable();
        seen.dedup();
        if seen.len() != self.correct.len() {
            return Err("duplicate correct answer index".to_string());
        }
        Ok(())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(usize),
    Many(Vec<usize>),
}

fn one_or_many<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<usize>, D::Error> {
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(index) => vec![index],
        OneOrMany::Many(indices) => indices,
    })
}

/// Transient handle on a backend job.
#[derive(Debug, Clone)]
pub struct JobHandle {
    id: String,
    request: Option<GenerationRequest>,
    submitted_at: Instant,
}

impl JobHandle {
    /// Create a handle. The id is interpolated into URL paths, so path and
    /// query delimiters are rejected.
    pub fn new(id: impl Into<String>, request: Option<GenerationRequest>) -> Result<Self, BatchError> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty()
            || trimmed
                .chars()
                .any(|c| c.is_whitespace() || matches!(c, '/' | '?' | '#'))
        {
            return Err(BatchError::InvalidRequest {
                message: format!("invalid job id '{id}'"),
            });
        }

        Ok(Self {
            id: trimmed.to_string(),
            request,
            submitted_at: Instant::now(),
        })
    }

    /// Handle for a job known only by id (e.g. resumed after a timeout).
    pub fn resume(id: impl Into<String>) -> Result<Self, BatchError> {
        Self::new(id, None)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn request(&self) -> Option<&GenerationRequest> {
        self.request.as_ref()
    }

    pub fn submitted_at(&self) -> Instant {
        self.submitted_at
    }

    /// Wall-clock time since submission.
    pub fn elapsed(&self) -> Duration {
        self.submitted_at.elapsed()
    }
}

/// Local view of a job's progress while it is being awaited.
///
/// Status only moves forward; backwards observations are ignored.
#[derive(Debug, Clone)]
pub struct BatchJob {
    handle: JobHandle,
    status: Option<JobStatus>,
}

impl BatchJob {
    pub fn new(handle: JobHandle) -> Self {
        Self {
            handle,
            status: None,
        }
    }

    pub fn handle(&self) -> &JobHandle {
        &self.handle
    }

    pub fn id(&self) -> &str {
        self.handle.id()
    }

    /// Last accepted status, if any was observed.
    pub fn status(&self) -> Option<JobStatus> {
        self.status
    }

    /// Last known status is a non-terminal one.
    pub fn is_known_pending(&self) -> bool {
        self.status.is_some_and(|s| !s.is_terminal())
    }

    /// Record an observed status. Returns false when the observation was
    /// rejected because it would move the job backwards or out of a
    /// terminal state.
    pub fn advance(&mut self, next: JobStatus) -> bool {
        match self.status {
            Some(current) if current.is_terminal() && current != next => {
                warn!(job_id = self.id(), %current, %next, "ignoring status change after terminal status");
                false
            }
            Some(current) if next.rank() < current.rank() => {
                warn!(job_id = self.id(), %current, %next, "ignoring backwards status change");
                false
            }
            _ => {
                self.status = Some(next);
                true
            }
        }
    }
}
