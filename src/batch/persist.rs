//! Batch output persistence.
//!
//! Every run writes exactly one new file. Names are derived from the job (or
//! request), the item count, a timestamp and a digest of the rendered
//! content; files are opened create-new and a numeric suffix is appended on
//! collision, so an existing file is never overwritten.
//!
//! Output layout:
//! ```text
//! <output-dir>/
//!   msgbatch_01abc_25q_20250301T101500_3f9a0c12.json
//!   aws-saa-c03_design-secure-architectures_10q_20250301T101502_77e1d0aa.sql
//! ```

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

#[cfg(test)]
use mockall::automock;

use super::error::BatchError;
use super::models::{GeneratedItem, GenerationRequest, JobHandle};
use super::sql::{parse_insert_statements, render_insert_statements};

/// Longest filename stem taken from job ids or request parameters.
const MAX_STEM_LEN: usize = 80;

/// Collision suffixes tried before giving up.
const MAX_NAME_ATTEMPTS: usize = 1000;

/// Source of the timestamp embedded in output files. Can be mocked in tests.
#[cfg_attr(test, automock)]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Output file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One self-describing JSON document with metadata and questions.
    #[default]
    Json,
    /// One `INSERT` statement per question.
    Sql,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Sql => "sql",
        }
    }

    /// Guess the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| ext.parse().ok())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "sql" => Ok(Self::Sql),
            other => Err(format!("unknown output format '{other}' (expected json or sql)")),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// What is known about the run that produced a set of questions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchMetadata {
    pub job_id: Option<String>,
    pub request: Option<GenerationRequest>,
}

impl BatchMetadata {
    pub fn from_handle(handle: &JobHandle) -> Self {
        Self {
            job_id: Some(handle.id().to_string()),
            request: handle.request().cloned(),
        }
    }

    pub fn from_request(request: &GenerationRequest) -> Self {
        Self {
            job_id: None,
            request: Some(request.clone()),
        }
    }
}

/// Metadata block written alongside the questions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certification: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub domains: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complexity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experience: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    pub question_count: usize,
    pub generated_at: DateTime<Utc>,
}

/// A persisted batch: metadata plus questions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputRecord {
    pub metadata: RecordMetadata,
    pub questions: Vec<GeneratedItem>,
}

impl OutputRecord {
    pub fn new(metadata: &BatchMetadata, items: &[GeneratedItem], generated_at: DateTime<Utc>) -> Self {
        let request = metadata.request.as_ref();
        Self {
            metadata: RecordMetadata {
                job_id: metadata.job_id.clone(),
                certification: request.map(|r| r.certification.clone()),
                domains: request.map(|r| r.domains.clone()).unwrap_or_default(),
                requested_count: request.map(|r| r.count),
                complexity: request.and_then(|r| r.complexity.clone()),
                experience: request.and_then(|r| r.experience.clone()),
                tags: request.map(|r| r.tags.clone()).unwrap_or_default(),
                question_count: items.len(),
                generated_at,
            },
            questions: items.to_vec(),
        }
    }
}

/// Directory that batch outputs are written to.
pub struct OutputSink<C: Clock = SystemClock> {
    dir: PathBuf,
    clock: C,
}

impl OutputSink<SystemClock> {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_clock(dir, SystemClock)
    }
}

impl<C: Clock> OutputSink<C> {
    pub fn with_clock(dir: impl Into<PathBuf>, clock: C) -> Self {
        Self {
            dir: dir.into(),
            clock,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `items` to a new file and return its path.
    pub fn persist(
        &self,
        items: &[GeneratedItem],
        metadata: &BatchMetadata,
        format: OutputFormat,
    ) -> Result<PathBuf, BatchError> {
        fs::create_dir_all(&self.dir).map_err(|source| BatchError::Persist {
            path: self.dir.clone(),
            source,
        })?;

        let generated_at = self.clock.now();
        let record = OutputRecord::new(metadata, items, generated_at);
        let content = match format {
            OutputFormat::Json => serde_json::to_string_pretty(&record)?,
            OutputFormat::Sql => render_insert_statements(&record)?,
        };

        let base = format!(
            "{}_{}q_{}_{}",
            file_stem(metadata),
            items.len(),
            generated_at.format("%Y%m%dT%H%M%S"),
            short_digest(&content)
        );
        let path = write_new(&self.dir, &base, format.extension(), &content)?;

        info!(path = %path.display(), count = items.len(), %format, "persisted batch output");
        Ok(path)
    }
}

/// Read the questions back from a file written by [`OutputSink::persist`].
pub fn load_items(path: &Path) -> Result<Vec<GeneratedItem>, BatchError> {
    let read_error = |detail: String| BatchError::ReadOutput {
        path: path.to_path_buf(),
        detail,
    };

    let content = fs::read_to_string(path).map_err(|e| read_error(e.to_string()))?;
    let format = OutputFormat::from_path(path)
        .ok_or_else(|| read_error("expected a .json or .sql file".to_string()))?;

    match format {
        OutputFormat::Json => serde_json::from_str::<OutputRecord>(&content)
            .map(|record| record.questions)
            .map_err(|e| read_error(e.to_string())),
        OutputFormat::Sql => parse_insert_statements(&content).map_err(|e| read_error(e.to_string())),
    }
}

/// Filename stem: the job id, or the certification and domains.
fn file_stem(metadata: &BatchMetadata) -> String {
    let raw = match (&metadata.job_id, &metadata.request) {
        (Some(id), _) => id.clone(),
        (None, Some(request)) => std::iter::once(request.certification.as_str())
            .chain(request.domains.iter().map(String::as_str))
            .map(|part| part.trim().to_lowercase().replace(char::is_whitespace, "-"))
            .collect::<Vec<_>>()
            .join("_"),
        (None, None) => String::new(),
    };

    let stem: String = sanitize_filename::sanitize(raw)
        .chars()
        .take(MAX_STEM_LEN)
        .collect();
    if stem.is_empty() {
        "batch".to_string()
    } else {
        stem
    }
}

/// First 8 hex digits of the SHA-256 of `content`.
fn short_digest(content: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let hash = hasher.finalize();
    hash[..4].iter().map(|b| format!("{b:02x}")).collect()
}

/// Create `<base>.<ext>`, or `<base>-N.<ext>` if taken. Never overwrites.
fn write_new(dir: &Path, base: &str, ext: &str, content: &str) -> Result<PathBuf, BatchError> {
    for attempt in 0..MAX_NAME_ATTEMPTS {
        let name = if attempt == 0 {
            format!("{base}.{ext}")
        } else {
            format!("{base}-{attempt}.{ext}")
        };
        let path = dir.join(name);

        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                file.write_all(content.as_bytes())
                    .and_then(|()| file.flush())
                    .map_err(|source| BatchError::Persist {
                        path: path.clone(),
                        source,
                    })?;
                return Ok(path);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(source) => return Err(BatchError::Persist { path, source }),
        }
    }

    Err(BatchError::Persist {
        path: dir.join(format!("{base}.{ext}")),
        source: std::io::Error::new(ErrorKind::AlreadyExists, "no free output file name"),
    })
}
