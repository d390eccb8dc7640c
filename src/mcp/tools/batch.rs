//! Batch generation tools.

use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use rmcp::{
    ErrorData as McpError, handler::server::wrapper::Parameters, model::CallToolResult, schemars,
    schemars::JsonSchema,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::backend::JobBackend;
use crate::batch::{
    BackendSignal, BatchError, BatchMetadata, BatchOrchestrator, GeneratedItem,
    GenerationRequest, JobHandle, OutputFormat, OutputSink, PollPolicy, SubmitOutcome, Terminal,
};
use crate::coverage::counts_by_category;

use super::text_result;

/// Parameters for `generate_questions_batch`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GenerateBatchParams {
    #[schemars(description = "Certification code, e.g. aws-saa-c03")]
    pub certification: String,

    #[schemars(description = "Exam domains to draw questions from (optional, default all)")]
    pub domains: Option<Vec<String>>,

    #[schemars(description = "Number of questions to generate (1-1000)")]
    pub count: usize,

    #[schemars(description = "Difficulty tier, e.g. easy, medium, hard (optional)")]
    pub complexity: Option<String>,

    #[schemars(description = "Target experience level, e.g. associate (optional)")]
    pub experience: Option<String>,

    #[schemars(description = "Tags attached to generated questions (optional)")]
    pub tags: Option<Vec<String>>,

    #[schemars(description = "Output format: json (default) or sql")]
    pub format: Option<String>,

    #[schemars(description = "Wait for the batch to finish (default true). When false, returns the job id immediately.")]
    pub wait: Option<bool>,

    #[schemars(description = "Maximum seconds to wait for completion (optional)")]
    pub max_wait_seconds: Option<u64>,
}

/// Parameters for `check_batch_status`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CheckBatchStatusParams {
    #[schemars(description = "Batch job id returned by generate_questions_batch")]
    pub job_id: String,
}

/// Parameters for `resume_batch`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ResumeBatchParams {
    #[schemars(description = "Batch job id to keep waiting on")]
    pub job_id: String,

    #[schemars(description = "Output format: json (default) or sql")]
    pub format: Option<String>,

    #[schemars(description = "Maximum seconds to wait for completion (optional)")]
    pub max_wait_seconds: Option<u64>,
}

/// Batch generation tools.
pub struct BatchTools<B: JobBackend> {
    orchestrator: Arc<BatchOrchestrator<B>>,
    sink: Arc<OutputSink>,
    policy: PollPolicy,
}

impl<B: JobBackend + 'static> BatchTools<B> {
    pub fn new(orchestrator: Arc<BatchOrchestrator<B>>, sink: Arc<OutputSink>, policy: PollPolicy) -> Self {
        Self {
            orchestrator,
            sink,
            policy,
        }
    }

    /// Submit a batch, wait for it and save the questions.
    pub async fn generate_questions_batch(
        &self,
        params: Parameters<GenerateBatchParams>,
    ) -> Result<CallToolResult, McpError> {
        let params = params.0;
        let format = parse_format(params.format.as_deref())?;
        let policy = self.policy_with(params.max_wait_seconds);

        let request = GenerationRequest {
            certification: params.certification,
            domains: params.domains.unwrap_or_default(),
            count: params.count,
            complexity: params.complexity,
            experience: params.experience,
            tags: params.tags.unwrap_or_default(),
        };

        let outcome = self
            .orchestrator
            .submit(&request)
            .await
            .map_err(map_batch_error)?;

        let (items, metadata) = match outcome {
            SubmitOutcome::Completed(items) => (items, BatchMetadata::from_request(&request)),
            SubmitOutcome::Queued(handle) if params.wait == Some(false) => {
                return text_result(format!(
                    "Batch job {} submitted for {} {} questions.\n\
                     Use check_batch_status or resume_batch with this job id to collect the results.",
                    handle.id(),
                    request.count,
                    request.certification
                ));
            }
            SubmitOutcome::Queued(handle) => {
                let items = self
                    .orchestrator
                    .await_completion(&handle, policy)
                    .await
                    .map_err(map_batch_error)?;
                (items, BatchMetadata::from_handle(&handle))
            }
        };

        self.save(&items, &metadata, format)
    }

    /// One status poll, reported as text.
    pub async fn check_batch_status(
        &self,
        params: Parameters<CheckBatchStatusParams>,
    ) -> Result<CallToolResult, McpError> {
        let handle = JobHandle::resume(params.0.job_id).map_err(map_batch_error)?;
        let id = handle.id();

        let text = match self.orchestrator.query_status(&handle).await {
            BackendSignal::Terminal(Terminal::Succeeded) => format!(
                "Batch job {id} has completed. Use resume_batch to retrieve and save the questions."
            ),
            BackendSignal::Terminal(Terminal::Failed { status, detail, .. }) => match detail {
                Some(detail) => format!("Batch job {id} ended with status '{status}': {detail}"),
                None => format!("Batch job {id} ended with status '{status}'."),
            },
            BackendSignal::NonTerminal(status) => {
                format!("Batch job {id} is {status}. Check again later or use resume_batch to wait.")
            }
            BackendSignal::Unreachable(reason) => format!(
                "Status of batch job {id} is currently unavailable ({reason}).\n\
                 The job may still be running; resume_batch will keep trying alternative result paths."
            ),
        };
        text_result(text)
    }

    /// Keep waiting on an existing job and save its questions.
    pub async fn resume_batch(
        &self,
        params: Parameters<ResumeBatchParams>,
    ) -> Result<CallToolResult, McpError> {
        let params = params.0;
        let format = parse_format(params.format.as_deref())?;
        let handle = JobHandle::resume(params.job_id).map_err(map_batch_error)?;

        let items = self
            .orchestrator
            .await_completion(&handle, self.policy_with(params.max_wait_seconds))
            .await
            .map_err(map_batch_error)?;

        self.save(&items, &BatchMetadata::from_handle(&handle), format)
    }

    fn policy_with(&self, max_wait_seconds: Option<u64>) -> PollPolicy {
        match max_wait_seconds {
            Some(secs) => PollPolicy::new(self.policy.interval, Duration::from_secs(secs)),
            None => self.policy,
        }
    }

    fn save(
        &self,
        items: &[GeneratedItem],
        metadata: &BatchMetadata,
        format: OutputFormat,
    ) -> Result<CallToolResult, McpError> {
        let path = self
            .sink
            .persist(items, metadata, format)
            .map_err(map_batch_error)?;
        text_result(summarize(items, metadata, &path))
    }
}

fn parse_format(raw: Option<&str>) -> Result<OutputFormat, McpError> {
    match raw {
        None => Ok(OutputFormat::default()),
        Some(raw) => raw.parse().map_err(|e: String| {
            McpError::invalid_params("invalid_format", Some(json!({ "error": e })))
        }),
    }
}

fn summarize(items: &[GeneratedItem], metadata: &BatchMetadata, path: &Path) -> String {
    let mut text = String::new();
    let certification = metadata
        .request
        .as_ref()
        .map(|r| r.certification.as_str())
        .unwrap_or("batch");

    let _ = write!(text, "Generated {} {} questions", items.len(), certification);
    if let Some(job_id) = &metadata.job_id {
        let _ = write!(text, " (job {job_id})");
    }
    let _ = writeln!(text);
    let _ = writeln!(text, "Saved to: {}", path.display());

    let by_domain = counts_by_category(items);
    if !by_domain.is_empty() {
        let _ = writeln!(text, "\nBy domain:");
        for (domain, count) in &by_domain {
            let _ = writeln!(text, "  - {domain}: {count}");
        }
    }

    let multi = items.iter().filter(|i| i.is_multiple_response()).count();
    if multi > 0 {
        let _ = writeln!(text, "\nMultiple-response questions: {multi}");
    }
    text
}

/// Map BatchError to McpError.
///
/// Bad input is `invalid_params`; everything else is `internal_error` with
/// the job id and whether waiting again could help.
pub(crate) fn map_batch_error(err: BatchError) -> McpError {
    let data = json!({
        "error": err.to_string(),
        "job_id": err.job_id(),
        "resumable": err.is_resumable(),
    });

    match err {
        BatchError::InvalidRequest { .. } => McpError::invalid_params("invalid_request", Some(data)),
        BatchError::Expired { .. } => McpError::internal_error("batch_expired", Some(data)),
        BatchError::JobFailed { .. } => McpError::internal_error("batch_failed", Some(data)),
        BatchError::Timeout { .. } => McpError::internal_error("batch_timeout", Some(data)),
        BatchError::MalformedResponse { .. } => {
            McpError::internal_error("malformed_response", Some(data))
        }
        BatchError::Transport(_) => McpError::internal_error("backend_unreachable", Some(data)),
        BatchError::Persist { .. } | BatchError::ReadOutput { .. } | BatchError::Encode(_) => {
            McpError::internal_error("output_error", Some(data))
        }
    }
}
