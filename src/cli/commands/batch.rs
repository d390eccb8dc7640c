use std::path::Path;

use tabled::{Table, Tabled};

use crate::backend::JobBackend;
use crate::batch::{
    BackendSignal, BatchMetadata, BatchOrchestrator, Clock, GeneratedItem, GenerationRequest,
    JobHandle, OutputFormat, OutputSink, PollPolicy, SubmitOutcome, Terminal, load_items,
};
use crate::cli::error::{CliError, CliResult};
use crate::cli::utils::{answer_letters, apply_table_style, truncate_with_ellipsis};
use crate::coverage::counts_by_category;

#[derive(Tabled)]
pub(crate) struct DomainCountDisplay {
    #[tabled(rename = "Domain")]
    pub(crate) domain: String,
    #[tabled(rename = "Questions")]
    pub(crate) count: i64,
}

#[derive(Tabled)]
pub(crate) struct ItemDisplay {
    #[tabled(rename = "#")]
    pub(crate) index: usize,
    #[tabled(rename = "Domain")]
    pub(crate) domain: String,
    #[tabled(rename = "Difficulty")]
    pub(crate) difficulty: String,
    #[tabled(rename = "Question")]
    pub(crate) question: String,
    #[tabled(rename = "Answer")]
    pub(crate) answer: String,
}

impl ItemDisplay {
    fn new(index: usize, item: &GeneratedItem) -> Self {
        Self {
            index,
            domain: truncate_with_ellipsis(&item.category, 30),
            difficulty: if item.complexity.is_empty() {
                "-".to_string()
            } else {
                item.complexity.clone()
            },
            question: truncate_with_ellipsis(&item.body, 60),
            answer: answer_letters(&item.correct),
        }
    }
}

/// Parse `json` or `sql`.
pub fn parse_output_format(raw: &str) -> CliResult<OutputFormat> {
    raw.parse()
        .map_err(|message| CliError::InvalidInput { message })
}

/// Submit a generation request, optionally wait for it, and save the result.
pub async fn generate<B: JobBackend, C: Clock>(
    orchestrator: &BatchOrchestrator<B>,
    sink: &OutputSink<C>,
    policy: PollPolicy,
    request: &GenerationRequest,
    format: OutputFormat,
    wait: bool,
) -> CliResult<String> {
    let (items, metadata) = match orchestrator.submit(request).await? {
        SubmitOutcome::Completed(items) => (items, BatchMetadata::from_request(request)),
        SubmitOutcome::Queued(handle) if !wait => {
            return Ok(format!(
                "✓ Batch job {} submitted ({} {} questions)\nRun `qbank resume {}` to collect the results.",
                handle.id(),
                request.count,
                request.certification,
                handle.id()
            ));
        }
        SubmitOutcome::Queued(handle) => {
            let items = orchestrator.await_completion(&handle, policy).await?;
            (items, BatchMetadata::from_handle(&handle))
        }
    };

    let path = sink.persist(&items, &metadata, format)?;
    Ok(format_saved(&items, &path))
}

/// Report a job's status from a single poll.
pub async fn status<B: JobBackend>(
    orchestrator: &BatchOrchestrator<B>,
    job_id: &str,
) -> CliResult<String> {
    let handle = JobHandle::resume(job_id)?;
    let id = handle.id();

    let line = match orchestrator.query_status(&handle).await {
        BackendSignal::Terminal(Terminal::Succeeded) => {
            format!("Job {id}: completed (run `qbank resume {id}` to save the questions)")
        }
        BackendSignal::Terminal(Terminal::Failed { status, detail, .. }) => match detail {
            Some(detail) => format!("Job {id}: {status} ({detail})"),
            None => format!("Job {id}: {status}"),
        },
        BackendSignal::NonTerminal(status) => format!("Job {id}: {status}"),
        BackendSignal::Unreachable(reason) => {
            format!("Job {id}: status unavailable ({reason})")
        }
    };
    Ok(line)
}

/// Wait on an existing job and save its questions.
pub async fn resume<B: JobBackend, C: Clock>(
    orchestrator: &BatchOrchestrator<B>,
    sink: &OutputSink<C>,
    policy: PollPolicy,
    job_id: &str,
    format: OutputFormat,
) -> CliResult<String> {
    let handle = JobHandle::resume(job_id)?;
    let items = orchestrator.await_completion(&handle, policy).await?;
    let path = sink.persist(&items, &BatchMetadata::from_handle(&handle), format)?;
    Ok(format_saved(&items, &path))
}

/// Show the questions stored in a saved batch file.
pub fn inspect(path: &Path, format: &str) -> CliResult<String> {
    let items = load_items(path)?;

    match format {
        "json" => Ok(serde_json::to_string_pretty(&items)?),
        _ => Ok(format_items(&items)),
    }
}

pub(crate) fn format_saved(items: &[GeneratedItem], path: &Path) -> String {
    let header = format!("✓ Saved {} questions to {}", items.len(), path.display());
    let rows: Vec<DomainCountDisplay> = counts_by_category(items)
        .into_iter()
        .map(|(domain, count)| DomainCountDisplay { domain, count })
        .collect();
    if rows.is_empty() {
        return header;
    }

    let mut table = Table::new(rows);
    apply_table_style(&mut table);
    format!("{header}\n{table}")
}

pub(crate) fn format_items(items: &[GeneratedItem]) -> String {
    if items.is_empty() {
        return "No questions found.".to_string();
    }

    let rows: Vec<ItemDisplay> = items
        .iter()
        .enumerate()
        .map(|(i, item)| ItemDisplay::new(i + 1, item))
        .collect();
    let mut table = Table::new(rows);
    apply_table_style(&mut table);
    table.to_string()
}
