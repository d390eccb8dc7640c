//! Recovery strategies for jobs whose status endpoint is unusable.
//!
//! The chain is plain data: an ordered list of strategies that the
//! orchestrator walks until one produces questions.

use std::fmt;

use serde_json::{Value, json};
use tracing::{debug, info};

use crate::backend::{BackendRoutes, JobBackend, expand_route};

use super::error::BatchError;
use super::models::{BatchJob, GeneratedItem, JobStatus};
use super::orchestrator::BatchOrchestrator;
use super::signal::{ResultsSignal, classify_results, has_error_signal, items_field, parse_items};

/// One way of getting results without a working status endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryStrategy {
    /// GET a results route template (`{id}` placeholder).
    Probe(String),
    /// Re-POST the submission with the job id attached. Only attempted when
    /// the last known status is `pending`.
    Resubmit,
    /// Replay the original request through single-request generation.
    Synchronous,
}

impl RecoveryStrategy {
    /// Canonical results, each alternate route, resubmission, then
    /// synchronous generation.
    pub fn default_chain(routes: &BackendRoutes) -> Vec<Self> {
        let mut chain = vec![Self::Probe(routes.results.clone())];
        chain.extend(
            routes
                .alternate_results
                .iter()
                .map(|template| Self::Probe(template.clone())),
        );
        chain.push(Self::Resubmit);
        chain.push(Self::Synchronous);
        chain
    }
}

impl fmt::Display for RecoveryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Probe(template) => write!(f, "probe {template}"),
            Self::Resubmit => f.write_str("resubmit"),
            Self::Synchronous => f.write_str("synchronous generation"),
        }
    }
}

/// Why a strategy produced nothing.
#[derive(Debug)]
pub(crate) enum StrategyFailure {
    /// The job is definitely dead; stop recovering and surface this.
    Fatal(BatchError),
    /// This strategy could not help; try the next one.
    Unavailable(String),
}

type StrategyResult = Result<Vec<GeneratedItem>, StrategyFailure>;

/// Synchronous generation state carried across recovery passes within one
/// wait, so a transient page failure resumes instead of starting over.
#[derive(Debug, Default)]
pub(crate) struct SyncProgress {
    items: Vec<GeneratedItem>,
    calls: usize,
    exhausted: bool,
}

impl SyncProgress {
    pub(crate) fn gathered(&self) -> usize {
        self.items.len()
    }

    pub(crate) fn is_exhausted(&self) -> bool {
        self.exhausted
    }
}

/// Statuses worth another page attempt on the next recovery pass.
fn is_transient(status: u16) -> bool {
    status >= 500 || status == 408 || status == 429
}

fn unavailable(reason: impl fmt::Display) -> StrategyFailure {
    StrategyFailure::Unavailable(reason.to_string())
}

impl<B: JobBackend> BatchOrchestrator<B> {
    pub(super) async fn attempt(
        &self,
        strategy: &RecoveryStrategy,
        job: &BatchJob,
        progress: &mut SyncProgress,
    ) -> StrategyResult {
        match strategy {
            RecoveryStrategy::Probe(template) => self.probe(template, job).await,
            RecoveryStrategy::Resubmit => self.resubmit(job).await,
            RecoveryStrategy::Synchronous => self.generate_synchronously(job, progress).await,
        }
    }

    async fn probe(&self, template: &str, job: &BatchJob) -> StrategyResult {
        let path = expand_route(template, job.id());
        let reply = self.backend.get(&path, &[]).await.map_err(unavailable)?;

        match classify_results(reply.status, &reply.body) {
            ResultsSignal::Items(items) if !items.is_empty() => Ok(items),
            ResultsSignal::Items(_) => Err(unavailable(format!("{path}: no questions yet"))),
            ResultsSignal::Failed {
                explicit: true,
                expired: true,
                detail,
                ..
            } => Err(StrategyFailure::Fatal(BatchError::Expired {
                job_id: job.id().to_string(),
                detail: Some(detail),
            })),
            // Routes the backend does not serve answer with error bodies too,
            // and a still-running job answering "not ready" is not a failure.
            ResultsSignal::Failed {
                explicit: true,
                status,
                detail,
                ..
            } if reply.is_success() && !job.is_known_pending() => {
                Err(StrategyFailure::Fatal(BatchError::JobFailed {
                    job_id: job.id().to_string(),
                    status,
                    detail: Some(detail),
                }))
            }
            ResultsSignal::Failed { detail, .. } => Err(unavailable(format!("{path}: {detail}"))),
            ResultsSignal::Malformed(detail) => Err(unavailable(format!("{path}: {detail}"))),
        }
    }

    async fn resubmit(&self, job: &BatchJob) -> StrategyResult {
        if job.status() != Some(JobStatus::Pending) {
            return Err(unavailable("last known status is not pending"));
        }

        let mut body = match job.handle().request() {
            Some(request) => serde_json::to_value(request)
                .map_err(|e| StrategyFailure::Fatal(BatchError::Encode(e)))?,
            None => json!({}),
        };
        if let Value::Object(fields) = &mut body {
            fields.insert("batchId".to_string(), json!(job.id()));
        }

        let reply = self
            .backend
            .post(&self.routes.submit, &body)
            .await
            .map_err(unavailable)?;
        if !reply.is_success() || has_error_signal(&reply.body) {
            return Err(unavailable(format!(
                "resubmission rejected with HTTP {}",
                reply.status
            )));
        }

        let items = items_field(&reply.body).map(parse_items).unwrap_or_default();
        if items.is_empty() {
            return Err(unavailable("resubmission echoed no questions"));
        }
        Ok(items)
    }

    /// Page through the single-request endpoint until the original count is
    /// reached, starting from whatever `progress` already holds.
    ///
    /// A transport error or transient HTTP status keeps the gathered pages
    /// for the next pass. Any other rejection or a page without questions
    /// marks `progress` exhausted, so this always terminates.
    async fn generate_synchronously(
        &self,
        job: &BatchJob,
        progress: &mut SyncProgress,
    ) -> StrategyResult {
        if progress.exhausted {
            return Err(unavailable("synchronous generation already gave up"));
        }
        let Some(request) = job.handle().request() else {
            progress.exhausted = true;
            return Err(unavailable("original request unknown, nothing to replay"));
        };

        while progress.items.len() < request.count {
            let page = (request.count - progress.items.len()).min(self.per_call_cap);
            let body = serde_json::to_value(request.with_count(page))
                .map_err(|e| StrategyFailure::Fatal(BatchError::Encode(e)))?;
            progress.calls += 1;
            let call = progress.calls;

            let reply = self
                .backend
                .post(&self.routes.generate, &body)
                .await
                .map_err(|e| unavailable(format!("generation call {call}: {e}")))?;
            if !reply.is_success() || has_error_signal(&reply.body) {
                if !reply.is_success() && is_transient(reply.status) {
                    debug!(
                        call,
                        gathered = progress.items.len(),
                        status = reply.status,
                        "synchronous generation page failed, will resume"
                    );
                } else {
                    progress.exhausted = true;
                }
                return Err(unavailable(format!(
                    "generation call {call} rejected with HTTP {}",
                    reply.status
                )));
            }

            let page_items = items_field(&reply.body).map(parse_items).unwrap_or_default();
            if page_items.is_empty() {
                progress.exhausted = true;
                return Err(unavailable(format!("generation call {call} returned no questions")));
            }
            debug!(call, received = page_items.len(), "synchronous generation page");
            progress.items.extend(page_items.into_iter().take(page));
        }

        progress.exhausted = true;
        let items = std::mem::take(&mut progress.items);
        info!(calls = progress.calls, count = items.len(), "degraded to synchronous generation");
        Ok(items)
    }
}
