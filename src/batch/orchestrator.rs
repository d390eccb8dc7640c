//! Batch job orchestrator.
//!
//! Drives a generation job from submission to retrieved results:
//!
//! ```text
//! submit ──▶ items (synchronous)          ──▶ done
//!        └─▶ job id ──▶ poll status ──┬─▶ success  ──▶ retrieve results
//!                           ▲         ├─▶ failure  ──▶ JobFailed / Expired
//!                           │         ├─▶ pending  ──▶ sleep
//!                           └─────────┴─▶ unusable ──▶ recovery chain, sleep
//! ```

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use crate::backend::{BackendRoutes, JobBackend};

use super::error::BatchError;
use super::models::{BatchJob, GeneratedItem, GenerationRequest, JobHandle, JobStatus};
use super::recovery::{RecoveryStrategy, StrategyFailure, SyncProgress};
use super::signal::{
    BackendSignal, FailureKind, ResultsSignal, Terminal, classify_backend_signal,
    classify_results, error_message, has_error_signal, items_field, job_id_field, parse_items,
};

/// Items requested per call when degrading to single-request generation.
pub const DEFAULT_PER_CALL_CAP: usize = 10;

/// Consecutive unusable status replies before recovery strategies run.
pub const DEFAULT_UNREACHABLE_THRESHOLD: u32 = 2;

/// Poll cadence and wait budget for one `await_completion` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_wait: Duration,
}

impl PollPolicy {
    pub fn new(interval: Duration, max_wait: Duration) -> Self {
        Self { interval, max_wait }
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            max_wait: Duration::from_secs(30 * 60),
        }
    }
}

/// Result of a submission.
#[derive(Debug)]
pub enum SubmitOutcome {
    /// The backend answered synchronously with the generated items.
    Completed(Vec<GeneratedItem>),
    /// The backend queued the work as a batch job.
    Queued(JobHandle),
}

/// Submits batch jobs and waits for their results.
///
/// Generic over `B: JobBackend` so tests can inject a scripted backend.
pub struct BatchOrchestrator<B: JobBackend> {
    pub(super) backend: Arc<B>,
    pub(super) routes: BackendRoutes,
    recovery: Vec<RecoveryStrategy>,
    pub(super) per_call_cap: usize,
    unreachable_threshold: u32,
}

impl<B: JobBackend> BatchOrchestrator<B> {
    /// Create an orchestrator with the default recovery chain for `routes`.
    pub fn new(backend: Arc<B>, routes: BackendRoutes) -> Self {
        let recovery = RecoveryStrategy::default_chain(&routes);
        Self {
            backend,
            routes,
            recovery,
            per_call_cap: DEFAULT_PER_CALL_CAP,
            unreachable_threshold: DEFAULT_UNREACHABLE_THRESHOLD,
        }
    }

    pub fn with_per_call_cap(mut self, cap: usize) -> Self {
        self.per_call_cap = cap.max(1);
        self
    }

    pub fn with_unreachable_threshold(mut self, threshold: u32) -> Self {
        self.unreachable_threshold = threshold.max(1);
        self
    }

    pub fn with_recovery(mut self, chain: Vec<RecoveryStrategy>) -> Self {
        self.recovery = chain;
        self
    }

    pub fn routes(&self) -> &BackendRoutes {
        &self.routes
    }

    pub fn recovery(&self) -> &[RecoveryStrategy] {
        &self.recovery
    }

    /// Send a generation request to the submission endpoint.
    #[instrument(skip_all, fields(certification = %request.certification, count = request.count))]
    pub async fn submit(&self, request: &GenerationRequest) -> Result<SubmitOutcome, BatchError> {
        request.validate()?;

        let body = serde_json::to_value(request)?;
        let reply = self.backend.post(&self.routes.submit, &body).await?;
        let endpoint = self.routes.submit.clone();

        if !reply.is_success() || has_error_signal(&reply.body) {
            return Err(BatchError::MalformedResponse {
                endpoint,
                detail: error_message(&reply.body)
                    .unwrap_or_else(|| format!("submission rejected with HTTP {}", reply.status)),
            });
        }

        let items = items_field(&reply.body).map(parse_items);
        let job_id = job_id_field(&reply.body);

        // A queued reply may echo an empty question list next to its job id.
        if let Some(items) = items.filter(|items| !items.is_empty() || job_id.is_none()) {
            info!(count = items.len(), "backend completed generation synchronously");
            return Ok(SubmitOutcome::Completed(items));
        }

        if let Some(id) = job_id {
            let handle = JobHandle::new(id, Some(request.clone())).map_err(|e| {
                BatchError::MalformedResponse {
                    endpoint: endpoint.clone(),
                    detail: e.to_string(),
                }
            })?;
            info!(job_id = handle.id(), "batch job submitted");
            return Ok(SubmitOutcome::Queued(handle));
        }

        Err(BatchError::MalformedResponse {
            endpoint,
            detail: "response carried neither questions nor a job id".to_string(),
        })
    }

    /// Poll until the job finishes, fails, or the wait budget runs out.
    ///
    /// The budget is measured from the handle's submission time. Transport
    /// errors and unusable status replies are retried; once the status
    /// endpoint has been unusable for a few polls in a row the recovery
    /// chain runs on every poll.
    #[instrument(skip_all, fields(job_id = handle.id()))]
    pub async fn await_completion(
        &self,
        handle: &JobHandle,
        policy: PollPolicy,
    ) -> Result<Vec<GeneratedItem>, BatchError> {
        let mut job = BatchJob::new(handle.clone());
        let mut unreachable_streak = 0u32;
        let mut progress = SyncProgress::default();

        loop {
            let last_error = match self.query_status(handle).await {
                BackendSignal::Terminal(Terminal::Succeeded) => {
                    job.advance(JobStatus::Completed);
                    info!("batch job completed, retrieving results");
                    return self.retrieve_results(handle).await;
                }
                BackendSignal::Terminal(Terminal::Failed {
                    kind,
                    status,
                    detail,
                }) => {
                    job.advance(status);
                    warn!(%status, ?detail, "batch job failed");
                    return Err(failure_error(handle.id(), kind, status, detail));
                }
                BackendSignal::NonTerminal(status) => {
                    unreachable_streak = 0;
                    job.advance(status);
                    debug!(status = ?job.status(), "batch job still running");
                    None
                }
                BackendSignal::Unreachable(reason) => {
                    unreachable_streak += 1;
                    debug!(%reason, unreachable_streak, "status endpoint unusable");

                    if unreachable_streak >= self.unreachable_threshold {
                        if let Some(items) = self.recover(&job, &mut progress).await? {
                            return Ok(items);
                        }
                    }
                    Some(reason)
                }
            };

            let waited = handle.elapsed();
            if waited > policy.max_wait {
                warn!(waited_secs = waited.as_secs(), "gave up waiting for batch job");
                return Err(BatchError::Timeout {
                    job_id: handle.id().to_string(),
                    waited_secs: waited.as_secs(),
                    last_status: job.status(),
                    last_error,
                });
            }

            tokio::time::sleep(policy.interval).await;
        }
    }

    /// Fetch the results of a job known to have finished.
    ///
    /// Any failure reported here is a late job failure and is not retried.
    #[instrument(skip_all, fields(job_id = handle.id()))]
    pub async fn retrieve_results(
        &self,
        handle: &JobHandle,
    ) -> Result<Vec<GeneratedItem>, BatchError> {
        let path = self.routes.results_for(handle.id());
        let reply = self.backend.get(&path, &[]).await?;

        match classify_results(reply.status, &reply.body) {
            ResultsSignal::Items(items) => {
                info!(count = items.len(), "retrieved batch results");
                Ok(items)
            }
            ResultsSignal::Failed {
                expired: true,
                detail,
                ..
            } => Err(BatchError::Expired {
                job_id: handle.id().to_string(),
                detail: Some(detail),
            }),
            ResultsSignal::Failed { status, detail, .. } => Err(BatchError::JobFailed {
                job_id: handle.id().to_string(),
                status,
                detail: Some(detail),
            }),
            ResultsSignal::Malformed(detail) => Err(BatchError::MalformedResponse {
                endpoint: path,
                detail,
            }),
        }
    }

    /// One classified status poll. Transport errors become `Unreachable`.
    pub async fn query_status(&self, handle: &JobHandle) -> BackendSignal {
        let path = self.routes.status_for(handle.id());
        match self.backend.get(&path, &[]).await {
            Ok(reply) => classify_backend_signal(reply.status, &reply.body),
            Err(e) => BackendSignal::Unreachable(e.to_string()),
        }
    }

    /// Run the recovery chain once, in order.
    ///
    /// `Ok(None)` means every strategy came up empty; the caller keeps
    /// polling. Only a definite job failure is returned as an error.
    async fn recover(
        &self,
        job: &BatchJob,
        progress: &mut SyncProgress,
    ) -> Result<Option<Vec<GeneratedItem>>, BatchError> {
        for strategy in &self.recovery {
            if matches!(strategy, RecoveryStrategy::Synchronous) && progress.is_exhausted() {
                continue;
            }

            match self.attempt(strategy, job, progress).await {
                Ok(items) => {
                    info!(%strategy, count = items.len(), "recovered batch results");
                    return Ok(Some(items));
                }
                Err(StrategyFailure::Fatal(e)) => return Err(e),
                Err(StrategyFailure::Unavailable(reason)) => {
                    debug!(
                        %strategy,
                        %reason,
                        gathered = progress.gathered(),
                        "recovery strategy came up empty"
                    );
                }
            }
        }
        Ok(None)
    }
}

fn failure_error(
    job_id: &str,
    kind: FailureKind,
    status: JobStatus,
    detail: Option<String>,
) -> BatchError {
    match kind {
        FailureKind::Expired => BatchError::Expired {
            job_id: job_id.to_string(),
            detail,
        },
        FailureKind::Cancelled | FailureKind::Failed => BatchError::JobFailed {
            job_id: job_id.to_string(),
            status: status.to_string(),
            detail,
        },
    }
}
