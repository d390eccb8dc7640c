//! Batch question generation.
//!
//! Submission, status polling with recovery, result retrieval and output
//! persistence for bulk generation jobs.
//!
//! - `models`: request, item, handle and status types
//! - `signal`: classification of raw backend replies
//! - `orchestrator`: submit / await / retrieve
//! - `recovery`: fallback chain used when the status endpoint is unusable
//! - `persist` and `sql`: writing and reading output files

mod error;
mod models;
mod orchestrator;
mod persist;
mod recovery;
mod signal;
mod sql;

#[cfg(test)]
mod persist_test;

pub use error::BatchError;
pub use models::{BatchJob, GeneratedItem, GenerationRequest, JobHandle, JobStatus, MAX_REQUEST_COUNT};
pub use orchestrator::{
    BatchOrchestrator, DEFAULT_PER_CALL_CAP, DEFAULT_UNREACHABLE_THRESHOLD, PollPolicy,
    SubmitOutcome,
};
pub use persist::{
    BatchMetadata, Clock, OutputFormat, OutputRecord, OutputSink, RecordMetadata, SystemClock,
    load_items,
};
pub use recovery::RecoveryStrategy;
pub use signal::{
    BackendSignal, FailureKind, ResultsSignal, Terminal, classify_backend_signal,
    classify_results, is_expired_message,
};
pub use sql::{QUESTIONS_TABLE, SqlParseError, parse_insert_statements, render_insert_statements};
