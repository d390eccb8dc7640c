use miette::Diagnostic;
use thiserror::Error;

/// Transport-level failures talking to the job backend.
///
/// These never describe the job itself; a reachable backend reporting a
/// failed job is a successful reply with an error body.
#[derive(Error, Diagnostic, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Failed to connect to job backend: {message}")]
    #[diagnostic(
        code(qbank::backend::unreachable),
        help(
            "Is the question backend running? Set QBANK_API_URL or pass --api-url to point at it."
        )
    )]
    Unreachable { message: String },

    #[error("Request to job backend failed: {message}")]
    #[diagnostic(code(qbank::backend::request_failed))]
    Request { message: String },
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() || e.is_timeout() {
            BackendError::Unreachable {
                message: e.to_string(),
            }
        } else {
            BackendError::Request {
                message: e.to_string(),
            }
        }
    }
}

pub type BackendResult<T> = Result<T, BackendError>;
