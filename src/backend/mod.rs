//! Job backend abstraction.
//!
//! The question-generation backend is an external HTTP service. Everything
//! the core needs from it goes through the [`JobBackend`] trait, which only
//! knows how to GET and POST JSON at a path and hand back the raw HTTP status
//! plus body. Interpreting those replies is the orchestrator's job.
//!
//! - `http`: reqwest-based implementation used in production
//! - `routes`: configurable route templates (`{id}` placeholder)

mod error;
mod http;
mod routes;

#[cfg(test)]
pub(crate) mod fake;
#[cfg(test)]
mod http_test;

use std::future::Future;

use serde_json::Value;

pub use error::{BackendError, BackendResult};
pub use http::HttpJobBackend;
pub use routes::{BackendRoutes, expand_route};

/// Raw reply from the backend: HTTP status plus the decoded body.
///
/// Bodies that are not valid JSON are carried as `Value::String` so callers
/// can still surface the text; empty bodies become `Value::Null`.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendReply {
    pub status: u16,
    pub body: Value,
}

impl BackendReply {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    /// True for 2xx responses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Transport seam to the job-processing backend.
///
/// Implementations must be cheap to share across tasks; the orchestrator
/// holds them behind an `Arc`.
pub trait JobBackend: Send + Sync {
    /// GET `path` with optional query parameters.
    fn get(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> impl Future<Output = BackendResult<BackendReply>> + Send;

    /// POST a JSON body to `path`.
    fn post(
        &self,
        path: &str,
        body: &Value,
    ) -> impl Future<Output = BackendResult<BackendReply>> + Send;
}
