//! Backend route templates.
//!
//! Routes are deployment configuration. Job-scoped routes carry an `{id}`
//! placeholder that is replaced with the job handle.

use serde::{Deserialize, Serialize};

/// Route templates for the question-generation backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendRoutes {
    /// Batch submission (POST)
    pub submit: String,
    /// Batch status (GET, `{id}`)
    pub status: String,
    /// Canonical batch results (GET, `{id}`)
    pub results: String,
    /// Alternative result paths probed during recovery, in order (GET, `{id}`)
    pub alternate_results: Vec<String>,
    /// Single-request, non-batch generation (POST)
    pub generate: String,
    /// Per-domain question counts (GET, `?certification=`)
    pub domain_stats: String,
}

impl Default for BackendRoutes {
    fn default() -> Self {
        Self {
            submit: "/api/questions/batch".to_string(),
            status: "/api/questions/batch/{id}/status".to_string(),
            results: "/api/questions/batch/{id}/results".to_string(),
            alternate_results: vec![
                "/api/questions/batch/{id}".to_string(),
                "/api/batch/{id}/results".to_string(),
                "/api/batches/{id}/results".to_string(),
            ],
            generate: "/api/questions/generate".to_string(),
            domain_stats: "/api/questions/stats/domains".to_string(),
        }
    }
}

impl BackendRoutes {
    pub fn status_for(&self, job_id: &str) -> String {
        expand_route(&self.status, job_id)
    }

    pub fn results_for(&self, job_id: &str) -> String {
        expand_route(&self.results, job_id)
    }
}

/// Substitute the job id into a route template.
pub fn expand_route(template: &str, job_id: &str) -> String {
    template.replace("{id}", job_id)
}
