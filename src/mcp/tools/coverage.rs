//! Coverage analysis tools.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;

use rmcp::{
    ErrorData as McpError, handler::server::wrapper::Parameters, model::CallToolResult, schemars,
    schemars::JsonSchema,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::backend::{BackendRoutes, JobBackend};
use crate::coverage::{CoverageError, ProfileRegistry, analyze, fetch_observed_counts};

use super::text_result;

/// Parameters for `analyze_coverage`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AnalyzeCoverageParams {
    #[schemars(description = "Coverage profile name, e.g. aws-saa-c03 (see list_coverage_profiles)")]
    pub profile: String,

    #[schemars(description = "Total number of questions the bank should hold")]
    pub total_target: u64,

    #[schemars(description = "Observed question count per domain. When omitted, counts are fetched from the backend.")]
    pub counts: Option<BTreeMap<String, i64>>,

    #[schemars(description = "Certification to fetch counts for (optional, defaults to the profile name)")]
    pub certification: Option<String>,
}

/// Coverage analysis tools.
pub struct CoverageTools<B: JobBackend> {
    backend: Arc<B>,
    routes: BackendRoutes,
    profiles: Arc<ProfileRegistry>,
}

impl<B: JobBackend + 'static> CoverageTools<B> {
    pub fn new(backend: Arc<B>, routes: BackendRoutes, profiles: Arc<ProfileRegistry>) -> Self {
        Self {
            backend,
            routes,
            profiles,
        }
    }

    /// Compare observed domain counts against a profile.
    pub async fn analyze_coverage(
        &self,
        params: Parameters<AnalyzeCoverageParams>,
    ) -> Result<CallToolResult, McpError> {
        let params = params.0;
        let profile = self.profiles.get(&params.profile).map_err(map_coverage_error)?;

        let observed = match params.counts {
            Some(counts) => counts,
            None => {
                let certification = params.certification.as_deref().unwrap_or(&profile.name);
                fetch_observed_counts(&*self.backend, &self.routes, certification)
                    .await
                    .map_err(map_coverage_error)?
            }
        };

        let report = analyze(profile, params.total_target, &observed).map_err(map_coverage_error)?;
        text_result(report.to_string())
    }

    /// Names, descriptions and weights of the known profiles.
    pub async fn list_coverage_profiles(&self) -> Result<CallToolResult, McpError> {
        let mut text = String::new();
        for profile in self.profiles.iter() {
            let _ = writeln!(text, "{}: {}", profile.name, profile.description);
            for target in &profile.targets {
                let _ = writeln!(text, "  - {} ({}%)", target.category, target.weight);
            }
        }
        if text.is_empty() {
            text.push_str("No coverage profiles configured.");
        }
        text_result(text)
    }
}

/// Map CoverageError to McpError.
pub(crate) fn map_coverage_error(err: CoverageError) -> McpError {
    let data = Some(json!({ "error": err.to_string() }));
    match err {
        CoverageError::Backend(_) => McpError::internal_error("backend_unreachable", data),
        CoverageError::MalformedCounts { .. } => McpError::internal_error("malformed_counts", data),
        CoverageError::UnknownProfile { .. } => McpError::invalid_params("unknown_profile", data),
        _ => McpError::invalid_params("invalid_coverage_input", data),
    }
}
