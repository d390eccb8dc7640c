//! Coverage analysis error types.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use crate::backend::BackendError;

/// Invalid analyzer input or an unusable coverage data source.
#[derive(Error, Diagnostic, Debug, Clone, PartialEq)]
pub enum CoverageError {
    #[error("Total target must be greater than zero")]
    #[diagnostic(code(qbank::coverage::invalid_total))]
    InvalidTotal,

    #[error("Coverage profile '{profile}' has no categories")]
    #[diagnostic(code(qbank::coverage::empty_profile))]
    EmptyProfile { profile: String },

    #[error("Category '{category}' in profile '{profile}' has invalid weight {weight}")]
    #[diagnostic(code(qbank::coverage::invalid_weight))]
    InvalidWeight {
        profile: String,
        category: String,
        weight: f64,
    },

    #[error("Weights in profile '{profile}' sum to {sum}, expected 100")]
    #[diagnostic(
        code(qbank::coverage::weight_sum),
        help("Weights are percentages and are not normalized. Adjust them to sum to 100 (within 0.5).")
    )]
    WeightSum { profile: String, sum: f64 },

    #[error("Category '{category}' appears more than once in {source_name}")]
    #[diagnostic(code(qbank::coverage::duplicate_category))]
    DuplicateCategory {
        category: String,
        source_name: String,
    },

    #[error("Observed count for '{category}' is negative ({count})")]
    #[diagnostic(code(qbank::coverage::negative_count))]
    NegativeCount { category: String, count: i64 },

    #[error("Unknown coverage profile '{name}'")]
    #[diagnostic(
        code(qbank::coverage::unknown_profile),
        help("Available profiles: {available}")
    )]
    UnknownProfile { name: String, available: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Backend(#[from] BackendError),

    #[error("Malformed domain statistics: {detail}")]
    #[diagnostic(code(qbank::coverage::malformed_counts))]
    MalformedCounts { detail: String },
}

/// Failure loading custom coverage profiles.
#[derive(Error, Diagnostic, Debug)]
pub enum ProfileError {
    #[error("Failed to read profiles file {}: {source}", .path.display())]
    #[diagnostic(code(qbank::coverage::profiles_io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid profiles YAML: {0}")]
    #[diagnostic(
        code(qbank::coverage::profiles_yaml),
        help("Expected a top-level `profiles:` list of {{name, description, targets: [{{category, weight}}]}}")
    )]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Invalid(#[from] CoverageError),
}
