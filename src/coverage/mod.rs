//! Coverage gap analysis.
//!
//! - `profiles`: per-certification category weights (built-in and YAML)
//! - `analyzer`: pure comparison of observed counts against a profile
//! - `source`: observed counts from the backend's statistics route

mod analyzer;
mod error;
mod profiles;
mod source;


pub use analyzer::{
    CategoryCoverage, CoverageGap, CoverageReport, CoverageStatus, OVER_THRESHOLD,
    SATURATED_PERCENTAGE, UNDER_THRESHOLD, UnmatchedCategory, analyze, counts_by_category,
};
pub use error::{CoverageError, ProfileError};
pub use profiles::{
    CoverageProfile, CoverageTarget, ProfileRegistry, WEIGHT_SUM_TOLERANCE, normalize_category,
};
pub use source::{fetch_observed_counts, parse_domain_counts};
