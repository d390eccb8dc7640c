use std::collections::BTreeMap;
use std::path::PathBuf;

use tabled::{Table, Tabled};

use crate::backend::{BackendRoutes, JobBackend};
use crate::batch::load_items;
use crate::cli::error::{CliError, CliResult};
use crate::cli::utils::{apply_table_style, truncate_with_ellipsis};
use crate::coverage::{
    CategoryCoverage, CoverageReport, ProfileRegistry, analyze, counts_by_category,
    fetch_observed_counts,
};

/// Where observed per-domain counts come from.
#[derive(Debug, Clone, PartialEq)]
pub enum CountSource {
    /// Saved batch files, tallied by domain.
    Files(Vec<PathBuf>),
    /// `Domain=N` pairs from the command line.
    Pairs(Vec<String>),
    /// The backend's domain statistics for a certification.
    Backend { certification: String },
}

#[derive(Tabled)]
pub(crate) struct CoverageDisplay {
    #[tabled(rename = "Domain")]
    pub(crate) domain: String,
    #[tabled(rename = "Weight")]
    pub(crate) weight: String,
    #[tabled(rename = "Target")]
    pub(crate) target: u64,
    #[tabled(rename = "Have")]
    pub(crate) observed: u64,
    #[tabled(rename = "Coverage")]
    pub(crate) percentage: String,
    #[tabled(rename = "Status")]
    pub(crate) status: String,
}

impl From<&CategoryCoverage> for CoverageDisplay {
    fn from(c: &CategoryCoverage) -> Self {
        Self {
            domain: truncate_with_ellipsis(&c.category, 45),
            weight: format!("{}%", c.weight),
            target: c.target,
            observed: c.observed,
            percentage: format!("{:.1}%", c.percentage),
            status: c.status.to_string(),
        }
    }
}

#[derive(Tabled)]
pub(crate) struct ProfileDisplay {
    #[tabled(rename = "Profile")]
    pub(crate) name: String,
    #[tabled(rename = "Description")]
    pub(crate) description: String,
    #[tabled(rename = "Domains")]
    pub(crate) domains: usize,
}

/// Resolve observed counts from `source`.
///
/// The backend is only contacted for [`CountSource::Backend`].
pub async fn observed_counts<B: JobBackend>(
    source: &CountSource,
    backend: impl FnOnce() -> CliResult<B>,
    routes: &BackendRoutes,
) -> CliResult<BTreeMap<String, i64>> {
    match source {
        CountSource::Files(paths) => counts_from_files(paths),
        CountSource::Pairs(pairs) => parse_count_pairs(pairs),
        CountSource::Backend { certification } => {
            let backend = backend()?;
            Ok(fetch_observed_counts(&backend, routes, certification).await?)
        }
    }
}

/// Tally the questions in saved batch files by domain.
pub fn counts_from_files(paths: &[PathBuf]) -> CliResult<BTreeMap<String, i64>> {
    let mut items = Vec::new();
    for path in paths {
        items.extend(load_items(path)?);
    }
    Ok(counts_by_category(&items))
}

/// Parse `Domain=N` pairs.
pub fn parse_count_pairs(pairs: &[String]) -> CliResult<BTreeMap<String, i64>> {
    let mut counts = BTreeMap::new();
    for pair in pairs {
        let (domain, count) = pair.rsplit_once('=').ok_or_else(|| CliError::InvalidInput {
            message: format!("expected DOMAIN=COUNT, got '{pair}'"),
        })?;
        let count: i64 = count.trim().parse().map_err(|_| CliError::InvalidInput {
            message: format!("count for '{}' is not an integer", domain.trim()),
        })?;
        if counts.insert(domain.trim().to_string(), count).is_some() {
            return Err(CliError::InvalidInput {
                message: format!("domain '{}' given more than once", domain.trim()),
            });
        }
    }
    Ok(counts)
}

/// Analyze `observed` against a named profile.
pub fn coverage(
    registry: &ProfileRegistry,
    profile: &str,
    total: u64,
    observed: &BTreeMap<String, i64>,
    format: &str,
) -> CliResult<String> {
    let profile = registry.get(profile)?;
    let report = analyze(profile, total, observed)?;

    match format {
        "json" => Ok(serde_json::to_string_pretty(&report)?),
        _ => Ok(format_report(&report)),
    }
}

/// List the known coverage profiles.
pub fn list_profiles(registry: &ProfileRegistry, format: &str) -> CliResult<String> {
    let profiles: Vec<_> = registry.iter().collect();

    match format {
        "json" => Ok(serde_json::to_string_pretty(&profiles)?),
        _ => {
            if profiles.is_empty() {
                return Ok("No coverage profiles found.".to_string());
            }
            let rows: Vec<ProfileDisplay> = profiles
                .iter()
                .map(|p| ProfileDisplay {
                    name: p.name.clone(),
                    description: truncate_with_ellipsis(&p.description, 50),
                    domains: p.targets.len(),
                })
                .collect();
            let mut table = Table::new(rows);
            apply_table_style(&mut table);
            Ok(table.to_string())
        }
    }
}

pub(crate) fn format_report(report: &CoverageReport) -> String {
    let mut out = format!(
        "Coverage for {}: {} of {} questions ({}%)\n",
        report.profile, report.total_observed, report.total_target, report.overall_percentage
    );

    let rows: Vec<CoverageDisplay> = report.categories.iter().map(|c| c.into()).collect();
    let mut table = Table::new(rows);
    apply_table_style(&mut table);
    out.push_str(&table.to_string());

    if !report.under.is_empty() {
        out.push_str("\n\nUnder target:");
        for gap in &report.under {
            out.push_str(&format!("\n  - {}: {} more needed", gap.category, gap.count));
        }
    }
    if !report.over.is_empty() {
        out.push_str("\n\nOver target:");
        for gap in &report.over {
            out.push_str(&format!("\n  - {}: {} surplus", gap.category, gap.count));
        }
    }
    if !report.unmatched.is_empty() {
        out.push_str("\n\nNot in profile:");
        for u in &report.unmatched {
            out.push_str(&format!("\n  - {}: {}", u.category, u.observed));
        }
    }
    out
}
