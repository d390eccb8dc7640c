//! Coverage gap analysis.
//!
//! Compares observed per-category question counts against the quota a
//! profile allocates to each category. Pure: no I/O, no state.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::Serialize;

use super::error::CoverageError;
use super::profiles::{CoverageProfile, normalize_category};
use crate::batch::GeneratedItem;

/// Below this percentage of its target a category is `under`.
pub const UNDER_THRESHOLD: u64 = 80;

/// Above this percentage of its target a category is `over`.
pub const OVER_THRESHOLD: u64 = 120;

/// Percentage reported for a category with a zero target but observations.
pub const SATURATED_PERCENTAGE: f64 = 999.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CoverageStatus {
    Under,
    OnTarget,
    Over,
}

impl CoverageStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Under => "under",
            Self::OnTarget => "on-target",
            Self::Over => "over",
        }
    }
}

impl fmt::Display for CoverageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One profile category in a report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryCoverage {
    pub category: String,
    pub weight: f64,
    pub observed: u64,
    pub target: u64,
    pub percentage: f64,
    pub status: CoverageStatus,
}

/// Shortfall (for `under`) or surplus (for `over`) of one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoverageGap {
    pub category: String,
    pub count: u64,
}

/// Observed category that no profile target matched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnmatchedCategory {
    pub category: String,
    pub observed: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverageReport {
    pub profile: String,
    pub total_target: u64,
    pub total_observed: u64,
    /// `round(total_observed / total_target * 100)`
    pub overall_percentage: u64,
    /// In profile order.
    pub categories: Vec<CategoryCoverage>,
    pub under: Vec<CoverageGap>,
    pub over: Vec<CoverageGap>,
    pub unmatched: Vec<UnmatchedCategory>,
}

/// Compare `observed` counts against `profile` for a total of `total_target`
/// questions.
///
/// Observed keys match profile categories case-insensitively after
/// trimming. Input is validated and rejected, never normalized.
pub fn analyze(
    profile: &CoverageProfile,
    total_target: u64,
    observed: &BTreeMap<String, i64>,
) -> Result<CoverageReport, CoverageError> {
    if total_target == 0 {
        return Err(CoverageError::InvalidTotal);
    }
    profile.validate()?;

    let mut counts: HashMap<String, (&str, u64)> = HashMap::with_capacity(observed.len());
    for (category, &count) in observed {
        let count = u64::try_from(count).map_err(|_| CoverageError::NegativeCount {
            category: category.clone(),
            count,
        })?;
        if counts
            .insert(normalize_category(category), (category.as_str(), count))
            .is_some()
        {
            return Err(CoverageError::DuplicateCategory {
                category: category.clone(),
                source_name: "observed counts".to_string(),
            });
        }
    }

    let mut categories = Vec::with_capacity(profile.targets.len());
    let mut under = Vec::new();
    let mut over = Vec::new();

    for target in &profile.targets {
        let key = normalize_category(&target.category);
        let seen = counts.remove(&key).map(|(_, count)| count).unwrap_or(0);
        let target_count = (target.weight / 100.0 * total_target as f64).round() as u64;
        let (percentage, status) = classify(seen, target_count);

        match status {
            // A zero target with nothing observed is under but needs nothing.
            CoverageStatus::Under if target_count <= seen => {}
            CoverageStatus::Under => under.push(CoverageGap {
                category: target.category.clone(),
                count: target_count - seen,
            }),
            CoverageStatus::Over => over.push(CoverageGap {
                category: target.category.clone(),
                count: seen - target_count,
            }),
            CoverageStatus::OnTarget => {}
        }

        categories.push(CategoryCoverage {
            category: target.category.clone(),
            weight: target.weight,
            observed: seen,
            target: target_count,
            percentage,
            status,
        });
    }

    let mut unmatched: Vec<UnmatchedCategory> = counts
        .into_values()
        .map(|(category, observed)| UnmatchedCategory {
            category: category.to_string(),
            observed,
        })
        .collect();
    unmatched.sort_by(|a, b| a.category.cmp(&b.category));

    let total_observed: u64 = observed.values().map(|&c| c as u64).sum();
    let overall_percentage = (total_observed as f64 / total_target as f64 * 100.0).round() as u64;

    Ok(CoverageReport {
        profile: profile.name.clone(),
        total_target,
        total_observed,
        overall_percentage,
        categories,
        under,
        over,
        unmatched,
    })
}

/// Percentage of target reached and the resulting status.
///
/// Thresholds are compared in integers so the 80% and 120% boundaries are
/// exact. A zero target yields 0% (under) with no observations and the
/// saturated value (over) otherwise.
fn classify(observed: u64, target: u64) -> (f64, CoverageStatus) {
    if target == 0 {
        return if observed == 0 {
            (0.0, CoverageStatus::Under)
        } else {
            (SATURATED_PERCENTAGE, CoverageStatus::Over)
        };
    }

    let percentage = observed as f64 * 100.0 / target as f64;
    let scaled = observed.saturating_mul(100);
    let status = if scaled < UNDER_THRESHOLD.saturating_mul(target) {
        CoverageStatus::Under
    } else if scaled > OVER_THRESHOLD.saturating_mul(target) {
        CoverageStatus::Over
    } else {
        CoverageStatus::OnTarget
    };
    (percentage, status)
}

/// Tally items per category, keeping the first spelling seen.
pub fn counts_by_category(items: &[GeneratedItem]) -> BTreeMap<String, i64> {
    let mut spelling: HashMap<String, String> = HashMap::new();
    let mut counts: BTreeMap<String, i64> = BTreeMap::new();
    for item in items {
        let name = spelling
            .entry(normalize_category(&item.category))
            .or_insert_with(|| item.category.trim().to_string());
        *counts.entry(name.clone()).or_insert(0) += 1;
    }
    counts
}

impl fmt::Display for CoverageReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Coverage for {}: {} of {} questions ({}%)",
            self.profile, self.total_observed, self.total_target, self.overall_percentage
        )?;
        writeln!(f)?;
        for c in &self.categories {
            writeln!(
                f,
                "  {} ({}%): {}/{} ({:.1}%) {}",
                c.category, c.weight, c.observed, c.target, c.percentage, c.status
            )?;
        }

        if !self.under.is_empty() {
            writeln!(f)?;
            writeln!(f, "Under target:")?;
            for gap in &self.under {
                writeln!(f, "  - {}: {} more needed", gap.category, gap.count)?;
            }
        }
        if !self.over.is_empty() {
            writeln!(f)?;
            writeln!(f, "Over target:")?;
            for gap in &self.over {
                writeln!(f, "  - {}: {} surplus", gap.category, gap.count)?;
            }
        }
        if !self.unmatched.is_empty() {
            writeln!(f)?;
            writeln!(f, "Not in profile:")?;
            for u in &self.unmatched {
                writeln!(f, "  - {}: {}", u.category, u.observed)?;
            }
        }
        Ok(())
    }
}
