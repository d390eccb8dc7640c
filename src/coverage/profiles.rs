//! Coverage profiles: per-certification category weights.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::{CoverageError, ProfileError};

/// Allowed distance of a profile's weight sum from 100.
pub const WEIGHT_SUM_TOLERANCE: f64 = 0.5;

/// One category and its share of the total, in percent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageTarget {
    pub category: String,
    pub weight: f64,
}

impl CoverageTarget {
    pub fn new(category: impl Into<String>, weight: f64) -> Self {
        Self {
            category: category.into(),
            weight,
        }
    }
}

/// Named set of coverage targets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageProfile {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub targets: Vec<CoverageTarget>,
}

impl CoverageProfile {
    pub fn new(name: impl Into<String>, description: impl Into<String>, targets: Vec<CoverageTarget>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            targets,
        }
    }

    /// Reject empty profiles, bad weights and duplicate categories.
    pub fn validate(&self) -> Result<(), CoverageError> {
        if self.targets.is_empty() {
            return Err(CoverageError::EmptyProfile {
                profile: self.name.clone(),
            });
        }

        let mut seen = HashSet::new();
        for target in &self.targets {
            if !target.weight.is_finite() || target.weight < 0.0 {
                return Err(CoverageError::InvalidWeight {
                    profile: self.name.clone(),
                    category: target.category.clone(),
                    weight: target.weight,
                });
            }
            if !seen.insert(normalize_category(&target.category)) {
                return Err(CoverageError::DuplicateCategory {
                    category: target.category.clone(),
                    source_name: format!("profile '{}'", self.name),
                });
            }
        }

        let sum: f64 = self.targets.iter().map(|t| t.weight).sum();
        if (sum - 100.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(CoverageError::WeightSum {
                profile: self.name.clone(),
                sum,
            });
        }
        Ok(())
    }
}

/// Category key used for matching: trimmed and lowercased.
pub fn normalize_category(category: &str) -> String {
    category.trim().to_lowercase()
}

#[derive(Debug, Deserialize)]
struct ProfilesFile {
    profiles: Vec<CoverageProfile>,
}

/// Profiles by name (case-insensitive).
#[derive(Debug, Clone, Default)]
pub struct ProfileRegistry {
    profiles: BTreeMap<String, CoverageProfile>,
}

impl ProfileRegistry {
    /// Registry holding the built-in certification profiles.
    pub fn builtin() -> Self {
        let profiles = builtin_profiles()
            .into_iter()
            .map(|profile| (profile.name.to_lowercase(), profile))
            .collect();
        Self { profiles }
    }

    /// Built-ins plus the profiles in a YAML file. File profiles replace
    /// built-ins of the same name.
    pub fn load_yaml(path: &Path) -> Result<Self, ProfileError> {
        let content = fs::read_to_string(path).map_err(|source| ProfileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut registry = Self::builtin();
        registry.extend_from_yaml(&content)?;
        debug!(path = %path.display(), profiles = registry.profiles.len(), "loaded coverage profiles");
        Ok(registry)
    }

    /// Add every profile in a YAML document.
    pub fn extend_from_yaml(&mut self, content: &str) -> Result<(), ProfileError> {
        let file: ProfilesFile = serde_yaml::from_str(content)?;
        for profile in file.profiles {
            self.insert(profile)?;
        }
        Ok(())
    }

    /// Validate and add a profile, replacing any with the same name.
    pub fn insert(&mut self, profile: CoverageProfile) -> Result<(), CoverageError> {
        profile.validate()?;
        self.profiles.insert(profile.name.to_lowercase(), profile);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&CoverageProfile, CoverageError> {
        self.profiles
            .get(&name.trim().to_lowercase())
            .ok_or_else(|| CoverageError::UnknownProfile {
                name: name.to_string(),
                available: self.names().join(", "),
            })
    }

    pub fn names(&self) -> Vec<&str> {
        self.profiles.values().map(|p| p.name.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CoverageProfile> {
        self.profiles.values()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

fn profile(name: &str, description: &str, targets: &[(&str, f64)]) -> CoverageProfile {
    CoverageProfile::new(
        name,
        description,
        targets
            .iter()
            .map(|(category, weight)| CoverageTarget::new(*category, *weight))
            .collect(),
    )
}

/// Published exam-guide domain weights.
fn builtin_profiles() -> Vec<CoverageProfile> {
    vec![
        profile(
            "aws-saa-c03",
            "AWS Certified Solutions Architect - Associate",
            &[
                ("Design Secure Architectures", 30.0),
                ("Design Resilient Architectures", 26.0),
                ("Design High-Performing Architectures", 24.0),
                ("Design Cost-Optimized Architectures", 20.0),
            ],
        ),
        profile(
            "aws-clf-c02",
            "AWS Certified Cloud Practitioner",
            &[
                ("Cloud Concepts", 24.0),
                ("Security and Compliance", 30.0),
                ("Cloud Technology and Services", 34.0),
                ("Billing, Pricing, and Support", 12.0),
            ],
        ),
        profile(
            "aws-dva-c02",
            "AWS Certified Developer - Associate",
            &[
                ("Development with AWS Services", 32.0),
                ("Security", 26.0),
                ("Deployment", 24.0),
                ("Troubleshooting and Optimization", 18.0),
            ],
        ),
        profile(
            "aws-soa-c02",
            "AWS Certified SysOps Administrator - Associate",
            &[
                ("Monitoring, Logging, and Remediation", 20.0),
                ("Reliability and Business Continuity", 16.0),
                ("Deployment, Provisioning, and Automation", 18.0),
                ("Security and Compliance", 16.0),
                ("Networking and Content Delivery", 18.0),
                ("Cost and Performance Optimization", 12.0),
            ],
        ),
    ]
}
