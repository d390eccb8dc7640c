//! Observed per-category counts from the backend's statistics route.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::debug;

use super::error::CoverageError;
use crate::backend::{BackendRoutes, JobBackend};

/// Fetch question counts per domain for a certification.
///
/// Accepts `{domains: {name: count}}`, `{domains: [{domain, count}]}` or
/// either shape under `data`.
pub async fn fetch_observed_counts<B: JobBackend>(
    backend: &B,
    routes: &BackendRoutes,
    certification: &str,
) -> Result<BTreeMap<String, i64>, CoverageError> {
    let reply = backend
        .get(&routes.domain_stats, &[("certification", certification)])
        .await?;

    if !reply.is_success() {
        return Err(CoverageError::MalformedCounts {
            detail: format!("{} returned HTTP {}", routes.domain_stats, reply.status),
        });
    }

    let counts = parse_domain_counts(&reply.body)?;
    debug!(certification, domains = counts.len(), "fetched domain statistics");
    Ok(counts)
}

/// Decode a domain statistics body.
pub fn parse_domain_counts(body: &Value) -> Result<BTreeMap<String, i64>, CoverageError> {
    let domains = body
        .get("domains")
        .or_else(|| body.get("data").and_then(|d| d.get("domains")))
        .or_else(|| body.get("data").filter(|d| d.is_array()))
        .ok_or_else(|| malformed("response carried no domains"))?;

    let mut counts = BTreeMap::new();
    match domains {
        Value::Object(map) => {
            for (domain, count) in map {
                counts.insert(domain.clone(), as_count(domain, count)?);
            }
        }
        Value::Array(entries) => {
            for entry in entries {
                let domain = entry
                    .get("domain")
                    .or_else(|| entry.get("name"))
                    .and_then(Value::as_str)
                    .ok_or_else(|| malformed("entry without a domain name"))?;
                let count = entry
                    .get("count")
                    .ok_or_else(|| malformed(format!("no count for '{domain}'")))?;
                if counts.insert(domain.to_string(), as_count(domain, count)?).is_some() {
                    return Err(malformed(format!("domain '{domain}' listed more than once")));
                }
            }
        }
        _ => return Err(malformed("domains is neither an object nor a list")),
    }
    Ok(counts)
}

fn as_count(domain: &str, value: &Value) -> Result<i64, CoverageError> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .ok_or_else(|| malformed(format!("count for '{domain}' is not an integer")))
}

fn malformed(detail: impl Into<String>) -> CoverageError {
    CoverageError::MalformedCounts {
        detail: detail.into(),
    }
}
