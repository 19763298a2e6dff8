//! Pack × version test matrix construction.
//!
//! Every pack is resolved once into a [`CompatibilityRequirement`] and then
//! checked against every candidate version. Compatible pairs become
//! [`TestJob`]s; incompatible pairs are recorded as
//! [`SkippedCombination`]s with the reason. When more jobs are produced than
//! the budget allows, jobs are ranked by [`job_priority`] and the tail is
//! dropped.
//!
//! # Examples
//!
//! ```
//! use contentpack_core::*;
//!
//! let packs = vec![PackEntry::new(
//!     "Demo",
//!     "demo.json",
//!     vec![CompatibilityCondition::version_range(Some("1.0.0"), None, "core")],
//! )];
//! let versions = vec!["1.0.0".to_string(), "0.9.0".to_string(), "2.0.0".to_string()];
//!
//! let plan = build_matrix(&packs, &versions, 50);
//! let tested: Vec<_> = plan.include.iter().map(|j| j.version.as_str()).collect();
//! assert_eq!(tested, ["1.0.0", "2.0.0"]);
//! assert_eq!(plan.skipped[0].version, "0.9.0");
//! assert!(plan.skipped[0].reason.contains("1.0.0"));
//! ```

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{CompatibilityCondition, CompatibilityRequirement, SemanticVersion};

/// Default job budget.
pub const DEFAULT_MAX_JOBS: usize = 50;

/// One entry of the packs document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackEntry {
    /// `metadata.name`.
    pub name: String,
    /// Path of the pack file relative to the corpus root.
    pub relative_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default)]
    pub compatibility_conditions: Vec<CompatibilityCondition>,
}

impl PackEntry {
    pub fn new(
        name: impl Into<String>,
        relative_path: impl Into<String>,
        compatibility_conditions: Vec<CompatibilityCondition>,
    ) -> Self {
        Self {
            name: name.into(),
            relative_path: relative_path.into(),
            category: None,
            compatibility_conditions,
        }
    }
}

/// Result a job is expected to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpectedResult {
    Pass,
}

/// One (pack, version) unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestJob {
    pub version: String,
    /// Relative path of the pack file.
    pub content_pack: String,
    /// Normalized pack name, see [`normalize_pack_name`].
    pub content_pack_name: String,
    pub content_pack_display_name: String,
    /// Unique within one plan.
    pub job_name: String,
    pub priority: u64,
    pub requirements: CompatibilityRequirement,
    pub expected_result: ExpectedResult,
}

/// A pair excluded from testing because it is known to be incompatible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedCombination {
    pub version: String,
    pub content_pack: String,
    pub reason: String,
    pub requirements: CompatibilityRequirement,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixSummary {
    /// `test_jobs + dropped_jobs + skipped_combinations`.
    pub total_combinations: usize,
    pub test_jobs: usize,
    pub skipped_combinations: usize,
    /// Compatible jobs cut by the budget.
    pub dropped_jobs: usize,
    pub versions_tested: usize,
    pub content_packs_tested: usize,
}

/// The matrix document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixPlan {
    pub include: Vec<TestJob>,
    #[serde(default)]
    pub skipped: Vec<SkippedCombination>,
    #[serde(default)]
    pub summary: MatrixSummary,
}

/// Lower-cases a display name and collapses every run of characters
/// outside `[a-z0-9]` into one `-`. Job names are built from this and used
/// as file names, so the result never contains a path separator or `.`.
///
/// ```
/// use contentpack_core::normalize_pack_name;
///
/// assert_eq!(normalize_pack_name("Demo Pack_One"), "demo-pack-one");
/// assert_eq!(normalize_pack_name("../Team/Demo"), "team-demo");
/// ```
pub fn normalize_pack_name(name: &str) -> String {
    let slug = slug(name);
    if slug.is_empty() { "pack".to_string() } else { slug }
}

/// Makes a version usable inside a job name: `v1.2.0` becomes `1-2-0`.
pub fn normalize_version(version: &str) -> String {
    let slug = slug(version.strip_prefix('v').unwrap_or(version));
    if slug.is_empty() { "version".to_string() } else { slug }
}

/// `true` when `name` can be used as a file name inside an output
/// directory: non-empty, ASCII alphanumerics, `-` and `_` only.
pub fn is_safe_job_name(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

fn slug(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            out.push(c);
        } else if !out.is_empty() && !out.ends_with('-') {
            out.push('-');
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

/// Ranking score used when the job budget is exceeded.
///
/// The version contributes `major*1000 + minor*100 + patch`. Packs whose
/// normalized name mentions a demo get `+100`, education packs `+50`.
///
/// ```
/// use contentpack_core::*;
///
/// assert_eq!(job_priority(&SemanticVersion::new(1, 2, 3), "demo"), 1323);
/// assert_eq!(job_priority(&SemanticVersion::new(1, 0, 0), "education-basics"), 1050);
/// assert_eq!(job_priority(&SemanticVersion::new(1, 0, 0), "other"), 1000);
/// ```
pub fn job_priority(version: &SemanticVersion, normalized_name: &str) -> u64 {
    let version_score = version
        .major
        .saturating_mul(1000)
        .saturating_add(version.minor.saturating_mul(100))
        .saturating_add(version.patch);

    let pack_bonus = if normalized_name.contains("demo") || normalized_name.contains("demonstration")
    {
        100
    } else if normalized_name.contains("education") {
        50
    } else {
        0
    };

    version_score.saturating_add(pack_bonus)
}

/// Builds the job list and skip list for `packs` × `versions`.
///
/// Jobs are emitted in discovery order (packs, then versions). If more
/// than `max_jobs` are compatible they are stably sorted by descending
/// priority and truncated, so ties keep discovery order. Empty inputs give
/// an empty plan.
pub fn build_matrix(packs: &[PackEntry], versions: &[String], max_jobs: usize) -> MatrixPlan {
    let mut include = Vec::new();
    let mut skipped = Vec::new();
    let mut used_names = HashSet::new();

    for pack in packs {
        let requirements = CompatibilityRequirement::from_conditions(&pack.compatibility_conditions);
        let normalized = normalize_pack_name(&pack.name);

        for version in versions {
            let verdict = requirements.evaluate(version);
            if !verdict.compatible {
                tracing::debug!(pack = %pack.name, version = %version, "skipping incompatible pair");
                skipped.push(SkippedCombination {
                    version: version.clone(),
                    content_pack: pack.name.clone(),
                    reason: verdict.reasons.join("; "),
                    requirements: requirements.clone(),
                });
                continue;
            }

            // evaluate() only reports compatible for a version that parses
            let priority = SemanticVersion::parse(version)
                .map(|v| job_priority(&v, &normalized))
                .unwrap_or_default();

            let base = format!("{normalized}-{}", normalize_version(version));
            let job_name = unique_name(base, &mut used_names);

            include.push(TestJob {
                version: version.clone(),
                content_pack: pack.relative_path.clone(),
                content_pack_name: normalized.clone(),
                content_pack_display_name: pack.name.clone(),
                job_name,
                priority,
                requirements: requirements.clone(),
                expected_result: ExpectedResult::Pass,
            });
        }
    }

    let mut dropped_jobs = 0;
    if include.len() > max_jobs {
        tracing::warn!(
            jobs = include.len(),
            max_jobs,
            "matrix exceeds job budget, keeping highest priority jobs"
        );
        include.sort_by(|a, b| b.priority.cmp(&a.priority));
        dropped_jobs = include.len() - max_jobs;
        include.truncate(max_jobs);
    }

    let summary = MatrixSummary {
        total_combinations: include.len() + dropped_jobs + skipped.len(),
        test_jobs: include.len(),
        skipped_combinations: skipped.len(),
        dropped_jobs,
        versions_tested: versions.len(),
        content_packs_tested: packs.len(),
    };

    MatrixPlan {
        include,
        skipped,
        summary,
    }
}

fn unique_name(base: String, used: &mut HashSet<String>) -> String {
    if used.insert(base.clone()) {
        return base;
    }
    let mut n = 2;
    loop {
        let candidate = format!("{base}-{n}");
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}
