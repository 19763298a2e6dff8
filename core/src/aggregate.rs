//! Folding job results into a compatibility matrix.
//!
//! Each (pack, version) key may be written once per run. Keys are kept in
//! ordered maps, so the finished matrix does not depend on the order in
//! which results arrive. For parallel ingestion, give each task its own
//! [`ResultAggregator`] over a disjoint set of keys and
//! [`merge`](ResultAggregator::merge) them afterwards.
//!
//! # Examples
//!
//! ```
//! use contentpack_core::*;
//!
//! let mut aggregator = ResultAggregator::with_universe(["Demo"], ["1.0.0", "2.0.0"]);
//! aggregator
//!     .ingest(TestResult::new("Demo", "1.0.0", vec![SubTestRecord::passed("load", 0.1)]))
//!     .unwrap();
//!
//! let matrix = aggregator.finalize();
//! assert_eq!(matrix.status("Demo", "1.0.0"), Some(CellStatus::Passed));
//! assert_eq!(matrix.status("Demo", "2.0.0"), Some(CellStatus::NotTested));
//! assert_eq!(matrix.summary.counts.total, 1);
//! ```

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{SemanticVersion, TestJob};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AggregateError {
    /// A second result arrived for a key that already has one.
    #[error("duplicate result for {pack} at version {version}")]
    DuplicateResult { pack: String, version: String },
}

/// Status of one sub-test or one rolled-up job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Passed,
    Failed,
    Error,
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Error => "error",
        })
    }
}

/// Status of one matrix cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellStatus {
    Passed,
    Failed,
    Error,
    NotTested,
}

impl From<TestStatus> for CellStatus {
    fn from(status: TestStatus) -> Self {
        match status {
            TestStatus::Passed => Self::Passed,
            TestStatus::Failed => Self::Failed,
            TestStatus::Error => Self::Error,
        }
    }
}

/// One named check inside a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubTestRecord {
    pub name: String,
    pub status: TestStatus,
    /// Seconds.
    pub duration: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SubTestRecord {
    pub fn passed(name: impl Into<String>, duration: f64) -> Self {
        Self {
            name: name.into(),
            status: TestStatus::Passed,
            duration,
            error: None,
        }
    }

    pub fn failed(name: impl Into<String>, duration: f64, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: TestStatus::Failed,
            duration,
            error: Some(error.into()),
        }
    }

    pub fn error(name: impl Into<String>, duration: f64, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: TestStatus::Error,
            duration,
            error: Some(error.into()),
        }
    }
}

/// Pass/fail/error counters; `total == passed + failed + errors` always.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
}

impl StatusCounts {
    pub fn record(&mut self, status: TestStatus) {
        self.total += 1;
        match status {
            TestStatus::Passed => self.passed += 1,
            TestStatus::Failed => self.failed += 1,
            TestStatus::Error => self.errors += 1,
        }
    }

    pub fn add(&mut self, other: &Self) {
        self.total += other.total;
        self.passed += other.passed;
        self.failed += other.failed;
        self.errors += other.errors;
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0 || self.errors > 0
    }
}

/// Outcome of one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    /// Display name of the pack.
    pub pack_name: String,
    pub version: String,
    pub tests: Vec<SubTestRecord>,
}

impl TestResult {
    pub fn new(pack_name: impl Into<String>, version: impl Into<String>, tests: Vec<SubTestRecord>) -> Self {
        Self {
            pack_name: pack_name.into(),
            version: version.into(),
            tests,
        }
    }

    /// `error` if any sub-test errored, else `failed` if any failed, else
    /// `passed`.
    pub fn status(&self) -> TestStatus {
        let any = |wanted| self.tests.iter().any(|t| t.status == wanted);
        if any(TestStatus::Error) {
            TestStatus::Error
        } else if any(TestStatus::Failed) {
            TestStatus::Failed
        } else {
            TestStatus::Passed
        }
    }

    /// Counters over the sub-tests.
    pub fn counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for test in &self.tests {
            counts.record(test.status);
        }
        counts
    }
}

/// A requested job with no matching result.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MissingResult {
    pub pack: String,
    pub version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixTotals {
    #[serde(flatten)]
    pub counts: StatusCounts,
    pub not_tested: usize,
    pub total_content_packs: usize,
    pub total_versions: usize,
}

/// The finished pack × version table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompatibilityMatrix {
    pub summary: MatrixTotals,
    /// Sorted by semantic version, unparseable tags last.
    pub versions: Vec<String>,
    pub compatibility_matrix: BTreeMap<String, BTreeMap<String, CellStatus>>,
    pub pack_summaries: BTreeMap<String, StatusCounts>,
    pub detailed_results: BTreeMap<String, BTreeMap<String, TestResult>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing: Vec<MissingResult>,
}

impl CompatibilityMatrix {
    /// Cell status; `version` may carry a leading `v`.
    pub fn status(&self, pack: &str, version: &str) -> Option<CellStatus> {
        self.compatibility_matrix
            .get(pack)?
            .get(&SemanticVersion::canonical(version))
            .copied()
    }

    /// `true` when any ingested result failed or errored.
    pub fn has_failures(&self) -> bool {
        self.summary.counts.has_failures()
    }
}

/// Accumulates [`TestResult`]s keyed by (pack, version).
#[derive(Debug, Clone, Default)]
pub struct ResultAggregator {
    results: BTreeMap<(String, String), TestResult>,
    packs: BTreeSet<String>,
    versions: BTreeSet<String>,
    summary: StatusCounts,
    missing: BTreeSet<MissingResult>,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts with a known pack and version universe; every combination
    /// without a result finalizes as [`CellStatus::NotTested`].
    pub fn with_universe<P, V>(packs: P, versions: V) -> Self
    where
        P: IntoIterator,
        P::Item: Into<String>,
        V: IntoIterator,
        V::Item: Into<String>,
    {
        Self {
            packs: packs.into_iter().map(Into::into).collect(),
            versions: versions
                .into_iter()
                .map(|v| {
                    let tag: String = v.into();
                    SemanticVersion::canonical(&tag)
                })
                .collect(),
            ..Self::default()
        }
    }

    /// Running counters over ingested results.
    pub fn summary(&self) -> StatusCounts {
        self.summary
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Adds one result and returns its rolled-up status.
    ///
    /// # Errors
    ///
    /// [`AggregateError::DuplicateResult`] if the key already has a result;
    /// the aggregator is left unchanged. `"v1.0.0"` and `"1.0.0"` are the
    /// same key.
    pub fn ingest(&mut self, mut result: TestResult) -> Result<TestStatus, AggregateError> {
        result.version = SemanticVersion::canonical(&result.version);
        let key = (result.pack_name.clone(), result.version.clone());
        if self.results.contains_key(&key) {
            return Err(AggregateError::DuplicateResult {
                pack: key.0,
                version: key.1,
            });
        }

        let status = result.status();
        self.summary.record(status);
        self.packs.insert(key.0.clone());
        self.versions.insert(key.1.clone());
        self.missing.remove(&MissingResult {
            pack: key.0.clone(),
            version: key.1.clone(),
        });
        self.results.insert(key, result);
        Ok(status)
    }

    /// Ingests every result, collecting rejected duplicates instead of
    /// stopping at the first.
    pub fn ingest_all(&mut self, results: impl IntoIterator<Item = TestResult>) -> Vec<AggregateError> {
        results
            .into_iter()
            .filter_map(|result| self.ingest(result).err())
            .collect()
    }

    /// Absorbs an aggregator built over a disjoint key set.
    ///
    /// # Errors
    ///
    /// [`AggregateError::DuplicateResult`] for the first shared key; nothing
    /// is merged in that case.
    pub fn merge(&mut self, other: ResultAggregator) -> Result<(), AggregateError> {
        if let Some((pack, version)) = other.results.keys().find(|k| self.results.contains_key(*k)) {
            return Err(AggregateError::DuplicateResult {
                pack: pack.clone(),
                version: version.clone(),
            });
        }

        self.summary.add(&other.summary);
        self.packs.extend(other.packs);
        self.versions.extend(other.versions);
        self.missing.extend(other.missing);
        self.results.extend(other.results);
        let results = &self.results;
        self.missing
            .retain(|m| !results.contains_key(&(m.pack.clone(), m.version.clone())));
        Ok(())
    }

    /// Marks requested jobs that have no result as missing and returns them.
    ///
    /// Missing jobs finalize as [`CellStatus::NotTested`] and are listed in
    /// [`CompatibilityMatrix::missing`], which distinguishes them from pairs
    /// that were never scheduled.
    pub fn reconcile(&mut self, jobs: &[TestJob]) -> Vec<MissingResult> {
        let mut newly_missing = Vec::new();
        for job in jobs {
            let key = (
                job.content_pack_display_name.clone(),
                SemanticVersion::canonical(&job.version),
            );
            self.packs.insert(key.0.clone());
            self.versions.insert(key.1.clone());
            if self.results.contains_key(&key) {
                continue;
            }
            let missing = MissingResult {
                pack: key.0,
                version: key.1,
            };
            if self.missing.insert(missing.clone()) {
                newly_missing.push(missing);
            }
        }
        if !newly_missing.is_empty() {
            tracing::warn!(count = newly_missing.len(), "requested jobs have no result");
        }
        newly_missing
    }

    /// Produces the finished matrix.
    pub fn finalize(self) -> CompatibilityMatrix {
        let mut compatibility_matrix: BTreeMap<String, BTreeMap<String, CellStatus>> = BTreeMap::new();
        let mut detailed_results: BTreeMap<String, BTreeMap<String, TestResult>> = BTreeMap::new();
        let mut pack_summaries: BTreeMap<String, StatusCounts> = BTreeMap::new();
        let mut not_tested = 0;

        for pack in &self.packs {
            let row = compatibility_matrix.entry(pack.clone()).or_default();
            pack_summaries.entry(pack.clone()).or_default();
            for version in &self.versions {
                if !self.results.contains_key(&(pack.clone(), version.clone())) {
                    row.insert(version.clone(), CellStatus::NotTested);
                    not_tested += 1;
                }
            }
        }

        for ((pack, version), result) in self.results {
            let status = result.status();
            compatibility_matrix
                .entry(pack.clone())
                .or_default()
                .insert(version.clone(), status.into());
            pack_summaries.entry(pack.clone()).or_default().record(status);
            detailed_results.entry(pack).or_default().insert(version, result);
        }

        let mut versions: Vec<String> = self.versions.into_iter().collect();
        versions.sort_by(|a, b| compare_version_tags(a, b));

        CompatibilityMatrix {
            summary: MatrixTotals {
                counts: self.summary,
                not_tested,
                total_content_packs: compatibility_matrix.len(),
                total_versions: versions.len(),
            },
            versions,
            compatibility_matrix,
            pack_summaries,
            detailed_results,
            missing: self.missing.into_iter().collect(),
        }
    }
}

/// Orders tags by semantic version; unparseable tags sort last, lexically.
pub fn compare_version_tags(a: &str, b: &str) -> Ordering {
    match (SemanticVersion::parse(a), SemanticVersion::parse(b)) {
        (Ok(x), Ok(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}
