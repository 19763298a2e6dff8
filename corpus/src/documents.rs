//! JSON documents exchanged between commands.
//!
//! The packs document lives in [`loader`](crate::PacksDocument); the
//! versions and matrix documents are the core types
//! [`VersionSelection`](contentpack_core::VersionSelection) and
//! [`MatrixPlan`](contentpack_core::MatrixPlan) serialized as-is. This
//! module adds the per-job result document and the aggregated report.

use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use contentpack_core::{
    CompatibilityCondition, CompatibilityMatrix, StatusCounts, SubTestRecord, TestJob, TestResult,
    TestStatus,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::error::Result;

/// Reads a JSON document of type `T`.
///
/// # Errors
///
/// Returns [`IoError`](crate::CorpusError::IoError) or
/// [`JsonError`](crate::CorpusError::JsonError).
pub fn read_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let file = std::fs::File::open(path)?;
    let reader = BufReader::new(file);
    Ok(serde_json::from_reader(reader)?)
}

/// Writes `value` as pretty-printed JSON, creating parent directories.
///
/// # Errors
///
/// Returns [`IoError`](crate::CorpusError::IoError) or
/// [`JsonError`](crate::CorpusError::JsonError).
pub fn write_json<T: Serialize>(path: impl AsRef<Path>, value: &T) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(path)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, value)?;
    Ok(())
}

/// Pack identity recorded in a result document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultPackInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub compatibility_conditions: Vec<CompatibilityCondition>,
}

/// Sub-test counters in a result document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultSummary {
    pub total_tests: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
}

impl From<StatusCounts> for ResultSummary {
    fn from(counts: StatusCounts) -> Self {
        Self {
            total_tests: counts.total,
            passed: counts.passed,
            failed: counts.failed,
            errors: counts.errors,
        }
    }
}

/// One job's result, as written to `<output_dir>/<job_name>.json`.
///
/// External test commands write this document too; only `tests` is
/// required when reading one back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_name: Option<String>,
    #[serde(default)]
    pub version: String,
    /// RFC 3339 UTC timestamp.
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub content_pack: ResultPackInfo,
    /// Sub-tests keyed by name, in execution order.
    #[serde(with = "sub_tests")]
    pub tests: Vec<SubTestRecord>,
    #[serde(default)]
    pub summary: ResultSummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TestStatus>,
}

impl ResultDocument {
    /// Builds the document for `result`, taking job details from `job`.
    pub fn from_result(result: &TestResult, job: Option<&TestJob>) -> Self {
        Self {
            job_name: job.map(|j| j.job_name.clone()),
            version: result.version.clone(),
            timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            content_pack: ResultPackInfo {
                name: result.pack_name.clone(),
                path: job.map(|j| j.content_pack.clone()),
                compatibility_conditions: Vec::new(),
            },
            tests: result.tests.clone(),
            summary: result.counts().into(),
            status: Some(result.status()),
        }
    }

    /// Converts back into a [`TestResult`].
    ///
    /// Status is recomputed from the sub-tests; the stored `status` and
    /// `summary` are informational.
    pub fn into_result(self) -> TestResult {
        TestResult::new(self.content_pack.name, self.version, self.tests)
    }
}

mod sub_tests {
    use std::fmt;

    use contentpack_core::{SubTestRecord, TestStatus};
    use serde::de::{MapAccess, SeqAccess, Visitor};
    use serde::ser::SerializeMap;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize)]
    struct EntryRef<'a> {
        status: TestStatus,
        duration: f64,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<&'a str>,
    }

    #[derive(Deserialize)]
    struct Entry {
        status: TestStatus,
        #[serde(default)]
        duration: f64,
        #[serde(default)]
        error: Option<String>,
    }

    #[derive(Deserialize)]
    struct NamedEntry {
        name: String,
        status: TestStatus,
        #[serde(default)]
        duration: f64,
        #[serde(default)]
        error: Option<String>,
    }

    pub fn serialize<S: Serializer>(tests: &[SubTestRecord], serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(tests.len()))?;
        for test in tests {
            map.serialize_entry(
                &test.name,
                &EntryRef {
                    status: test.status,
                    duration: test.duration,
                    error: test.error.as_deref(),
                },
            )?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<SubTestRecord>, D::Error> {
        deserializer.deserialize_any(OrderedTests)
    }

    struct OrderedTests;

    impl<'de> Visitor<'de> for OrderedTests {
        type Value = Vec<SubTestRecord>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map of sub-test name to result, or a list of named sub-tests")
        }

        fn visit_seq<A: SeqAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
            let mut tests = Vec::with_capacity(access.size_hint().unwrap_or(0));
            while let Some(entry) = access.next_element::<NamedEntry>()? {
                tests.push(SubTestRecord {
                    name: entry.name,
                    status: entry.status,
                    duration: entry.duration,
                    error: entry.error,
                });
            }
            Ok(tests)
        }

        fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
            let mut tests = Vec::new();
            while let Some((name, entry)) = access.next_entry::<String, Entry>()? {
                tests.push(SubTestRecord {
                    name,
                    status: entry.status,
                    duration: entry.duration,
                    error: entry.error,
                });
            }
            Ok(tests)
        }
    }
}

/// Result documents found under a directory.
#[derive(Debug, Default)]
pub struct ResultSet {
    pub documents: Vec<(PathBuf, ResultDocument)>,
    /// Files that were not result documents, with the reason.
    pub skipped: Vec<(PathBuf, String)>,
}

/// Loads every `*.json` result document under `dir`, recursively and in
/// path order.
///
/// # Errors
///
/// Returns an error only if `dir` cannot be traversed; unparseable files
/// are recorded in [`ResultSet::skipped`].
pub fn load_results(dir: impl AsRef<Path>) -> Result<ResultSet> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(crate::CorpusError::NotFound(dir.to_path_buf()));
    }

    let mut set = ResultSet::default();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        match read_json::<ResultDocument>(path) {
            Ok(document) if document.content_pack.name.trim().is_empty() => {
                tracing::warn!(path = %path.display(), "skipping result file without a content pack name");
                set.skipped
                    .push((path.to_path_buf(), "result document has no content pack name".to_string()));
            }
            Ok(document) => set.documents.push((path.to_path_buf(), document)),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "skipping invalid result file");
                set.skipped.push((path.to_path_buf(), err.to_string()));
            }
        }
    }
    Ok(set)
}

/// The aggregated compatibility matrix document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixReport {
    pub generated_at: String,
    #[serde(flatten)]
    pub matrix: CompatibilityMatrix,
}

impl MatrixReport {
    pub fn new(matrix: CompatibilityMatrix) -> Self {
        Self {
            generated_at: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            matrix,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn sample_result() -> TestResult {
        TestResult::new(
            "Demo",
            "1.0.0",
            vec![
                SubTestRecord::passed("content_pack_validation", 0.01),
                SubTestRecord::failed("database_operations", 0.02, "no such table: t"),
            ],
        )
    }

    #[test]
    fn test_result_document_shape() {
        let doc = ResultDocument::from_result(&sample_result(), None);
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["version"], "1.0.0");
        assert_eq!(value["status"], "failed");
        assert_eq!(value["summary"]["total_tests"], 2);
        assert_eq!(value["summary"]["failed"], 1);
        assert_eq!(value["tests"]["database_operations"]["error"], "no such table: t");
        assert!(value["tests"]["content_pack_validation"].get("error").is_none());
    }

    #[test]
    fn test_sub_test_order_survives_reading() {
        let text = r#"{
            "tests": {
                "zeta": {"status": "passed", "duration": 1.5},
                "alpha": {"status": "error", "error": "boom", "returncode": 2}
            },
            "content_pack": {"name": "Demo"},
            "version": "v2.0.0"
        }"#;
        let doc: ResultDocument = serde_json::from_str(text).unwrap();
        let names: Vec<_> = doc.tests.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["zeta", "alpha"]);
        assert_eq!(doc.tests[0].duration, 1.5);

        let result = doc.into_result();
        assert_eq!(result.status(), TestStatus::Error);
        assert_eq!(result.version, "v2.0.0");
    }

    #[test]
    fn test_list_form_sub_tests_are_read() {
        let doc: ResultDocument = serde_json::from_value(json!({
            "version": "1.0.0",
            "content_pack": {"name": "Demo"},
            "tests": [
                {"name": "content_pack_validation", "status": "passed", "duration": 0.1},
                {"name": "database_operations", "status": "failed", "error": "boom"}
            ]
        }))
        .unwrap();
        assert_eq!(doc.tests.len(), 2);
        assert_eq!(doc.tests[1].name, "database_operations");
        assert_eq!(doc.tests[1].error.as_deref(), Some("boom"));
        assert_eq!(doc.tests[1].duration, 0.0);
        assert_eq!(doc.into_result().status(), TestStatus::Failed);
    }

    #[test]
    fn test_status_is_recomputed_from_tests() {
        let doc: ResultDocument = serde_json::from_value(json!({
            "tests": {"a": {"status": "failed"}},
            "status": "passed"
        }))
        .unwrap();
        assert_eq!(doc.into_result().status(), TestStatus::Failed);
    }

    #[test]
    fn test_write_and_load_results() {
        let dir = tempfile::tempdir().unwrap();
        let doc = ResultDocument::from_result(&sample_result(), None);
        write_json(dir.path().join("nested/demo-1-0-0.json"), &doc).unwrap();
        std::fs::write(dir.path().join("garbage.json"), "[1, 2").unwrap();

        let set = load_results(dir.path()).unwrap();
        assert_eq!(set.documents.len(), 1);
        assert_eq!(set.documents[0].1.tests, doc.tests);
        assert_eq!(set.skipped.len(), 1);
    }

    #[test]
    fn test_load_results_skips_unnamed_documents() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("anonymous.json"),
            r#"{"version": "1.0.0", "tests": {"a": {"status": "passed"}}}"#,
        )
        .unwrap();
        write_json(dir.path().join("named.json"), &ResultDocument::from_result(&sample_result(), None)).unwrap();

        let set = load_results(dir.path()).unwrap();
        assert_eq!(set.documents.len(), 1);
        assert!(set.documents[0].0.ends_with("named.json"));
        assert_eq!(set.skipped.len(), 1);
        assert!(set.skipped[0].1.contains("no content pack name"));
    }

    #[test]
    fn test_load_results_missing_dir() {
        assert!(load_results("/nonexistent/results/dir").is_err());
    }
}
