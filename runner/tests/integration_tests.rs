//! End-to-end runs: discovery, matrix, execution and aggregation.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use contentpack_core::{CellStatus, ResultAggregator, TestStatus, build_matrix};
use contentpack_corpus::{discover_packs, load_results};
use contentpack_runner::{BuiltinExecutor, PoolConfig, run_jobs};
use serde_json::{Value, json};

fn pack(name: &str, min_version: &str, database: Value) -> Value {
    json!({
        "metadata": {
            "name": name,
            "summary": "s",
            "detailed_description": "d",
            "date_exported": "2024-01-01T00:00:00Z",
            "author_name": "a",
            "author_email": "a@example.com",
            "version": "1.0.0",
            "category": "education",
            "compatibility_conditions": [
                {"type": "version_range", "min_version": min_version}
            ]
        },
        "database": database,
        "state": {"timeline": {"events": []}}
    })
}

fn write(dir: &Path, file: &str, value: &Value) {
    std::fs::write(dir.join(file), serde_json::to_string_pretty(value).unwrap()).unwrap();
}

fn versions() -> Vec<String> {
    ["0.9.0", "1.0.0", "1.1.0"].iter().map(|v| v.to_string()).collect()
}

// ---------------------------------------------------------------------------
// Full pipeline
// ---------------------------------------------------------------------------

#[test]
fn test_pipeline_produces_matrix() {
    let packs_dir = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();
    write(
        packs_dir.path(),
        "good.json",
        &pack("Good Pack", "1.0.0", json!(["CREATE TABLE t (id INTEGER);"])),
    );
    write(
        packs_dir.path(),
        "broken-db.json",
        &pack("Broken Db", "0.1.0", json!(["INSERT INTO missing VALUES (1);"])),
    );

    let document = discover_packs(packs_dir.path(), None).unwrap();
    let plan = build_matrix(&document.content_packs, &versions(), 50);
    // Good Pack is skipped on 0.9.0.
    assert_eq!(plan.include.len(), 5);
    assert_eq!(plan.skipped.len(), 1);

    let config = PoolConfig {
        workers: 3,
        timeout: Duration::from_secs(30),
        output_dir: Some(out_dir.path().to_path_buf()),
    };
    let executor = Arc::new(BuiltinExecutor::new(packs_dir.path()).unwrap());
    let report = run_jobs(&plan.include, executor, &config).unwrap();
    assert_eq!(report.counts.total, 5);
    assert_eq!(report.counts.passed, 2);
    assert_eq!(report.counts.failed, 3);

    let set = load_results(out_dir.path()).unwrap();
    assert_eq!(set.documents.len(), 5);
    assert!(set.skipped.is_empty());

    let names: Vec<_> = document.content_packs.iter().map(|p| p.name.clone()).collect();
    let mut aggregator = ResultAggregator::with_universe(names, versions());
    let errors = aggregator.ingest_all(set.documents.into_iter().map(|(_, doc)| doc.into_result()));
    assert!(errors.is_empty());
    assert!(aggregator.reconcile(&plan.include).is_empty());

    let matrix = aggregator.finalize();
    assert_eq!(matrix.status("Good Pack", "1.0.0"), Some(CellStatus::Passed));
    assert_eq!(matrix.status("Good Pack", "0.9.0"), Some(CellStatus::NotTested));
    assert_eq!(matrix.status("Broken Db", "0.9.0"), Some(CellStatus::Failed));
    assert_eq!(matrix.summary.counts.total, 5);
    assert_eq!(matrix.summary.not_tested, 1);
    assert!(matrix.has_failures());
}

#[test]
fn test_missing_result_is_reported() {
    let packs_dir = tempfile::tempdir().unwrap();
    write(packs_dir.path(), "good.json", &pack("Good", "1.0.0", json!([])));

    let document = discover_packs(packs_dir.path(), None).unwrap();
    let plan = build_matrix(&document.content_packs, &versions(), 50);

    let executor = Arc::new(BuiltinExecutor::new(packs_dir.path()).unwrap());
    let report = run_jobs(&plan.include[..1], executor, &PoolConfig::default()).unwrap();
    assert_eq!(report.outcomes[0].result.status(), TestStatus::Passed);

    let mut aggregator = ResultAggregator::with_universe(["Good".to_string()], versions());
    aggregator.ingest_all(report.into_results());
    let missing = aggregator.reconcile(&plan.include);
    assert_eq!(missing.len(), 1);
    assert_eq!(missing[0].version, plan.include[1].version);

    let matrix = aggregator.finalize();
    assert_eq!(matrix.missing.len(), 1);
    assert_eq!(
        matrix.status("Good", &plan.include[1].version),
        Some(CellStatus::NotTested)
    );
}
