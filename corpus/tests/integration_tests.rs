use std::path::Path;

use contentpack_core::{SchemaConfig, SchemaValidator, ValidationError, build_matrix};
use contentpack_corpus::{
    CorpusError, Manifest, PacksDocument, collect_pack_paths, discover_packs, read_json,
    validate_corpus, write_json,
};
use serde_json::{Value, json};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn pack(name: &str, min_version: Option<&str>) -> Value {
    let mut metadata = json!({
        "name": name,
        "summary": format!("{name} summary"),
        "detailed_description": "A pack used in tests",
        "date_exported": "2024-03-01T12:00:00Z",
        "author_name": "Tester",
        "author_email": "tester@example.com",
        "version": "1.0.0",
        "category": "demo"
    });
    if let Some(min) = min_version {
        metadata["compatibility_conditions"] = json!([
            { "type": "version_range", "min_version": min, "reason": "needs newer host" }
        ]);
    }
    json!({
        "metadata": metadata,
        "database": ["CREATE TABLE notes (id INTEGER PRIMARY KEY, body TEXT);"],
        "state": { "memory": {} }
    })
}

fn write_pack(dir: &Path, file: &str, value: &Value) {
    let path = dir.join(file);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, serde_json::to_string_pretty(value).unwrap()).unwrap();
}

// ---------------------------------------------------------------------------
// Corpus validation
// ---------------------------------------------------------------------------

#[test]
fn test_corpus_continues_past_broken_files() {
    let dir = tempfile::tempdir().unwrap();
    write_pack(dir.path(), "a.json", &pack("Alpha", None));
    write_pack(dir.path(), "nested/b.json", &pack("Beta", Some("1.0.0")));
    std::fs::write(dir.path().join("broken.json"), "{ \"metadata\": ").unwrap();
    std::fs::write(dir.path().join("manifest.json"), "{}").unwrap();

    let paths = collect_pack_paths(&[dir.path()]).unwrap();
    assert_eq!(paths.len(), 3);

    let config = SchemaConfig::new().unwrap();
    let report = validate_corpus(&paths, &SchemaValidator::new(&config));
    assert_eq!(report.totals.files, 3);
    assert_eq!(report.totals.valid, 2);
    assert_eq!(report.totals.errors, 1);
    assert!(!report.is_valid());

    let broken = report.files.iter().find(|f| f.path.ends_with("broken.json")).unwrap();
    assert!(matches!(broken.result.errors[0], ValidationError::MalformedJson(_)));
}

#[test]
fn test_duplicate_names_fail_the_corpus() {
    let dir = tempfile::tempdir().unwrap();
    write_pack(dir.path(), "one.json", &pack("Same", None));
    write_pack(dir.path(), "two.json", &pack("Same", None));

    let paths = collect_pack_paths(&[dir.path()]).unwrap();
    let config = SchemaConfig::new().unwrap();
    let report = validate_corpus(&paths, &SchemaValidator::new(&config));

    assert_eq!(report.totals.valid, 2);
    assert_eq!(report.duplicates.len(), 1);
    let message = report.duplicates[0].to_string();
    assert!(message.contains("one.json"));
    assert!(message.contains("two.json"));
    assert!(!report.is_valid());
}

#[test]
fn test_collect_rejects_missing_and_empty_inputs() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        collect_pack_paths(&[dir.path()]),
        Err(CorpusError::NoPacksFound)
    ));
    assert!(matches!(
        collect_pack_paths(&[dir.path().join("missing")]),
        Err(CorpusError::NotFound(_))
    ));
}

#[test]
fn test_collect_deduplicates_overlapping_inputs() {
    let dir = tempfile::tempdir().unwrap();
    write_pack(dir.path(), "a.json", &pack("Alpha", None));
    let file = dir.path().join("a.json");
    let paths = collect_pack_paths(&[dir.path().to_path_buf(), file]).unwrap();
    assert_eq!(paths.len(), 1);
}

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

#[test]
fn test_discovery_builds_packs_document() {
    let dir = tempfile::tempdir().unwrap();
    write_pack(dir.path(), "demo/demo.json", &pack("Demo", Some("1.0.0")));
    write_pack(dir.path(), "misc.json", &pack("Misc", None));
    std::fs::write(dir.path().join("bad.json"), "nope").unwrap();

    let document = discover_packs(dir.path(), None).unwrap();
    assert_eq!(document.summary.total_packs, 2);
    assert_eq!(document.summary.packs_with_compatibility, 1);
    assert_eq!(document.summary.packs_without_compatibility, 1);
    assert_eq!(document.summary.skipped_files, 1);

    let demo = document.content_packs.iter().find(|p| p.name == "Demo").unwrap();
    assert_eq!(demo.relative_path, "demo/demo.json");
    assert_eq!(demo.compatibility_conditions.len(), 1);
}

#[test]
fn test_discovery_filter() {
    let dir = tempfile::tempdir().unwrap();
    write_pack(dir.path(), "demo.json", &pack("Demo", None));
    write_pack(dir.path(), "other.json", &pack("Other", None));

    // Every helper pack has category "demo", so only the name tells them apart.
    let document = discover_packs(dir.path(), Some("OTHER")).unwrap();
    assert_eq!(document.content_packs.len(), 1);
    assert_eq!(document.content_packs[0].name, "Other");

    let by_category = discover_packs(dir.path(), Some("dem?")).unwrap();
    assert_eq!(by_category.content_packs.len(), 2);

    let all = discover_packs(dir.path(), Some("*")).unwrap();
    assert_eq!(all.content_packs.len(), 2);
}

#[test]
fn test_packs_document_feeds_matrix_builder() {
    let dir = tempfile::tempdir().unwrap();
    write_pack(dir.path(), "demo.json", &pack("Demo", Some("1.0.0")));
    let out = dir.path().join("out/packs.json");

    let document = discover_packs(dir.path(), None).unwrap();
    write_json(&out, &document).unwrap();
    let reloaded: PacksDocument = read_json(&out).unwrap();
    assert_eq!(reloaded, document);

    let versions = vec!["1.0.0".to_string(), "0.9.0".to_string(), "2.0.0".to_string()];
    let plan = build_matrix(&reloaded.content_packs, &versions, 50);
    assert_eq!(plan.include.len(), 2);
    assert_eq!(plan.skipped.len(), 1);
    assert_eq!(plan.include[0].content_pack, "demo.json");
}

// ---------------------------------------------------------------------------
// Manifest
// ---------------------------------------------------------------------------

#[test]
fn test_manifest_workflow() {
    let dir = tempfile::tempdir().unwrap();
    write_pack(dir.path(), "b.json", &pack("beta", None));
    write_pack(dir.path(), "a.json", &pack("Alpha", None));

    let manifest = Manifest::generate(dir.path()).unwrap();
    assert_eq!(manifest.statistics.total_packs, 2);
    assert_eq!(manifest.content_packs[0].name, "Alpha");
    assert_eq!(manifest.content_packs[0].checksum.len(), 64);
    assert!(manifest.content_packs[0].sections.has_database);

    let path = dir.path().join("manifest.json");
    manifest.save(&path).unwrap();

    // The manifest itself is not indexed on the next run.
    let again = Manifest::generate(dir.path()).unwrap();
    assert_eq!(again.statistics.total_packs, 2);
    assert!(Manifest::load(&path).unwrap().stale_entries(dir.path()).is_empty());
}
