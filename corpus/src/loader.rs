//! Collecting, validating, and discovering content pack files.
//!
//! Batch operations here are continue-on-error: a file that cannot be read
//! or parsed is recorded against that file and the rest of the corpus is
//! still processed.

use std::collections::BTreeSet;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use contentpack_core::{
    CompatibilityCondition, NamedResult, PackEntry, SchemaValidator, ValidationError,
    ValidationResult, check_duplicate_names,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use walkdir::WalkDir;

use crate::error::{CorpusError, Result};

/// Index file written next to the packs; never treated as a pack.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Expands files and directories into a sorted, deduplicated list of pack
/// files.
///
/// Directories are searched recursively for `*.json`, skipping
/// [`MANIFEST_FILE`]. Files named explicitly are taken as given.
///
/// # Errors
///
/// Returns [`CorpusError::NotFound`] for an input that does not exist and
/// [`CorpusError::NoPacksFound`] if nothing was collected.
pub fn collect_pack_paths<P: AsRef<Path>>(inputs: &[P]) -> Result<Vec<PathBuf>> {
    let mut paths = BTreeSet::new();

    for input in inputs {
        let input = input.as_ref();
        if input.is_file() {
            paths.insert(input.to_path_buf());
        } else if input.is_dir() {
            paths.extend(walk_pack_files(input)?);
        } else {
            return Err(CorpusError::NotFound(input.to_path_buf()));
        }
    }

    if paths.is_empty() {
        return Err(CorpusError::NoPacksFound);
    }

    Ok(paths.into_iter().collect())
}

fn walk_pack_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type().is_file() && is_pack_file(path) {
            files.push(path.to_path_buf());
        }
    }
    Ok(files)
}

fn is_pack_file(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("json")
        && path.file_name().and_then(|n| n.to_str()) != Some(MANIFEST_FILE)
}

/// Reads and parses a JSON document.
///
/// # Errors
///
/// Returns [`CorpusError::IoError`] or [`CorpusError::JsonError`].
pub fn load_document(path: impl AsRef<Path>) -> Result<Value> {
    let file = std::fs::File::open(path)?;
    let reader = BufReader::new(file);
    Ok(serde_json::from_reader(reader)?)
}

/// Validation outcome for one file.
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub path: PathBuf,
    /// `metadata.name`, when present.
    pub name: Option<String>,
    #[serde(flatten)]
    pub result: ValidationResult,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CorpusTotals {
    pub files: usize,
    pub valid: usize,
    /// Per-file errors plus duplicate-name errors.
    pub errors: usize,
    pub warnings: usize,
}

/// Outcome of validating a set of files together.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CorpusReport {
    pub files: Vec<FileReport>,
    #[serde(serialize_with = "display_list")]
    pub duplicates: Vec<ValidationError>,
    pub totals: CorpusTotals,
}

impl CorpusReport {
    /// `true` when every file is valid and no names collide.
    pub fn is_valid(&self) -> bool {
        self.totals.errors == 0 && self.totals.valid == self.totals.files
    }
}

fn display_list<S: serde::Serializer>(
    items: &[ValidationError],
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_seq(items.iter().map(ToString::to_string))
}

/// Validates one file, recording read and parse failures as errors.
pub fn validate_file(path: &Path, validator: &SchemaValidator<'_>) -> FileReport {
    let (result, name) = match std::fs::read_to_string(path) {
        Ok(text) => match serde_json::from_str::<Value>(&text) {
            Ok(document) => {
                let name = document
                    .pointer("/metadata/name")
                    .and_then(Value::as_str)
                    .map(String::from);
                (validator.validate(&document), name)
            }
            Err(err) => (ValidationResult::malformed(err.to_string()), None),
        },
        Err(err) => (ValidationResult::unreadable(err.to_string()), None),
    };

    tracing::debug!(
        path = %path.display(),
        valid = result.is_valid,
        errors = result.errors.len(),
        warnings = result.warnings.len(),
        "validated content pack"
    );

    FileReport {
        path: path.to_path_buf(),
        name,
        result,
    }
}

/// Validates every file, then checks names across the valid ones.
pub fn validate_corpus(paths: &[PathBuf], validator: &SchemaValidator<'_>) -> CorpusReport {
    let files: Vec<FileReport> = paths.iter().map(|p| validate_file(p, validator)).collect();

    let display_paths: Vec<String> = files.iter().map(|f| f.path.display().to_string()).collect();
    let entries: Vec<NamedResult<'_>> = files
        .iter()
        .zip(&display_paths)
        .map(|(file, path)| NamedResult {
            path,
            result: &file.result,
            name: file.name.as_deref(),
        })
        .collect();
    let duplicates = check_duplicate_names(&entries);

    let totals = CorpusTotals {
        files: files.len(),
        valid: files.iter().filter(|f| f.result.is_valid).count(),
        errors: files.iter().map(|f| f.result.errors.len()).sum::<usize>() + duplicates.len(),
        warnings: files.iter().map(|f| f.result.warnings.len()).sum(),
    };

    tracing::info!(
        files = totals.files,
        valid = totals.valid,
        errors = totals.errors,
        warnings = totals.warnings,
        "corpus validation finished"
    );

    CorpusReport {
        files,
        duplicates,
        totals,
    }
}

/// Case-insensitive wildcard filter over pack fields.
///
/// Patterns containing `*`, `?` or `[` are shell-style wildcards matched
/// against the whole field; any other pattern matches as a substring. The
/// file name, relative path, name, category and tags are all tried.
#[derive(Debug, Clone)]
pub struct PackFilter {
    pattern: glob::Pattern,
}

impl PackFilter {
    /// # Errors
    ///
    /// Returns [`CorpusError::InvalidFilter`] for a malformed wildcard.
    pub fn new(raw: &str) -> Result<Self> {
        let lowered = raw.to_lowercase();
        let source = if lowered.contains(['*', '?', '[']) {
            lowered
        } else {
            format!("*{}*", glob::Pattern::escape(&lowered))
        };
        let pattern = glob::Pattern::new(&source).map_err(|e| CorpusError::InvalidFilter {
            pattern: raw.to_string(),
            message: e.to_string(),
        })?;
        Ok(Self { pattern })
    }

    pub fn matches<'a>(&self, fields: impl IntoIterator<Item = &'a str>) -> bool {
        fields
            .into_iter()
            .any(|field| self.pattern.matches(&field.to_lowercase()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoverySummary {
    pub total_packs: usize,
    pub packs_with_compatibility: usize,
    pub packs_without_compatibility: usize,
    pub categories: Vec<String>,
    /// Files that could not be read or parsed.
    pub skipped_files: usize,
}

/// The packs document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacksDocument {
    pub content_packs: Vec<PackEntry>,
    #[serde(default)]
    pub summary: DiscoverySummary,
}

/// Builds the packs document for every pack file under `root`.
///
/// Files that do not parse, or whose conditions are malformed, are skipped
/// with a warning and counted in [`DiscoverySummary::skipped_files`].
///
/// # Errors
///
/// Returns [`CorpusError::NotFound`] if `root` is not a directory, or
/// [`CorpusError::InvalidFilter`] for a bad filter.
pub fn discover_packs(root: &Path, filter: Option<&str>) -> Result<PacksDocument> {
    if !root.is_dir() {
        return Err(CorpusError::NotFound(root.to_path_buf()));
    }
    let filter = filter
        .filter(|f| !f.is_empty() && *f != "*")
        .map(PackFilter::new)
        .transpose()?;

    let mut document = PacksDocument::default();
    let mut categories = BTreeSet::new();

    for path in walk_pack_files(root)? {
        let entry = match describe_pack(root, &path) {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "skipping unreadable pack");
                document.summary.skipped_files += 1;
                continue;
            }
        };

        if let Some(filter) = &filter {
            if !filter.matches(entry.fields()) {
                continue;
            }
        }

        if entry.pack.compatibility_conditions.is_empty() {
            tracing::warn!(pack = %entry.pack.name, "pack declares no compatibility conditions");
            document.summary.packs_without_compatibility += 1;
        } else {
            document.summary.packs_with_compatibility += 1;
        }
        categories.insert(
            entry
                .pack
                .category
                .clone()
                .unwrap_or_else(|| "uncategorized".to_string()),
        );
        document.content_packs.push(entry.pack);
    }

    document.summary.total_packs = document.content_packs.len();
    document.summary.categories = categories.into_iter().collect();
    tracing::info!(packs = document.summary.total_packs, "discovered content packs");
    Ok(document)
}

struct Described {
    file_name: String,
    tags: Vec<String>,
    pack: PackEntry,
}

impl Described {
    fn fields(&self) -> impl Iterator<Item = &str> {
        [
            Some(self.file_name.as_str()),
            Some(self.pack.relative_path.as_str()),
            Some(self.pack.name.as_str()),
            self.pack.category.as_deref(),
        ]
        .into_iter()
        .flatten()
        .chain(self.tags.iter().map(String::as_str))
    }
}

fn describe_pack(root: &Path, path: &Path) -> Result<Described> {
    let document = load_document(path)?;
    let metadata = document.get("metadata");
    let text = |key: &str| {
        metadata
            .and_then(|m| m.get(key))
            .and_then(Value::as_str)
            .map(String::from)
    };

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string();
    let conditions: Vec<CompatibilityCondition> = match metadata.and_then(|m| m.get("compatibility_conditions")) {
        Some(raw) => serde_json::from_value(raw.clone()).map_err(|e| CorpusError::InvalidDocument {
            path: path.to_path_buf(),
            message: format!("compatibility_conditions: {e}"),
        })?,
        None => Vec::new(),
    };
    let tags = metadata
        .and_then(|m| m.get("tags"))
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).map(String::from).collect())
        .unwrap_or_default();

    Ok(Described {
        file_name: path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string(),
        tags,
        pack: PackEntry {
            name: text("name").unwrap_or(stem),
            relative_path: relative_path(root, path),
            category: text("category"),
            compatibility_conditions: conditions,
        },
    })
}

/// `path` relative to `root` with `/` separators.
pub fn relative_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
