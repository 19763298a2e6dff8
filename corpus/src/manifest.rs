//! Manifest generation for a directory of content packs.
//!
//! The manifest is an index consumed by the host application to list the
//! available packs. Each entry carries a SHA-256 checksum of the pack file
//! so consumers can detect a pack that changed since the manifest was
//! written.

use std::collections::BTreeSet;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::loader::{collect_pack_paths, load_document, relative_path};

/// Manifest format version.
pub const MANIFEST_VERSION: &str = "1.0.0";

/// Which optional sections a pack carries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackSections {
    pub has_database: bool,
    pub has_prompts: bool,
    pub has_state: bool,
    pub database_statements: usize,
    pub prompt_count: usize,
    pub state_modules: Vec<String>,
}

/// One indexed pack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub filename: String,
    pub relative_path: String,
    pub file_size_bytes: u64,
    /// Hex SHA-256 of the file contents.
    pub checksum: String,
    pub name: String,
    pub summary: String,
    pub detailed_description: String,
    pub version: String,
    pub author_name: String,
    pub author_email: String,
    pub date_exported: String,
    pub tags: Vec<String>,
    pub category: String,
    pub sections: PackSections,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestStatistics {
    pub total_packs: usize,
    pub categories: Vec<String>,
    pub authors: Vec<String>,
    pub total_size_bytes: u64,
    pub packs_with_database: usize,
    pub packs_with_prompts: usize,
    pub packs_with_state: usize,
}

/// The index document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub manifest_version: String,
    /// RFC 3339 UTC timestamp.
    pub generated_at: String,
    pub statistics: ManifestStatistics,
    pub content_packs: Vec<ManifestEntry>,
}

impl Manifest {
    /// Scans `root` and indexes every pack file that parses.
    ///
    /// Files that cannot be read or parsed are left out with a warning.
    /// Entries are sorted by lower-cased name.
    ///
    /// # Errors
    ///
    /// Returns an error if `root` does not exist or holds no pack files.
    pub fn generate(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let mut content_packs = Vec::new();

        for path in collect_pack_paths(&[root])? {
            match Self::describe(root, &path) {
                Ok(entry) => content_packs.push(entry),
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "leaving pack out of manifest");
                }
            }
        }

        content_packs.sort_by_key(|entry| entry.name.to_lowercase());

        let categories: BTreeSet<String> = content_packs.iter().map(|p| p.category.clone()).collect();
        let authors: BTreeSet<String> = content_packs
            .iter()
            .filter(|p| !p.author_name.is_empty())
            .map(|p| p.author_name.clone())
            .collect();

        let statistics = ManifestStatistics {
            total_packs: content_packs.len(),
            categories: categories.into_iter().collect(),
            authors: authors.into_iter().collect(),
            total_size_bytes: content_packs.iter().map(|p| p.file_size_bytes).sum(),
            packs_with_database: content_packs.iter().filter(|p| p.sections.has_database).count(),
            packs_with_prompts: content_packs.iter().filter(|p| p.sections.has_prompts).count(),
            packs_with_state: content_packs.iter().filter(|p| p.sections.has_state).count(),
        };

        tracing::info!(packs = statistics.total_packs, "generated manifest");

        Ok(Self {
            manifest_version: MANIFEST_VERSION.to_string(),
            generated_at: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            statistics,
            content_packs,
        })
    }

    fn describe(root: &Path, path: &Path) -> Result<ManifestEntry> {
        let document = load_document(path)?;
        let metadata = document.get("metadata");
        let text = |key: &str| {
            metadata
                .and_then(|m| m.get(key))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        let database = document.get("database").and_then(Value::as_array);
        let prompts = document.get("prompts");
        let prompt_count = match prompts {
            Some(Value::Array(items)) => items.len(),
            Some(Value::Object(items)) => items.len(),
            _ => 0,
        };
        let state = document.get("state").and_then(Value::as_object);

        let sections = PackSections {
            has_database: database.is_some_and(|d| !d.is_empty()),
            has_prompts: prompt_count > 0,
            has_state: state.is_some_and(|s| !s.is_empty()),
            database_statements: database.map_or(0, Vec::len),
            prompt_count,
            state_modules: state.map(|s| s.keys().cloned().collect()).unwrap_or_default(),
        };

        let tags = metadata
            .and_then(|m| m.get("tags"))
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).map(String::from).collect())
            .unwrap_or_default();
        let category = metadata
            .and_then(|m| m.get("category"))
            .and_then(Value::as_str)
            .unwrap_or("uncategorized")
            .to_string();

        Ok(ManifestEntry {
            filename: path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string(),
            relative_path: relative_path(root, path),
            file_size_bytes: std::fs::metadata(path)?.len(),
            checksum: Self::calculate_checksum(path)?,
            name: text("name"),
            summary: text("summary"),
            detailed_description: text("detailed_description"),
            version: text("version"),
            author_name: text("author_name"),
            author_email: text("author_email"),
            date_exported: text("date_exported"),
            tags,
            category,
            sections,
        })
    }

    /// Loads a manifest from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](crate::CorpusError::IoError) if the file cannot
    /// be read, or [`JsonError`](crate::CorpusError::JsonError) if the
    /// content is not valid manifest JSON.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let manifest = serde_json::from_reader(reader)?;
        Ok(manifest)
    }

    /// Saves the manifest as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](crate::CorpusError::IoError) if the file cannot
    /// be written, or [`JsonError`](crate::CorpusError::JsonError) if
    /// serialization fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Computes the SHA-256 hex digest of a file.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](crate::CorpusError::IoError) if the file cannot
    /// be read.
    pub fn calculate_checksum(path: impl AsRef<Path>) -> Result<String> {
        let bytes = std::fs::read(path)?;
        let hash = Sha256::digest(&bytes);
        Ok(format!("{:x}", hash))
    }

    /// Relative paths of entries whose file is missing or whose checksum no
    /// longer matches.
    pub fn stale_entries(&self, root: impl AsRef<Path>) -> Vec<String> {
        let root = root.as_ref();
        self.content_packs
            .iter()
            .filter(|entry| {
                Self::calculate_checksum(root.join(&entry.relative_path))
                    .map_or(true, |sum| sum != entry.checksum)
            })
            .map(|entry| entry.relative_path.clone())
            .collect()
    }
}
