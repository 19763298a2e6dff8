//! File and document bookkeeping for content pack corpora.
//!
//! This crate sits between the pure [`contentpack_core`] logic and the
//! filesystem:
//!
//! - [`collect_pack_paths`] and [`validate_corpus`] validate a set of pack
//!   files together, continuing past broken files.
//! - [`discover_packs`] builds the packs document consumed by the matrix
//!   builder.
//! - [`ResultDocument`], [`load_results`] and [`MatrixReport`] carry job
//!   results to the aggregator and out again.
//! - [`RunConfig`] is the YAML run configuration.
//! - [`Manifest`] indexes a pack directory with per-file checksums.
//!
//! # Quick start
//!
//! ```no_run
//! use contentpack_core::{SchemaConfig, SchemaValidator};
//! use contentpack_corpus::{collect_pack_paths, discover_packs, validate_corpus};
//! use std::path::Path;
//!
//! let config = SchemaConfig::new().unwrap();
//! let validator = SchemaValidator::new(&config);
//!
//! let paths = collect_pack_paths(&["content-packs"]).unwrap();
//! let report = validate_corpus(&paths, &validator);
//! println!("{}/{} valid", report.totals.valid, report.totals.files);
//!
//! let packs = discover_packs(Path::new("content-packs"), Some("demo")).unwrap();
//! println!("{} packs match", packs.content_packs.len());
//! ```

mod config;
mod documents;
mod error;
mod loader;
mod manifest;

pub use config::{ExecutionConfig, ExecutorKind, MatrixConfig, RunConfig, VersionsConfig};
pub use documents::{
    MatrixReport, ResultDocument, ResultPackInfo, ResultSet, ResultSummary, load_results,
    read_json, write_json,
};
pub use error::{CorpusError, Result};
pub use loader::{
    CorpusReport, CorpusTotals, DiscoverySummary, FileReport, MANIFEST_FILE, PackFilter,
    PacksDocument, collect_pack_paths, discover_packs, load_document, relative_path,
    validate_corpus, validate_file,
};
pub use manifest::{MANIFEST_VERSION, Manifest, ManifestEntry, ManifestStatistics, PackSections};
