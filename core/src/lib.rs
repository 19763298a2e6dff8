//! Content pack model, validation, and compatibility planning.
//!
//! This crate holds the pure, synchronous parts of content pack
//! compatibility testing:
//!
//! - [`SemanticVersion`]: `MAJOR.MINOR.PATCH` parsing and total ordering.
//! - [`ContentPack`]: typed view of a pack document, with
//!   [`CompatibilityCondition`]s declared in its metadata.
//! - [`SchemaValidator`]: structural validation of raw pack documents
//!   against an immutable [`SchemaConfig`], plus the corpus-wide
//!   [`check_duplicate_names`].
//! - [`CompatibilityRequirement`]: the intersection of a pack's conditions,
//!   evaluated against candidate versions ([`is_compatible`]).
//! - [`build_matrix`]: pack × version job planning under a job budget.
//! - [`ResultAggregator`]: folds job results into a
//!   [`CompatibilityMatrix`].
//! - [`select_versions`]: picks the releases worth testing.
//! - [`suggest_conditions`] and [`attempt_fixes`]: condition suggestions
//!   and metadata repairs for raw pack documents.
//!
//! Nothing here performs I/O; loading files and running jobs live in the
//! corpus and runner crates.
//!
//! # Example
//!
//! ```
//! use contentpack_core::*;
//!
//! let packs = vec![PackEntry::new(
//!     "Demo",
//!     "demo.json",
//!     vec![CompatibilityCondition::version_range(Some("1.0.0"), None, "core")],
//! )];
//! let versions = vec!["0.9.0".to_string(), "1.0.0".to_string()];
//!
//! let plan = build_matrix(&packs, &versions, DEFAULT_MAX_JOBS);
//! assert_eq!(plan.include.len(), 1);
//!
//! let mut aggregator = ResultAggregator::with_universe(["Demo"], versions.iter().cloned());
//! aggregator
//!     .ingest(TestResult::new("Demo", "1.0.0", vec![SubTestRecord::passed("load", 0.2)]))
//!     .unwrap();
//! let matrix = aggregator.finalize();
//! assert_eq!(matrix.status("Demo", "0.9.0"), Some(CellStatus::NotTested));
//! assert!(!matrix.has_failures());
//! ```

mod aggregate;
mod compat;
mod matrix;
mod select;
mod suggest;
mod types;
mod validate;
mod version;

pub use aggregate::{
    AggregateError, CellStatus, CompatibilityMatrix, MatrixTotals, MissingResult,
    ResultAggregator, StatusCounts, SubTestRecord, TestResult, TestStatus, compare_version_tags,
};
pub use compat::{Compatibility, CompatibilityRequirement, VersionRange, is_compatible};
pub use matrix::{
    DEFAULT_MAX_JOBS, ExpectedResult, MatrixPlan, MatrixSummary, PackEntry, SkippedCombination,
    TestJob, build_matrix, is_safe_job_name, job_priority, normalize_pack_name, normalize_version,
};
pub use select::{
    DEFAULT_VERSION_LIMIT, Release, SelectionCriteria, SkippedRelease, VersionSelection,
    select_versions,
};
pub use suggest::{
    DEFAULT_PACK_VERSION, Suggestion, UNTITLED_PACK_NAME, apply_conditions, attempt_fixes,
    suggest_conditions,
};
pub use types::*;
pub use validate::{
    KNOWN_STATE_MODULES, NamedResult, REQUIRED_METADATA_FIELDS, REQUIRED_PROMPT_FIELDS,
    SQL_KEYWORDS, SchemaConfig, SchemaValidator, ValidationError, ValidationResult,
    ValidationSummary, ValidationWarning, check_duplicate_names, json_type_name,
};
pub use version::{SemanticVersion, VersionError};
