//! Error types for corpus operations.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while reading or writing corpus files.
#[derive(Debug, Error)]
pub enum CorpusError {
    /// File I/O failure.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON parsing or serialization failure.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// YAML parsing or serialization failure.
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// Directory traversal failure.
    #[error("walk error: {0}")]
    WalkError(#[from] walkdir::Error),

    /// An input path does not exist.
    #[error("path not found: {}", .0.display())]
    NotFound(PathBuf),

    /// No pack files were found under the given inputs.
    #[error("no content pack files found")]
    NoPacksFound,

    /// A discovery filter is not a valid wildcard pattern.
    #[error("invalid filter pattern {pattern:?}: {message}")]
    InvalidFilter { pattern: String, message: String },

    /// A document is well-formed JSON but not the expected shape.
    #[error("invalid document {}: {message}", path.display())]
    InvalidDocument { path: PathBuf, message: String },
}

/// Convenience alias for results with [`CorpusError`].
pub type Result<T> = std::result::Result<T, CorpusError>;
