//! Run configuration for compatibility test runs.
//!
//! Every section and field has a default, so a partial file (or no file)
//! is enough.
//!
//! # Example YAML
//!
//! ```yaml
//! version: "1.0"
//! matrix:
//!   max_jobs: 50
//! execution:
//!   workers: 4
//!   timeout_secs: 60
//!   executor: command
//!   command: ["./run-pack-test", "{pack}", "{version}", "{output}"]
//! versions:
//!   limit: 5
//!   include_prereleases: false
//! ```

use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::time::Duration;

use contentpack_core::{DEFAULT_MAX_JOBS, DEFAULT_VERSION_LIMIT};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Job budget settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatrixConfig {
    pub max_jobs: usize,
}

impl Default for MatrixConfig {
    fn default() -> Self {
        Self {
            max_jobs: DEFAULT_MAX_JOBS,
        }
    }
}

/// Which executor runs each job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutorKind {
    /// In-process checks.
    #[default]
    Builtin,
    /// An external command per job.
    Command,
}

/// Worker pool settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Number of concurrent jobs.
    pub workers: usize,
    /// Per-job time limit in seconds.
    pub timeout_secs: u64,
    pub executor: ExecutorKind,
    /// Argv template for [`ExecutorKind::Command`], with `{pack}`,
    /// `{version}` and `{output}` placeholders.
    pub command: Vec<String>,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            timeout_secs: 60,
            executor: ExecutorKind::default(),
            command: Vec::new(),
        }
    }
}

impl ExecutionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Release selection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VersionsConfig {
    pub limit: usize,
    pub include_prereleases: bool,
}

impl Default for VersionsConfig {
    fn default() -> Self {
        Self {
            limit: DEFAULT_VERSION_LIMIT,
            include_prereleases: false,
        }
    }
}

/// Top-level run configuration.
///
/// # Examples
///
/// ```
/// use contentpack_corpus::{ExecutorKind, RunConfig};
///
/// let config: RunConfig = serde_yaml::from_str("execution: { workers: 2 }").unwrap();
/// assert_eq!(config.execution.workers, 2);
/// assert_eq!(config.execution.timeout_secs, 60);
/// assert_eq!(config.execution.executor, ExecutorKind::Builtin);
/// assert_eq!(config.matrix.max_jobs, 50);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Configuration format version (e.g., `"1.0"`).
    pub version: String,
    pub matrix: MatrixConfig,
    pub execution: ExecutionConfig,
    pub versions: VersionsConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            matrix: MatrixConfig::default(),
            execution: ExecutionConfig::default(),
            versions: VersionsConfig::default(),
        }
    }
}

impl RunConfig {
    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](crate::CorpusError::IoError) if the file cannot
    /// be read, or [`YamlError`](crate::CorpusError::YamlError) if parsing
    /// fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let config = serde_yaml::from_reader(reader)?;
        Ok(config)
    }

    /// Loads `path` if given, otherwise returns the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Saves the configuration as YAML.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](crate::CorpusError::IoError) if the file cannot
    /// be written, or [`YamlError`](crate::CorpusError::YamlError) if
    /// serialization fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_yaml::to_writer(writer, self)?;
        Ok(())
    }
}
