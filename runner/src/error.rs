use thiserror::Error;

/// Errors that prevent a run from starting.
///
/// Failures of individual jobs never surface here; they become `error`
/// sub-test records in that job's result.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("failed to build worker pool: {0}")]
    PoolBuild(#[from] rayon::ThreadPoolBuildError),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    Corpus(#[from] contentpack_corpus::CorpusError),

    /// The command executor was configured without a program to run.
    #[error("invalid test command: {0}")]
    InvalidCommand(String),

    #[error("invalid schema pattern: {0}")]
    Schema(#[from] regex::Error),
}

pub type Result<T> = std::result::Result<T, RunnerError>;
