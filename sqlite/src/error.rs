//! Error types for seeding operations.
//!
//! A statement that SQLite rejects is not an error here; it is recorded as a
//! failed [`StatementOutcome`](crate::StatementOutcome). These variants cover
//! failures of the scratch database itself.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SeedError {
    /// Opening the database or managing the transaction failed.
    #[error("database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    /// A table name that cannot be quoted safely.
    #[error("invalid table name '{0}'")]
    InvalidTable(String),
}

/// Convenience alias for results with [`SeedError`].
pub type Result<T> = std::result::Result<T, SeedError>;
