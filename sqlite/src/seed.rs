//! Applying seed statements to a scratch database.
//!
//! [`SeedDatabase`] runs a pack's `database` statements in order inside a
//! single transaction. Each statement gets its own savepoint, so a rejected
//! statement is rolled back alone and the remaining statements still run
//! against the state built so far.
//!
//! # Example
//!
//! ```
//! use contentpack_sqlite::SeedDatabase;
//!
//! let mut db = SeedDatabase::in_memory().unwrap();
//! let report = db
//!     .apply(&[
//!         "CREATE TABLE notes (id INTEGER PRIMARY KEY, body TEXT);".to_string(),
//!         "INSERT INTO notes (body) VALUES ('hello');".to_string(),
//!     ])
//!     .unwrap();
//!
//! assert!(report.is_success());
//! assert_eq!(report.tables, ["notes"]);
//! assert_eq!(db.row_count("notes").unwrap(), 1);
//! ```

use std::path::Path;

use contentpack_core::SQL_KEYWORDS;
use rusqlite::Connection;
use serde::Serialize;

use crate::error::{Result, SeedError};

/// What happened to one statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatementStatus {
    Applied,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatementOutcome {
    /// Zero-based position in the `database` array.
    pub index: usize,
    pub status: StatementStatus,
    /// Rows changed by the last statement in the batch.
    pub rows_changed: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Set when the statement does not start with a recognized keyword.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Outcome of applying a list of statements.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub outcomes: Vec<StatementOutcome>,
    pub applied: usize,
    pub failed: usize,
    /// User tables present after seeding, sorted by name.
    pub tables: Vec<String>,
}

impl SeedReport {
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &StatementOutcome> {
        self.outcomes
            .iter()
            .filter(|o| o.status == StatementStatus::Failed)
    }

    /// One-line description of the first failure, e.g.
    /// `statement 2: no such table: t`.
    pub fn first_failure(&self) -> Option<String> {
        self.failures().next().map(|o| {
            format!(
                "statement {}: {}",
                o.index + 1,
                o.error.as_deref().unwrap_or("failed")
            )
        })
    }
}

/// A scratch SQLite database that seed statements are applied to.
pub struct SeedDatabase {
    conn: Connection,
}

impl SeedDatabase {
    /// Wraps an existing connection, enabling foreign key enforcement.
    pub fn new(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self { conn })
    }

    pub fn in_memory() -> Result<Self> {
        Self::new(Connection::open_in_memory()?)
    }

    /// Opens (or creates) a database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::new(Connection::open(path)?)
    }

    /// Applies `statements` in order and commits whatever succeeded.
    ///
    /// Blank statements are recorded as failures without reaching SQLite.
    ///
    /// # Errors
    ///
    /// Returns [`SeedError::DatabaseError`] only if the transaction or a
    /// savepoint cannot be managed.
    pub fn apply(&mut self, statements: &[String]) -> Result<SeedReport> {
        let mut report = SeedReport::default();
        let mut tx = self.conn.transaction()?;

        for (index, statement) in statements.iter().enumerate() {
            let warning = (!starts_with_keyword(statement))
                .then(|| "statement does not start with a recognized SQL keyword".to_string());

            if statement.trim().is_empty() {
                report.failed += 1;
                report.outcomes.push(StatementOutcome {
                    index,
                    status: StatementStatus::Failed,
                    rows_changed: 0,
                    error: Some("empty statement".to_string()),
                    warning: None,
                });
                continue;
            }

            let savepoint = tx.savepoint()?;
            match savepoint.execute_batch(statement) {
                Ok(()) => {
                    let rows_changed = savepoint.changes();
                    savepoint.commit()?;
                    report.applied += 1;
                    report.outcomes.push(StatementOutcome {
                        index,
                        status: StatementStatus::Applied,
                        rows_changed,
                        error: None,
                        warning,
                    });
                }
                Err(err) => {
                    // Dropping the savepoint rolls this statement back.
                    drop(savepoint);
                    tracing::debug!(index, error = %err, "seed statement rejected");
                    report.failed += 1;
                    report.outcomes.push(StatementOutcome {
                        index,
                        status: StatementStatus::Failed,
                        rows_changed: 0,
                        error: Some(err.to_string()),
                        warning,
                    });
                }
            }
        }

        tx.commit()?;
        report.tables = self.table_names()?;

        tracing::debug!(
            applied = report.applied,
            failed = report.failed,
            tables = report.tables.len(),
            "applied seed statements"
        );
        Ok(report)
    }

    /// User table names, sorted.
    pub fn table_names(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(names)
    }

    /// Counts rows in `table`.
    ///
    /// # Errors
    ///
    /// Returns [`SeedError::InvalidTable`] if the name holds anything other
    /// than alphanumerics and underscores.
    pub fn row_count(&self, table: &str) -> Result<usize> {
        if table.is_empty() || !table.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return Err(SeedError::InvalidTable(table.to_string()));
        }
        let count: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM \"{table}\""), [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    pub fn into_connection(self) -> Connection {
        self.conn
    }
}

/// Applies `statements` to a fresh in-memory database.
pub fn apply_statements(statements: &[String]) -> Result<SeedReport> {
    SeedDatabase::in_memory()?.apply(statements)
}

fn starts_with_keyword(statement: &str) -> bool {
    let first = statement
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_ascii_uppercase();
    SQL_KEYWORDS.iter().any(|k| *k == first)
}
