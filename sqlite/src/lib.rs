//! SQLite seeding for content packs.
//!
//! A pack's `database` section is a list of SQL statements the host runs
//! against its own database when the pack is loaded. This crate replays
//! them against a scratch database and reports, per statement, whether
//! SQLite accepted it.
//!
//! # Quick start
//!
//! ```
//! use contentpack_sqlite::apply_statements;
//!
//! let report = apply_statements(&[
//!     "CREATE TABLE t (id INTEGER PRIMARY KEY);".to_string(),
//!     "INSERT INTO nowhere VALUES (1);".to_string(),
//! ])
//! .unwrap();
//!
//! assert_eq!(report.applied, 1);
//! assert_eq!(report.failed, 1);
//! ```

mod error;
mod seed;

pub use error::{Result, SeedError};
pub use seed::{SeedDatabase, SeedReport, StatementOutcome, StatementStatus, apply_statements};
