//! Execution of content pack compatibility jobs.
//!
//! Feed the jobs of a [`MatrixPlan`](contentpack_core::MatrixPlan) to
//! [`run_jobs`] together with a [`JobExecutor`]. Each job's result is
//! returned in job order and, when an output directory is configured,
//! written as `<output_dir>/<job_name>.json` for the `report` step.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use contentpack_core::build_matrix;
//! use contentpack_corpus::discover_packs;
//! use contentpack_runner::{BuiltinExecutor, PoolConfig, run_jobs};
//! use std::path::Path;
//!
//! let root = Path::new("content-packs");
//! let packs = discover_packs(root, None).unwrap();
//! let plan = build_matrix(&packs.content_packs, &["1.0.0".to_string()], 50);
//!
//! let executor = Arc::new(BuiltinExecutor::new(root).unwrap());
//! let config = PoolConfig {
//!     workers: 4,
//!     timeout: Duration::from_secs(60),
//!     output_dir: Some("test-results".into()),
//! };
//! let report = run_jobs(&plan.include, executor, &config).unwrap();
//! println!("{} passed, {} failed", report.counts.passed, report.counts.failed);
//! ```

mod error;
mod executor;
mod pool;

pub use error::{Result, RunnerError};
pub use executor::{BuiltinExecutor, CommandExecutor, EXECUTION_TEST, JobExecutor, build_executor};
pub use pool::{JobOutcome, PoolConfig, RunReport, WATCHDOG_GRACE, default_parallel_jobs, run_jobs};
