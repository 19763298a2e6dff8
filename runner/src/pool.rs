//! Bounded parallel execution of test jobs.
//!
//! Jobs run on a `rayon` pool of `workers` threads. Each job's executor
//! call runs on its own watchdog thread and reports back over a channel,
//! so a job that panics or never returns produces an `error` result
//! instead of taking the pool down with it.
//!
//! An executor thread abandoned after a timeout keeps its worker slot until
//! it exits, so at most `workers` executors ever run at once.

use std::path::PathBuf;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use contentpack_core::{StatusCounts, SubTestRecord, TestJob, TestResult, is_safe_job_name};
use contentpack_corpus::{ResultDocument, write_json};
use rayon::prelude::*;

use crate::error::Result;
use crate::executor::{EXECUTION_TEST, JobExecutor};

/// Extra time the watchdog allows beyond the job timeout, so an executor
/// that enforces the timeout itself gets to report first.
pub const WATCHDOG_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Concurrent jobs. Zero picks [`default_parallel_jobs`].
    pub workers: usize,
    pub timeout: Duration,
    /// Where `<job_name>.json` result documents go. `None` skips writing.
    pub output_dir: Option<PathBuf>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            timeout: Duration::from_secs(60),
            output_dir: None,
        }
    }
}

/// One finished job.
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub job_name: String,
    pub result: TestResult,
    /// Wall-clock seconds, including executor start-up.
    pub elapsed: f64,
    /// Where the result document was written.
    pub output: Option<PathBuf>,
    /// Set when writing the result document failed.
    pub write_error: Option<String>,
}

/// Every job's outcome, in job order.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub outcomes: Vec<JobOutcome>,
    /// Roll-up over job statuses.
    pub counts: StatusCounts,
}

impl RunReport {
    pub fn results(&self) -> impl Iterator<Item = &TestResult> {
        self.outcomes.iter().map(|o| &o.result)
    }

    pub fn into_results(self) -> Vec<TestResult> {
        self.outcomes.into_iter().map(|o| o.result).collect()
    }
}

/// Runs every job and collects results in job order.
///
/// # Errors
///
/// Returns an error only if the pool cannot be built or the output
/// directory cannot be created.
pub fn run_jobs(
    jobs: &[TestJob],
    executor: Arc<dyn JobExecutor>,
    config: &PoolConfig,
) -> Result<RunReport> {
    if let Some(dir) = &config.output_dir {
        std::fs::create_dir_all(dir)?;
    }

    let workers = if config.workers == 0 {
        default_parallel_jobs(jobs.len())
    } else {
        config.workers
    };
    let pool = rayon::ThreadPoolBuilder::new().num_threads(workers).build()?;
    let slots = Slots::new(workers);

    tracing::info!(jobs = jobs.len(), workers, timeout_secs = config.timeout.as_secs(), "running test jobs");

    let outcomes: Vec<JobOutcome> = pool.install(|| {
        jobs.par_iter()
            .map(|job| run_one(job, &executor, &slots, config))
            .collect()
    });

    let mut counts = StatusCounts::default();
    for outcome in &outcomes {
        counts.record(outcome.result.status());
    }
    tracing::info!(
        passed = counts.passed,
        failed = counts.failed,
        errors = counts.errors,
        "test jobs finished"
    );

    Ok(RunReport { outcomes, counts })
}

fn run_one(
    job: &TestJob,
    executor: &Arc<dyn JobExecutor>,
    slots: &Arc<Slots>,
    config: &PoolConfig,
) -> JobOutcome {
    let started = Instant::now();
    let tests = supervise(job, executor, slots, config.timeout);
    let elapsed = started.elapsed().as_secs_f64();
    let result = TestResult::new(&job.content_pack_display_name, &job.version, tests);

    tracing::debug!(job = %job.job_name, status = %result.status(), elapsed, "job finished");

    let mut outcome = JobOutcome {
        job_name: job.job_name.clone(),
        result,
        elapsed,
        output: None,
        write_error: None,
    };

    if let Some(dir) = &config.output_dir {
        if !is_safe_job_name(&job.job_name) {
            tracing::warn!(job = %job.job_name, "job name is not a plain file name, result not written");
            outcome.write_error = Some(format!("unsafe job name '{}'", job.job_name));
            return outcome;
        }
        let path = dir.join(format!("{}.json", job.job_name));
        let document = ResultDocument::from_result(&outcome.result, Some(job));
        match write_json(&path, &document) {
            Ok(()) => outcome.output = Some(path),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "failed to write result document");
                outcome.write_error = Some(err.to_string());
            }
        }
    }

    outcome
}

/// Runs the executor on a watchdog thread holding one worker slot.
fn supervise(
    job: &TestJob,
    executor: &Arc<dyn JobExecutor>,
    slots: &Arc<Slots>,
    timeout: Duration,
) -> Vec<SubTestRecord> {
    let started = Instant::now();
    let Some(slot) = slots.acquire(timeout + WATCHDOG_GRACE) else {
        tracing::warn!(job = %job.job_name, "no worker slot freed up, timed-out jobs are still running");
        return vec![SubTestRecord::error(
            EXECUTION_TEST,
            started.elapsed().as_secs_f64(),
            format!(
                "no worker became free within {}s; earlier jobs are still running past their timeout",
                (timeout + WATCHDOG_GRACE).as_secs()
            ),
        )];
    };
    let (tx, rx) = mpsc::channel();
    let worker_executor = Arc::clone(executor);
    let worker_job = job.clone();

    let spawned = std::thread::Builder::new()
        .name(format!("job-{}", job.job_name))
        .spawn(move || {
            let _slot = slot;
            let records = worker_executor.execute(&worker_job, timeout);
            let _ = tx.send(records);
        });
    if let Err(err) = spawned {
        return vec![SubTestRecord::error(
            EXECUTION_TEST,
            0.0,
            format!("failed to start job thread: {err}"),
        )];
    }

    match rx.recv_timeout(timeout + WATCHDOG_GRACE) {
        Ok(records) => records,
        Err(RecvTimeoutError::Timeout) => {
            // The thread is left to finish on its own; its late result is dropped.
            tracing::warn!(job = %job.job_name, timeout_secs = timeout.as_secs(), "job exceeded its timeout");
            vec![SubTestRecord::error(
                EXECUTION_TEST,
                started.elapsed().as_secs_f64(),
                format!("timed out after {}s", timeout.as_secs()),
            )]
        }
        Err(RecvTimeoutError::Disconnected) => {
            tracing::warn!(job = %job.job_name, "job executor panicked");
            vec![SubTestRecord::error(
                EXECUTION_TEST,
                started.elapsed().as_secs_f64(),
                "executor panicked",
            )]
        }
    }
}

/// Counts live executor threads against the worker limit.
struct Slots {
    live: Mutex<usize>,
    freed: Condvar,
    limit: usize,
}

impl Slots {
    fn new(limit: usize) -> Arc<Self> {
        Arc::new(Self {
            live: Mutex::new(0),
            freed: Condvar::new(),
            limit: limit.max(1),
        })
    }

    /// Waits up to `wait` for a free slot.
    fn acquire(self: &Arc<Self>, wait: Duration) -> Option<SlotGuard> {
        let deadline = Instant::now() + wait;
        let mut live = self.live.lock().unwrap_or_else(PoisonError::into_inner);
        while *live >= self.limit {
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            let (guard, _) = self
                .freed
                .wait_timeout(live, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            live = guard;
        }
        *live += 1;
        Some(SlotGuard(Arc::clone(self)))
    }
}

/// Released when the executor thread exits, panics included.
struct SlotGuard(Arc<Slots>);

impl Drop for SlotGuard {
    fn drop(&mut self) {
        let mut live = self.0.live.lock().unwrap_or_else(PoisonError::into_inner);
        *live = live.saturating_sub(1);
        self.0.freed.notify_one();
    }
}

/// Worker count when none is configured: the CPU count, capped for large
/// runs and never above the number of jobs.
pub fn default_parallel_jobs(job_count: usize) -> usize {
    let cpu_count = std::thread::available_parallelism()
        .map(|parallelism| parallelism.get())
        .unwrap_or(4);
    let adaptive_cap = if job_count >= 500 { 8 } else { 12 };
    cpu_count.min(adaptive_cap).max(1).min(job_count.max(1))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use contentpack_core::{CompatibilityRequirement, ExpectedResult, TestStatus};

    use super::*;

    fn job(name: &str) -> TestJob {
        TestJob {
            version: "1.0.0".to_string(),
            content_pack: format!("{name}.json"),
            content_pack_name: name.to_string(),
            content_pack_display_name: name.to_string(),
            job_name: format!("{name}-1-0-0"),
            priority: 0,
            requirements: CompatibilityRequirement::default(),
            expected_result: ExpectedResult::Pass,
        }
    }

    /// Behaves according to the pack name.
    #[derive(Default)]
    struct ScriptedExecutor {
        calls: AtomicUsize,
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    impl JobExecutor for ScriptedExecutor {
        fn execute(&self, job: &TestJob, _timeout: Duration) -> Vec<SubTestRecord> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(active, Ordering::SeqCst);
            let records = self.behave(job);
            self.active.fetch_sub(1, Ordering::SeqCst);
            records
        }
    }

    impl ScriptedExecutor {
        fn behave(&self, job: &TestJob) -> Vec<SubTestRecord> {
            match job.content_pack_name.as_str() {
                "panics" => panic!("scripted panic"),
                "hangs" => {
                    std::thread::sleep(Duration::from_secs(30));
                    Vec::new()
                }
                "overruns" => {
                    std::thread::sleep(Duration::from_secs(3));
                    vec![SubTestRecord::passed("check", 3.0)]
                }
                "fails" => vec![SubTestRecord::failed("check", 0.0, "nope")],
                _ => vec![SubTestRecord::passed("check", 0.0)],
            }
        }
    }

    fn scripted() -> Arc<ScriptedExecutor> {
        Arc::new(ScriptedExecutor::default())
    }

    #[test]
    fn test_results_keep_job_order() {
        let jobs: Vec<_> = (0..20).map(|i| job(&format!("pack{i}"))).collect();
        let executor = scripted();
        let report = run_jobs(&jobs, executor.clone(), &PoolConfig::default()).unwrap();

        assert_eq!(executor.calls.load(Ordering::SeqCst), 20);
        let names: Vec<_> = report.outcomes.iter().map(|o| o.job_name.clone()).collect();
        let expected: Vec<_> = jobs.iter().map(|j| j.job_name.clone()).collect();
        assert_eq!(names, expected);
        assert_eq!(report.counts.passed, 20);
    }

    #[test]
    fn test_panic_becomes_error_result() {
        let jobs = vec![job("ok"), job("panics"), job("fails")];
        let report = run_jobs(&jobs, scripted(), &PoolConfig::default()).unwrap();

        let statuses: Vec<_> = report.results().map(TestResult::status).collect();
        assert_eq!(statuses, [TestStatus::Passed, TestStatus::Error, TestStatus::Failed]);
        assert_eq!(report.outcomes[1].result.tests[0].error.as_deref(), Some("executor panicked"));
        assert_eq!(report.counts.total, 3);
    }

    #[test]
    fn test_hung_job_times_out() {
        let config = PoolConfig {
            workers: 2,
            timeout: Duration::from_secs(0),
            output_dir: None,
        };
        let started = Instant::now();
        let report = run_jobs(&[job("hangs"), job("ok")], scripted(), &config).unwrap();

        assert!(started.elapsed() < Duration::from_secs(10));
        let hung = &report.outcomes[0].result;
        assert_eq!(hung.status(), TestStatus::Error);
        assert_eq!(hung.tests[0].error.as_deref(), Some("timed out after 0s"));
        assert_eq!(report.outcomes[1].result.status(), TestStatus::Passed);
    }

    #[test]
    fn test_timed_out_job_keeps_its_worker_slot() {
        let config = PoolConfig {
            workers: 1,
            timeout: Duration::from_secs(0),
            output_dir: None,
        };
        let executor = scripted();
        let report = run_jobs(&[job("overruns"), job("ok"), job("ok2")], executor.clone(), &config).unwrap();

        assert_eq!(executor.peak.load(Ordering::SeqCst), 1);
        let overrun = &report.outcomes[0].result;
        assert_eq!(overrun.tests[0].error.as_deref(), Some("timed out after 0s"));
        assert_eq!(report.outcomes[1].result.status(), TestStatus::Passed);
        assert_eq!(report.outcomes[2].result.status(), TestStatus::Passed);
    }

    #[test]
    fn test_slot_wait_gives_up_behind_a_hung_job() {
        let config = PoolConfig {
            workers: 1,
            timeout: Duration::from_secs(0),
            output_dir: None,
        };
        let executor = scripted();
        let report = run_jobs(&[job("hangs"), job("ok")], executor.clone(), &config).unwrap();

        assert_eq!(executor.calls.load(Ordering::SeqCst), 1);
        let starved = &report.outcomes[1].result;
        assert_eq!(starved.status(), TestStatus::Error);
        assert!(starved.tests[0].error.as_deref().unwrap().contains("no worker became free"));
    }

    #[test]
    fn test_unsafe_job_name_is_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let results = dir.path().join("results");
        let mut escaping = job("a");
        escaping.job_name = "../escaped-1-0-0".to_string();
        let config = PoolConfig {
            output_dir: Some(results.clone()),
            ..PoolConfig::default()
        };
        let report = run_jobs(&[escaping], scripted(), &config).unwrap();

        assert!(report.outcomes[0].output.is_none());
        assert!(report.outcomes[0].write_error.as_deref().unwrap().contains("unsafe job name"));
        assert!(!dir.path().join("escaped-1-0-0.json").exists());
    }

    #[test]
    fn test_result_documents_are_written_per_job() {
        let dir = tempfile::tempdir().unwrap();
        let config = PoolConfig {
            output_dir: Some(dir.path().join("results")),
            ..PoolConfig::default()
        };
        let report = run_jobs(&[job("a"), job("fails")], scripted(), &config).unwrap();

        for outcome in &report.outcomes {
            let path = outcome.output.as_ref().unwrap();
            assert_eq!(path.file_name().unwrap().to_string_lossy(), format!("{}.json", outcome.job_name));
            let document: ResultDocument = contentpack_corpus::read_json(path).unwrap();
            assert_eq!(document.job_name.as_deref(), Some(outcome.job_name.as_str()));
            assert_eq!(document.into_result().status(), outcome.result.status());
        }
    }

    #[test]
    fn test_default_parallel_jobs_bounds() {
        assert_eq!(default_parallel_jobs(0), 1);
        assert_eq!(default_parallel_jobs(1), 1);
        assert!(default_parallel_jobs(10_000) <= 8);
    }
}
