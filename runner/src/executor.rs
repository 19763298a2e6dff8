//! Job executors.
//!
//! A [`JobExecutor`] turns one [`TestJob`] into the sub-test records of its
//! result. [`BuiltinExecutor`] checks the pack in-process;
//! [`CommandExecutor`] delegates to an external program and reads back the
//! result document it writes.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use contentpack_core::{
    ContentPack, SchemaConfig, SchemaValidator, SubTestRecord, TestJob, is_compatible,
    is_safe_job_name,
};
use contentpack_corpus::{ExecutionConfig, ExecutorKind, ResultDocument, read_json};
use serde_json::Value;
use wait_timeout::ChildExt;

use crate::error::{Result, RunnerError};

/// Sub-test name used for failures of the job as a whole.
pub const EXECUTION_TEST: &str = "execution";

/// Runs one job.
///
/// Implementations must not panic on bad input; a panic is still caught by
/// the pool and reported as an `error` result.
pub trait JobExecutor: Send + Sync {
    fn execute(&self, job: &TestJob, timeout: Duration) -> Vec<SubTestRecord>;
}

/// Builds the executor selected by `config`.
pub fn build_executor(
    config: &ExecutionConfig,
    pack_root: &Path,
    output_dir: &Path,
) -> Result<Arc<dyn JobExecutor>> {
    Ok(match config.executor {
        ExecutorKind::Builtin => Arc::new(BuiltinExecutor::new(pack_root)?),
        ExecutorKind::Command => Arc::new(CommandExecutor::new(
            config.command.clone(),
            pack_root,
            output_dir,
        )?),
    })
}

/// In-process checks against a pack file.
pub struct BuiltinExecutor {
    pack_root: PathBuf,
    schema: SchemaConfig,
}

impl BuiltinExecutor {
    pub fn new(pack_root: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            pack_root: pack_root.into(),
            schema: SchemaConfig::new()?,
        })
    }

    fn validation(&self, text: &str) -> SubTestRecord {
        let started = Instant::now();
        let result = SchemaValidator::new(&self.schema).validate_str(text);
        let elapsed = seconds(started);
        if result.is_valid {
            SubTestRecord::passed("content_pack_validation", elapsed)
        } else {
            let errors: Vec<_> = result.errors.iter().map(ToString::to_string).collect();
            SubTestRecord::failed("content_pack_validation", elapsed, errors.join("; "))
        }
    }

    fn loading(document: &Value) -> (SubTestRecord, Option<ContentPack>) {
        let started = Instant::now();
        match ContentPack::from_value(document.clone()) {
            Ok(pack) => (SubTestRecord::passed("content_pack_loading", seconds(started)), Some(pack)),
            Err(err) => (
                SubTestRecord::failed("content_pack_loading", seconds(started), err.to_string()),
                None,
            ),
        }
    }

    fn compatibility(job: &TestJob, pack: Option<&ContentPack>) -> SubTestRecord {
        let started = Instant::now();
        let verdict = match pack {
            Some(pack) => is_compatible(pack.conditions(), &job.version),
            None => job.requirements.evaluate(&job.version),
        };
        if verdict.compatible {
            SubTestRecord::passed("compatibility_checking", seconds(started))
        } else {
            SubTestRecord::failed(
                "compatibility_checking",
                seconds(started),
                verdict.reasons.join("; "),
            )
        }
    }

    fn database(document: &Value) -> SubTestRecord {
        let started = Instant::now();
        let statements: Vec<String> = match document.get("database") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => {
                let mut statements = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    let Some(sql) = item.as_str() else {
                        return SubTestRecord::failed(
                            "database_operations",
                            seconds(started),
                            format!("statement {} is not a string", i + 1),
                        );
                    };
                    statements.push(sql.to_string());
                }
                statements
            }
            Some(_) => {
                return SubTestRecord::failed(
                    "database_operations",
                    seconds(started),
                    "database must be an array of statements",
                );
            }
        };

        if statements.is_empty() {
            return SubTestRecord::passed("database_operations", seconds(started));
        }

        match contentpack_sqlite::apply_statements(&statements) {
            Ok(report) => match report.first_failure() {
                None => SubTestRecord::passed("database_operations", seconds(started)),
                Some(failure) => {
                    SubTestRecord::failed("database_operations", seconds(started), failure)
                }
            },
            Err(err) => SubTestRecord::error("database_operations", seconds(started), err.to_string()),
        }
    }

    fn state(document: &Value) -> SubTestRecord {
        let started = Instant::now();
        let modules = match document.get("state") {
            None | Some(Value::Null) => {
                return SubTestRecord::passed("state_operations", seconds(started));
            }
            Some(Value::Object(modules)) => modules,
            Some(_) => {
                return SubTestRecord::failed(
                    "state_operations",
                    seconds(started),
                    "state must be an object of modules",
                );
            }
        };

        let bad: Vec<&str> = modules
            .iter()
            .filter(|(_, value)| !value.is_object())
            .map(|(name, _)| name.as_str())
            .collect();
        if bad.is_empty() {
            SubTestRecord::passed("state_operations", seconds(started))
        } else {
            SubTestRecord::failed(
                "state_operations",
                seconds(started),
                format!("state modules must be objects: {}", bad.join(", ")),
            )
        }
    }
}

impl JobExecutor for BuiltinExecutor {
    /// Checks run in order; once `timeout` has passed the remaining checks
    /// are replaced by one `execution` error.
    fn execute(&self, job: &TestJob, timeout: Duration) -> Vec<SubTestRecord> {
        let started = Instant::now();
        let path = self.pack_root.join(&job.content_pack);
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) => {
                return vec![SubTestRecord::error(
                    EXECUTION_TEST,
                    seconds(started),
                    format!("cannot read {}: {err}", path.display()),
                )];
            }
        };

        let mut records = vec![self.validation(&text)];
        let document: Value = match serde_json::from_str(&text) {
            Ok(document) => document,
            Err(_) => return records,
        };

        let (loading, pack) = Self::loading(&document);
        records.push(loading);
        let checks: [&dyn Fn() -> SubTestRecord; 3] = [
            &|| Self::compatibility(job, pack.as_ref()),
            &|| Self::database(&document),
            &|| Self::state(&document),
        ];
        for check in checks {
            if started.elapsed() >= timeout {
                tracing::warn!(job = %job.job_name, timeout_secs = timeout.as_secs(), "builtin checks ran past the timeout");
                records.push(SubTestRecord::error(
                    EXECUTION_TEST,
                    seconds(started),
                    format!("timed out after {}s", timeout.as_secs()),
                ));
                return records;
            }
            records.push(check());
        }

        tracing::debug!(job = %job.job_name, tests = records.len(), "builtin checks finished");
        records
    }
}

/// Runs an external program once per job.
///
/// The argv template may use `{pack}` (absolute pack path), `{version}` and
/// `{output}` (where the program must write its result document).
pub struct CommandExecutor {
    template: Vec<String>,
    pack_root: PathBuf,
    output_dir: PathBuf,
}

impl CommandExecutor {
    /// # Errors
    ///
    /// Returns [`RunnerError::InvalidCommand`] if the template is empty.
    pub fn new(
        template: Vec<String>,
        pack_root: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> Result<Self> {
        if template.first().is_none_or(|program| program.trim().is_empty()) {
            return Err(RunnerError::InvalidCommand(
                "the command template needs a program".to_string(),
            ));
        }
        Ok(Self {
            template,
            pack_root: pack_root.into(),
            output_dir: output_dir.into(),
        })
    }

    /// Path the program is told to write its result document to.
    pub fn output_path(&self, job: &TestJob) -> PathBuf {
        self.output_dir.join(format!("{}.json", job.job_name))
    }

    /// The argv for `job`, placeholders filled in.
    pub fn command_line(&self, job: &TestJob) -> Vec<String> {
        let pack = self.pack_root.join(&job.content_pack);
        let pack = pack.to_string_lossy();
        let output = self.output_path(job);
        let output = output.to_string_lossy();
        self.template
            .iter()
            .map(|arg| {
                arg.replace("{pack}", &pack)
                    .replace("{version}", &job.version)
                    .replace("{output}", &output)
            })
            .collect()
    }

    fn spawn(&self, argv: &[String]) -> std::io::Result<Child> {
        let mut command = Command::new(&argv[0]);
        command
            .args(&argv[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        command.spawn()
    }
}

impl JobExecutor for CommandExecutor {
    fn execute(&self, job: &TestJob, timeout: Duration) -> Vec<SubTestRecord> {
        let started = Instant::now();
        if !is_safe_job_name(&job.job_name) {
            return vec![SubTestRecord::error(
                EXECUTION_TEST,
                0.0,
                format!("unsafe job name '{}'", job.job_name),
            )];
        }
        let argv = self.command_line(job);
        let output = self.output_path(job);

        if let Err(err) = std::fs::create_dir_all(&self.output_dir) {
            return vec![SubTestRecord::error(
                EXECUTION_TEST,
                seconds(started),
                format!("cannot create {}: {err}", self.output_dir.display()),
            )];
        }
        // A document left over from an earlier run must not be mistaken for this one.
        let _ = std::fs::remove_file(&output);

        let mut child = match self.spawn(&argv) {
            Ok(child) => child,
            Err(err) => {
                return vec![SubTestRecord::error(
                    EXECUTION_TEST,
                    seconds(started),
                    format!("failed to start {}: {err}", argv[0]),
                )];
            }
        };

        // Drain stderr in the background so a chatty child cannot block on a full pipe.
        let stderr_thread = child.stderr.take().map(|mut pipe| {
            std::thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = pipe.read_to_end(&mut buf);
                buf
            })
        });

        let status = match child.wait_timeout(timeout) {
            Ok(Some(status)) => status,
            Ok(None) => {
                tracing::warn!(job = %job.job_name, timeout_secs = timeout.as_secs(), "test command timed out, killing process");
                let _ = child.kill();
                let _ = child.wait();
                return vec![SubTestRecord::error(
                    EXECUTION_TEST,
                    seconds(started),
                    format!("timed out after {}s", timeout.as_secs()),
                )];
            }
            Err(err) => {
                let _ = child.kill();
                let _ = child.wait();
                return vec![SubTestRecord::error(
                    EXECUTION_TEST,
                    seconds(started),
                    format!("wait failed: {err}"),
                )];
            }
        };

        let stderr = stderr_thread
            .and_then(|t| t.join().ok())
            .map(|buf| String::from_utf8_lossy(&buf).trim().to_string())
            .unwrap_or_default();

        if output.is_file() {
            return match read_json::<ResultDocument>(&output) {
                Ok(document) if !document.tests.is_empty() || status.success() => document.tests,
                Ok(_) => vec![SubTestRecord::failed(
                    EXECUTION_TEST,
                    seconds(started),
                    exit_message(status.code(), &stderr),
                )],
                Err(err) => vec![SubTestRecord::error(
                    EXECUTION_TEST,
                    seconds(started),
                    format!("invalid result document: {err}"),
                )],
            };
        }

        if status.success() {
            vec![SubTestRecord::error(
                EXECUTION_TEST,
                seconds(started),
                "command wrote no result document",
            )]
        } else {
            vec![SubTestRecord::failed(
                EXECUTION_TEST,
                seconds(started),
                exit_message(status.code(), &stderr),
            )]
        }
    }
}

fn exit_message(code: Option<i32>, stderr: &str) -> String {
    let status = code.map_or_else(|| "a signal".to_string(), |c| format!("status {c}"));
    let last_line = stderr.lines().last().unwrap_or_default();
    if last_line.is_empty() {
        format!("exited with {status}")
    } else {
        format!("exited with {status}: {last_line}")
    }
}

fn seconds(started: Instant) -> f64 {
    started.elapsed().as_secs_f64()
}
