mod templates;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use contentpack_core::{
    CompatibilityCondition, CompatibilityMatrix, MatrixPlan, Release, ResultAggregator,
    SchemaConfig, SchemaValidator, SelectionCriteria, SemanticVersion, Suggestion, TestStatus,
    ValidationSummary, VersionSelection, apply_conditions, attempt_fixes, build_matrix,
    is_compatible, normalize_pack_name, select_versions, suggest_conditions,
};
use contentpack_corpus::{
    CorpusError, CorpusReport, CorpusTotals, ExecutorKind, MANIFEST_FILE, Manifest, MatrixReport,
    PacksDocument, RunConfig, collect_pack_paths, discover_packs, load_document, load_results,
    read_json, validate_corpus, write_json,
};
use contentpack_runner::{PoolConfig, build_executor, run_jobs};
use serde::Serialize;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use crate::templates::{Template, TemplateOptions};

/// How a command finished, mapped to the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    /// Everything processed passed.
    Success,
    /// At least one item failed.
    Failures,
    /// Nothing was found to process.
    Nothing,
}

impl Outcome {
    fn exit_code(self) -> ExitCode {
        match self {
            Self::Success => ExitCode::SUCCESS,
            Self::Failures => ExitCode::from(1),
            Self::Nothing => ExitCode::from(2),
        }
    }

    fn from_failures(failed: bool) -> Self {
        if failed { Self::Failures } else { Self::Success }
    }
}

/// CLI-side executor choice, mapped onto the run configuration.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliExecutor {
    Builtin,
    Command,
}

impl From<CliExecutor> for ExecutorKind {
    fn from(kind: CliExecutor) -> Self {
        match kind {
            CliExecutor::Builtin => Self::Builtin,
            CliExecutor::Command => Self::Command,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "cpcompat", version)]
#[command(about = "Validate content packs and test their compatibility across host versions")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Validate content pack files and directories.
    Validate(ValidateArgs),
    /// Check one pack against candidate host versions.
    Check(CheckArgs),
    /// Suggest compatibility conditions from the sections a pack uses.
    Suggest(SuggestArgs),
    /// Build the packs document from a pack directory.
    Discover(DiscoverArgs),
    /// Select host versions to test from a release list.
    Versions(VersionsArgs),
    /// Build the test matrix from packs and versions documents.
    Matrix(MatrixArgs),
    /// Run every job of a matrix document.
    Run(RunArgs),
    /// Aggregate result documents into a compatibility matrix.
    Report(ReportArgs),
    /// Generate or check the pack manifest.
    Manifest(ManifestArgs),
    /// Write a new pack from a template.
    Init(InitArgs),
}

#[derive(Debug, Args)]
struct ValidateArgs {
    /// Pack files and/or directories containing pack JSON files.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
    /// Emit the report as JSON.
    #[arg(long)]
    json: bool,
    /// Only print failing files.
    #[arg(short, long)]
    quiet: bool,
    /// Fill in missing metadata of failing packs, keeping a `.json.backup` copy.
    #[arg(long)]
    fix: bool,
}

#[derive(Debug, Args)]
struct SuggestArgs {
    /// Pack JSON file.
    pack: PathBuf,
    /// Write the suggested conditions into the pack.
    #[arg(long)]
    write: bool,
    /// Write the updated pack here instead of in place (implies --write).
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Emit the suggestions as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
struct CheckArgs {
    /// Pack JSON file.
    pack: PathBuf,
    /// Host version to check (repeatable).
    #[arg(short = 'c', long = "candidate-version", required = true)]
    versions: Vec<String>,
    /// Emit the verdicts as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
struct DiscoverArgs {
    /// Pack directory.
    #[arg(default_value = "content-packs")]
    root: PathBuf,
    /// Wildcard or substring matched against file name, path, name, category and tags.
    #[arg(long)]
    filter: Option<String>,
    /// Write the packs document here instead of stdout.
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct VersionsArgs {
    /// JSON array of releases (`tag_name`, `draft`, `prerelease`).
    #[arg(long)]
    releases: PathBuf,
    /// Oldest version to keep.
    #[arg(long)]
    min_version: Option<String>,
    /// Select only this version.
    #[arg(long)]
    specific: Option<String>,
    #[arg(long)]
    include_prereleases: bool,
    /// Keep every matching release.
    #[arg(long)]
    all: bool,
    /// Number of newest releases to keep.
    #[arg(long)]
    limit: Option<usize>,
    /// Run configuration (YAML).
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct MatrixArgs {
    /// Packs document written by `discover`.
    #[arg(long)]
    packs: PathBuf,
    /// Versions document written by `versions`.
    #[arg(long, required_unless_present = "versions_list")]
    versions: Option<PathBuf>,
    /// Host version to include (repeatable), instead of a versions document.
    #[arg(short = 'c', long = "candidate-version", id = "versions_list", conflicts_with = "versions")]
    candidate_versions: Vec<String>,
    /// Job budget.
    #[arg(long)]
    max_jobs: Option<usize>,
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct RunArgs {
    /// Matrix document written by `matrix`.
    #[arg(long)]
    matrix: PathBuf,
    /// Directory the jobs' pack paths are relative to.
    #[arg(long, default_value = "content-packs")]
    packs_root: PathBuf,
    /// Where `<job_name>.json` result documents are written.
    #[arg(long, default_value = "test-results")]
    output_dir: PathBuf,
    #[arg(long)]
    workers: Option<usize>,
    /// Per-job timeout in seconds.
    #[arg(long)]
    timeout: Option<u64>,
    #[arg(long, value_enum)]
    executor: Option<CliExecutor>,
    #[arg(long)]
    config: Option<PathBuf>,
    /// Test command for the command executor, with `{pack}`, `{version}` and `{output}` placeholders.
    #[arg(last = true)]
    command: Vec<String>,
}

#[derive(Debug, Args)]
struct ReportArgs {
    /// Directory searched recursively for result documents.
    #[arg(long, default_value = "test-results")]
    results: PathBuf,
    /// Matrix document; requested jobs without a result are reported as missing.
    #[arg(long)]
    matrix: Option<PathBuf>,
    /// Packs document; packs without results are listed as not tested.
    #[arg(long)]
    packs: Option<PathBuf>,
    /// Write the matrix report here and print a table instead.
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct ManifestArgs {
    /// Pack directory.
    #[arg(default_value = "content-packs")]
    root: PathBuf,
    /// Manifest path (default: `<root>/manifest.json`).
    #[arg(long)]
    output: Option<PathBuf>,
    /// Report entries whose file changed instead of regenerating.
    #[arg(long)]
    check: bool,
}

#[derive(Debug, Args)]
struct InitArgs {
    /// Display name of the new pack.
    name: String,
    #[arg(long, value_enum, default_value = "basic")]
    template: Template,
    /// Minimum supported host version.
    #[arg(long, default_value = "1.0.0")]
    min_version: String,
    #[arg(long, default_value = "custom")]
    category: String,
    #[arg(long, default_value = "Content Pack Author")]
    author: String,
    #[arg(long, default_value = "author@example.com")]
    email: String,
    /// Comma-separated tags.
    #[arg(long, value_delimiter = ',')]
    tags: Vec<String>,
    /// Output file (default: `<normalized-name>.json`).
    #[arg(long)]
    output: Option<PathBuf>,
    /// Overwrite an existing file.
    #[arg(long)]
    force: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Command::Validate(args) => run_validate(args),
        Command::Check(args) => run_check(args),
        Command::Suggest(args) => run_suggest(args),
        Command::Discover(args) => run_discover(args),
        Command::Versions(args) => run_versions(args),
        Command::Matrix(args) => run_matrix(args),
        Command::Run(args) => run_run(args),
        Command::Report(args) => run_report(args),
        Command::Manifest(args) => run_manifest(args),
        Command::Init(args) => run_init(args),
    };

    match result {
        Ok(outcome) => outcome.exit_code(),
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(1)
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Writes `value` to `output`, or pretty-prints it to stdout.
fn emit_json<T: Serialize>(value: &T, output: Option<&Path>) -> Result<(), String> {
    match output {
        Some(path) => write_json(path, value)
            .map_err(|err| format!("Failed to write '{}': {err}", path.display())),
        None => {
            let raw = serde_json::to_string_pretty(value)
                .map_err(|err| format!("Failed to serialize output: {err}"))?;
            println!("{raw}");
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<RunConfig, String> {
    RunConfig::load_or_default(path).map_err(|err| match path {
        Some(path) => format!("Failed to load config '{}': {err}", path.display()),
        None => err.to_string(),
    })
}

fn schema_config() -> Result<SchemaConfig, String> {
    SchemaConfig::new().map_err(|err| format!("Failed to build the pack schema: {err}"))
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct FileVerdict<'a> {
    file: &'a Path,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    valid: bool,
    errors: Vec<String>,
    warnings: Vec<String>,
    summary: &'a ValidationSummary,
}

#[derive(Serialize)]
struct ValidateOutput<'a> {
    valid: bool,
    files: Vec<FileVerdict<'a>>,
    duplicates: Vec<String>,
    totals: &'a CorpusTotals,
}

fn run_validate(args: ValidateArgs) -> Result<Outcome, String> {
    let paths = match collect_pack_paths(&args.inputs) {
        Ok(paths) => paths,
        Err(CorpusError::NoPacksFound) => {
            eprintln!("No content pack files found. Nothing to validate.");
            return Ok(Outcome::Nothing);
        }
        Err(err) => return Err(err.to_string()),
    };

    let config = schema_config()?;
    let validator = SchemaValidator::new(&config);
    let mut report = validate_corpus(&paths, &validator);
    if args.fix && fix_failing_packs(&report)? > 0 {
        report = validate_corpus(&paths, &validator);
    }

    if args.json {
        let output = ValidateOutput {
            valid: report.is_valid(),
            files: report
                .files
                .iter()
                .map(|file| FileVerdict {
                    file: &file.path,
                    name: file.name.as_deref(),
                    valid: file.result.is_valid,
                    errors: file.result.errors.iter().map(ToString::to_string).collect(),
                    warnings: file.result.warnings.iter().map(ToString::to_string).collect(),
                    summary: &file.result.summary,
                })
                .collect(),
            duplicates: report.duplicates.iter().map(ToString::to_string).collect(),
            totals: &report.totals,
        };
        emit_json(&output, None)?;
    } else {
        for file in &report.files {
            if file.result.is_valid {
                if !args.quiet {
                    println!("PASS {}", file.path.display());
                }
            } else {
                println!("FAIL {}", file.path.display());
            }
            for error in &file.result.errors {
                println!("  error: {error}");
            }
            if !args.quiet {
                for warning in &file.result.warnings {
                    println!("  warning: {warning}");
                }
            }
        }
        for duplicate in &report.duplicates {
            println!("error: {duplicate}");
        }
        if !args.quiet {
            println!(
                "Validated {} file(s): {} valid, {} error(s), {} warning(s).",
                report.totals.files, report.totals.valid, report.totals.errors, report.totals.warnings
            );
        }
    }

    Ok(Outcome::from_failures(!report.is_valid()))
}

/// Repairs the metadata of every failing pack in place and returns how many
/// files were rewritten. Unreadable files are left for the validator.
fn fix_failing_packs(report: &CorpusReport) -> Result<usize, String> {
    let exported_at = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
    let mut rewritten = 0;

    for file in report.files.iter().filter(|f| !f.result.is_valid) {
        let Ok(mut document) = load_document(&file.path) else {
            continue;
        };
        let fixes = attempt_fixes(&mut document, &exported_at);
        if fixes.is_empty() {
            eprintln!("No automatic fixes available for {}", file.path.display());
            continue;
        }

        let backup = file.path.with_extension("json.backup");
        fs::copy(&file.path, &backup)
            .map_err(|err| format!("Failed to back up '{}': {err}", file.path.display()))?;
        write_json(&file.path, &document)
            .map_err(|err| format!("Failed to write '{}': {err}", file.path.display()))?;
        tracing::info!(
            path = %file.path.display(),
            backup = %backup.display(),
            fixes = fixes.len(),
            "fixed pack"
        );
        eprintln!("FIXED {}", file.path.display());
        for fix in &fixes {
            eprintln!("  {fix}");
        }
        rewritten += 1;
    }

    Ok(rewritten)
}

// ---------------------------------------------------------------------------
// check / suggest
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct VersionVerdict {
    version: String,
    compatible: bool,
    reasons: Vec<String>,
}

#[derive(Serialize)]
struct CheckOutput {
    content_pack: String,
    file: PathBuf,
    conditions: Vec<CompatibilityCondition>,
    results: Vec<VersionVerdict>,
}

fn run_check(args: CheckArgs) -> Result<Outcome, String> {
    let document = load_document(&args.pack)
        .map_err(|err| format!("Failed to read '{}': {err}", args.pack.display()))?;
    let metadata = document.get("metadata");
    let name = metadata
        .and_then(|m| m.get("name"))
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();
    let conditions: Vec<CompatibilityCondition> =
        match metadata.and_then(|m| m.get("compatibility_conditions")) {
            None | Some(Value::Null) => Vec::new(),
            Some(raw) => serde_json::from_value(raw.clone()).map_err(|err| {
                format!("Malformed compatibility conditions in '{}': {err}", args.pack.display())
            })?,
        };

    let results: Vec<VersionVerdict> = args
        .versions
        .iter()
        .map(|version| {
            let verdict = is_compatible(&conditions, version);
            VersionVerdict {
                version: version.clone(),
                compatible: verdict.compatible,
                reasons: verdict.reasons,
            }
        })
        .collect();
    let all_compatible = results.iter().all(|r| r.compatible);

    if args.json {
        emit_json(
            &CheckOutput {
                content_pack: name,
                file: args.pack,
                conditions,
                results,
            },
            None,
        )?;
    } else {
        for result in &results {
            if result.compatible {
                println!("COMPATIBLE {name} @ {}", result.version);
            } else {
                println!("INCOMPATIBLE {name} @ {}", result.version);
                for reason in &result.reasons {
                    println!("  {reason}");
                }
            }
        }
    }

    Ok(Outcome::from_failures(!all_compatible))
}

#[derive(Serialize)]
struct SuggestOutput<'a> {
    file: &'a Path,
    suggestions: &'a [Suggestion],
    #[serde(skip_serializing_if = "Option::is_none")]
    written: Option<&'a Path>,
}

fn run_suggest(args: SuggestArgs) -> Result<Outcome, String> {
    let mut document = load_document(&args.pack)
        .map_err(|err| format!("Failed to read '{}': {err}", args.pack.display()))?;
    let suggestions = suggest_conditions(&document);

    let target = match (&args.output, args.write) {
        (Some(output), _) => Some(output.as_path()),
        (None, true) => Some(args.pack.as_path()),
        (None, false) => None,
    };
    if let Some(target) = target {
        let conditions: Vec<CompatibilityCondition> =
            suggestions.iter().map(|s| s.condition.clone()).collect();
        if !apply_conditions(&mut document, &conditions) {
            return Err(format!("'{}' has no metadata object to update", args.pack.display()));
        }
        write_json(target, &document)
            .map_err(|err| format!("Failed to write '{}': {err}", target.display()))?;
        tracing::info!(path = %target.display(), conditions = conditions.len(), "wrote conditions");
    }

    if args.json {
        emit_json(
            &SuggestOutput {
                file: &args.pack,
                suggestions: &suggestions,
                written: target,
            },
            None,
        )?;
    } else {
        for suggestion in &suggestions {
            let condition = &suggestion.condition;
            println!(
                "{}: min {} ({})",
                suggestion.finding,
                condition.min_version.as_deref().unwrap_or("-"),
                condition.reason_text()
            );
        }
        if let Some(target) = target {
            println!(
                "Updated {} with {} compatibility condition(s).",
                target.display(),
                suggestions.len()
            );
        }
    }

    Ok(Outcome::Success)
}

// ---------------------------------------------------------------------------
// discover / versions / matrix
// ---------------------------------------------------------------------------

fn run_discover(args: DiscoverArgs) -> Result<Outcome, String> {
    let document = discover_packs(&args.root, args.filter.as_deref()).map_err(|e| e.to_string())?;
    emit_json(&document, args.output.as_deref())?;

    let summary = &document.summary;
    eprintln!(
        "Discovered {} pack(s): {} with compatibility conditions, {} without, {} file(s) skipped.",
        summary.total_packs,
        summary.packs_with_compatibility,
        summary.packs_without_compatibility,
        summary.skipped_files
    );

    if document.content_packs.is_empty() {
        return Ok(Outcome::Nothing);
    }
    Ok(Outcome::Success)
}

fn run_versions(args: VersionsArgs) -> Result<Outcome, String> {
    let config = load_config(args.config.as_deref())?;
    let releases: Vec<Release> = read_json(&args.releases)
        .map_err(|err| format!("Failed to read releases '{}': {err}", args.releases.display()))?;
    let min_version = args
        .min_version
        .as_deref()
        .map(SemanticVersion::parse)
        .transpose()
        .map_err(|err| format!("Invalid --min-version: {err}"))?;

    let criteria = SelectionCriteria {
        min_version,
        specific: args.specific,
        include_prereleases: args.include_prereleases || config.versions.include_prereleases,
        all: args.all,
        limit: args.limit.unwrap_or(config.versions.limit),
    };
    let selection = select_versions(&releases, &criteria);
    emit_json(&selection, args.output.as_deref())?;

    for skipped in &selection.skipped {
        eprintln!("skipped {}: {}", skipped.tag, skipped.reason);
    }
    if selection.versions.is_empty() {
        eprintln!("No versions selected.");
        return Ok(Outcome::Nothing);
    }
    eprintln!("Selected {} version(s).", selection.versions.len());
    Ok(Outcome::Success)
}

fn run_matrix(args: MatrixArgs) -> Result<Outcome, String> {
    let config = load_config(args.config.as_deref())?;
    let packs: PacksDocument = read_json(&args.packs)
        .map_err(|err| format!("Failed to read packs document '{}': {err}", args.packs.display()))?;
    let versions = match &args.versions {
        Some(path) => {
            let selection: VersionSelection = read_json(path)
                .map_err(|err| format!("Failed to read versions document '{}': {err}", path.display()))?;
            selection.versions
        }
        None => args.candidate_versions,
    };

    let max_jobs = args.max_jobs.unwrap_or(config.matrix.max_jobs);
    let plan = build_matrix(&packs.content_packs, &versions, max_jobs);
    emit_json(&plan, args.output.as_deref())?;

    let summary = &plan.summary;
    eprintln!(
        "Matrix: {} job(s), {} skipped as incompatible, {} dropped by the budget of {max_jobs}.",
        summary.test_jobs, summary.skipped_combinations, summary.dropped_jobs
    );

    if plan.include.is_empty() {
        return Ok(Outcome::Nothing);
    }
    Ok(Outcome::Success)
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

fn run_run(args: RunArgs) -> Result<Outcome, String> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(workers) = args.workers {
        config.execution.workers = workers;
    }
    if let Some(timeout) = args.timeout {
        config.execution.timeout_secs = timeout;
    }
    if let Some(executor) = args.executor {
        config.execution.executor = executor.into();
    }
    if !args.command.is_empty() {
        config.execution.command = args.command;
    }

    let plan: MatrixPlan = read_json(&args.matrix)
        .map_err(|err| format!("Failed to read matrix document '{}': {err}", args.matrix.display()))?;
    if plan.include.is_empty() {
        eprintln!("The matrix has no jobs. Nothing to test.");
        return Ok(Outcome::Nothing);
    }

    tracing::info!(
        matrix = %args.matrix.display(),
        jobs = plan.include.len(),
        executor = ?config.execution.executor,
        "loaded matrix"
    );
    let executor = build_executor(&config.execution, &args.packs_root, &args.output_dir)
        .map_err(|e| e.to_string())?;
    let pool = PoolConfig {
        workers: config.execution.workers,
        timeout: config.execution.timeout(),
        output_dir: Some(args.output_dir.clone()),
    };
    let report = run_jobs(&plan.include, executor, &pool).map_err(|e| e.to_string())?;

    for outcome in &report.outcomes {
        let status = outcome.result.status();
        println!("{:<6} {} ({:.2}s)", status_label(status), outcome.job_name, outcome.elapsed);
        for test in outcome.result.tests.iter().filter(|t| t.status != TestStatus::Passed) {
            println!(
                "  {} {}: {}",
                test.status,
                test.name,
                test.error.as_deref().unwrap_or("no details")
            );
        }
        if let Some(err) = &outcome.write_error {
            eprintln!("  failed to write result document: {err}");
        }
    }

    let counts = &report.counts;
    println!(
        "Ran {} job(s): {} passed, {} failed, {} error(s). Results in '{}'.",
        counts.total,
        counts.passed,
        counts.failed,
        counts.errors,
        args.output_dir.display()
    );

    let write_failed = report.outcomes.iter().any(|o| o.write_error.is_some());
    Ok(Outcome::from_failures(counts.has_failures() || write_failed))
}

fn status_label(status: TestStatus) -> &'static str {
    match status {
        TestStatus::Passed => "PASS",
        TestStatus::Failed => "FAIL",
        TestStatus::Error => "ERROR",
    }
}

// ---------------------------------------------------------------------------
// report
// ---------------------------------------------------------------------------

fn run_report(args: ReportArgs) -> Result<Outcome, String> {
    let set = load_results(&args.results)
        .map_err(|err| format!("Failed to read results '{}': {err}", args.results.display()))?;
    for (path, reason) in &set.skipped {
        eprintln!("skipped {}: {reason}", path.display());
    }
    if set.documents.is_empty() {
        eprintln!("No test results found in '{}'.", args.results.display());
        return Ok(Outcome::Nothing);
    }

    let plan: Option<MatrixPlan> = args
        .matrix
        .as_ref()
        .map(|path| {
            read_json(path)
                .map_err(|err| format!("Failed to read matrix document '{}': {err}", path.display()))
        })
        .transpose()?;
    let packs: Option<PacksDocument> = args
        .packs
        .as_ref()
        .map(|path| {
            read_json(path)
                .map_err(|err| format!("Failed to read packs document '{}': {err}", path.display()))
        })
        .transpose()?;

    let pack_names: Vec<String> = packs
        .iter()
        .flat_map(|doc| doc.content_packs.iter().map(|p| p.name.clone()))
        .collect();
    let versions: Vec<String> = plan
        .iter()
        .flat_map(|plan| {
            plan.include
                .iter()
                .map(|j| j.version.clone())
                .chain(plan.skipped.iter().map(|s| s.version.clone()))
        })
        .collect();
    tracing::debug!(
        results = set.documents.len(),
        packs = pack_names.len(),
        versions = versions.len(),
        "aggregating results"
    );
    let mut aggregator = ResultAggregator::with_universe(pack_names, versions);

    let duplicates = aggregator.ingest_all(set.documents.into_iter().map(|(_, doc)| doc.into_result()));
    for duplicate in &duplicates {
        eprintln!("error: {duplicate}");
    }
    let missing = plan
        .as_ref()
        .map(|plan| aggregator.reconcile(&plan.include))
        .unwrap_or_default();
    for item in &missing {
        eprintln!("missing result for {} @ {}", item.pack, item.version);
    }

    let matrix = aggregator.finalize();
    let failed = matrix.has_failures() || !duplicates.is_empty() || !missing.is_empty();

    match &args.output {
        Some(path) => {
            emit_json(&MatrixReport::new(matrix.clone()), Some(path))?;
            print!("{}", render_table(&matrix));
        }
        None => emit_json(&MatrixReport::new(matrix.clone()), None)?,
    }

    let totals = &matrix.summary;
    eprintln!(
        "{} result(s): {} passed, {} failed, {} error(s), {} not tested.",
        totals.counts.total, totals.counts.passed, totals.counts.failed, totals.counts.errors, totals.not_tested
    );

    Ok(Outcome::from_failures(failed))
}

/// Plain-text pack × version table.
fn render_table(matrix: &CompatibilityMatrix) -> String {
    let pack_width = matrix
        .compatibility_matrix
        .keys()
        .map(|name| name.chars().count())
        .chain(std::iter::once("Content pack".len()))
        .max()
        .unwrap_or_default();
    let widths: Vec<usize> = matrix
        .versions
        .iter()
        .map(|v| v.chars().count().max("not_tested".len()))
        .collect();

    let mut out = format!("{:<pack_width$}", "Content pack");
    for (version, width) in matrix.versions.iter().zip(&widths) {
        out.push_str(&format!("  {version:<width$}"));
    }
    out.push('\n');

    for (pack, row) in &matrix.compatibility_matrix {
        out.push_str(&format!("{pack:<pack_width$}"));
        for (version, width) in matrix.versions.iter().zip(&widths) {
            let cell = row
                .get(version)
                .and_then(|status| serde_json::to_value(status).ok())
                .and_then(|value| value.as_str().map(String::from))
                .unwrap_or_else(|| "-".to_string());
            out.push_str(&format!("  {cell:<width$}"));
        }
        out.push('\n');
    }
    out
}

// ---------------------------------------------------------------------------
// manifest
// ---------------------------------------------------------------------------

fn run_manifest(args: ManifestArgs) -> Result<Outcome, String> {
    let path = args.output.unwrap_or_else(|| args.root.join(MANIFEST_FILE));

    if args.check {
        let manifest = Manifest::load(&path)
            .map_err(|err| format!("Failed to load manifest '{}': {err}", path.display()))?;
        let stale = manifest.stale_entries(&args.root);
        for entry in &stale {
            println!("STALE {entry}");
        }
        println!(
            "Checked {} manifest entr{}: {} stale.",
            manifest.content_packs.len(),
            if manifest.content_packs.len() == 1 { "y" } else { "ies" },
            stale.len()
        );
        return Ok(Outcome::from_failures(!stale.is_empty()));
    }

    let manifest = match Manifest::generate(&args.root) {
        Ok(manifest) => manifest,
        Err(CorpusError::NoPacksFound) => {
            eprintln!("No content pack files found in '{}'.", args.root.display());
            return Ok(Outcome::Nothing);
        }
        Err(err) => return Err(err.to_string()),
    };
    manifest
        .save(&path)
        .map_err(|err| format!("Failed to write '{}': {err}", path.display()))?;

    let stats = &manifest.statistics;
    println!(
        "Wrote manifest with {} pack(s) ({} bytes, {} categories) to '{}'.",
        stats.total_packs,
        stats.total_size_bytes,
        stats.categories.len(),
        path.display()
    );
    Ok(Outcome::Success)
}

// ---------------------------------------------------------------------------
// init
// ---------------------------------------------------------------------------

fn run_init(args: InitArgs) -> Result<Outcome, String> {
    SemanticVersion::parse(&args.min_version).map_err(|err| format!("Invalid --min-version: {err}"))?;
    if args.name.trim().is_empty() {
        return Err("The pack name must not be empty".to_string());
    }

    let path = args
        .output
        .unwrap_or_else(|| PathBuf::from(format!("{}.json", normalize_pack_name(&args.name))));
    if path.exists() && !args.force {
        return Err(format!("'{}' already exists (use --force to overwrite)", path.display()));
    }

    let options = TemplateOptions {
        name: args.name.trim().to_string(),
        min_version: args.min_version,
        category: args.category,
        author_name: args.author,
        author_email: args.email,
        tags: args.tags.into_iter().filter(|t| !t.trim().is_empty()).collect(),
        date_exported: chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
    };
    let pack = templates::render(args.template, &options);

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|err| format!("Failed to create directory '{}': {err}", parent.display()))?;
    }
    let raw = serde_json::to_string_pretty(&pack)
        .map_err(|err| format!("Failed to serialize pack: {err}"))?;
    fs::write(&path, format!("{raw}\n"))
        .map_err(|err| format!("Failed to write '{}': {err}", path.display()))?;

    let template = format!("{:?}", args.template).to_lowercase();
    tracing::info!(path = %path.display(), template = %template, "wrote pack template");
    println!("Created {template} pack template at '{}'.", path.display());
    Ok(Outcome::Success)
}
