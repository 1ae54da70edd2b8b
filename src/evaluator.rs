//! Case evaluation engine.
//!
//! Runs declared cases one at a time, in order, classifies each outcome and
//! writes the human-readable report.

use crate::compare;
use crate::executor::{self, CommandLine, ExecError, ExecutionResult, Platform};
use crate::schema::{CaseFile, TestCase};
use std::fmt;
use std::io::Write;

/// Case-insensitive name filters.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    include: Option<String>,
    exclude: Option<String>,
}

impl Filter {
    pub fn new(include: Option<&str>, exclude: Option<&str>) -> Self {
        Self {
            include: include.map(str::to_lowercase),
            exclude: exclude.map(str::to_lowercase),
        }
    }

    /// Whether a case with this name should run.
    ///
    /// Include and exclude are checked independently, so a name matching
    /// both is rejected.
    pub fn allows(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        if let Some(include) = &self.include
            && !name.contains(include.as_str())
        {
            return false;
        }
        if let Some(exclude) = &self.exclude
            && name.contains(exclude.as_str())
        {
            return false;
        }
        true
    }
}

/// Settings for one run over a case file.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub filter: Filter,
    /// Echo each command before running it.
    pub debug: bool,
    pub platform: Platform,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            filter: Filter::default(),
            debug: false,
            platform: Platform::current(),
        }
    }
}

/// Why a case failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// JSON comparison was requested but one side does not parse.
    MalformedOutput {
        side: &'static str,
        raw: String,
        error: String,
    },
    /// The command failed to run or exited non-zero.
    UnexpectedFailure {
        detail: String,
        stdout: String,
        stderr: String,
    },
    /// The command succeeded although failure was expected.
    MissingExpectedFailure,
    StderrMismatch { got: String, wanted: String },
    /// Trimmed stdout differs from the expectation.
    OutputMismatch { expected: String, actual: String },
    /// Output was correct but the run took too long.
    TimingViolation { seconds: u64, limit: u64 },
}

impl Failure {
    /// Short classification label.
    pub fn classification(&self) -> &'static str {
        match self {
            Failure::MalformedOutput { .. } => "malformed output",
            Failure::UnexpectedFailure { .. } => "unexpected failure",
            Failure::MissingExpectedFailure => "missing expected failure",
            Failure::StderrMismatch { .. } => "stderr mismatch",
            Failure::OutputMismatch { .. } => "output mismatch",
            Failure::TimingViolation { .. } => "timing violation",
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.classification())?;
        match self {
            Failure::MalformedOutput { side, raw, error } => {
                write!(f, ": {side} is not valid JSON ({error}): {raw}")
            }
            Failure::UnexpectedFailure { detail, .. } => write!(f, ": {detail}"),
            Failure::MissingExpectedFailure => write!(f, ": command succeeded"),
            Failure::StderrMismatch { got, wanted } => {
                write!(f, ". Got {got:?}, wanted {wanted:?}.")
            }
            Failure::OutputMismatch { .. } => Ok(()),
            Failure::TimingViolation { seconds, limit } => {
                write!(f, ": completed in {seconds} seconds. Wanted at most {limit}s")
            }
        }
    }
}

/// Outcome of one declared case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Excluded by the name filter; not announced and not counted.
    Filtered,
    /// Skipped on this platform.
    Skipped,
    Passed,
    Failed(Failure),
}

/// Pass/fail counts for a run.
///
/// `total` counts executed cases only; filtered and platform-skipped cases
/// never enter it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    pub failures: usize,
    pub skipped: usize,
}

impl RunSummary {
    /// Counts contributed by a single verdict.
    pub fn of(verdict: &Verdict) -> Self {
        match verdict {
            Verdict::Filtered => Self::default(),
            Verdict::Skipped => Self {
                skipped: 1,
                ..Self::default()
            },
            Verdict::Passed => Self {
                total: 1,
                ..Self::default()
            },
            Verdict::Failed(_) => Self {
                total: 1,
                failures: 1,
                ..Self::default()
            },
        }
    }

    pub fn passed(&self) -> usize {
        self.total - self.failures
    }

    /// Whether the run should exit successfully.
    pub fn succeeded(&self) -> bool {
        self.failures == 0
    }
}

impl std::ops::Add for RunSummary {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            total: self.total + other.total,
            failures: self.failures + other.failures,
            skipped: self.skipped + other.skipped,
        }
    }
}

/// Run every case in `file`, writing the report to `out`.
pub fn run_cases<W: Write>(
    file: &CaseFile,
    options: &RunOptions,
    out: &mut W,
) -> std::io::Result<RunSummary> {
    let mut summary = RunSummary::default();
    for case in &file.cases {
        let verdict = run_case(case, file.executable.as_deref(), options, out)?;
        summary = summary + RunSummary::of(&verdict);
    }

    writeln!(
        out,
        "{} of {} succeeded.",
        summary.passed(),
        summary.total
    )?;
    if summary.skipped > 0 {
        writeln!(out, "{} skipped.", summary.skipped)?;
    }
    Ok(summary)
}

/// Run and report a single case.
pub fn run_case<W: Write>(
    case: &TestCase,
    executable: Option<&str>,
    options: &RunOptions,
    out: &mut W,
) -> std::io::Result<Verdict> {
    if !options.filter.allows(&case.name) {
        log::debug!("filtered out: {}", case.name);
        return Ok(Verdict::Filtered);
    }

    writeln!(out, "STARTING: {}", case.name)?;
    if options.debug {
        writeln!(out, "{}", case.command)?;
    }

    if case.skip_on_windows && options.platform == Platform::Windows {
        writeln!(out, "  SKIPPED\n")?;
        return Ok(Verdict::Skipped);
    }

    let command = CommandLine {
        executable,
        shell: case.shell,
        no_translate: case.no_translate,
        ..CommandLine::new(&case.command)
    };
    let outcome = executor::run(&command, options.platform);

    let verdict = match classify(case, outcome, options.platform) {
        Ok(()) => Verdict::Passed,
        Err(failure) => Verdict::Failed(failure),
    };
    report(&verdict, out)?;
    Ok(verdict)
}

fn report<W: Write>(verdict: &Verdict, out: &mut W) -> std::io::Result<()> {
    match verdict {
        Verdict::Filtered | Verdict::Skipped => {}
        Verdict::Passed => writeln!(out, "  SUCCESS\n")?,
        Verdict::Failed(failure) => {
            writeln!(out, "  FAILURE: {failure}")?;
            match failure {
                Failure::UnexpectedFailure { stdout, stderr, .. } => {
                    if !stdout.is_empty() {
                        writeln!(out, "  stdout:\n{stdout}")?;
                    }
                    if !stderr.is_empty() {
                        writeln!(out, "  stderr:\n{stderr}")?;
                    }
                }
                Failure::OutputMismatch { expected, actual } => {
                    write!(out, "{}", compare::render_diff(expected, actual))?;
                }
                _ => {}
            }
            writeln!(out)?;
        }
    }
    Ok(())
}

/// Decide whether an execution outcome satisfies a case.
///
/// Checks run in a fixed order and the first failing one wins: exit status,
/// stderr, stdout (after optional JSON canonicalization and path
/// normalization), then the time limit.
pub fn classify(
    case: &TestCase,
    outcome: Result<ExecutionResult, ExecError>,
    platform: Platform,
) -> Result<(), Failure> {
    let result = match outcome {
        Ok(result) if result.succeeded() => {
            if case.expect_failure {
                return Err(Failure::MissingExpectedFailure);
            }
            result
        }
        Ok(result) => {
            if !case.expect_failure {
                return Err(Failure::UnexpectedFailure {
                    detail: result.status_description(),
                    stdout: result.stdout_text(),
                    stderr: result.stderr_text(),
                });
            }
            result
        }
        // Not being able to launch counts as a failed run
        Err(ExecError::Spawn { program, source }) if case.expect_failure => {
            log::debug!("{program:?} did not start ({source}), as the case expects failure");
            ExecutionResult::default()
        }
        Err(e) => {
            return Err(Failure::UnexpectedFailure {
                detail: e.to_string(),
                stdout: String::new(),
                stderr: String::new(),
            });
        }
    };

    if let Some(wanted) = &case.expected_stderr {
        let got = result.stderr_text();
        if &got != wanted {
            return Err(Failure::StderrMismatch {
                got,
                wanted: wanted.clone(),
            });
        }
    }

    if let Some(expected) = &case.expected_stdout {
        let mut actual = result.stdout_text();
        let mut expected = expected.clone();

        if case.sort_as_json {
            actual = compare::canonicalize_json(&actual).map_err(|e| Failure::MalformedOutput {
                side: "output",
                raw: actual.clone(),
                error: e.to_string(),
            })?;
            expected =
                compare::canonicalize_json(&expected).map_err(|e| Failure::MalformedOutput {
                    side: "expected output",
                    raw: expected.clone(),
                    error: e.to_string(),
                })?;
        }

        let expected = compare::normalize_expected_paths(&expected, platform);
        if !compare::outputs_match(&expected, &actual) {
            return Err(Failure::OutputMismatch {
                expected: expected.trim().to_string(),
                actual: actual.trim().to_string(),
            });
        }
    }

    if let Some(limit) = case.time_limit_seconds {
        let seconds = result.duration.as_secs();
        if seconds > limit {
            return Err(Failure::TimingViolation { seconds, limit });
        }
    }

    Ok(())
}
