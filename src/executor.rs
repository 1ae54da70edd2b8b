//! Command execution.
//!
//! Turns a declared command line into exactly one child process, run to
//! completion in the current directory with stdout and stderr captured.
//! Dispatch is resolved against a [`Platform`] first, so the rewriting rules
//! can be exercised without running on that platform.

use std::fmt;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

/// Suffix appended to the executable placeholder on Windows.
const EXE_SUFFIX: &str = ".exe";

/// The platform a command is resolved for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// Forward-slash paths; shell is `bash`.
    Unix,
    /// Backslash paths; commands are rewritten before running.
    Windows,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Unix
        }
    }

    /// Whether the native path separator is a backslash.
    pub fn uses_backslash(self) -> bool {
        matches!(self, Platform::Windows)
    }

    fn shell(self) -> (&'static str, &'static str) {
        match self {
            Platform::Unix => ("bash", "-c"),
            Platform::Windows => ("cmd", "/C"),
        }
    }
}

/// Error type for command execution.
#[derive(Debug)]
pub enum ExecError {
    /// The command line could not be split into words.
    Split(shell_words::ParseError),
    /// The command line has no words.
    EmptyCommand,
    /// The process could not be started.
    Spawn {
        program: String,
        source: std::io::Error,
    },
}

impl fmt::Display for ExecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecError::Split(e) => write!(f, "cannot parse command: {e}"),
            ExecError::EmptyCommand => write!(f, "empty command"),
            ExecError::Spawn { program, source } => {
                write!(f, "failed to spawn {program:?}: {source}")
            }
        }
    }
}

impl std::error::Error for ExecError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExecError::Split(e) => Some(e),
            ExecError::EmptyCommand => None,
            ExecError::Spawn { source, .. } => Some(source),
        }
    }
}

impl From<shell_words::ParseError> for ExecError {
    fn from(e: shell_words::ParseError) -> Self {
        ExecError::Split(e)
    }
}

/// A command as declared, before platform resolution.
#[derive(Debug, Clone, Copy)]
pub struct CommandLine<'a> {
    /// The shell-like command line.
    pub line: &'a str,
    /// Executable placeholder that gets the `.exe` suffix on Windows.
    pub executable: Option<&'a str>,
    /// Run through the shell even without a pipe.
    pub shell: bool,
    /// Skip the Windows rewrite.
    pub no_translate: bool,
}

impl<'a> CommandLine<'a> {
    pub fn new(line: &'a str) -> Self {
        Self {
            line,
            executable: None,
            shell: false,
            no_translate: false,
        }
    }

    /// Resolve into a concrete invocation for `platform`.
    pub fn resolve(&self, platform: Platform) -> Result<Invocation, ExecError> {
        let words = shell_words::split(self.line)?;
        if words.is_empty() {
            return Err(ExecError::EmptyCommand);
        }

        if platform.uses_backslash() && !self.no_translate {
            let mut words = words.into_iter().map(|w| self.translate_word(&w));
            let program = words.next().ok_or(ExecError::EmptyCommand)?;
            return Ok(Invocation::Direct {
                program,
                args: words.collect(),
            });
        }

        if self.shell || self.line.contains('|') {
            let (program, flag) = platform.shell();
            return Ok(Invocation::Shell {
                program,
                flag,
                line: self.line.to_string(),
            });
        }

        let mut words = words.into_iter();
        let program = words.next().ok_or(ExecError::EmptyCommand)?;
        Ok(Invocation::Direct {
            program,
            args: words.collect(),
        })
    }

    fn translate_word(&self, word: &str) -> String {
        let word = match self.executable {
            Some(exe) if !exe.is_empty() => word.replace(exe, &format!("{exe}{EXE_SUFFIX}")),
            _ => word.to_string(),
        };
        word.replace('/', "\\")
    }
}

/// A fully resolved process invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    /// Run the program with the given arguments, no shell involved.
    Direct { program: String, args: Vec<String> },
    /// Hand the untouched line to a shell interpreter.
    Shell {
        program: &'static str,
        flag: &'static str,
        line: String,
    },
}

impl Invocation {
    fn program(&self) -> &str {
        match self {
            Invocation::Direct { program, .. } => program.as_str(),
            Invocation::Shell { program, .. } => *program,
        }
    }

    fn to_command(&self) -> Command {
        match self {
            Invocation::Direct { program, args } => {
                let mut c = Command::new(program);
                c.args(args);
                c
            }
            Invocation::Shell {
                program,
                flag,
                line,
            } => {
                let mut c = Command::new(program);
                c.arg(flag);
                c.arg(line);
                c
            }
        }
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Invocation::Direct { program, args } => {
                write!(f, "{program}")?;
                for arg in args {
                    write!(f, " {arg:?}")?;
                }
                Ok(())
            }
            Invocation::Shell {
                program,
                flag,
                line,
            } => write!(f, "{program} {flag} {line:?}"),
        }
    }
}

/// Captured outcome of one process run.
#[derive(Debug, Clone, Default)]
pub struct ExecutionResult {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// Exit code if the process exited normally.
    pub exit_code: Option<i32>,
    /// Signal number if the process was terminated by a signal (Unix only).
    pub signal: Option<i32>,
    pub duration: Duration,
}

impl ExecutionResult {
    /// Whether the process exited with status zero.
    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
    }

    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    /// Human-readable exit status.
    pub fn status_description(&self) -> String {
        match (self.exit_code, self.signal) {
            (Some(code), _) => format!("exit code {code}"),
            (None, Some(signal)) => format!("terminated by signal {signal}"),
            (None, None) => "unknown exit status".to_string(),
        }
    }
}

/// Resolve `command` for `platform` and run it.
pub fn run(command: &CommandLine<'_>, platform: Platform) -> Result<ExecutionResult, ExecError> {
    let invocation = command.resolve(platform)?;
    log::debug!("resolved {:?} to {invocation}", command.line);
    execute(&invocation)
}

/// Run an invocation to completion, capturing its output.
///
/// A non-zero exit is not an error here; callers branch on
/// [`ExecutionResult::succeeded`].
pub fn execute(invocation: &Invocation) -> Result<ExecutionResult, ExecError> {
    let mut cmd = invocation.to_command();
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    let start = Instant::now();
    let output = cmd.output().map_err(|source| ExecError::Spawn {
        program: invocation.program().to_string(),
        source,
    })?;
    let duration = start.elapsed();

    #[cfg(unix)]
    let signal = {
        use std::os::unix::process::ExitStatusExt;
        output.status.signal()
    };
    #[cfg(not(unix))]
    let signal = None;

    Ok(ExecutionResult {
        stdout: output.stdout,
        stderr: output.stderr,
        exit_code: output.status.code(),
        signal,
        duration,
    })
}
