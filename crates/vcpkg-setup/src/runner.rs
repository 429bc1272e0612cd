//! External command execution with output capture.

use crate::error::SetupError;
use crate::Result;
use std::process::{Command, Stdio};
use tracing::{debug, error, info};

/// A single command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Command to execute (first element is the executable).
    pub argv: Vec<String>,

    /// Human-readable description for the log.
    pub description: String,

    /// Treat a non-zero exit as an error instead of a plain result.
    pub strict: bool,
}

impl CommandSpec {
    pub fn new(argv: Vec<String>, description: impl Into<String>) -> Self {
        Self {
            argv,
            description: description.into(),
            strict: false,
        }
    }

    /// Fail with [`SetupError::CommandFailed`] on a non-zero exit.
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    /// Command line joined with spaces, for logging.
    pub fn display(&self) -> String {
        self.argv.join(" ")
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Captured stdout.
    pub stdout: String,

    /// Captured stderr.
    pub stderr: String,

    /// Exit code (-1 when the process was killed by a signal).
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Process boundary. Implemented by [`SystemRunner`]; tests script it.
pub trait CommandRunner {
    fn execute(&self, spec: &CommandSpec) -> Result<CommandOutput>;
}

/// Runs commands as child processes and waits for them to finish.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn execute(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        let (exe, args) = spec
            .argv
            .split_first()
            .ok_or_else(|| SetupError::InvalidConfig("empty command".to_string()))?;

        let output = Command::new(exe)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| SetupError::Spawn {
                command: spec.display(),
                source,
            })?;

        let result = CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
        };

        if spec.strict && !result.success() {
            log_output(&result);
            return Err(SetupError::CommandFailed {
                command: spec.display(),
                exit_code: result.exit_code,
            });
        }

        Ok(result)
    }
}

fn log_output(output: &CommandOutput) {
    if !output.stdout.is_empty() {
        info!(stdout = %output.stdout.trim_end(), "command stdout");
    }
    if !output.stderr.is_empty() {
        info!(stderr = %output.stderr.trim_end(), "command stderr");
    }
}

/// Run a command and reduce the outcome to pass/fail.
///
/// Logs the command and whatever it printed. Spawn failures, strict-mode
/// failures, and non-zero exits are all logged and reported as `false`;
/// nothing propagates, so the caller owns the retry policy.
pub fn run_command(runner: &dyn CommandRunner, spec: &CommandSpec) -> bool {
    info!(description = %spec.description, command = %spec.display(), "running command");

    match runner.execute(spec) {
        Ok(output) => {
            log_output(&output);
            if output.success() {
                info!(outcome = "success", "{} succeeded", spec.description);
                true
            } else {
                error!(exit_code = output.exit_code, "{} failed", spec.description);
                false
            }
        }
        Err(err @ SetupError::CommandFailed { .. }) => {
            error!(error = %err, "{} failed", spec.description);
            false
        }
        Err(err) => {
            error!(error = %err, "exception while running {}", spec.description);
            debug!(?err, "command error detail");
            false
        }
    }
}
