//! External command execution.
//!
//! Everything that shells out (git, build tools, editor CLIs) goes through the
//! [`Executor`] trait so callers can be unit-tested with a scripted executor.
use anyhow::{Context, Result};
use std::fmt;
use std::path::Path;
use std::process::{Command, Output};

/// Result of a command execution.
#[derive(Debug, Clone, Default)]
pub struct ExecResult {
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Whether the process exited with status zero.
    pub success: bool,
    /// Exit code, `None` when the process was killed by a signal.
    pub code: Option<i32>,
}

impl ExecResult {
    /// Stdout followed by stderr, trimmed, skipping whichever is empty.
    ///
    /// Git writes most of its progress and diagnostics to stderr, so callers
    /// that surface "the output" of a command want both streams.
    #[must_use]
    pub fn combined(&self) -> String {
        let out = self.stdout.trim();
        let err = self.stderr.trim();
        match (out.is_empty(), err.is_empty()) {
            (true, _) => err.to_string(),
            (false, true) => out.to_string(),
            (false, false) => format!("{out}\n{err}"),
        }
    }
}

impl From<Output> for ExecResult {
    fn from(output: Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
            code: output.status.code(),
        }
    }
}

/// Run external commands and capture their output.
///
/// A non-zero exit is not an error: the result is returned so the caller can
/// inspect the exit status and captured output itself. Only a program that
/// cannot be launched at all fails.
pub trait Executor: Send + Sync + fmt::Debug {
    /// Run a command, allowing failure.
    ///
    /// # Errors
    ///
    /// Returns an error only if the program cannot be launched.
    fn run_unchecked(&self, program: &str, args: &[&str]) -> Result<ExecResult>;

    /// Run a command in `dir`, allowing failure.
    ///
    /// # Errors
    ///
    /// Returns an error only if the program cannot be launched.
    fn run_in_unchecked(&self, dir: &Path, program: &str, args: &[&str]) -> Result<ExecResult>;

    /// Check if a program is available on `PATH`.
    fn which(&self, program: &str) -> bool;
}

/// Production [`Executor`] backed by [`std::process::Command`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemExecutor;

fn execute(mut cmd: Command, label: &str) -> Result<ExecResult> {
    let output = cmd
        .output()
        .with_context(|| format!("failed to execute: {label}"))?;
    Ok(ExecResult::from(output))
}

impl Executor for SystemExecutor {
    fn run_unchecked(&self, program: &str, args: &[&str]) -> Result<ExecResult> {
        let mut cmd = Command::new(program);
        cmd.args(args);
        execute(cmd, program)
    }

    fn run_in_unchecked(&self, dir: &Path, program: &str, args: &[&str]) -> Result<ExecResult> {
        let mut cmd = Command::new(program);
        cmd.args(args).current_dir(dir);
        execute(cmd, &format!("{program} in {}", dir.display()))
    }

    fn which(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }
}
