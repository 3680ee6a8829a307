//! Runs a chosen command through the user's shell.
//!
//! A failing command is a normal outcome here: it is reported back as an
//! [`ExecutionReport`] for display, never as an error.

use anyhow::Result;
use async_trait::async_trait;
use std::process::{Output, Stdio};
use tokio::process::Command;
use tracing::{info, warn};

/// Shown when a command succeeds without writing anything to stdout.
pub const NO_OUTPUT_NOTICE: &str = "Command executed successfully, but produced no output.";

/// Outcome of running one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionReport {
    pub success: bool,
    /// `None` when the process was killed by a signal or never started.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ExecutionReport {
    fn from_output(output: &Output) -> Self {
        Self {
            success: output.status.success(),
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }

    fn spawn_failure(err: &anyhow::Error) -> Self {
        Self {
            success: false,
            exit_code: None,
            stdout: String::new(),
            stderr: format!("failed to start command: {}", err),
        }
    }

    /// What to print for this outcome.
    pub fn display_text(&self) -> String {
        if !self.success {
            let detail = self.stderr.trim();
            return match (detail.is_empty(), self.exit_code) {
                (false, _) => format!("Error: {}", detail),
                (true, Some(code)) => format!("Error: command exited with status {}", code),
                (true, None) => "Error: command terminated by a signal".to_string(),
            };
        }
        if self.stdout.trim().is_empty() {
            NO_OUTPUT_NOTICE.to_string()
        } else {
            self.stdout.trim_end().to_string()
        }
    }
}

/// Trait for running shell command lines.
///
/// This abstraction enables testing without spawning real processes.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run_shell(&self, command_line: &str) -> Result<Output>;
}

/// Runs command lines with `sh -c` (`cmd /C` on Windows).
pub struct ShellProcessRunner;

#[async_trait]
impl ProcessRunner for ShellProcessRunner {
    async fn run_shell(&self, command_line: &str) -> Result<Output> {
        let mut cmd = if cfg!(windows) {
            let mut cmd = Command::new("cmd");
            cmd.arg("/C");
            cmd
        } else {
            let mut cmd = Command::new("sh");
            cmd.arg("-c");
            cmd
        };
        // output() would otherwise hand the child a null stdin
        cmd.arg(command_line).stdin(Stdio::inherit());
        Ok(cmd.output().await?)
    }
}

pub struct Executor<R: ProcessRunner = ShellProcessRunner> {
    runner: R,
}

impl Executor {
    pub fn new() -> Self {
        Self::with_runner(ShellProcessRunner)
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: ProcessRunner> Executor<R> {
    pub fn with_runner(runner: R) -> Self {
        Self { runner }
    }

    /// Run `command_line` to completion and capture its output.
    pub async fn execute(&self, command_line: &str) -> ExecutionReport {
        info!("Executing: {}", command_line);
        match self.runner.run_shell(command_line).await {
            Ok(output) => {
                let report = ExecutionReport::from_output(&output);
                if !report.success {
                    warn!("Command exited with {:?}", report.exit_code);
                }
                report
            }
            Err(e) => {
                warn!("Could not start command: {}", e);
                ExecutionReport::spawn_failure(&e)
            }
        }
    }
}
