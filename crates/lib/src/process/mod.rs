//! External process execution.
//!
//! Everything this crate provisions goes through an external tool
//! (`terraform`, `aws`). [`ProcessRunner`] is the seam between the lifecycle
//! logic and the operating system, so the driver and bootstrapper can be
//! exercised against a scripted runner instead of real subprocesses.

mod system;

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use crate::sink::OutputSink;

pub use system::SystemRunner;

/// A program invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
  pub program: String,
  pub args: Vec<String>,
  pub cwd: Option<PathBuf>,
  pub env: Vec<(String, String)>,
}

impl CommandSpec {
  pub fn new(program: impl Into<String>) -> Self {
    Self {
      program: program.into(),
      args: Vec::new(),
      cwd: None,
      env: Vec::new(),
    }
  }

  pub fn arg(mut self, arg: impl Into<String>) -> Self {
    self.args.push(arg.into());
    self
  }

  pub fn args<I, S>(mut self, args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.args.extend(args.into_iter().map(Into::into));
    self
  }

  pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
    self.cwd = Some(dir.into());
    self
  }

  pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.env.push((key.into(), value.into()));
    self
  }
}

impl fmt::Display for CommandSpec {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.program)?;
    for arg in &self.args {
      write!(f, " {}", arg)?;
    }
    Ok(())
  }
}

/// How a process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(pub Option<i32>);

impl ExitCode {
  pub const SUCCESS: ExitCode = ExitCode(Some(0));

  pub fn success(self) -> bool {
    self.0 == Some(0)
  }
}

impl fmt::Display for ExitCode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.0 {
      Some(code) => write!(f, "exit code {}", code),
      None => write!(f, "terminated by signal"),
    }
  }
}

/// Captured result of a buffered run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
  pub exit: ExitCode,
  /// Standard output alone, for structured decoding.
  pub stdout: String,
  /// Standard output and error interleaved in arrival order.
  pub combined: String,
}

impl ProcessOutput {
  pub fn success(&self) -> bool {
    self.exit.success()
  }
}

/// Failures to run a process at all. A non-zero exit is not one of these.
#[derive(Debug, Error)]
pub enum ProcessError {
  #[error("'{program}' was not found on PATH")]
  NotFound { program: String },

  #[error("failed to run '{program}': {source}")]
  Io {
    program: String,
    #[source]
    source: std::io::Error,
  },
}

/// Runs external programs.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
  /// Runs to completion and returns everything the process printed.
  async fn run(&self, spec: &CommandSpec) -> Result<ProcessOutput, ProcessError>;

  /// Runs to completion, forwarding stdout and stderr lines to `sink` as
  /// they are produced.
  async fn run_streaming(&self, spec: &CommandSpec, sink: &mut dyn OutputSink) -> Result<ExitCode, ProcessError>;
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn builder_collects_arguments() {
    let spec = CommandSpec::new("terraform")
      .arg("plan")
      .args(["-input=false", "-out=tfplan"])
      .current_dir("/tmp/work")
      .env("TF_IN_AUTOMATION", "1");

    assert_eq!(spec.args, vec!["plan", "-input=false", "-out=tfplan"]);
    assert_eq!(spec.cwd, Some(PathBuf::from("/tmp/work")));
    assert_eq!(spec.to_string(), "terraform plan -input=false -out=tfplan");
  }

  #[test]
  fn exit_code_display() {
    assert!(ExitCode::SUCCESS.success());
    assert!(!ExitCode(Some(2)).success());
    assert!(!ExitCode(None).success());
    assert_eq!(ExitCode(Some(2)).to_string(), "exit code 2");
  }
}
