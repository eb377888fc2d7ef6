//! Terraform process driver.
//!
//! [`Terraform`] wraps the `terraform` binary for one working directory. It
//! accumulates input variables and replays them as discrete `-var` arguments
//! on `plan` and `destroy`; `apply` only ever runs a saved plan file, so it
//! never takes variables of its own.
//!
//! Every operation comes in a buffered flavour, which returns the tool's
//! combined output inside the error on failure, and a streaming flavour,
//! which forwards output to an [`OutputSink`] while the tool runs.

mod backend_config;
mod modules;

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::process::{CommandSpec, ExitCode, ProcessError, ProcessOutput, ProcessRunner};
use crate::sink::OutputSink;
use crate::variables::Variables;

pub use backend_config::{render_backend_config, write_backend_config};
pub use modules::{CopyError, copy_modules};

/// Program name looked up on `PATH`.
pub const TERRAFORM: &str = "terraform";

/// Terraform subcommands, used to label failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
  Version,
  Init,
  Plan,
  Apply,
  Destroy,
  Output,
}

impl fmt::Display for Operation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Operation::Version => "version",
      Operation::Init => "init",
      Operation::Plan => "plan",
      Operation::Apply => "apply",
      Operation::Destroy => "destroy",
      Operation::Output => "output",
    };
    f.write_str(name)
  }
}

/// Errors from driving terraform.
#[derive(Debug, Error)]
pub enum TerraformError {
  #[error(
    "terraform was not found on PATH\n\
     Install Terraform 1.5 or newer (https://developer.hashicorp.com/terraform/install) and try again"
  )]
  NotInstalled,

  #[error("terraform {operation} failed ({exit}):\n{output}")]
  Failed {
    operation: Operation,
    exit: ExitCode,
    output: String,
  },

  #[error("terraform {operation} failed ({exit}), see the output above")]
  StreamFailed { operation: Operation, exit: ExitCode },

  #[error("failed to decode terraform output: {0}")]
  Decode(#[source] serde_json::Error),

  #[error(transparent)]
  Process(ProcessError),
}

impl From<ProcessError> for TerraformError {
  fn from(err: ProcessError) -> Self {
    match err {
      ProcessError::NotFound { .. } => TerraformError::NotInstalled,
      other => TerraformError::Process(other),
    }
  }
}

/// A terraform working directory plus its accumulated variables.
pub struct Terraform {
  work_dir: PathBuf,
  runner: Arc<dyn ProcessRunner>,
  vars: Variables,
}

impl Terraform {
  pub fn new(work_dir: impl Into<PathBuf>, runner: Arc<dyn ProcessRunner>) -> Self {
    Self {
      work_dir: work_dir.into(),
      runner,
      vars: Variables::new(),
    }
  }

  pub fn work_dir(&self) -> &Path {
    &self.work_dir
  }

  /// Sets one variable, replacing any earlier value for `key`.
  pub fn set_var(&mut self, key: impl Into<String>, value: impl Into<Value>) {
    self.vars.insert(key.into(), value.into());
  }

  /// Merges `vars` in; later keys win.
  pub fn set_vars(&mut self, vars: Variables) {
    self.vars.extend(vars);
  }

  pub fn vars(&self) -> &Variables {
    &self.vars
  }

  /// Verifies terraform can be executed and returns its version line.
  pub async fn check_installed(&self) -> Result<String, TerraformError> {
    let output = self.run(Operation::Version, self.command(["version"])).await?;
    Ok(output.stdout.lines().next().unwrap_or_default().trim().to_string())
  }

  /// Initializes providers and the configured backend.
  pub async fn init(&self) -> Result<(), TerraformError> {
    let spec = self.command(["init", "-input=false", "-no-color"]);
    self.run(Operation::Init, spec).await.map(|_| ())
  }

  /// Computes a plan and saves it to `plan_file`.
  pub async fn plan(&self, plan_file: &Path) -> Result<(), TerraformError> {
    self.run(Operation::Plan, self.plan_command(plan_file)).await.map(|_| ())
  }

  pub async fn streaming_plan(&self, plan_file: &Path, sink: &mut dyn OutputSink) -> Result<(), TerraformError> {
    self.stream(Operation::Plan, self.plan_command(plan_file), sink).await
  }

  /// Applies a plan previously saved by [`plan`](Self::plan).
  pub async fn apply(&self, plan_file: &Path) -> Result<(), TerraformError> {
    self.run(Operation::Apply, self.apply_command(plan_file)).await.map(|_| ())
  }

  pub async fn streaming_apply(&self, plan_file: &Path, sink: &mut dyn OutputSink) -> Result<(), TerraformError> {
    self.stream(Operation::Apply, self.apply_command(plan_file), sink).await
  }

  /// Destroys every resource managed by this configuration.
  pub async fn destroy(&self) -> Result<(), TerraformError> {
    self.run(Operation::Destroy, self.destroy_command()).await.map(|_| ())
  }

  pub async fn streaming_destroy(&self, sink: &mut dyn OutputSink) -> Result<(), TerraformError> {
    self.stream(Operation::Destroy, self.destroy_command(), sink).await
  }

  /// Reads root module outputs as `name -> value`.
  pub async fn output(&self) -> Result<BTreeMap<String, Value>, TerraformError> {
    let output = self
      .run(Operation::Output, self.command(["output", "-json", "-no-color"]))
      .await?;
    parse_outputs(&output.stdout).map_err(TerraformError::Decode)
  }

  fn command<I, S>(&self, args: I) -> CommandSpec
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    CommandSpec::new(TERRAFORM)
      .args(args)
      .current_dir(&self.work_dir)
      .env("TF_IN_AUTOMATION", "1")
  }

  fn plan_command(&self, plan_file: &Path) -> CommandSpec {
    self
      .command(["plan", "-input=false", "-no-color"])
      .arg(format!("-out={}", plan_file.display()))
      .args(self.var_args())
  }

  fn apply_command(&self, plan_file: &Path) -> CommandSpec {
    self
      .command(["apply", "-input=false", "-no-color", "-auto-approve"])
      .arg(plan_file.display().to_string())
  }

  fn destroy_command(&self) -> CommandSpec {
    self
      .command(["destroy", "-input=false", "-no-color", "-auto-approve"])
      .args(self.var_args())
  }

  fn var_args(&self) -> Vec<String> {
    self
      .vars
      .iter()
      .flat_map(|(key, value)| ["-var".to_string(), format!("{}={}", key, render_var(value))])
      .collect()
  }

  async fn run(&self, operation: Operation, spec: CommandSpec) -> Result<ProcessOutput, TerraformError> {
    info!(%operation, work_dir = %self.work_dir.display(), "running terraform");
    let output = self.runner.run(&spec).await?;
    if !output.success() {
      return Err(TerraformError::Failed {
        operation,
        exit: output.exit,
        output: output.combined,
      });
    }
    debug!(%operation, "terraform succeeded");
    Ok(output)
  }

  async fn stream(
    &self,
    operation: Operation,
    spec: CommandSpec,
    sink: &mut dyn OutputSink,
  ) -> Result<(), TerraformError> {
    info!(%operation, work_dir = %self.work_dir.display(), "running terraform (streaming)");
    let exit = self.runner.run_streaming(&spec, sink).await?;
    if !exit.success() {
      return Err(TerraformError::StreamFailed { operation, exit });
    }
    Ok(())
  }
}

/// Renders a variable value for `-var name=value`.
///
/// Scalars are passed raw; lists and maps are JSON, which terraform parses
/// as an HCL expression.
pub fn render_var(value: &Value) -> String {
  match value {
    Value::Null => String::new(),
    Value::String(s) => s.clone(),
    Value::Bool(b) => b.to_string(),
    Value::Number(n) => n.to_string(),
    Value::Array(_) | Value::Object(_) => value.to_string(),
  }
}

#[derive(Deserialize)]
struct OutputEntry {
  #[serde(default)]
  value: Value,
}

/// Flattens `terraform output -json` (`{name: {value, type, sensitive}}`) to `name -> value`.
pub fn parse_outputs(json: &str) -> Result<BTreeMap<String, Value>, serde_json::Error> {
  if json.trim().is_empty() {
    return Ok(BTreeMap::new());
  }
  let entries: BTreeMap<String, OutputEntry> = serde_json::from_str(json)?;
  Ok(entries.into_iter().map(|(name, entry)| (name, entry.value)).collect())
}
