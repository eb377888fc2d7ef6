//! Types for the deployment lifecycle.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::backend::BootstrapError;
use crate::identity::{AwsCliIdentity, IdentityError, IdentityProvider};
use crate::platform::paths;
use crate::process::{ProcessRunner, SystemRunner};
use crate::records::{JsonRecordStore, RecordStore};
use crate::sink::OutputSink;
use crate::terraform::{CopyError, TerraformError};

/// Output key holding the public API URL.
pub const API_URL_OUTPUT: &str = "api_url";
/// Output key holding the load balancer's DNS name.
pub const LOAD_BALANCER_OUTPUT: &str = "load_balancer_dns";

/// Where a [`Deployment`](super::Deployment) is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentState {
  Created,
  Prepared,
  Planned,
  Deployed,
  Destroyed,
  CleanedUp,
}

impl fmt::Display for DeploymentState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      DeploymentState::Created => "created",
      DeploymentState::Prepared => "prepared",
      DeploymentState::Planned => "planned",
      DeploymentState::Deployed => "deployed",
      DeploymentState::Destroyed => "destroyed",
      DeploymentState::CleanedUp => "cleaned up",
    };
    f.write_str(name)
  }
}

/// Per-run settings.
#[derive(Debug, Clone)]
pub struct DeployOptions {
  /// Defaults to `prod`.
  pub environment: Option<String>,
  /// Overrides the identity provider's default region.
  pub region: Option<String>,
  /// Overrides the deployer name derived from the caller ARN.
  pub owner: Option<String>,
  /// Terraform module tree copied into the working directory.
  pub modules_dir: PathBuf,
  /// Scratch root for the generated working directory.
  pub work_root: PathBuf,
  /// Use this working directory instead of generating one. Cleanup still
  /// refuses to remove it unless its name carries the deployment sentinel.
  pub work_dir: Option<PathBuf>,
  /// Forward terraform output live instead of buffering it.
  pub stream_output: bool,
  /// Prebuilt container image reference passed as `container_image`.
  pub image: Option<String>,
}

impl Default for DeployOptions {
  fn default() -> Self {
    Self {
      environment: None,
      region: None,
      owner: None,
      modules_dir: paths::modules_dir(),
      work_root: paths::work_root(),
      work_dir: None,
      stream_output: false,
      image: None,
    }
  }
}

/// External collaborators a deployment talks to.
pub struct DeployContext {
  pub runner: Arc<dyn ProcessRunner>,
  pub identity: Arc<dyn IdentityProvider>,
  pub records: Arc<dyn RecordStore>,
  pub sink: Box<dyn OutputSink>,
}

impl DeployContext {
  /// Real subprocesses, the AWS CLI and the default record file.
  pub fn system(sink: Box<dyn OutputSink>) -> Self {
    let runner: Arc<dyn ProcessRunner> = Arc::new(SystemRunner);
    Self {
      identity: Arc::new(AwsCliIdentity::new(runner.clone())),
      runner,
      records: Arc::new(JsonRecordStore::default_store()),
      sink,
    }
  }
}

/// What a successful deploy produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentResult {
  pub api_url: String,
  pub load_balancer_dns: String,
  /// `<app>-<environment>-<account>`
  pub deployment_id: String,
  pub region: String,
  pub account_id: String,
  pub deployed_at: DateTime<Utc>,
}

impl DeploymentResult {
  /// Builds a result from flattened terraform outputs. Missing or
  /// non-string outputs leave the field empty.
  pub fn from_outputs(
    outputs: &BTreeMap<String, Value>,
    app_name: &str,
    environment: &str,
    account_id: &str,
    region: &str,
    deployed_at: DateTime<Utc>,
  ) -> Self {
    let text = |key: &str| {
      outputs
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
    };
    Self {
      api_url: text(API_URL_OUTPUT),
      load_balancer_dns: text(LOAD_BALANCER_OUTPUT),
      deployment_id: format!("{}-{}-{}", app_name, environment, account_id),
      region: region.to_string(),
      account_id: account_id.to_string(),
      deployed_at,
    }
  }
}

/// Lifecycle phases, used to label terraform failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
  Plan,
  Deploy,
  Destroy,
}

impl fmt::Display for Phase {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Phase::Plan => "plan",
      Phase::Deploy => "deploy",
      Phase::Destroy => "destroy",
    };
    f.write_str(name)
  }
}

#[derive(Debug, Error)]
pub enum DeployError {
  #[error("failed to resolve cloud identity: {0}")]
  Identity(#[source] IdentityError),

  #[error("failed to resolve default region: {0}")]
  Region(#[source] IdentityError),

  #[error("invalid {field} '{value}': must be lowercase alphanumeric with hyphens")]
  InvalidName { field: &'static str, value: String },

  #[error("cannot {action} a deployment that is {state}")]
  InvalidState {
    action: &'static str,
    state: DeploymentState,
  },

  #[error("failed to create working directory {}: {source}", path.display())]
  WorkDir { path: PathBuf, source: std::io::Error },

  #[error("failed to stage modules: {0}")]
  Modules(#[from] CopyError),

  #[error("failed to write backend configuration in {}: {source}", path.display())]
  BackendConfig { path: PathBuf, source: std::io::Error },

  #[error("failed to bootstrap state backend: {0}")]
  Bootstrap(#[from] BootstrapError),

  #[error("{phase} failed: {source}")]
  Terraform {
    phase: Phase,
    #[source]
    source: TerraformError,
  },

  #[error("failed to remove working directory {}: {source}", path.display())]
  Cleanup { path: PathBuf, source: std::io::Error },
}
