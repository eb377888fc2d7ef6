//! Caller identity and default region.
//!
//! The orchestrator only needs to know which account it is deploying into
//! and which region to default to. [`IdentityProvider`] keeps that behind a
//! trait; [`AwsCliIdentity`] answers through the `aws` CLI and the standard
//! AWS environment variables.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::consts::{AWS_CLI, DEFAULT_REGION};
use crate::process::{CommandSpec, ExitCode, ProcessError, ProcessRunner};

/// Region variables consulted in order.
pub const REGION_ENV_VARS: [&str; 2] = ["AWS_REGION", "AWS_DEFAULT_REGION"];

/// The principal the cloud credentials resolve to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerIdentity {
  #[serde(rename = "Account")]
  pub account_id: String,
  #[serde(rename = "Arn")]
  pub arn: String,
  #[serde(rename = "UserId")]
  pub user_id: String,
}

#[derive(Debug, Error)]
pub enum IdentityError {
  #[error(
    "the aws CLI was not found on PATH\n\
     Install AWS CLI v2 and run 'aws configure' to set up credentials"
  )]
  AwsCliMissing,

  #[error("could not resolve cloud credentials ({exit}):\n{output}")]
  Credentials { exit: ExitCode, output: String },

  #[error("failed to decode caller identity: {0}")]
  Decode(#[source] serde_json::Error),

  #[error("caller identity has an empty account id")]
  EmptyAccount,

  #[error(transparent)]
  Process(ProcessError),
}

impl From<ProcessError> for IdentityError {
  fn from(err: ProcessError) -> Self {
    match err {
      ProcessError::NotFound { .. } => IdentityError::AwsCliMissing,
      other => IdentityError::Process(other),
    }
  }
}

/// Resolves who is deploying and where by default.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
  async fn current_identity(&self) -> Result<CallerIdentity, IdentityError>;

  /// The region to use when none is requested. Never empty.
  async fn default_region(&self) -> Result<String, IdentityError>;
}

/// Identity lookups through `aws sts` and `aws configure`.
pub struct AwsCliIdentity {
  runner: Arc<dyn ProcessRunner>,
}

impl AwsCliIdentity {
  pub fn new(runner: Arc<dyn ProcessRunner>) -> Self {
    Self { runner }
  }
}

#[async_trait]
impl IdentityProvider for AwsCliIdentity {
  async fn current_identity(&self) -> Result<CallerIdentity, IdentityError> {
    let spec = CommandSpec::new(AWS_CLI).args(["sts", "get-caller-identity", "--output", "json"]);
    let output = self.runner.run(&spec).await?;
    if !output.success() {
      return Err(IdentityError::Credentials {
        exit: output.exit,
        output: output.combined,
      });
    }

    let identity: CallerIdentity = serde_json::from_str(&output.stdout).map_err(IdentityError::Decode)?;
    if identity.account_id.trim().is_empty() {
      return Err(IdentityError::EmptyAccount);
    }
    debug!(account = %identity.account_id, arn = %identity.arn, "resolved caller identity");
    Ok(identity)
  }

  async fn default_region(&self) -> Result<String, IdentityError> {
    if let Some(region) = region_from_env() {
      return Ok(region);
    }

    let spec = CommandSpec::new(AWS_CLI).args(["configure", "get", "region"]);
    let configured = match self.runner.run(&spec).await {
      Ok(output) if output.success() => output.stdout.trim().to_string(),
      // Unset profiles exit 1 with no output.
      Ok(_) => String::new(),
      Err(err) => return Err(err.into()),
    };

    if configured.is_empty() {
      debug!(region = DEFAULT_REGION, "no configured region, using default");
      Ok(DEFAULT_REGION.to_string())
    } else {
      Ok(configured)
    }
  }
}

/// First non-empty region from the standard environment variables.
pub fn region_from_env() -> Option<String> {
  REGION_ENV_VARS
    .iter()
    .filter_map(|key| std::env::var(key).ok())
    .map(|v| v.trim().to_string())
    .find(|v| !v.is_empty())
}

/// Deployer name for the `deployed-by` tag: the last path segment of the ARN.
pub fn owner_from_arn(arn: &str) -> String {
  arn.rsplit(['/', ':']).next().unwrap_or(arn).to_string()
}
