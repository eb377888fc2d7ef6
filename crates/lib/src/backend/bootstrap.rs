//! Idempotent creation of the state bucket and lock table.
//!
//! Each resource is probed first and only created when absent, so running
//! the bootstrap any number of times leaves the account in the same state.
//! A freshly created bucket gets versioning and default encryption; if
//! either step fails the bootstrap fails, since an unversioned or
//! unencrypted state bucket is not an acceptable result.

use std::sync::Arc;

use serde_json::json;
use thiserror::Error;
use tracing::{debug, info};

use super::StateBackend;
use crate::consts::AWS_CLI;
use crate::process::{CommandSpec, ExitCode, ProcessError, ProcessOutput, ProcessRunner};

/// S3's home region, where `create-bucket` must not carry a location constraint.
pub const HOME_REGION: &str = "us-east-1";

const LOCK_KEY: &str = "LockID";

#[derive(Debug, Error)]
pub enum BootstrapError {
  #[error(
    "the aws CLI was not found on PATH\n\
     Install AWS CLI v2 (https://docs.aws.amazon.com/cli/latest/userguide/getting-started-install.html) and configure credentials"
  )]
  AwsCliMissing,

  #[error("failed to {action} state bucket {bucket} ({exit}):\n{output}")]
  Bucket {
    action: &'static str,
    bucket: String,
    exit: ExitCode,
    output: String,
  },

  #[error("failed to {action} lock table {table} ({exit}):\n{output}")]
  LockTable {
    action: &'static str,
    table: String,
    exit: ExitCode,
    output: String,
  },

  #[error(transparent)]
  Process(ProcessError),
}

impl From<ProcessError> for BootstrapError {
  fn from(err: ProcessError) -> Self {
    match err {
      ProcessError::NotFound { .. } => BootstrapError::AwsCliMissing,
      other => BootstrapError::Process(other),
    }
  }
}

/// What a bootstrap run had to create.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BootstrapReport {
  pub bucket_created: bool,
  pub lock_table_created: bool,
}

/// Provisions the state backend through the AWS CLI.
pub struct StateBackendBootstrapper {
  runner: Arc<dyn ProcessRunner>,
}

impl StateBackendBootstrapper {
  pub fn new(runner: Arc<dyn ProcessRunner>) -> Self {
    Self { runner }
  }

  pub async fn ensure(&self, backend: &StateBackend) -> Result<BootstrapReport, BootstrapError> {
    self
      .ensure_state_backend(&backend.bucket, &backend.lock_table, &backend.region)
      .await
  }

  /// Makes sure both the bucket and the lock table exist in `region`.
  pub async fn ensure_state_backend(
    &self,
    bucket: &str,
    lock_table: &str,
    region: &str,
  ) -> Result<BootstrapReport, BootstrapError> {
    let mut report = BootstrapReport::default();

    if self.bucket_exists(bucket, region).await? {
      debug!(bucket, "state bucket already exists");
    } else {
      self.create_bucket(bucket, region).await?;
      report.bucket_created = true;
    }

    if self.table_exists(lock_table, region).await? {
      debug!(table = lock_table, "lock table already exists");
    } else {
      self.create_table(lock_table, region).await?;
      report.lock_table_created = true;
    }

    Ok(report)
  }

  async fn bucket_exists(&self, bucket: &str, region: &str) -> Result<bool, BootstrapError> {
    let output = self
      .aws(["s3api", "head-bucket", "--bucket", bucket, "--region", region])
      .await?;
    if output.success() {
      return Ok(true);
    }
    if is_not_found(&output.combined, &["404", "Not Found", "NoSuchBucket"]) {
      return Ok(false);
    }
    Err(bucket_error("inspect", bucket, output))
  }

  async fn create_bucket(&self, bucket: &str, region: &str) -> Result<(), BootstrapError> {
    info!(bucket, region, "creating state bucket");

    let mut args = vec!["s3api", "create-bucket", "--bucket", bucket, "--region", region];
    let constraint = format!("LocationConstraint={}", region);
    if region != HOME_REGION {
      args.extend(["--create-bucket-configuration", constraint.as_str()]);
    }
    let output = self.aws(args).await?;
    if !output.success() && !output.combined.contains("BucketAlreadyOwnedByYou") {
      return Err(bucket_error("create", bucket, output));
    }

    let output = self
      .aws([
        "s3api",
        "put-bucket-versioning",
        "--bucket",
        bucket,
        "--versioning-configuration",
        "Status=Enabled",
        "--region",
        region,
      ])
      .await?;
    if !output.success() {
      return Err(bucket_error("enable versioning on", bucket, output));
    }

    let encryption = json!({
      "Rules": [{ "ApplyServerSideEncryptionByDefault": { "SSEAlgorithm": "AES256" } }]
    })
    .to_string();
    let output = self
      .aws([
        "s3api",
        "put-bucket-encryption",
        "--bucket",
        bucket,
        "--server-side-encryption-configuration",
        encryption.as_str(),
        "--region",
        region,
      ])
      .await?;
    if !output.success() {
      return Err(bucket_error("enable encryption on", bucket, output));
    }

    Ok(())
  }

  async fn table_exists(&self, table: &str, region: &str) -> Result<bool, BootstrapError> {
    let output = self
      .aws(["dynamodb", "describe-table", "--table-name", table, "--region", region])
      .await?;
    if output.success() {
      return Ok(true);
    }
    if is_not_found(&output.combined, &["ResourceNotFoundException"]) {
      return Ok(false);
    }
    Err(table_error("inspect", table, output))
  }

  async fn create_table(&self, table: &str, region: &str) -> Result<(), BootstrapError> {
    info!(table, region, "creating lock table");

    let attribute = format!("AttributeName={},AttributeType=S", LOCK_KEY);
    let key_schema = format!("AttributeName={},KeyType=HASH", LOCK_KEY);
    let output = self
      .aws([
        "dynamodb",
        "create-table",
        "--table-name",
        table,
        "--attribute-definitions",
        attribute.as_str(),
        "--key-schema",
        key_schema.as_str(),
        "--billing-mode",
        "PAY_PER_REQUEST",
        "--region",
        region,
      ])
      .await?;
    if !output.success() && !output.combined.contains("ResourceInUseException") {
      return Err(table_error("create", table, output));
    }

    let output = self
      .aws(["dynamodb", "wait", "table-exists", "--table-name", table, "--region", region])
      .await?;
    if !output.success() {
      return Err(table_error("wait for", table, output));
    }

    Ok(())
  }

  async fn aws<'a, I>(&self, args: I) -> Result<ProcessOutput, BootstrapError>
  where
    I: IntoIterator<Item = &'a str>,
  {
    let spec = CommandSpec::new(AWS_CLI).args(args);
    Ok(self.runner.run(&spec).await?)
  }
}

fn is_not_found(output: &str, markers: &[&str]) -> bool {
  markers.iter().any(|m| output.contains(m))
}

fn bucket_error(action: &'static str, bucket: &str, output: ProcessOutput) -> BootstrapError {
  BootstrapError::Bucket {
    action,
    bucket: bucket.to_string(),
    exit: output.exit,
    output: output.combined,
  }
}

fn table_error(action: &'static str, table: &str, output: ProcessOutput) -> BootstrapError {
  BootstrapError::LockTable {
    action,
    table: table.to_string(),
    exit: output.exit,
    output: output.combined,
  }
}
