//! Fixed names and defaults shared across the crate.

/// Application name, used for config/data directory names and tagging.
pub const APP_NAME: &str = "byoa";

/// Default manifest file name looked up in the current directory.
pub const MANIFEST_FILENAME: &str = "byoa.yaml";

/// Environment used when none is given.
pub const DEFAULT_ENVIRONMENT: &str = "prod";

/// Region used when neither the environment nor the AWS CLI config provide one.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Substring that marks a working directory as created by a deployment.
///
/// Cleanup refuses to remove any directory whose name lacks it.
pub const WORK_DIR_SENTINEL: &str = "byoa-deploy-";

/// Plan file written inside the working directory.
pub const PLAN_FILENAME: &str = "tfplan";

/// Backend configuration file written inside the working directory.
pub const BACKEND_FILENAME: &str = "backend.tf";

/// Terraform's private cache directory, never copied between module trees.
pub const TERRAFORM_CACHE_DIR: &str = ".terraform";

/// Type tag stored on every deployment record.
pub const RECORD_TYPE: &str = "byoa";

/// AWS CLI program name looked up on `PATH`.
pub const AWS_CLI: &str = "aws";
