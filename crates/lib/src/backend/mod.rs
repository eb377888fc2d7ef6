//! Remote state backend.
//!
//! Terraform state for every deployment lives in one S3 bucket and one
//! DynamoDB lock table per AWS account. Deployments are isolated from each
//! other by their state key, which depends only on application name and
//! environment, so re-running a deployment reconnects to the same state.

mod bootstrap;

use serde::{Deserialize, Serialize};

use crate::consts::APP_NAME;

pub use bootstrap::{BootstrapError, BootstrapReport, HOME_REGION, StateBackendBootstrapper};

/// Where terraform keeps state for one deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateBackend {
  pub bucket: String,
  pub key: String,
  pub region: String,
  pub lock_table: String,
}

impl StateBackend {
  pub fn for_deployment(account_id: &str, region: &str, app_name: &str, environment: &str) -> Self {
    Self {
      bucket: state_bucket_name(account_id),
      key: state_key(app_name, environment),
      region: region.to_string(),
      lock_table: lock_table_name(account_id),
    }
  }
}

/// `deployments/<app>/<environment>/state`
pub fn state_key(app_name: &str, environment: &str) -> String {
  format!("deployments/{}/{}/state", app_name, environment)
}

pub fn state_bucket_name(account_id: &str) -> String {
  format!("{}-terraform-state-{}", APP_NAME, account_id)
}

pub fn lock_table_name(account_id: &str) -> String {
  format!("{}-terraform-locks-{}", APP_NAME, account_id)
}
