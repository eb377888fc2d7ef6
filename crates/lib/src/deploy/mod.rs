//! Deployment orchestration.
//!
//! A [`Deployment`] drives one application through its lifecycle:
//!
//! 1. **Create**: resolve account, region and owner; pick a working
//!    directory; compute the state backend.
//! 2. **Prepare**: create the working directory, copy the module tree in,
//!    write `backend.tf`, bootstrap the state bucket and lock table.
//! 3. **Plan**: derive variables, `terraform init`, `terraform plan -out`.
//! 4. **Deploy**: apply the saved plan, read outputs, record the result.
//! 5. **Cleanup**: remove the working directory (sentinel-guarded).
//!
//! `destroy` tears the deployed infrastructure down instead of deploying and
//! may run from any state after Prepare. Phases must run in order; calling
//! one out of order fails with [`DeployError::InvalidState`] before any
//! tool is invoked. Every terraform failure is returned with the phase that
//! hit it; the only failure downgraded to a warning is saving the
//! deployment record after a successful apply.

mod types;
mod workdir;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::backend::{StateBackend, StateBackendBootstrapper};
use crate::consts::{DEFAULT_ENVIRONMENT, PLAN_FILENAME};
use crate::identity::owner_from_arn;
use crate::manifest::{Manifest, is_valid_name};
use crate::records::{DeploymentRecord, RecordStore, remove_record, upsert_record};
use crate::sink::OutputSink;
use crate::terraform::{Terraform, copy_modules, write_backend_config};
use crate::variables::{Variables, derive_variables};

pub use types::*;
pub use workdir::{is_owned_work_dir, new_work_dir_path, remove_owned_work_dir};

/// Variable carrying a prebuilt container image, when one is supplied.
pub const CONTAINER_IMAGE_VAR: &str = "container_image";

/// One application deployment and the working directory it owns.
pub struct Deployment {
  manifest: Manifest,
  environment: String,
  region: String,
  account_id: String,
  owner: String,
  work_dir: PathBuf,
  backend: StateBackend,
  options: DeployOptions,
  terraform: Terraform,
  bootstrapper: StateBackendBootstrapper,
  records: Arc<dyn RecordStore>,
  sink: Box<dyn OutputSink>,
  state: DeploymentState,
  result: Option<DeploymentResult>,
}

impl Deployment {
  /// Resolves identity and region and computes paths. Touches no files.
  pub async fn create(manifest: Manifest, options: DeployOptions, ctx: DeployContext) -> Result<Self, DeployError> {
    let identity = ctx.identity.current_identity().await.map_err(DeployError::Identity)?;
    let region = match options.region.as_deref().filter(|r| !r.is_empty()) {
      Some(region) => region.to_string(),
      None => ctx.identity.default_region().await.map_err(DeployError::Region)?,
    };

    let environment = options
      .environment
      .clone()
      .filter(|e| !e.is_empty())
      .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string());
    if !is_valid_name(&environment) {
      return Err(DeployError::InvalidName {
        field: "environment",
        value: environment,
      });
    }
    if !is_valid_name(&manifest.name) {
      return Err(DeployError::InvalidName {
        field: "application name",
        value: manifest.name.clone(),
      });
    }

    let owner = options
      .owner
      .clone()
      .filter(|o| !o.is_empty())
      .unwrap_or_else(|| owner_from_arn(&identity.arn));
    let work_dir = options
      .work_dir
      .clone()
      .unwrap_or_else(|| new_work_dir_path(&options.work_root, &manifest.name));
    let backend = StateBackend::for_deployment(&identity.account_id, &region, &manifest.name, &environment);

    info!(
      app = %manifest.name,
      %environment,
      %region,
      account = %identity.account_id,
      work_dir = %work_dir.display(),
      "created deployment"
    );

    Ok(Self {
      terraform: Terraform::new(&work_dir, ctx.runner.clone()),
      bootstrapper: StateBackendBootstrapper::new(ctx.runner),
      records: ctx.records,
      sink: ctx.sink,
      manifest,
      environment,
      region,
      account_id: identity.account_id,
      owner,
      work_dir,
      backend,
      options,
      state: DeploymentState::Created,
      result: None,
    })
  }

  /// Stages the working directory and makes sure the state backend exists.
  pub async fn prepare(&mut self) -> Result<(), DeployError> {
    self.expect_state("prepare", &[DeploymentState::Created])?;

    self.progress(format!("Preparing working directory {}", self.work_dir.display()));
    std::fs::create_dir_all(&self.work_dir).map_err(|source| DeployError::WorkDir {
      path: self.work_dir.clone(),
      source,
    })?;

    let copied = copy_modules(&self.options.modules_dir, &self.work_dir)?;
    info!(files = copied, modules = %self.options.modules_dir.display(), "staged modules");

    write_backend_config(&self.work_dir, &self.backend).map_err(|source| DeployError::BackendConfig {
      path: self.work_dir.clone(),
      source,
    })?;

    self.progress(format!(
      "Ensuring state backend s3://{} (lock table {}) in {}",
      self.backend.bucket, self.backend.lock_table, self.backend.region
    ));
    let report = self.bootstrapper.ensure(&self.backend).await?;
    if report.bucket_created {
      self.progress(format!("Created state bucket {}", self.backend.bucket));
    }
    if report.lock_table_created {
      self.progress(format!("Created lock table {}", self.backend.lock_table));
    }

    self.state = DeploymentState::Prepared;
    Ok(())
  }

  /// Initializes terraform and saves a plan. May be repeated before deploy.
  pub async fn plan(&mut self) -> Result<(), DeployError> {
    self.expect_state("plan", &[DeploymentState::Prepared, DeploymentState::Planned])?;
    self.load_variables();

    self.progress("Initializing terraform".to_string());
    self.terraform.init().await.map_err(phase(Phase::Plan))?;

    self.progress(format!(
      "Planning {} ({}) in {}",
      self.manifest.name, self.environment, self.region
    ));
    let plan_file = self.plan_file();
    if self.options.stream_output {
      self
        .terraform
        .streaming_plan(&plan_file, self.sink.as_mut())
        .await
        .map_err(phase(Phase::Plan))?;
    } else {
      self.terraform.plan(&plan_file).await.map_err(phase(Phase::Plan))?;
    }

    self.progress(format!("Plan saved to {}", plan_file.display()));
    self.state = DeploymentState::Planned;
    Ok(())
  }

  /// Applies the saved plan and records the outcome.
  pub async fn deploy(&mut self) -> Result<DeploymentResult, DeployError> {
    self.expect_state("deploy", &[DeploymentState::Planned])?;

    self.progress(format!("Deploying {} ({})", self.manifest.name, self.environment));
    let plan_file = self.plan_file();
    if self.options.stream_output {
      self
        .terraform
        .streaming_apply(&plan_file, self.sink.as_mut())
        .await
        .map_err(phase(Phase::Deploy))?;
    } else {
      self.terraform.apply(&plan_file).await.map_err(phase(Phase::Deploy))?;
    }

    let outputs = self.terraform.output().await.map_err(phase(Phase::Deploy))?;
    let result = DeploymentResult::from_outputs(
      &outputs,
      &self.manifest.name,
      &self.environment,
      &self.account_id,
      &self.region,
      Utc::now(),
    );
    if result.api_url.is_empty() {
      warn!("terraform produced no {} output", API_URL_OUTPUT);
    }

    let record = DeploymentRecord::new(
      &self.account_id,
      &self.region,
      &self.environment,
      &result.api_url,
      result.deployed_at,
    );
    if let Err(err) = upsert_record(self.records.as_ref(), &self.manifest.name, record) {
      warn!(error = %err, app = %self.manifest.name, "failed to save deployment record");
      self.progress(format!("Warning: deployment succeeded but its record was not saved: {}", err));
    }

    info!(id = %result.deployment_id, api_url = %result.api_url, "deployment complete");
    self.progress(format!("Deployed {}", result.deployment_id));
    self.state = DeploymentState::Deployed;
    self.result = Some(result.clone());
    Ok(result)
  }

  /// Destroys every resource in this deployment's state.
  pub async fn destroy(&mut self) -> Result<(), DeployError> {
    self.expect_state(
      "destroy",
      &[
        DeploymentState::Prepared,
        DeploymentState::Planned,
        DeploymentState::Deployed,
      ],
    )?;
    self.load_variables();

    self.progress("Initializing terraform".to_string());
    self.terraform.init().await.map_err(phase(Phase::Destroy))?;

    self.progress(format!("Destroying {} ({})", self.manifest.name, self.environment));
    if self.options.stream_output {
      self
        .terraform
        .streaming_destroy(self.sink.as_mut())
        .await
        .map_err(phase(Phase::Destroy))?;
    } else {
      self.terraform.destroy().await.map_err(phase(Phase::Destroy))?;
    }

    match remove_record(
      self.records.as_ref(),
      &self.manifest.name,
      &self.account_id,
      &self.region,
      &self.environment,
    ) {
      Ok(true) => {}
      Ok(false) => debug!(app = %self.manifest.name, env = %self.environment, "no matching deployment record"),
      Err(err) => warn!(error = %err, app = %self.manifest.name, "failed to remove deployment record"),
    }

    self.progress(format!("Destroyed {} ({})", self.manifest.name, self.environment));
    self.state = DeploymentState::Destroyed;
    self.result = None;
    Ok(())
  }

  /// Removes the working directory if this deployment created it.
  ///
  /// Allowed from any state. Returns whether anything was removed.
  pub fn cleanup(&mut self) -> Result<bool, DeployError> {
    if self.state == DeploymentState::CleanedUp {
      return Ok(false);
    }
    let removed = remove_owned_work_dir(&self.work_dir).map_err(|source| DeployError::Cleanup {
      path: self.work_dir.clone(),
      source,
    })?;
    if !removed && !is_owned_work_dir(&self.work_dir) {
      self.progress(format!(
        "Leaving {} in place: not a deployment working directory",
        self.work_dir.display()
      ));
    }
    self.state = DeploymentState::CleanedUp;
    Ok(removed)
  }

  /// The variables a plan would use, including the image override.
  pub fn variables(&self) -> Variables {
    let mut vars = derive_variables(
      &self.manifest,
      &self.account_id,
      &self.region,
      &self.environment,
      &self.owner,
    );
    if let Some(image) = self.options.image.as_deref().filter(|i| !i.is_empty()) {
      vars.insert(CONTAINER_IMAGE_VAR.to_string(), json!(image));
    }
    vars
  }

  pub fn state(&self) -> DeploymentState {
    self.state
  }

  pub fn manifest(&self) -> &Manifest {
    &self.manifest
  }

  pub fn environment(&self) -> &str {
    &self.environment
  }

  pub fn region(&self) -> &str {
    &self.region
  }

  pub fn account_id(&self) -> &str {
    &self.account_id
  }

  pub fn owner(&self) -> &str {
    &self.owner
  }

  pub fn work_dir(&self) -> &Path {
    &self.work_dir
  }

  pub fn backend(&self) -> &StateBackend {
    &self.backend
  }

  pub fn plan_file(&self) -> PathBuf {
    self.work_dir.join(PLAN_FILENAME)
  }

  pub fn result(&self) -> Option<&DeploymentResult> {
    self.result.as_ref()
  }

  fn load_variables(&mut self) {
    let vars = self.variables();
    self.terraform.set_vars(vars);
  }

  fn expect_state(&self, action: &'static str, allowed: &[DeploymentState]) -> Result<(), DeployError> {
    if allowed.contains(&self.state) {
      Ok(())
    } else {
      Err(DeployError::InvalidState {
        action,
        state: self.state,
      })
    }
  }

  fn progress(&mut self, message: String) {
    self.sink.write_line(&message);
  }
}

fn phase(phase: Phase) -> impl FnOnce(crate::terraform::TerraformError) -> DeployError {
  move |source| DeployError::Terraform { phase, source }
}
