//! Implementation of the `byoa plan`, `byoa deploy` and `byoa destroy` commands.
//!
//! All three stage a fresh working directory, run their phases, and remove
//! the working directory afterwards whether or not the phases succeeded
//! (unless `--keep-workdir` is given).

use std::time::Instant;

use anyhow::{Context, Result};
use serde_json::json;
use tracing::debug;

use byoa_lib::deploy::{DeployContext, DeployError, DeployOptions, Deployment, DeploymentResult};
use byoa_lib::manifest::Manifest;

use crate::DeployArgs;
use crate::output::{
  OutputFormat, TerminalSink, format_elapsed, print_info, print_json, print_note, print_stat, print_success,
  print_warning,
};
use crate::prompts::confirm;

use super::runtime;

fn options(args: &DeployArgs, image: Option<String>) -> DeployOptions {
  let mut options = DeployOptions {
    environment: args.environment.clone(),
    region: args.region.clone(),
    owner: args.owner.clone(),
    work_dir: args.work_dir.clone(),
    stream_output: args.stream,
    image,
    ..DeployOptions::default()
  };
  if let Some(modules) = &args.modules {
    options.modules_dir = modules.clone();
  }
  options
}

async fn create(args: &DeployArgs, image: Option<String>, format: OutputFormat) -> Result<Deployment> {
  debug!(manifest = %args.file.display(), "loading manifest");
  let manifest =
    Manifest::load(&args.file).with_context(|| format!("Failed to load manifest: {}", args.file.display()))?;
  let ctx = DeployContext::system(Box::new(TerminalSink::new(format)));
  let deployment = Deployment::create(manifest, options(args, image), ctx)
    .await
    .context("Failed to start deployment")?;
  Ok(deployment)
}

/// Removes the working directory unless asked to keep it. Cleanup problems
/// are reported but never mask the command's own result.
fn finish(deployment: &mut Deployment, keep_workdir: bool) {
  if keep_workdir {
    print_note(&format!("Working directory kept at {}", deployment.work_dir().display()));
    return;
  }
  if let Err(err) = deployment.cleanup() {
    print_warning(&format!("{:#}", anyhow::Error::from(err)));
  }
}

pub fn cmd_plan(args: &DeployArgs, format: OutputFormat) -> Result<()> {
  runtime()?.block_on(plan(args, format))
}

async fn plan(args: &DeployArgs, format: OutputFormat) -> Result<()> {
  let mut deployment = create(args, None, format).await?;

  let outcome: Result<(), DeployError> = async {
    deployment.prepare().await?;
    deployment.plan().await
  }
  .await;
  finish(&mut deployment, args.keep_workdir);

  if outcome.is_ok() {
    if format.is_json() {
      print_json(&json!({
        "app_name": deployment.manifest().name,
        "environment": deployment.environment(),
        "region": deployment.region(),
        "account_id": deployment.account_id(),
        "backend": deployment.backend(),
        "variables": deployment.variables(),
      }))?;
    } else {
      print_success(&format!(
        "Plan ready for {} ({})",
        deployment.manifest().name,
        deployment.environment()
      ));
      print_stat("Account", deployment.account_id());
      print_stat("Region", deployment.region());
      print_stat("State", &format!("s3://{}/{}", deployment.backend().bucket, deployment.backend().key));
    }
  }

  outcome.context("Plan failed")
}

pub fn cmd_deploy(args: &DeployArgs, image: Option<String>, format: OutputFormat) -> Result<()> {
  runtime()?.block_on(deploy(args, image, format))
}

async fn deploy(args: &DeployArgs, image: Option<String>, format: OutputFormat) -> Result<()> {
  let started = Instant::now();
  let mut deployment = create(args, image, format).await?;

  let outcome: Result<DeploymentResult, DeployError> = async {
    deployment.prepare().await?;
    deployment.plan().await?;
    deployment.deploy().await
  }
  .await;
  finish(&mut deployment, args.keep_workdir);

  if let Ok(result) = &outcome {
    if format.is_json() {
      print_json(result)?;
    } else {
      print_success(&format!(
        "Deployed {} in {}",
        result.deployment_id,
        format_elapsed(started.elapsed())
      ));
      if !result.api_url.is_empty() {
        print_stat("API URL", &result.api_url);
      }
      if !result.load_balancer_dns.is_empty() {
        print_stat("Load balancer", &result.load_balancer_dns);
      }
      print_stat("Region", &result.region);
      print_stat("Account", &result.account_id);
    }
  }

  outcome.map(|_| ()).context("Deploy failed")
}

pub fn cmd_destroy(args: &DeployArgs, yes: bool, format: OutputFormat) -> Result<()> {
  runtime()?.block_on(destroy(args, yes, format))
}

async fn destroy(args: &DeployArgs, yes: bool, format: OutputFormat) -> Result<()> {
  let mut deployment = create(args, None, format).await?;

  let question = format!(
    "Destroy all infrastructure for {} ({}) in account {}?",
    deployment.manifest().name,
    deployment.environment(),
    deployment.account_id()
  );
  if !confirm(&question, yes)? {
    print_info("Destroy cancelled");
    finish(&mut deployment, args.keep_workdir);
    return Ok(());
  }

  let outcome: Result<(), DeployError> = async {
    deployment.prepare().await?;
    deployment.destroy().await
  }
  .await;
  finish(&mut deployment, args.keep_workdir);

  if outcome.is_ok() {
    if format.is_json() {
      print_json(&json!({
        "app_name": deployment.manifest().name,
        "environment": deployment.environment(),
        "destroyed": true,
      }))?;
    } else {
      print_success(&format!(
        "Destroyed {} ({})",
        deployment.manifest().name,
        deployment.environment()
      ));
    }
  }

  outcome.context("Destroy failed")
}
