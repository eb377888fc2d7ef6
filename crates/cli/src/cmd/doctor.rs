//! Implementation of the `byoa doctor` command.

use std::sync::Arc;

use anyhow::{Result, bail};
use serde::Serialize;

use byoa_lib::consts::AWS_CLI;
use byoa_lib::identity::{AwsCliIdentity, IdentityProvider};
use byoa_lib::platform::paths::{modules_dir, records_path, work_root};
use byoa_lib::process::{CommandSpec, ProcessRunner, SystemRunner};
use byoa_lib::terraform::Terraform;

use crate::output::{OutputFormat, print_error, print_json, print_stat, print_success};

use super::runtime;

#[derive(Debug, Serialize)]
struct Check {
  name: &'static str,
  ok: bool,
  detail: String,
}

pub fn cmd_doctor(format: OutputFormat) -> Result<()> {
  let runner: Arc<dyn ProcessRunner> = Arc::new(SystemRunner);
  let checks = runtime()?.block_on(async {
    let mut checks = Vec::new();

    let terraform = Terraform::new(work_root(), runner.clone());
    checks.push(match terraform.check_installed().await {
      Ok(version) => Check {
        name: "terraform",
        ok: true,
        detail: version,
      },
      Err(err) => Check {
        name: "terraform",
        ok: false,
        detail: err.to_string(),
      },
    });

    let aws = runner.run(&CommandSpec::new(AWS_CLI).arg("--version")).await;
    checks.push(match aws {
      Ok(output) if output.success() => Check {
        name: "aws",
        ok: true,
        detail: output.combined.lines().next().unwrap_or_default().to_string(),
      },
      Ok(output) => Check {
        name: "aws",
        ok: false,
        detail: output.combined,
      },
      Err(err) => Check {
        name: "aws",
        ok: false,
        detail: err.to_string(),
      },
    });

    let identity = AwsCliIdentity::new(runner.clone());
    checks.push(match identity.current_identity().await {
      Ok(caller) => Check {
        name: "credentials",
        ok: true,
        detail: caller.arn,
      },
      Err(err) => Check {
        name: "credentials",
        ok: false,
        detail: err.to_string(),
      },
    });

    let modules = modules_dir();
    checks.push(Check {
      name: "modules",
      ok: modules.is_dir(),
      detail: if modules.is_dir() {
        modules.display().to_string()
      } else {
        format!("{} does not exist (set BYOA_MODULES_DIR or pass --modules)", modules.display())
      },
    });

    checks
  });

  let failed = checks.iter().filter(|c| !c.ok).count();

  if format.is_json() {
    print_json(&checks)?;
  } else {
    for check in &checks {
      if check.ok {
        print_success(&format!("{}: {}", check.name, check.detail));
      } else {
        print_error(&format!("{}: {}", check.name, check.detail));
      }
    }
    print_stat("Records", &records_path().display().to_string());
  }

  if failed > 0 {
    bail!("{} check(s) failed", failed);
  }
  Ok(())
}
