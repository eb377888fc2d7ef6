//! Implementation of the `byoa validate` command.

use std::path::Path;

use anyhow::{Result, bail};
use serde_json::json;

use byoa_lib::manifest::{Manifest, ManifestError};

use crate::output::{OutputFormat, print_error, print_json, print_stat, print_success};

pub fn cmd_validate(file: &Path, format: OutputFormat) -> Result<()> {
  match Manifest::load(file) {
    Ok(manifest) => {
      if format.is_json() {
        print_json(&json!({ "valid": true, "manifest": manifest }))?;
      } else {
        print_success(&format!("{} is valid", file.display()));
        print_stat("Name", &manifest.name);
        print_stat("Runtime", &manifest.runtime);
        print_stat("Port", &manifest.port.to_string());
        print_stat("Base image", manifest.start_image());
        print_stat("Endpoints", &manifest.endpoints.len().to_string());
      }
      Ok(())
    }
    Err(ManifestError::Invalid(invalid)) => {
      if format.is_json() {
        print_json(&json!({ "valid": false, "violations": invalid.violations }))?;
      } else {
        print_error(&format!("{} has {} problem(s):", file.display(), invalid.violations.len()));
        for violation in &invalid.violations {
          eprintln!("  {}", violation);
        }
      }
      bail!("Manifest validation failed")
    }
    Err(err) => Err(err.into()),
  }
}
