//! Terraform input variables derived from a manifest.
//!
//! [`derive_variables`] is pure: the same manifest and context always give
//! the same map, and nothing here touches the filesystem or the network.

use std::collections::BTreeMap;

use serde_json::{Value, json};

use crate::consts::APP_NAME;
use crate::manifest::{Manifest, derived_start_image, split_quantity};

/// Flat variable set handed to the Terraform driver.
pub type Variables = BTreeMap<String, Value>;

/// Fargate CPU units when `resources.cpu` is unset (1024 = 1 vCPU).
pub const DEFAULT_CPU: u64 = 256;

/// Memory in MiB when `resources.memory` is unset.
pub const DEFAULT_MEMORY: u64 = 512;

pub const DEFAULT_MIN_CAPACITY: u64 = 1;
pub const DEFAULT_MAX_CAPACITY: u64 = 10;
pub const DEFAULT_TARGET_CPU: u64 = 70;
pub const DEFAULT_HEALTH_CHECK: &str = "/health";

/// Stand-in value prefix for required environment variables.
///
/// Real secrets are never written into Terraform variables; the
/// infrastructure layer is expected to replace these out-of-band.
pub const PLACEHOLDER_PREFIX: &str = "PLACEHOLDER_";

/// Builds the Terraform variable set for one deployment.
pub fn derive_variables(
  manifest: &Manifest,
  account_id: &str,
  region: &str,
  environment: &str,
  owner: &str,
) -> Variables {
  let mut vars = Variables::new();

  vars.insert("app_name".into(), json!(manifest.name));
  vars.insert("environment".into(), json!(environment));
  vars.insert("aws_region".into(), json!(region));
  vars.insert("account_id".into(), json!(account_id));
  vars.insert("owner".into(), json!(owner));
  vars.insert(
    "tags".into(),
    json!({
      "managed-by": APP_NAME,
      "deployed-by": owner,
      "environment": environment,
      "application-name": manifest.name,
    }),
  );

  let (cpu, memory) = match &manifest.resources {
    Some(resources) => (
      resources.cpu.as_deref().and_then(parse_cpu_units).unwrap_or(DEFAULT_CPU),
      resources.memory.as_deref().and_then(parse_memory_mib).unwrap_or(DEFAULT_MEMORY),
    ),
    None => (DEFAULT_CPU, DEFAULT_MEMORY),
  };
  vars.insert("cpu".into(), json!(cpu));
  vars.insert("memory".into(), json!(memory));

  let (min, max, target) = match &manifest.scaling {
    Some(s) => (
      s.min.max(0) as u64,
      s.max.max(0) as u64,
      s.target_cpu_percent.map(|t| t.clamp(0, 100) as u64).unwrap_or(DEFAULT_TARGET_CPU),
    ),
    None => (DEFAULT_MIN_CAPACITY, DEFAULT_MAX_CAPACITY, DEFAULT_TARGET_CPU),
  };
  vars.insert("min_capacity".into(), json!(min));
  vars.insert("max_capacity".into(), json!(max));
  vars.insert("target_cpu_utilization".into(), json!(target));

  vars.insert("container_port".into(), json!(manifest.port));
  let health_check = if manifest.health_check.is_empty() {
    DEFAULT_HEALTH_CHECK
  } else {
    manifest.health_check.as_str()
  };
  vars.insert("health_check_path".into(), json!(health_check));
  vars.insert("base_image".into(), json!(derived_start_image(&manifest.runtime)));

  vars.insert("needs_database".into(), json!(needs_database(&manifest.env.required)));

  if !manifest.env.is_empty() {
    let mut env = serde_json::Map::new();
    for (name, default) in &manifest.env.optional {
      env.insert(name.clone(), json!(default));
    }
    for name in &manifest.env.required {
      env.insert(name.clone(), json!(format!("{}{}", PLACEHOLDER_PREFIX, name)));
    }
    vars.insert("environment_variables".into(), Value::Object(env));
  }

  vars
}

/// True when any required variable looks like database configuration.
pub fn needs_database(required: &[String]) -> bool {
  required.iter().any(|name| {
    let upper = name.to_ascii_uppercase();
    upper.contains("DATABASE") || upper.starts_with("DB_")
  })
}

/// Parses a CPU quantity into Fargate units.
///
/// `250m` is millicores, plain values up to 16 are vCPUs and anything larger
/// is taken as raw units. `vcpu` is accepted as an explicit vCPU suffix.
pub fn parse_cpu_units(quantity: &str) -> Option<u64> {
  let (number, suffix) = split_quantity(quantity.trim());
  let value: f64 = number.parse().ok()?;
  let units = match suffix.to_ascii_lowercase().as_str() {
    "m" => value * 1024.0 / 1000.0,
    "vcpu" => value * 1024.0,
    "" if value <= 16.0 => value * 1024.0,
    "" => value,
    _ => return None,
  };
  Some(units.round() as u64)
}

/// Parses a memory quantity into MiB. Plain numbers are already MiB and
/// suffixes are case-insensitive.
pub fn parse_memory_mib(quantity: &str) -> Option<u64> {
  let (number, suffix) = split_quantity(quantity.trim());
  let value: f64 = number.parse().ok()?;
  let mib = match suffix.to_ascii_lowercase().as_str() {
    "" | "mi" | "m" | "mb" => value,
    "ki" | "k" | "kb" => value / 1024.0,
    "gi" | "g" | "gb" => value * 1024.0,
    "ti" | "t" | "tb" => value * 1024.0 * 1024.0,
    _ => return None,
  };
  Some(mib.round() as u64)
}
