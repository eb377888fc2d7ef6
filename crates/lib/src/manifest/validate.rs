//! Manifest validation.
//!
//! Validation is total: every rule is checked and every violation collected,
//! so a user fixing a manifest sees the whole list at once.

use std::fmt;
use std::path::Path;

use serde::Serialize;
use thiserror::Error;

use super::types::{Manifest, parse_endpoint};
use crate::variables::{parse_cpu_units, parse_memory_mib};

/// Runtime tags accepted in `runtime`.
pub const SUPPORTED_RUNTIMES: &[&str] = &[
  "python3.9",
  "python3.10",
  "python3.11",
  "python3.12",
  "node18",
  "node20",
  "node22",
  "go1.21",
  "go1.22",
  "java17",
  "java21",
  "ruby3.2",
  "ruby3.3",
  "custom",
];

/// HTTP methods accepted in `endpoints`.
pub const HTTP_METHODS: &[&str] = &["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS"];

const MAX_NAME_LEN: usize = 63;

/// One violated rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
  /// Dotted path of the offending field, e.g. `scaling.max`.
  pub field: String,
  pub message: String,
}

impl fmt::Display for Violation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}: {}", self.field, self.message)
  }
}

/// All rule violations found in a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("manifest has {} problem(s):\n{}", .violations.len(), render(.violations))]
pub struct ValidationError {
  pub violations: Vec<Violation>,
}

fn render(violations: &[Violation]) -> String {
  violations
    .iter()
    .map(|v| format!("  - {}", v))
    .collect::<Vec<_>>()
    .join("\n")
}

#[derive(Default)]
struct Collector {
  violations: Vec<Violation>,
}

impl Collector {
  fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
    self.violations.push(Violation {
      field: field.into(),
      message: message.into(),
    });
  }

  fn finish(self) -> Result<(), ValidationError> {
    if self.violations.is_empty() {
      Ok(())
    } else {
      Err(ValidationError {
        violations: self.violations,
      })
    }
  }
}

/// Checks every rule, resolving `files.*` references against `base_dir`.
pub(crate) fn validate_manifest(manifest: &Manifest, base_dir: &Path) -> Result<(), ValidationError> {
  let mut errs = Collector::default();

  if manifest.name.is_empty() {
    errs.push("name", "is required");
  } else if !is_valid_name(&manifest.name) {
    errs.push(
      "name",
      format!(
        "'{}' must be 1-{} lowercase letters, digits or hyphens, start with a letter and not end with a hyphen",
        manifest.name, MAX_NAME_LEN
      ),
    );
  }

  if manifest.runtime.is_empty() {
    errs.push("runtime", "is required");
  } else if !SUPPORTED_RUNTIMES.contains(&manifest.runtime.as_str()) {
    errs.push(
      "runtime",
      format!(
        "'{}' is not supported (expected one of: {})",
        manifest.runtime,
        SUPPORTED_RUNTIMES.join(", ")
      ),
    );
  }

  if manifest.start_command.trim().is_empty() {
    errs.push("start_command", "is required");
  }

  if manifest.port == 0 {
    errs.push("port", "is required");
  } else if !(1..=65535).contains(&manifest.port) {
    errs.push("port", format!("must be between 1 and 65535 (got {})", manifest.port));
  }

  if let Some(files) = &manifest.files {
    for (field, rel) in files.named() {
      if rel.is_empty() {
        errs.push(field, "must not be empty when set");
      } else if !base_dir.join(rel).exists() {
        errs.push(field, format!("file '{}' does not exist", rel));
      }
    }
  }

  for (i, entry) in manifest.endpoints.iter().enumerate() {
    let field = format!("endpoints[{}]", i);
    match parse_endpoint(entry) {
      None => errs.push(field, format!("'{}' must look like 'METHOD /path'", entry)),
      Some((method, path)) => {
        if !HTTP_METHODS.contains(&method) {
          errs.push(
            field.clone(),
            format!("method '{}' is not one of {}", method, HTTP_METHODS.join(", ")),
          );
        }
        if !path.starts_with('/') {
          errs.push(field, format!("path '{}' must start with '/'", path));
        }
      }
    }
  }

  for (i, name) in manifest.env.required.iter().enumerate() {
    if !is_valid_env_name(name) {
      errs.push(format!("env.required[{}]", i), format!("'{}' is not a valid variable name", name));
    }
  }
  for name in manifest.env.optional.keys() {
    if !is_valid_env_name(name) {
      errs.push(format!("env.optional.{}", name), "is not a valid variable name");
    }
  }

  if !manifest.health_check.is_empty() && !manifest.health_check.starts_with('/') {
    errs.push("health_check", format!("'{}' must start with '/'", manifest.health_check));
  }

  if let Some(scaling) = &manifest.scaling {
    if scaling.min < 0 {
      errs.push("scaling.min", format!("must be >= 0 (got {})", scaling.min));
    }
    if scaling.max < scaling.min {
      errs.push(
        "scaling.max",
        format!("must be >= scaling.min (got {} < {})", scaling.max, scaling.min),
      );
    }
    if let Some(target) = scaling.target_cpu_percent
      && !(0..=100).contains(&target)
    {
      errs.push("scaling.target_cpu_percent", format!("must be between 0 and 100 (got {})", target));
    }
  }

  if let Some(resources) = &manifest.resources {
    if let Some(memory) = &resources.memory
      && !(is_valid_quantity(memory) && parse_memory_mib(memory).is_some())
    {
      errs.push(
        "resources.memory",
        format!("'{}' is not a memory quantity like 512Mi or 1Gi", memory),
      );
    }
    if let Some(cpu) = &resources.cpu
      && !(is_valid_quantity(cpu) && parse_cpu_units(cpu).is_some())
    {
      errs.push("resources.cpu", format!("'{}' is not a quantity like 0.5 or 250m", cpu));
    }
  }

  errs.finish()
}

/// Whether `name` is a usable application identifier.
///
/// Names end up in bucket keys, DNS labels and resource names, so they follow
/// DNS label rules: 1-63 characters of `[a-z0-9-]`, starting with a letter
/// and not ending with a hyphen.
pub fn is_valid_name(name: &str) -> bool {
  let bytes = name.as_bytes();
  if bytes.is_empty() || bytes.len() > MAX_NAME_LEN {
    return false;
  }
  if !bytes[0].is_ascii_lowercase() || bytes[bytes.len() - 1] == b'-' {
    return false;
  }
  bytes
    .iter()
    .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
}

fn is_valid_env_name(name: &str) -> bool {
  let mut chars = name.chars();
  match chars.next() {
    Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
    _ => return false,
  }
  chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Whether `value` matches `<number>[unit-suffix]`, e.g. `512`, `0.25`, `1Gi`, `250m`.
pub fn is_valid_quantity(value: &str) -> bool {
  let (number, suffix) = split_quantity(value);
  if number.is_empty() || !number.starts_with(|c: char| c.is_ascii_digit()) {
    return false;
  }
  if number.ends_with('.') || number.matches('.').count() > 1 {
    return false;
  }
  suffix.chars().all(|c| c.is_ascii_alphabetic())
}

/// Splits a quantity into its numeric prefix and unit suffix.
pub(crate) fn split_quantity(value: &str) -> (&str, &str) {
  let idx = value
    .find(|c: char| !(c.is_ascii_digit() || c == '.'))
    .unwrap_or(value.len());
  value.split_at(idx)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::manifest::types::{FileRefs, Resources, Scaling};

  fn valid() -> Manifest {
    Manifest {
      name: "test-api".into(),
      runtime: "python3.11".into(),
      start_command: "uvicorn main:app".into(),
      port: 8080,
      ..Default::default()
    }
  }

  fn fields(err: &ValidationError) -> Vec<&str> {
    err.violations.iter().map(|v| v.field.as_str()).collect()
  }

  #[test]
  fn minimal_manifest_is_valid() {
    assert!(validate_manifest(&valid(), Path::new(".")).is_ok());
  }

  #[test]
  fn valid_names() {
    assert!(is_valid_name("a"));
    assert!(is_valid_name(&"a".repeat(63)));
    assert!(is_valid_name("test-api-v2"));
    assert!(is_valid_name("a1"));
  }

  #[test]
  fn invalid_names() {
    assert!(!is_valid_name(""));
    assert!(!is_valid_name(&"a".repeat(64)));
    assert!(!is_valid_name("Test-api"));
    assert!(!is_valid_name("1api"));
    assert!(!is_valid_name("-api"));
    assert!(!is_valid_name("api-"));
    assert!(!is_valid_name("my_api"));
    assert!(!is_valid_name("my.api"));
  }

  #[test]
  fn reports_every_missing_field() {
    let err = validate_manifest(&Manifest::default(), Path::new(".")).unwrap_err();
    assert_eq!(fields(&err), vec!["name", "runtime", "start_command", "port"]);

    let message = err.to_string();
    for field in ["name", "runtime", "start_command", "port"] {
      assert!(message.contains(field), "message should mention {field}: {message}");
    }
  }

  #[test]
  fn port_out_of_range() {
    let mut manifest = valid();
    manifest.port = 70000;
    let err = validate_manifest(&manifest, Path::new(".")).unwrap_err();
    assert_eq!(fields(&err), vec!["port"]);
    assert!(err.to_string().contains("70000"));

    manifest.port = -1;
    assert!(validate_manifest(&manifest, Path::new(".")).is_err());
  }

  #[test]
  fn unknown_runtime() {
    let mut manifest = valid();
    manifest.runtime = "cobol85".into();
    let err = validate_manifest(&manifest, Path::new(".")).unwrap_err();
    assert!(err.to_string().contains("cobol85"));
  }

  #[test]
  fn endpoint_rules() {
    let mut manifest = valid();
    manifest.endpoints = vec![
      "GET /ok".into(),
      "FETCH /items".into(),
      "POST items".into(),
      "nonsense".into(),
    ];
    let err = validate_manifest(&manifest, Path::new(".")).unwrap_err();
    assert_eq!(fields(&err), vec!["endpoints[1]", "endpoints[2]", "endpoints[3]"]);
  }

  #[test]
  fn scaling_rules() {
    let mut manifest = valid();
    manifest.scaling = Some(Scaling {
      min: 3,
      max: 2,
      target_cpu_percent: Some(120),
    });
    let err = validate_manifest(&manifest, Path::new(".")).unwrap_err();
    assert_eq!(fields(&err), vec!["scaling.max", "scaling.target_cpu_percent"]);

    manifest.scaling = Some(Scaling {
      min: -1,
      max: 0,
      target_cpu_percent: None,
    });
    let err = validate_manifest(&manifest, Path::new(".")).unwrap_err();
    assert_eq!(fields(&err), vec!["scaling.min"]);
  }

  #[test]
  fn resource_quantities() {
    assert!(is_valid_quantity("512"));
    assert!(is_valid_quantity("512Mi"));
    assert!(is_valid_quantity("0.25"));
    assert!(is_valid_quantity("250m"));
    assert!(!is_valid_quantity(""));
    assert!(!is_valid_quantity("Mi"));
    assert!(!is_valid_quantity(".5"));
    assert!(!is_valid_quantity("1.2.3"));
    assert!(!is_valid_quantity("5 Gi"));
    assert!(!is_valid_quantity("1G1"));

    let mut manifest = valid();
    manifest.resources = Some(Resources {
      memory: Some("lots".into()),
      cpu: Some("1.5".into()),
    });
    let err = validate_manifest(&manifest, Path::new(".")).unwrap_err();
    assert_eq!(fields(&err), vec!["resources.memory"]);

    manifest.resources = Some(Resources {
      memory: Some("4Xi".into()),
      cpu: Some("2Gi".into()),
    });
    let err = validate_manifest(&manifest, Path::new(".")).unwrap_err();
    assert_eq!(fields(&err), vec!["resources.memory", "resources.cpu"]);
  }

  #[test]
  fn accepted_quantities_are_understood_by_the_deriver() {
    for memory in ["768", "768Mi", "4gi", "4GB", "2048ki", "1T"] {
      let mut manifest = valid();
      manifest.resources = Some(Resources {
        memory: Some(memory.into()),
        cpu: None,
      });
      assert!(validate_manifest(&manifest, Path::new(".")).is_ok(), "{memory} rejected");
      let mib = parse_memory_mib(memory).unwrap();
      assert_ne!(mib, crate::variables::DEFAULT_MEMORY, "{memory}");
    }
    for cpu in ["1", "0.5", "500m", "2vcpu", "4096"] {
      let mut manifest = valid();
      manifest.resources = Some(Resources {
        memory: None,
        cpu: Some(cpu.into()),
      });
      assert!(validate_manifest(&manifest, Path::new(".")).is_ok(), "{cpu} rejected");
      let units = parse_cpu_units(cpu).unwrap();
      assert_ne!(units, crate::variables::DEFAULT_CPU, "{cpu}");
    }
  }

  #[test]
  fn file_references_resolve_against_base_dir() {
    let dir = tempfile::TempDir::new().unwrap();
    std::fs::write(dir.path().join("main.py"), "print('hi')").unwrap();

    let mut manifest = valid();
    manifest.files = Some(FileRefs {
      main: Some("main.py".into()),
      dependencies: Some("requirements.txt".into()),
      dockerfile: None,
    });
    let err = validate_manifest(&manifest, dir.path()).unwrap_err();
    assert_eq!(fields(&err), vec!["files.dependencies"]);
    assert!(err.to_string().contains("requirements.txt"));
  }

  #[test]
  fn env_names_and_health_check() {
    let mut manifest = valid();
    manifest.env.required = vec!["DATABASE_URL".into(), "9LIVES".into()];
    manifest.env.optional.insert("bad-name".into(), "x".into());
    manifest.health_check = "health".into();
    let err = validate_manifest(&manifest, Path::new(".")).unwrap_err();
    assert_eq!(fields(&err), vec!["env.required[1]", "env.optional.bad-name", "health_check"]);
  }
}
