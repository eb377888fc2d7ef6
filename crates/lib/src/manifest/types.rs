//! Manifest types.
//!
//! A manifest is the declarative description of one application's deployable
//! shape. It is authored by hand as YAML, loaded once per run and never
//! mutated afterwards.
//!
//! Every field is optional at the serde level so that a half-written manifest
//! still parses; missing and malformed values are reported together by
//! [`Manifest::validate`](super::Manifest::validate) instead of failing on the
//! first one.
//!
//! # Example
//!
//! ```yaml
//! name: test-api
//! runtime: python3.11
//! start_command: uvicorn main:app --host 0.0.0.0
//! port: 8080
//! health_check: /health
//! endpoints:
//!   - GET /items
//!   - POST /items
//! env:
//!   required: [DATABASE_URL]
//!   optional:
//!     LOG_LEVEL: info
//! scaling:
//!   min: 1
//!   max: 4
//!   target_cpu_percent: 60
//! resources:
//!   cpu: 500m
//!   memory: 1Gi
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The declared application.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Manifest {
  /// Application identifier; lowercase letters, digits and hyphens.
  pub name: String,

  /// Runtime tag, e.g. `python3.11`, `node20` or `custom`.
  pub runtime: String,

  /// Command the container runs on start.
  pub start_command: String,

  /// Port the application listens on.
  ///
  /// Kept signed so out-of-range values reach validation instead of failing
  /// deserialization.
  pub port: i64,

  #[serde(skip_serializing_if = "Option::is_none")]
  pub files: Option<FileRefs>,

  /// `"METHOD /path"` entries.
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub endpoints: Vec<String>,

  #[serde(skip_serializing_if = "EnvContract::is_empty")]
  pub env: EnvContract,

  #[serde(skip_serializing_if = "String::is_empty")]
  pub health_check: String,

  #[serde(skip_serializing_if = "Option::is_none")]
  pub scaling: Option<Scaling>,

  #[serde(skip_serializing_if = "Option::is_none")]
  pub resources: Option<Resources>,
}

/// Files the application ships with, relative to the manifest.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileRefs {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub main: Option<String>,

  #[serde(skip_serializing_if = "Option::is_none")]
  pub dependencies: Option<String>,

  #[serde(skip_serializing_if = "Option::is_none")]
  pub dockerfile: Option<String>,
}

impl FileRefs {
  /// Named references as `(field, path)` pairs.
  pub fn named(&self) -> impl Iterator<Item = (&'static str, &str)> {
    [
      ("files.main", self.main.as_deref()),
      ("files.dependencies", self.dependencies.as_deref()),
      ("files.dockerfile", self.dockerfile.as_deref()),
    ]
    .into_iter()
    .filter_map(|(field, path)| path.map(|p| (field, p)))
  }
}

/// The environment-variable contract.
///
/// Required variables must be provided at deploy time; optional ones fall
/// back to the declared default.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvContract {
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub required: Vec<String>,

  #[serde(skip_serializing_if = "BTreeMap::is_empty")]
  pub optional: BTreeMap<String, String>,
}

impl EnvContract {
  pub fn is_empty(&self) -> bool {
    self.required.is_empty() && self.optional.is_empty()
  }
}

/// Horizontal scaling bounds.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scaling {
  pub min: i64,
  pub max: i64,

  #[serde(skip_serializing_if = "Option::is_none")]
  pub target_cpu_percent: Option<i64>,
}

/// Per-instance resource limits as quantity strings (`512Mi`, `0.5`, `250m`).
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Resources {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub memory: Option<String>,

  /// `250m` is millicores and `2vcpu` is explicit vCPUs. A plain number up
  /// to 16 counts as vCPUs; above 16 it is taken as raw Fargate units
  /// (1024 per vCPU), so `16` and `17` are far apart.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub cpu: Option<String>,
}

/// Splits an endpoint declaration into `(method, path)`.
///
/// Returns `None` when the entry is not two whitespace-separated parts.
pub fn parse_endpoint(entry: &str) -> Option<(&str, &str)> {
  let mut parts = entry.split_whitespace();
  let method = parts.next()?;
  let path = parts.next()?;
  if parts.next().is_some() {
    return None;
  }
  Some((method, path))
}
