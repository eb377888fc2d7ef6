//! Local deployment records.
//!
//! After a successful deploy the orchestrator writes one record per
//! application name, replacing whatever was there before. Records are
//! informational: losing them never affects the deployed infrastructure.
//!
//! # Storage Layout
//!
//! ```text
//! {config_dir}/deployments.json
//! {
//!   "version": 1,
//!   "deployments": { "<app>": { "type": "byoa", "account_id": ..., ... } }
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::consts::RECORD_TYPE;
use crate::platform::paths::records_path;

/// Current records file format version.
pub const RECORDS_VERSION: u32 = 1;

/// One application's most recent deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
  #[serde(rename = "type")]
  pub kind: String,
  pub account_id: String,
  pub region: String,
  pub environment: String,
  pub endpoint: String,
  pub timestamp: DateTime<Utc>,
}

impl DeploymentRecord {
  pub fn new(
    account_id: impl Into<String>,
    region: impl Into<String>,
    environment: impl Into<String>,
    endpoint: impl Into<String>,
    timestamp: DateTime<Utc>,
  ) -> Self {
    Self {
      kind: RECORD_TYPE.to_string(),
      account_id: account_id.into(),
      region: region.into(),
      environment: environment.into(),
      endpoint: endpoint.into(),
      timestamp,
    }
  }

  /// Whether this record is for the given account, region and environment.
  pub fn describes(&self, account_id: &str, region: &str, environment: &str) -> bool {
    self.account_id == account_id && self.region == region && self.environment == environment
  }
}

/// Records keyed by application name.
pub type DeploymentRecords = BTreeMap<String, DeploymentRecord>;

#[derive(Debug, Error)]
pub enum RecordError {
  #[error("failed to read deployment records {}: {source}", path.display())]
  Read { path: PathBuf, source: io::Error },

  #[error("failed to parse deployment records {}: {source}", path.display())]
  Parse { path: PathBuf, source: serde_json::Error },

  #[error("unsupported deployment records version {0}")]
  UnsupportedVersion(u32),

  #[error("failed to serialize deployment records: {0}")]
  Serialize(#[source] serde_json::Error),

  #[error("failed to write deployment records {}: {source}", path.display())]
  Write { path: PathBuf, source: io::Error },
}

/// Load/save access to the record map.
pub trait RecordStore: Send + Sync {
  fn load(&self) -> Result<DeploymentRecords, RecordError>;
  fn save(&self, records: &DeploymentRecords) -> Result<(), RecordError>;
}

/// Loads, inserts (replacing any prior entry for `app`) and saves.
pub fn upsert_record(store: &dyn RecordStore, app: &str, record: DeploymentRecord) -> Result<(), RecordError> {
  let mut records = store.load()?;
  records.insert(app.to_string(), record);
  store.save(&records)
}

/// Removes `app`'s record when it describes the given target. Returns
/// whether one was removed.
///
/// Records are keyed by application name only, so a record left by another
/// environment, account or region is kept.
pub fn remove_record(
  store: &dyn RecordStore,
  app: &str,
  account_id: &str,
  region: &str,
  environment: &str,
) -> Result<bool, RecordError> {
  let mut records = store.load()?;
  match records.get(app) {
    Some(record) if record.describes(account_id, region, environment) => {}
    _ => return Ok(false),
  }
  records.remove(app);
  store.save(&records)?;
  Ok(true)
}

#[derive(Debug, Serialize, Deserialize)]
struct RecordsFile {
  version: u32,
  #[serde(default)]
  deployments: DeploymentRecords,
}

/// Records persisted as a single JSON file.
#[derive(Debug, Clone)]
pub struct JsonRecordStore {
  path: PathBuf,
}

impl JsonRecordStore {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  /// Store at the platform config location, honouring `BYOA_CONFIG_DIR`.
  pub fn default_store() -> Self {
    Self::new(records_path())
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  fn temp_path(&self) -> PathBuf {
    let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    self.path.with_file_name(name)
  }
}

impl RecordStore for JsonRecordStore {
  fn load(&self) -> Result<DeploymentRecords, RecordError> {
    let content = match fs::read_to_string(&self.path) {
      Ok(content) => content,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(DeploymentRecords::new()),
      Err(source) => {
        return Err(RecordError::Read {
          path: self.path.clone(),
          source,
        });
      }
    };

    let file: RecordsFile = serde_json::from_str(&content).map_err(|source| RecordError::Parse {
      path: self.path.clone(),
      source,
    })?;
    if file.version != RECORDS_VERSION {
      return Err(RecordError::UnsupportedVersion(file.version));
    }
    Ok(file.deployments)
  }

  fn save(&self, records: &DeploymentRecords) -> Result<(), RecordError> {
    let write_err = |source| RecordError::Write {
      path: self.path.clone(),
      source,
    };

    if let Some(parent) = self.path.parent() {
      fs::create_dir_all(parent).map_err(write_err)?;
    }

    let file = RecordsFile {
      version: RECORDS_VERSION,
      deployments: records.clone(),
    };
    let content = serde_json::to_string_pretty(&file).map_err(RecordError::Serialize)?;

    // Write to a sibling then rename so readers never see a torn file.
    let temp = self.temp_path();
    fs::write(&temp, content).map_err(write_err)?;
    fs::rename(&temp, &self.path).map_err(write_err)?;

    debug!(path = %self.path.display(), count = records.len(), "saved deployment records");
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;
  use tempfile::TempDir;

  fn record(env: &str, endpoint: &str) -> DeploymentRecord {
    let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
    DeploymentRecord::new("123456789012", "us-east-1", env, endpoint, at)
  }

  #[test]
  fn missing_file_is_empty() {
    let dir = TempDir::new().unwrap();
    let store = JsonRecordStore::new(dir.path().join("deployments.json"));
    assert!(store.load().unwrap().is_empty());
  }

  #[test]
  fn upsert_replaces_prior_entry() {
    let dir = TempDir::new().unwrap();
    let store = JsonRecordStore::new(dir.path().join("nested").join("deployments.json"));

    upsert_record(&store, "orders", record("staging", "https://old.example.com")).unwrap();
    upsert_record(&store, "billing", record("prod", "https://billing.example.com")).unwrap();
    upsert_record(&store, "orders", record("prod", "https://new.example.com")).unwrap();

    let records = store.load().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records["orders"].environment, "prod");
    assert_eq!(records["orders"].endpoint, "https://new.example.com");
    assert_eq!(records["orders"].kind, "byoa");
    assert!(!dir.path().join("nested").join("deployments.json.tmp").exists());
  }

  #[test]
  fn remove_reports_presence() {
    let dir = TempDir::new().unwrap();
    let store = JsonRecordStore::new(dir.path().join("deployments.json"));
    upsert_record(&store, "orders", record("prod", "")).unwrap();

    assert!(remove_record(&store, "orders", "123456789012", "us-east-1", "prod").unwrap());
    assert!(!remove_record(&store, "orders", "123456789012", "us-east-1", "prod").unwrap());
    assert!(store.load().unwrap().is_empty());
  }

  #[test]
  fn remove_keeps_record_of_other_target() {
    let dir = TempDir::new().unwrap();
    let store = JsonRecordStore::new(dir.path().join("deployments.json"));
    upsert_record(&store, "orders", record("prod", "https://orders.example.com")).unwrap();

    assert!(!remove_record(&store, "orders", "123456789012", "us-east-1", "staging").unwrap());
    assert!(!remove_record(&store, "orders", "210987654321", "us-east-1", "prod").unwrap());
    assert!(!remove_record(&store, "orders", "123456789012", "eu-west-1", "prod").unwrap());
    assert_eq!(store.load().unwrap()["orders"].environment, "prod");
  }

  #[test]
  fn file_format() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("deployments.json");
    let store = JsonRecordStore::new(&path);
    upsert_record(&store, "orders", record("prod", "https://api.example.com")).unwrap();

    let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(value["version"], 1);
    let entry = &value["deployments"]["orders"];
    assert_eq!(entry["type"], "byoa");
    assert_eq!(entry["account_id"], "123456789012");
    assert_eq!(entry["timestamp"], "2026-03-01T12:00:00Z");
  }

  #[test]
  fn rejects_unknown_version() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("deployments.json");
    fs::write(&path, r#"{"version": 9, "deployments": {}}"#).unwrap();
    let err = JsonRecordStore::new(&path).load().unwrap_err();
    assert!(matches!(err, RecordError::UnsupportedVersion(9)));
  }

  #[test]
  fn corrupt_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("deployments.json");
    fs::write(&path, "{").unwrap();
    assert!(matches!(
      JsonRecordStore::new(&path).load(),
      Err(RecordError::Parse { .. })
    ));
  }
}
