//! Filesystem locations.
//!
//! Each location can be overridden with an environment variable, otherwise
//! it follows the XDG base directory layout (or `%APPDATA%` on Windows).

use std::path::PathBuf;

use crate::consts::APP_NAME;

/// Overrides [`config_dir`].
pub const CONFIG_DIR_ENV: &str = "BYOA_CONFIG_DIR";
/// Overrides [`modules_dir`].
pub const MODULES_DIR_ENV: &str = "BYOA_MODULES_DIR";
/// Overrides [`work_root`].
pub const WORK_ROOT_ENV: &str = "BYOA_WORK_ROOT";

const RECORDS_FILENAME: &str = "deployments.json";
const MODULES_DIRNAME: &str = "modules";

fn env_path(key: &str) -> Option<PathBuf> {
  std::env::var_os(key).filter(|v| !v.is_empty()).map(PathBuf::from)
}

/// Returns the user's home directory, or `.` when it cannot be determined.
#[cfg(windows)]
pub fn home_dir() -> PathBuf {
  env_path("USERPROFILE").unwrap_or_else(|| PathBuf::from("."))
}

/// Returns the user's home directory, or `.` when it cannot be determined.
#[cfg(not(windows))]
pub fn home_dir() -> PathBuf {
  env_path("HOME").unwrap_or_else(|| PathBuf::from("."))
}

/// Directory holding user configuration and the deployment records.
#[cfg(windows)]
pub fn config_dir() -> PathBuf {
  if let Some(dir) = env_path(CONFIG_DIR_ENV) {
    return dir;
  }
  env_path("APPDATA").unwrap_or_else(home_dir).join(APP_NAME)
}

/// Directory holding user configuration and the deployment records.
#[cfg(not(windows))]
pub fn config_dir() -> PathBuf {
  if let Some(dir) = env_path(CONFIG_DIR_ENV) {
    return dir;
  }
  env_path("XDG_CONFIG_HOME")
    .unwrap_or_else(|| home_dir().join(".config"))
    .join(APP_NAME)
}

#[cfg(windows)]
pub fn data_dir() -> PathBuf {
  env_path("LOCALAPPDATA")
    .or_else(|| env_path("APPDATA"))
    .unwrap_or_else(home_dir)
    .join(APP_NAME)
}

#[cfg(not(windows))]
pub fn data_dir() -> PathBuf {
  env_path("XDG_DATA_HOME")
    .unwrap_or_else(|| home_dir().join(".local").join("share"))
    .join(APP_NAME)
}

/// Where the infrastructure module tree is installed.
pub fn modules_dir() -> PathBuf {
  env_path(MODULES_DIR_ENV).unwrap_or_else(|| data_dir().join(MODULES_DIRNAME))
}

/// Scratch root under which per-deployment working directories are created.
pub fn work_root() -> PathBuf {
  env_path(WORK_ROOT_ENV).unwrap_or_else(std::env::temp_dir)
}

/// Location of the local deployment records file.
pub fn records_path() -> PathBuf {
  config_dir().join(RECORDS_FILENAME)
}
