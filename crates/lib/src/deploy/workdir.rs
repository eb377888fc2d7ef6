//! Per-deployment working directories.
//!
//! Every directory a deployment creates is named
//! `byoa-deploy-<app>-<uuid>`. Removal is refused for anything whose name
//! lacks that sentinel, whoever asks for it.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::consts::WORK_DIR_SENTINEL;

/// A fresh, unique working directory path under `root`. Nothing is created.
pub fn new_work_dir_path(root: &Path, app_name: &str) -> PathBuf {
  root.join(format!("{}{}-{}", WORK_DIR_SENTINEL, app_name, Uuid::new_v4()))
}

/// Whether `path`'s final component carries the deployment sentinel.
pub fn is_owned_work_dir(path: &Path) -> bool {
  path
    .file_name()
    .and_then(|name| name.to_str())
    .is_some_and(|name| name.contains(WORK_DIR_SENTINEL))
}

/// Removes `path` if it is a deployment working directory.
///
/// Returns `Ok(false)` without touching the filesystem when the guard
/// refuses, and also when the directory is already gone.
pub fn remove_owned_work_dir(path: &Path) -> io::Result<bool> {
  if !is_owned_work_dir(path) {
    warn!(path = %path.display(), "refusing to remove directory not created by a deployment");
    return Ok(false);
  }
  match fs::remove_dir_all(path) {
    Ok(()) => {
      debug!(path = %path.display(), "removed working directory");
      Ok(true)
    }
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
    Err(e) => Err(e),
  }
}
