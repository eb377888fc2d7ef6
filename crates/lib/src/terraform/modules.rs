//! Copying terraform module sources into a working directory.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

use crate::consts::TERRAFORM_CACHE_DIR;

#[derive(Debug, Error)]
pub enum CopyError {
  #[error("module source {} does not exist", .0.display())]
  SourceMissing(PathBuf),

  #[error("failed to walk {}: {source}", path.display())]
  Walk { path: PathBuf, source: walkdir::Error },

  #[error("failed to create directory {}: {source}", path.display())]
  CreateDir { path: PathBuf, source: std::io::Error },

  #[error("failed to copy {} to {}: {source}", from.display(), to.display())]
  CopyFile {
    from: PathBuf,
    to: PathBuf,
    source: std::io::Error,
  },
}

/// Recursively copies `src` into `dst`, creating directories as needed.
///
/// Any directory named `.terraform` is skipped together with everything
/// below it, at any depth. Returns the number of files copied.
pub fn copy_modules(src: &Path, dst: &Path) -> Result<usize, CopyError> {
  if !src.is_dir() {
    return Err(CopyError::SourceMissing(src.to_path_buf()));
  }

  let walker = WalkDir::new(src)
    .follow_links(true)
    .into_iter()
    .filter_entry(|e| e.depth() == 0 || e.file_name() != TERRAFORM_CACHE_DIR);

  let mut copied = 0;
  for entry in walker {
    let entry = entry.map_err(|source| CopyError::Walk {
      path: src.to_path_buf(),
      source,
    })?;
    let rel = entry.path().strip_prefix(src).unwrap_or(entry.path());
    let target = dst.join(rel);

    if entry.file_type().is_dir() {
      fs::create_dir_all(&target).map_err(|source| CopyError::CreateDir {
        path: target.clone(),
        source,
      })?;
    } else if entry.file_type().is_file() {
      if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|source| CopyError::CreateDir {
          path: parent.to_path_buf(),
          source,
        })?;
      }
      fs::copy(entry.path(), &target).map_err(|source| CopyError::CopyFile {
        from: entry.path().to_path_buf(),
        to: target.clone(),
        source,
      })?;
      copied += 1;
    }
  }

  debug!(src = %src.display(), dst = %dst.display(), files = copied, "copied modules");
  Ok(copied)
}
