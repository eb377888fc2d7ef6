//! Application manifest.
//!
//! Loading, saving and validating the YAML file that declares an
//! application's deployable shape.

mod image;
mod types;
mod validate;

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

pub use image::{DEFAULT_BASE_IMAGE, derived_start_image};
pub use types::*;
pub use validate::{HTTP_METHODS, SUPPORTED_RUNTIMES, ValidationError, Violation, is_valid_name, is_valid_quantity};

pub(crate) use validate::split_quantity;

/// Errors that can occur when loading or saving a manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
  #[error("failed to read manifest {}: {source}", path.display())]
  Read { path: PathBuf, source: std::io::Error },

  #[error("failed to parse manifest {}: {source}", path.display())]
  Parse { path: PathBuf, source: serde_yaml::Error },

  #[error("failed to serialize manifest: {0}")]
  Serialize(#[source] serde_yaml::Error),

  #[error("failed to write manifest {}: {source}", path.display())]
  Write { path: PathBuf, source: std::io::Error },

  #[error(transparent)]
  Invalid(#[from] ValidationError),
}

impl Manifest {
  /// Parses and validates the manifest at `path`.
  ///
  /// `files.*` references are resolved against the manifest's directory,
  /// not the current working directory, so `byoa validate -f app/byoa.yaml`
  /// finds `app/main.py`. [`Manifest::validate`] checks against the working
  /// directory instead.
  pub fn load(path: &Path) -> Result<Self, ManifestError> {
    let content = fs::read_to_string(path).map_err(|source| ManifestError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    let manifest: Manifest = serde_yaml::from_str(&content).map_err(|source| ManifestError::Parse {
      path: path.to_path_buf(),
      source,
    })?;

    let base_dir = manifest_dir(path);
    debug!(path = %path.display(), base_dir = %base_dir.display(), "loaded manifest");
    manifest.validate_in(&base_dir)?;
    Ok(manifest)
  }

  /// Serializes the manifest to `path` as YAML.
  pub fn save(&self, path: &Path) -> Result<(), ManifestError> {
    let content = serde_yaml::to_string(self).map_err(ManifestError::Serialize)?;
    fs::write(path, content).map_err(|source| ManifestError::Write {
      path: path.to_path_buf(),
      source,
    })
  }

  /// Validates every rule, resolving `files.*` against the current directory.
  pub fn validate(&self) -> Result<(), ValidationError> {
    self.validate_in(Path::new("."))
  }

  /// Validates every rule, resolving `files.*` against `base_dir`.
  pub fn validate_in(&self, base_dir: &Path) -> Result<(), ValidationError> {
    validate::validate_manifest(self, base_dir)
  }

  /// Base image for this manifest's runtime.
  pub fn start_image(&self) -> &'static str {
    derived_start_image(&self.runtime)
  }
}

fn manifest_dir(path: &Path) -> PathBuf {
  let parent = match path.parent() {
    Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
    _ => PathBuf::from("."),
  };
  dunce::canonicalize(&parent).unwrap_or(parent)
}
