//! The `backend "s3"` block terraform reads from the working directory.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::backend::StateBackend;
use crate::consts::BACKEND_FILENAME;

/// Renders the backend declaration for `backend`.
pub fn render_backend_config(backend: &StateBackend) -> String {
  format!(
    r#"terraform {{
  backend "s3" {{
    bucket         = {}
    key            = {}
    region         = {}
    dynamodb_table = {}
    encrypt        = true
  }}
}}
"#,
    hcl_string(&backend.bucket),
    hcl_string(&backend.key),
    hcl_string(&backend.region),
    hcl_string(&backend.lock_table),
  )
}

/// Writes [`render_backend_config`] to `backend.tf` inside `dir`.
pub fn write_backend_config(dir: &Path, backend: &StateBackend) -> io::Result<PathBuf> {
  let path = dir.join(BACKEND_FILENAME);
  fs::write(&path, render_backend_config(backend))?;
  Ok(path)
}

fn hcl_string(value: &str) -> String {
  let escaped = value.replace('\\', "\\\\").replace('"', "\\\"").replace("${", "$${");
  format!("\"{}\"", escaped)
}
