mod doctor;
mod lifecycle;
mod status;
mod validate;

use anyhow::{Context, Result};
use tokio::runtime::Runtime;

pub use doctor::cmd_doctor;
pub use lifecycle::{cmd_deploy, cmd_destroy, cmd_plan};
pub use status::cmd_status;
pub use validate::cmd_validate;

/// Deployment phases run one at a time, so a single-threaded runtime is enough.
fn runtime() -> Result<Runtime> {
  tokio::runtime::Builder::new_current_thread()
    .enable_all()
    .build()
    .context("Failed to create async runtime")
}
