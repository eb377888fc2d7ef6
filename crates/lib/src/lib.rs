//! byoa-lib: deploy an application into your own AWS account.
//!
//! The crate turns a declarative application manifest into running
//! infrastructure by driving Terraform:
//! - [`manifest`]: the manifest model and its validator
//! - [`variables`]: manifest plus context to Terraform input variables
//! - [`backend`]: the per-account S3/DynamoDB state backend and its bootstrap
//! - [`terraform`]: the Terraform process driver
//! - [`deploy`]: the deployment lifecycle tying the pieces together

pub mod backend;
pub mod consts;
pub mod deploy;
pub mod identity;
pub mod manifest;
pub mod platform;
pub mod process;
pub mod records;
pub mod sink;
pub mod terraform;
pub mod util;
pub mod variables;
