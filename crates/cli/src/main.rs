mod cmd;
mod output;
mod prompts;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use byoa_lib::consts::MANIFEST_FILENAME;

use crate::output::{OutputFormat, print_error};

/// Deploy applications into your own AWS account
#[derive(Parser)]
#[command(name = "byoa")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable debug logging
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Output format
  #[arg(short, long, global = true, value_enum, default_value_t)]
  output: OutputFormat,

  #[command(subcommand)]
  command: Commands,
}

/// Flags shared by every command that touches infrastructure.
#[derive(Args, Debug, Clone)]
pub struct DeployArgs {
  /// Path to the application manifest
  #[arg(short, long, default_value = MANIFEST_FILENAME)]
  pub file: PathBuf,

  /// Deployment environment (default: prod)
  #[arg(long = "env")]
  pub environment: Option<String>,

  /// AWS region (default: AWS_REGION, AWS_DEFAULT_REGION, then the CLI profile)
  #[arg(long)]
  pub region: Option<String>,

  /// Name recorded in the deployed-by tag (default: derived from the caller ARN)
  #[arg(long)]
  pub owner: Option<String>,

  /// Terraform module tree (default: BYOA_MODULES_DIR or the data directory)
  #[arg(long = "modules")]
  pub modules: Option<PathBuf>,

  /// Use this working directory instead of a generated one
  #[arg(long)]
  pub work_dir: Option<PathBuf>,

  /// Stream terraform output while it runs
  #[arg(long)]
  pub stream: bool,

  /// Keep the working directory after the command finishes
  #[arg(long)]
  pub keep_workdir: bool,
}

#[derive(Subcommand)]
enum Commands {
  /// Check a manifest without touching any infrastructure
  Validate {
    /// Path to the application manifest
    #[arg(short, long, default_value = MANIFEST_FILENAME)]
    file: PathBuf,
  },

  /// Show what a deployment would change
  Plan(DeployArgs),

  /// Plan and apply a deployment
  Deploy {
    #[command(flatten)]
    args: DeployArgs,

    /// Prebuilt container image to run
    #[arg(long)]
    image: Option<String>,
  },

  /// Tear down a deployment's infrastructure
  Destroy {
    #[command(flatten)]
    args: DeployArgs,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    yes: bool,
  },

  /// List recorded deployments
  Status,

  /// Check that terraform and the AWS CLI are available
  Doctor,
}

fn main() -> ExitCode {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "warn" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let result = match cli.command {
    Commands::Validate { file } => cmd::cmd_validate(&file, cli.output),
    Commands::Plan(args) => cmd::cmd_plan(&args, cli.output),
    Commands::Deploy { args, image } => cmd::cmd_deploy(&args, image, cli.output),
    Commands::Destroy { args, yes } => cmd::cmd_destroy(&args, yes, cli.output),
    Commands::Status => cmd::cmd_status(cli.output),
    Commands::Doctor => cmd::cmd_doctor(cli.output),
  };

  match result {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) => {
      print_error(&format!("{:#}", err));
      ExitCode::FAILURE
    }
  }
}
