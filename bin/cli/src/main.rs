//! Operational tooling over the merge / lint / package
//! pipeline, for use in CI and on air-gapped staging hosts.
//!
//! Exit codes: 0 on success, 2 on validation or lint
//! failure, 1 on internal error.

#[macro_use]
extern crate tracing;

use burndler_client::entities::logger::{LogConfig, LogLevel};
use clap::{Parser, Subcommand};
use colored::Colorize;

mod command;

#[derive(Parser)]
#[command(
  name = "burndler",
  about = "Burndler installer tooling: merge, lint and package compose fragments",
  version
)]
struct CliArgs {
  #[command(subcommand)]
  command: Command,

  /// Log level for diagnostic output.
  #[arg(long, global = true, default_value = "warn")]
  log_level: String,
}

#[derive(Subcommand)]
enum Command {
  /// Merge compose fragments into one namespaced document.
  Merge(command::merge::MergeArgs),
  /// Lint a compose document against the air-gapped policy.
  Lint(command::lint::LintArgs),
  /// Package a merged document and a files directory into an
  /// installer archive.
  Package(command::package::PackageArgs),
}

/// Validation failures exit 2, internal errors exit 1.
pub enum CliError {
  Validation(String),
  Internal(anyhow::Error),
}

impl From<anyhow::Error> for CliError {
  fn from(error: anyhow::Error) -> CliError {
    CliError::Internal(error)
  }
}

async fn app(args: CliArgs) -> Result<(), CliError> {
  match &args.command {
    Command::Merge(merge) => command::merge::handle(merge).await,
    Command::Lint(lint) => command::lint::handle(lint).await,
    Command::Package(package) => {
      command::package::handle(package).await
    }
  }
}

#[tokio::main]
async fn main() {
  dotenvy::dotenv().ok();
  let args = CliArgs::parse();
  let level = match args.log_level.as_str() {
    "trace" => LogLevel::Trace,
    "debug" => LogLevel::Debug,
    "info" => LogLevel::Info,
    "error" => LogLevel::Error,
    _ => LogLevel::Warn,
  };
  logger::init(&LogConfig {
    level,
    ..Default::default()
  })
  .expect("failed to init logger");

  let code = match app(args).await {
    Ok(()) => 0,
    Err(CliError::Validation(message)) => {
      eprintln!("{}: {message}", "INVALID".red());
      2
    }
    Err(CliError::Internal(error)) => {
      eprintln!("{}: {error:#}", "ERROR".red());
      1
    }
  };
  std::process::exit(code);
}
