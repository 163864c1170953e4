use std::path::PathBuf;

use anyhow::Context;
use burndler_client::entities::compose::LintOptions;
use clap::Args;

use crate::CliError;

#[derive(Args)]
pub struct LintArgs {
  /// The compose document to lint.
  pub file: PathBuf,

  /// Escalate missing resource limits to errors.
  #[arg(long)]
  pub strict: bool,

  /// Services allowed to run privileged.
  #[arg(long)]
  pub allow_privileged: Vec<String>,

  /// Services allowed to use host networking.
  #[arg(long)]
  pub allow_host_network: Vec<String>,
}

pub async fn handle(args: &LintArgs) -> Result<(), CliError> {
  let document = tokio::fs::read_to_string(&args.file)
    .await
    .with_context(|| format!("failed to read {:?}", args.file))
    .map_err(CliError::Internal)?;
  if document.trim().is_empty() {
    return Err(CliError::Validation(format!(
      "{:?} is empty",
      args.file
    )));
  }

  let options = LintOptions {
    strict: args.strict,
    allow_privileged: args.allow_privileged.clone(),
    allow_host_network: args.allow_host_network.clone(),
  };
  let report = compose::lint(&document, &options);

  println!(
    "{}",
    serde_json::to_string_pretty(&report)
      .context("failed to serialize lint report")
      .map_err(CliError::Internal)?
  );

  if report.valid {
    Ok(())
  } else {
    Err(CliError::Validation(format!(
      "{} lint error(s)",
      report.errors.len()
    )))
  }
}
