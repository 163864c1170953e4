use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use compose::{MergeInput, namespace_for};

use crate::CliError;

#[derive(Args)]
pub struct MergeArgs {
  /// Compose fragment files, merged in the order given. The
  /// file stem names the container for namespacing.
  #[arg(required = true)]
  pub files: Vec<PathBuf>,

  /// Service name used to derive the namespace slug.
  #[arg(long, default_value = "service")]
  pub service_name: String,

  /// Service id used in the namespace.
  #[arg(long, default_value_t = 0)]
  pub service_id: i64,

  /// Write the merged document here instead of stdout.
  #[arg(long)]
  pub output: Option<PathBuf>,

  /// Write the merge report (json) here.
  #[arg(long)]
  pub report: Option<PathBuf>,
}

pub async fn handle(args: &MergeArgs) -> Result<(), CliError> {
  let mut inputs = Vec::with_capacity(args.files.len());
  for file in &args.files {
    let container = file
      .file_stem()
      .map(|stem| stem.to_string_lossy().to_string())
      .unwrap_or_else(|| String::from("container"));
    let contents = tokio::fs::read_to_string(file)
      .await
      .with_context(|| format!("failed to read {file:?}"))
      .map_err(CliError::Internal)?;
    inputs.push(MergeInput {
      namespace: namespace_for(
        &args.service_name,
        args.service_id,
        &container,
      ),
      container,
      version: String::new(),
      compose: contents,
    });
  }

  let merged = compose::merge(&inputs)
    .map_err(|e| CliError::Validation(format!("{e:#}")))?;

  if let Some(report_path) = &args.report {
    let report = serde_json::to_string_pretty(&merged.report)
      .context("failed to serialize merge report")
      .map_err(CliError::Internal)?;
    tokio::fs::write(report_path, report)
      .await
      .with_context(|| {
        format!("failed to write report to {report_path:?}")
      })
      .map_err(CliError::Internal)?;
  }

  match &args.output {
    Some(output) => {
      tokio::fs::write(output, &merged.compose)
        .await
        .with_context(|| {
          format!("failed to write merged document to {output:?}")
        })
        .map_err(CliError::Internal)?;
      info!("wrote merged document to {output:?}");
    }
    None => print!("{}", merged.compose),
  }
  Ok(())
}
