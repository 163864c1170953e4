use std::path::{Path, PathBuf};

use anyhow::Context;
use async_compression::tokio::write::GzipEncoder;
use burndler_client::entities::compose::LintOptions;
use clap::Args;
use tokio::io::AsyncWriteExt;

use crate::CliError;

#[derive(Args)]
pub struct PackageArgs {
  /// The merged compose document to package.
  pub compose: PathBuf,

  /// Directory of additional files to bundle under `files/`.
  #[arg(long)]
  pub files: Option<PathBuf>,

  /// Output archive path.
  #[arg(long, default_value = "installer.tar.gz")]
  pub output: PathBuf,

  /// Escalate missing resource limits to errors during the
  /// pre-package lint.
  #[arg(long)]
  pub strict: bool,
}

/// Lint, then write a deterministic `installer.tar.gz` next
/// to the operator.
pub async fn handle(args: &PackageArgs) -> Result<(), CliError> {
  let document = tokio::fs::read_to_string(&args.compose)
    .await
    .with_context(|| format!("failed to read {:?}", args.compose))
    .map_err(CliError::Internal)?;

  let options = LintOptions {
    strict: args.strict,
    ..Default::default()
  };
  let report = compose::lint(&document, &options);
  if !report.valid {
    let first = report
      .first_error()
      .map(|e| format!("{} at {}", e.rule, e.path))
      .unwrap_or_default();
    return Err(CliError::Validation(format!(
      "{} lint error(s), first: {first}",
      report.errors.len()
    )));
  }

  let mut entries: Vec<(String, Vec<u8>)> = vec![
    (String::from("compose.yaml"), document.into_bytes()),
    (
      String::from("lint.json"),
      serde_json::to_vec_pretty(&report)
        .context("failed to serialize lint report")
        .map_err(CliError::Internal)?,
    ),
  ];
  if let Some(files) = &args.files {
    collect_files(files, files, &mut entries)
      .map_err(CliError::Internal)?;
  }
  entries.sort_by(|a, b| a.0.cmp(&b.0));

  let mut builder = tar::Builder::new(Vec::new());
  for (path, bytes) in &entries {
    let mut header = tar::Header::new_gnu();
    header.set_entry_type(tar::EntryType::Regular);
    header.set_mode(0o644);
    header.set_mtime(0);
    header.set_uid(0);
    header.set_gid(0);
    header.set_size(bytes.len() as u64);
    builder
      .append_data(&mut header, path, &bytes[..])
      .with_context(|| format!("failed to append '{path}'"))
      .map_err(CliError::Internal)?;
  }
  let tar_bytes = builder
    .into_inner()
    .context("failed to finish archive")
    .map_err(CliError::Internal)?;

  let mut encoder = GzipEncoder::with_quality(
    Vec::new(),
    async_compression::Level::Best,
  );
  encoder
    .write_all(&tar_bytes)
    .await
    .context("failed to compress archive")
    .map_err(CliError::Internal)?;
  encoder
    .shutdown()
    .await
    .context("failed to finish compression")
    .map_err(CliError::Internal)?;

  tokio::fs::write(&args.output, encoder.into_inner())
    .await
    .with_context(|| {
      format!("failed to write archive to {:?}", args.output)
    })
    .map_err(CliError::Internal)?;
  info!("wrote installer archive to {:?}", args.output);
  println!("{}", args.output.display());
  Ok(())
}

fn collect_files(
  root: &Path,
  dir: &Path,
  entries: &mut Vec<(String, Vec<u8>)>,
) -> anyhow::Result<()> {
  for entry in std::fs::read_dir(dir)
    .with_context(|| format!("failed to read dir {dir:?}"))?
  {
    let entry = entry
      .with_context(|| format!("failed to read dir {dir:?}"))?;
    let path = entry.path();
    if path.is_dir() {
      collect_files(root, &path, entries)?;
      continue;
    }
    let relative = path
      .strip_prefix(root)
      .context("file escaped the files root")?
      .to_string_lossy()
      .replace('\\', "/");
    let bytes = std::fs::read(&path)
      .with_context(|| format!("failed to read {path:?}"))?;
    entries.push((format!("files/{relative}"), bytes));
  }
  Ok(())
}
