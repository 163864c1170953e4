//! The template-render stage: every declared container file is
//! gated by its include condition, then rendered (templates),
//! streamed verbatim (static files) or emitted as a path marker
//! (directories). Fetch-and-render fans out bounded per
//! container; final ordering is fixed by a later sort.

use burndler_client::entities::{
  container::{ContainerFile, FileKind},
  error::ErrorKind,
};
use bytes::Bytes;
use futures::{StreamExt, stream};

use crate::helpers::{AddErrorKind, CoreError, CoreResult, err};

use super::{BuildRunner, BuildUnit};

#[derive(Debug, Clone)]
pub struct ArchiveFile {
  /// Fully qualified path inside the installer archive.
  pub path: String,
  /// `None` marks a directory entry.
  pub bytes: Option<Bytes>,
}

impl ArchiveFile {
  pub fn regular(
    path: impl Into<String>,
    bytes: impl Into<Bytes>,
  ) -> ArchiveFile {
    ArchiveFile {
      path: path.into(),
      bytes: Some(bytes.into()),
    }
  }

  pub fn directory(path: impl Into<String>) -> ArchiveFile {
    ArchiveFile {
      path: path.into(),
      bytes: None,
    }
  }
}

pub async fn render_files(
  runner: &BuildRunner<'_>,
  units: &[BuildUnit],
) -> CoreResult<Vec<ArchiveFile>> {
  let mut out = Vec::new();
  for unit in units {
    runner.check_cancelled()?;
    let Some(configuration) = &unit.configuration else {
      continue;
    };
    let mut included = Vec::new();
    for file in &configuration.files {
      if !file.include_condition.is_empty()
        && !template::eval_condition(
          &file.include_condition,
          &unit.vars,
        )
        .map_err(|e| template_error(e, &unit.container.name))?
      {
        continue;
      }
      included.push(file);
    }
    let mut pending: Vec<
      std::pin::Pin<
        Box<
          dyn std::future::Future<Output = CoreResult<ArchiveFile>>
            + Send
            + '_,
        >,
      >,
    > = Vec::new();
    for file in included {
      pending.push(Box::pin(render_one(runner, unit, file)));
    }
    let mut results = stream::iter(pending)
      .buffer_unordered(runner.fan_out)
      .collect::<Vec<CoreResult<ArchiveFile>>>()
      .await;
    for result in results.drain(..) {
      out.push(result?);
    }
  }
  Ok(out)
}

async fn render_one(
  runner: &BuildRunner<'_>,
  unit: &BuildUnit,
  file: &ContainerFile,
) -> CoreResult<ArchiveFile> {
  let archive_path = format!(
    "files/{}/{}",
    unit.namespace,
    file.path.trim_start_matches('/')
  );
  match file.kind {
    FileKind::Directory => {
      Ok(ArchiveFile::directory(archive_path))
    }
    FileKind::Static => {
      let bytes = runner
        .storage
        .download(&file.storage_key)
        .await
        .error_kind(ErrorKind::StorageUnavailable)?;
      Ok(ArchiveFile {
        path: archive_path,
        bytes: Some(bytes),
      })
    }
    FileKind::Template => {
      let bytes = runner
        .storage
        .download(&file.storage_key)
        .await
        .error_kind(ErrorKind::StorageUnavailable)?;
      let text = String::from_utf8(bytes.to_vec()).map_err(|_| {
        err(
          ErrorKind::TemplateParseError,
          format!("template '{}' is not valid utf-8", file.path),
        )
      })?;
      let rendered =
        template::render(&text, file.format, &unit.vars).map_err(
          |e| template_error(e, &unit.container.name),
        )?;
      Ok(ArchiveFile::regular(archive_path, rendered))
    }
  }
}

fn template_error(
  e: template::Error,
  container: &str,
) -> CoreError {
  CoreError {
    kind: e.kind(),
    error: anyhow::Error::from(e)
      .context(format!("container '{container}'")),
  }
}
