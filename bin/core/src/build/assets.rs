//! The asset-resolution stage: include predicates decide
//! participation, embedded assets are pulled from blob storage
//! into the archive, referenced assets become manifest entries
//! carrying a signed retrieval URL.

use burndler_client::entities::{
  build::{AssetManifest, ManifestEntry},
  container::{ContainerAsset, StorageMode},
  error::ErrorKind,
};
use futures::{StreamExt, stream};

use crate::helpers::{AddErrorKind, CoreError, CoreResult, err};

use super::{BuildRunner, BuildUnit, render::ArchiveFile};

pub async fn resolve_assets(
  runner: &BuildRunner<'_>,
  units: &[BuildUnit],
) -> CoreResult<(Vec<ArchiveFile>, AssetManifest)> {
  let mut manifest = AssetManifest {
    version: String::from("1.0"),
    assets: Vec::new(),
  };
  let mut embedded = Vec::new();

  for unit in units {
    runner.check_cancelled()?;
    let Some(configuration) = &unit.configuration else {
      continue;
    };
    let mut to_fetch = Vec::new();
    for asset in &configuration.assets {
      // absent predicate means include
      if !asset.include_condition.is_empty()
        && !template::eval_condition(
          &asset.include_condition,
          &unit.vars,
        )
        .map_err(|e| CoreError {
          kind: e.kind(),
          error: anyhow::Error::from(e).context(format!(
            "include condition of asset '{}'",
            asset.path
          )),
        })?
      {
        continue;
      }

      let archive_path = format!(
        "assets/{}/{}",
        unit.namespace,
        asset.path.trim_start_matches('/')
      );
      match asset.storage_mode {
        StorageMode::Embedded => {
          if asset.storage_key.is_empty() {
            return Err(err(
              ErrorKind::InvalidRequest,
              format!(
                "embedded asset '{}' declares no storage handle",
                asset.path
              ),
            ));
          }
          to_fetch.push((archive_path, asset));
        }
        StorageMode::Referenced => {
          manifest.assets.push(ManifestEntry {
            path: archive_path,
            size: asset.size,
            checksum: asset.checksum.clone(),
            url: referenced_url(runner, asset)?,
          });
        }
      }
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
    for (archive_path, asset) in to_fetch {
      pending.push(Box::pin(async move {
        let bytes = runner
          .storage
          .download(&asset.storage_key)
          .await
          .error_kind(ErrorKind::StorageUnavailable)?;
        Ok::<ArchiveFile, CoreError>(ArchiveFile {
          path: archive_path,
          bytes: Some(bytes),
        })
      }));
    }
    let mut fetched = stream::iter(pending)
      .buffer_unordered(runner.fan_out)
      .collect::<Vec<CoreResult<ArchiveFile>>>()
      .await;
    for result in fetched.drain(..) {
      embedded.push(result?);
    }
  }

  manifest.assets.sort_by(|a, b| a.path.cmp(&b.path));
  Ok((embedded, manifest))
}

/// Referenced assets must carry a pre-resolved URL or a
/// storage handle to sign; never neither.
fn referenced_url(
  runner: &BuildRunner<'_>,
  asset: &ContainerAsset,
) -> CoreResult<String> {
  if !asset.url.is_empty() {
    return Ok(asset.url.clone());
  }
  if asset.storage_key.is_empty() {
    return Err(err(
      ErrorKind::InvalidRequest,
      format!(
        "referenced asset '{}' has neither a URL nor a storage handle",
        asset.path
      ),
    ));
  }
  runner
    .storage
    .signed_url(&asset.storage_key, runner.signed_url_ttl)
    .error_kind(ErrorKind::StorageUnavailable)
}
