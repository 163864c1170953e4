//! The packaging stage: a deterministic gzipped tar streamed
//! into blob storage under a build-scoped key.
//!
//! Entry metadata is zeroed so that two builds of the same
//! snapshot produce byte-identical archives.

use anyhow::Context;
use async_compression::tokio::write::GzipEncoder;
use burndler_client::entities::error::ErrorKind;
use tokio::io::AsyncWriteExt;

use crate::helpers::{AddErrorKind, CoreResult, err};

use super::{BuildRunner, BuildUnit, render::ArchiveFile};

pub async fn package(
  runner: &BuildRunner<'_>,
  build_id: &str,
  entries: Vec<ArchiveFile>,
) -> CoreResult<String> {
  runner.check_cancelled()?;
  let tar_bytes = build_tar(&entries)?;

  let mut encoder = GzipEncoder::with_quality(
    Vec::new(),
    async_compression::Level::Best,
  );
  encoder
    .write_all(&tar_bytes)
    .await
    .context("failed to compress installer archive")
    .error_kind(ErrorKind::Internal)?;
  encoder
    .shutdown()
    .await
    .context("failed to finish installer compression")
    .error_kind(ErrorKind::Internal)?;
  let compressed = encoder.into_inner();

  let key = format!("builds/{build_id}/installer.tar.gz");
  runner
    .storage
    .upload(&key, compressed.into())
    .await
    .error_kind(ErrorKind::StorageUnavailable)
}

fn build_tar(entries: &[ArchiveFile]) -> CoreResult<Vec<u8>> {
  let mut builder = tar::Builder::new(Vec::new());
  for entry in entries {
    let mut header = tar::Header::new_gnu();
    header.set_mtime(0);
    header.set_uid(0);
    header.set_gid(0);
    match &entry.bytes {
      Some(bytes) => {
        header.set_entry_type(tar::EntryType::Regular);
        header.set_mode(if is_executable(&entry.path) {
          0o755
        } else {
          0o644
        });
        header.set_size(bytes.len() as u64);
        builder
          .append_data(&mut header, &entry.path, &bytes[..])
          .with_context(|| {
            format!("failed to append '{}'", entry.path)
          })
          .error_kind(ErrorKind::Internal)?;
      }
      None => {
        header.set_entry_type(tar::EntryType::Directory);
        header.set_mode(0o755);
        header.set_size(0);
        builder
          .append_data(
            &mut header,
            format!("{}/", entry.path.trim_end_matches('/')),
            std::io::empty(),
          )
          .with_context(|| {
            format!("failed to append directory '{}'", entry.path)
          })
          .error_kind(ErrorKind::Internal)?;
      }
    }
  }
  builder
    .into_inner()
    .context("failed to finish installer tar")
    .error_kind(ErrorKind::Internal)
}

fn is_executable(path: &str) -> bool {
  path.starts_with("scripts/") || path.ends_with(".sh")
}

pub fn install_md(
  service: &burndler_client::entities::service::Service,
  units: &[BuildUnit],
) -> String {
  let mut containers = String::new();
  for unit in units {
    containers.push_str(&format!(
      "- `{}` {} (namespace `{}`)\n",
      unit.container.name, unit.version.version, unit.namespace
    ));
  }
  format!(
    r#"# {name} installer

Self-contained, air-gapped installer produced by Burndler.

## Contents

- `compose.yaml` — the merged compose document
- `lint.json` — the policy report the document was accepted under
- `manifest.json` — externally referenced assets (download before
  going offline)
- `files/` — rendered configuration files, per container namespace
- `assets/` — embedded binary assets
- `scripts/install.sh` — bootstrap script

## Containers

{containers}
## Install

1. Copy this directory to the target host.
2. If `manifest.json` lists assets, download each URL to its `path`
   while still connected.
3. Run `scripts/install.sh` (or `docker compose -f compose.yaml up -d`
   directly).

All images are digest-pinned and must already be present in the
target registry or loaded locally.
"#,
    name = service.name,
  )
}

pub fn install_sh() -> String {
  String::from(
    r#"#!/bin/sh
set -eu

cd "$(dirname "$0")/.."

if ! command -v docker >/dev/null 2>&1; then
  echo "docker is required" >&2
  exit 1
fi

if docker compose version >/dev/null 2>&1; then
  COMPOSE="docker compose"
else
  COMPOSE="docker-compose"
fi

exec $COMPOSE -f compose.yaml up -d
"#,
  )
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn tar_output_is_deterministic() {
    let entries = vec![
      ArchiveFile::regular("compose.yaml", "services: {}\n"),
      ArchiveFile::directory("files/acme_1/web/conf.d"),
      ArchiveFile::regular("scripts/install.sh", install_sh()),
    ];
    let first = build_tar(&entries).unwrap();
    let second = build_tar(&entries).unwrap();
    assert_eq!(first, second);
  }

  #[test]
  fn tar_round_trips_entries() {
    let entries = vec![
      ArchiveFile::regular("compose.yaml", "services: {}\n"),
      ArchiveFile::regular(
        "files/acme_1/web/app.conf",
        "port = 8080\n",
      ),
    ];
    let bytes = build_tar(&entries).unwrap();
    let mut archive = tar::Archive::new(&bytes[..]);
    let paths: Vec<String> = archive
      .entries()
      .unwrap()
      .map(|e| {
        e.unwrap().path().unwrap().to_string_lossy().to_string()
      })
      .collect();
    assert_eq!(
      paths,
      vec!["compose.yaml", "files/acme_1/web/app.conf"]
    );
  }
}
