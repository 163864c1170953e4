//! Local filesystem backend with HMAC-SHA256 signed URLs.

use std::path::{Component, Path, PathBuf};

use anyhow::{Context, anyhow};
use burndler_client::entities::burndler_timestamp;
use bytes::Bytes;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::StorageObject;

type HmacSha256 = Hmac<Sha256>;

pub struct LocalStorage {
  root: PathBuf,
  url_base: String,
  signing_secret: String,
}

impl LocalStorage {
  pub fn new(
    root: PathBuf,
    url_base: String,
    signing_secret: String,
  ) -> LocalStorage {
    LocalStorage {
      root,
      url_base,
      signing_secret,
    }
  }

  pub async fn upload(
    &self,
    key: &str,
    bytes: Bytes,
  ) -> anyhow::Result<String> {
    let path = self.object_path(key)?;
    if let Some(parent) = path.parent() {
      tokio::fs::create_dir_all(parent)
        .await
        .with_context(|| {
          format!("failed to create parent directory {parent:?}")
        })?;
    }
    tokio::fs::write(&path, &bytes)
      .await
      .with_context(|| format!("failed to write {path:?}"))?;
    Ok(format!("{}/{key}", self.url_base))
  }

  pub async fn download(&self, key: &str) -> anyhow::Result<Bytes> {
    let path = self.object_path(key)?;
    let bytes = tokio::fs::read(&path)
      .await
      .with_context(|| format!("failed to read {path:?}"))?;
    Ok(bytes.into())
  }

  pub async fn delete(&self, key: &str) -> anyhow::Result<()> {
    let path = self.object_path(key)?;
    tokio::fs::remove_file(&path)
      .await
      .with_context(|| format!("failed to remove {path:?}"))
  }

  pub async fn exists(&self, key: &str) -> anyhow::Result<bool> {
    let path = self.object_path(key)?;
    Ok(tokio::fs::try_exists(&path).await.unwrap_or(false))
  }

  pub async fn list(
    &self,
    prefix: &str,
  ) -> anyhow::Result<Vec<StorageObject>> {
    let mut objects = Vec::new();
    let mut pending = vec![self.root.clone()];
    while let Some(dir) = pending.pop() {
      let mut entries = match tokio::fs::read_dir(&dir).await {
        Ok(entries) => entries,
        // the root may not exist before the first upload
        Err(_) => continue,
      };
      while let Some(entry) = entries
        .next_entry()
        .await
        .with_context(|| format!("failed to read dir {dir:?}"))?
      {
        let path = entry.path();
        let file_type =
          entry.file_type().await.with_context(|| {
            format!("failed to stat {:?}", entry.path())
          })?;
        if file_type.is_dir() {
          pending.push(path);
          continue;
        }
        let key = match path.strip_prefix(&self.root) {
          Ok(rel) => rel.to_string_lossy().replace('\\', "/"),
          Err(_) => continue,
        };
        if !key.starts_with(prefix) {
          continue;
        }
        let metadata = entry.metadata().await.with_context(|| {
          format!("failed to read metadata for {path:?}")
        })?;
        let modified = metadata
          .modified()
          .ok()
          .and_then(|time| {
            time
              .duration_since(std::time::UNIX_EPOCH)
              .ok()
              .map(|d| d.as_millis() as i64)
          })
          .unwrap_or_default();
        objects.push(StorageObject {
          key,
          size: metadata.len(),
          modified,
        });
      }
    }
    objects.sort_by(|a, b| a.key.cmp(&b.key));
    Ok(objects)
  }

  pub fn signed_url(
    &self,
    key: &str,
    ttl_secs: u64,
  ) -> anyhow::Result<String> {
    // key validity only, no filesystem access
    self.object_path(key)?;
    let expires =
      burndler_timestamp() + (ttl_secs as i64).saturating_mul(1000);
    let signature = self.sign(key, expires)?;
    Ok(format!(
      "{}/{key}?expires={expires}&sig={signature}",
      self.url_base
    ))
  }

  /// Check a presented `sig` for `key` against the signing
  /// secret and the expiry.
  pub fn verify_signed(
    &self,
    key: &str,
    expires: i64,
    signature: &str,
  ) -> bool {
    if expires < burndler_timestamp() {
      return false;
    }
    self
      .sign(key, expires)
      .map(|expected| expected == signature)
      .unwrap_or(false)
  }

  fn sign(&self, key: &str, expires: i64) -> anyhow::Result<String> {
    if self.signing_secret.is_empty() {
      return Err(anyhow!(
        "storage.signing_secret must be configured to sign URLs"
      ));
    }
    let mut mac =
      HmacSha256::new_from_slice(self.signing_secret.as_bytes())
        .context("failed to initialize hmac")?;
    mac.update(key.as_bytes());
    mac.update(b":");
    mac.update(expires.to_string().as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
  }

  fn object_path(&self, key: &str) -> anyhow::Result<PathBuf> {
    let path = Path::new(key);
    let valid = !key.is_empty()
      && path.components().all(|component| {
        matches!(component, Component::Normal(_))
      });
    if !valid {
      return Err(anyhow!("invalid storage key '{key}'"));
    }
    Ok(self.root.join(path))
  }
}
