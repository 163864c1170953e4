//! # Burndler Storage
//!
//! The blob storage contract consumed by the asset resolver and the
//! packager. Backends are swappable behind [Storage]; the local
//! filesystem backend is the only one shipped here, an object store
//! backend plugs in as another variant.

use anyhow::Context;
use burndler_client::entities::config::{
  StorageConfig, StorageProvider,
};
use bytes::Bytes;

mod local;

pub use local::LocalStorage;

/// One stored object, as returned by [Storage::list].
#[derive(Debug, Clone)]
pub struct StorageObject {
  pub key: String,
  pub size: u64,
  /// Last modification, unix millis.
  pub modified: i64,
}

pub enum Storage {
  Local(LocalStorage),
}

impl Storage {
  /// `host` provides the fallback retrieval URL base when the
  /// storage config does not set one.
  pub fn from_config(
    config: &StorageConfig,
    host: &str,
  ) -> anyhow::Result<Storage> {
    match config.provider {
      StorageProvider::Local => {
        let url_base = if config.url_base.is_empty() {
          format!("{}/storage", host.trim_end_matches('/'))
        } else {
          config.url_base.trim_end_matches('/').to_string()
        };
        Ok(Storage::Local(LocalStorage::new(
          config.local_root.clone(),
          url_base,
          config.signing_secret.clone(),
        )))
      }
    }
  }

  /// Durably write `bytes` under `key`, returning the
  /// canonical retrieval URL.
  pub async fn upload(
    &self,
    key: &str,
    bytes: Bytes,
  ) -> anyhow::Result<String> {
    match self {
      Storage::Local(local) => local
        .upload(key, bytes)
        .await
        .with_context(|| format!("failed to upload '{key}'")),
    }
  }

  pub async fn download(&self, key: &str) -> anyhow::Result<Bytes> {
    match self {
      Storage::Local(local) => local
        .download(key)
        .await
        .with_context(|| format!("failed to download '{key}'")),
    }
  }

  pub async fn delete(&self, key: &str) -> anyhow::Result<()> {
    match self {
      Storage::Local(local) => local
        .delete(key)
        .await
        .with_context(|| format!("failed to delete '{key}'")),
    }
  }

  pub async fn exists(&self, key: &str) -> anyhow::Result<bool> {
    match self {
      Storage::Local(local) => local.exists(key).await,
    }
  }

  pub async fn list(
    &self,
    prefix: &str,
  ) -> anyhow::Result<Vec<StorageObject>> {
    match self {
      Storage::Local(local) => local
        .list(prefix)
        .await
        .with_context(|| format!("failed to list '{prefix}'")),
    }
  }

  /// A time-limited retrieval URL for `key`.
  pub fn signed_url(
    &self,
    key: &str,
    ttl_secs: u64,
  ) -> anyhow::Result<String> {
    match self {
      Storage::Local(local) => local.signed_url(key, ttl_secs),
    }
  }
}
