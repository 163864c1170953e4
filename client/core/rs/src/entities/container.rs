use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use strum::Display;
use typeshare::typeshare;

use super::{I64, Version, rules::DependencyRule};

/// A reusable, versioned fragment of compose configuration
/// plus its attached metadata.
#[typeshare]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Container {
  pub id: I64,
  /// Globally unique name.
  pub name: String,
  #[serde(default)]
  pub description: String,
  pub created_at: I64,
  pub updated_at: I64,
  /// Soft delete marker. Listing filters exclude
  /// containers with this set.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub deleted_at: Option<I64>,
}

/// Immutable once published. `(container_id, version)` is unique.
#[typeshare]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContainerVersion {
  pub id: I64,
  pub container_id: I64,
  pub version: Version,
  /// The raw compose fragment.
  pub compose_content: String,
  /// Variable defaults applied below service level variables.
  #[serde(default)]
  pub default_variables: Value,
  /// Logical resource paths this version ships.
  #[serde(default)]
  pub resource_paths: Vec<String>,
  /// Peer dependencies: container name -> version constraint.
  #[serde(default)]
  pub dependencies: HashMap<String, String>,
  /// The configuration applicable to this version, if any.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub configuration_id: Option<I64>,
  /// Publishing requires a passing lint and freezes the record.
  #[serde(default)]
  pub published: bool,
  #[serde(default)]
  pub published_at: I64,
  pub created_at: I64,
}

/// Attached to a Container and applicable from
/// `minimum_version` upward. `(container_id, name)` is unique.
#[typeshare]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContainerConfiguration {
  pub id: I64,
  pub container_id: I64,
  pub name: String,
  #[serde(default)]
  pub description: String,
  pub minimum_version: Version,
  /// Opaque schema tree consumed by the UI form renderer.
  #[serde(default)]
  pub ui_schema: Value,
  #[serde(default)]
  pub dependency_rules: Vec<DependencyRule>,
  #[serde(default)]
  pub files: Vec<ContainerFile>,
  #[serde(default)]
  pub assets: Vec<ContainerAsset>,
  pub created_at: I64,
  pub updated_at: I64,
}

#[typeshare]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContainerFile {
  pub id: I64,
  /// Logical path inside the installer.
  pub path: String,
  pub kind: FileKind,
  #[serde(default)]
  pub format: TemplateFormat,
  /// Template expression gating inclusion.
  /// Empty means always included.
  #[serde(default)]
  pub include_condition: String,
  /// Blob storage key for the file bytes.
  /// Empty for `directory` kind.
  #[serde(default)]
  pub storage_key: String,
  #[serde(default)]
  pub description: String,
}

#[typeshare]
#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FileKind {
  #[default]
  Template,
  Static,
  /// Emitted as a path marker only, no storage handle.
  Directory,
}

#[typeshare]
#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TemplateFormat {
  Yaml,
  Json,
  Env,
  #[default]
  Text,
}

#[typeshare]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContainerAsset {
  pub id: I64,
  /// Original upload filename.
  pub filename: String,
  /// Logical path inside the installer.
  pub path: String,
  pub class: AssetClass,
  #[serde(default)]
  pub content_type: String,
  pub size: I64,
  /// SHA-256 of the asset bytes, hex encoded.
  pub checksum: String,
  #[serde(default)]
  pub compressed: bool,
  /// Template expression gating inclusion.
  /// Empty means always included.
  #[serde(default)]
  pub include_condition: String,
  pub storage_mode: StorageMode,
  /// Blob storage key. Required for embedded assets.
  #[serde(default)]
  pub storage_key: String,
  /// Pre-resolved retrieval URL for referenced assets.
  /// Empty means one is signed at build time.
  #[serde(default)]
  pub url: String,
}

#[typeshare]
#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AssetClass {
  Config,
  #[default]
  Data,
  Script,
  Binary,
  Document,
}

#[typeshare]
#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StorageMode {
  /// Bundled into the installer archive.
  #[default]
  Embedded,
  /// Left in blob storage, manifest carries a signed URL.
  Referenced,
}

impl ContainerConfiguration {
  /// Whether this configuration applies to the given version.
  pub fn applies_to(&self, version: Version) -> bool {
    self.minimum_version <= version
  }
}
