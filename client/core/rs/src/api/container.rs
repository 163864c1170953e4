use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use typeshare::typeshare;

use crate::entities::{
  I64, Version,
  container::{ContainerAsset, ContainerFile},
  rules::DependencyRule,
};

#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateContainerRequest {
  pub name: String,
  #[serde(default)]
  pub description: String,
}

#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateContainerVersionRequest {
  /// `vMAJOR.MINOR.PATCH`, the `v` prefix is optional.
  pub version: Version,
  pub compose_content: String,
  #[serde(default)]
  pub default_variables: Value,
  #[serde(default)]
  pub resource_paths: Vec<String>,
  /// container name -> version constraint (`vX.Y.Z` or
  /// `>=vX.Y.Z`).
  #[serde(default)]
  pub dependencies: HashMap<String, String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub configuration_id: Option<I64>,
}

#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateVersionComposeRequest {
  pub compose_content: String,
}

#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateConfigurationRequest {
  pub name: String,
  #[serde(default)]
  pub description: String,
  pub minimum_version: Version,
  #[serde(default)]
  pub ui_schema: Value,
  #[serde(default)]
  pub dependency_rules: Vec<DependencyRule>,
  #[serde(default)]
  pub files: Vec<ContainerFile>,
  #[serde(default)]
  pub assets: Vec<ContainerAsset>,
}
