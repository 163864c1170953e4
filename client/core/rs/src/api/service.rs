use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use typeshare::typeshare;

use crate::entities::{I64, rules::RuleViolation};

#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateServiceRequest {
  pub name: String,
  #[serde(default)]
  pub variables: Value,
}

#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddServiceContainerRequest {
  pub container_id: I64,
  pub version_id: I64,
  #[serde(default)]
  pub order: I64,
  #[serde(default = "default_enabled")]
  pub enabled: bool,
  #[serde(default)]
  pub overrides: Value,
}

fn default_enabled() -> bool {
  true
}

/// Dependency evaluation (C2) over user supplied values for
/// one `(service, container)` pair.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateConfigurationRequest {
  pub values: Value,
}

#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateConfigurationResponse {
  pub valid: bool,
  #[serde(default)]
  pub errors: Vec<RuleViolation>,
}

#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteConfigurationRequest {
  pub values: Value,
}

/// The versioned export document. Also the import request
/// body; import requires `version == "1.0"`.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigExport {
  pub version: String,
  pub service_id: I64,
  /// Round-trip convenience, ignored by the importer.
  #[serde(default)]
  pub service_name: String,
  /// container name -> value tree.
  pub containers: BTreeMap<String, Value>,
}

pub const CONFIG_EXPORT_VERSION: &str = "1.0";

#[typeshare]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportConfigurationResponse {
  /// Container names whose configuration was inserted or
  /// replaced.
  pub imported: Vec<String>,
  /// Container names in the document that do not exist.
  pub skipped: Vec<String>,
}
