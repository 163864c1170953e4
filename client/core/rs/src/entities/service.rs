use serde::{Deserialize, Serialize};
use serde_json::Value;
use typeshare::typeshare;

use super::I64;

/// A user's assembly of container references with
/// per-reference values.
#[typeshare]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Service {
  pub id: I64,
  pub user_id: I64,
  /// Unique per user.
  pub name: String,
  /// Service level variables, merged below per-container
  /// overrides.
  #[serde(default)]
  pub variables: Value,
  pub created_at: I64,
  pub updated_at: I64,
}

/// One container reference inside a service.
/// `(service_id, container_id, version_id)` is unique.
#[typeshare]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceContainer {
  pub id: I64,
  pub service_id: I64,
  pub container_id: I64,
  pub version_id: I64,
  /// Stable merge order, ascending. Ties break by
  /// container id ascending.
  #[serde(default)]
  pub order: I64,
  #[serde(default = "default_enabled")]
  pub enabled: bool,
  /// Per-reference variable overrides.
  #[serde(default)]
  pub overrides: Value,
}

fn default_enabled() -> bool {
  true
}

/// User-supplied configuration values for one
/// `(service, container)` pair.
#[typeshare]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfiguration {
  pub id: I64,
  pub service_id: I64,
  pub container_id: I64,
  /// The value tree the UI schema collects.
  #[serde(default)]
  pub values: Value,
  pub created_at: I64,
  pub updated_at: I64,
}
