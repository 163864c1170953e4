use serde::{Deserialize, Serialize};
use typeshare::typeshare;

use crate::entities::{
  I64,
  compose::{LintOptions, LintReport, MergeReport},
};

/// Stateless merge preview. Modules are merged in the
/// order given.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeComposeRequest {
  /// Service name used to derive the namespace slug.
  pub service_name: String,
  pub service_id: I64,
  pub modules: Vec<MergeModule>,
}

#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeModule {
  /// Container name, second segment of the namespace.
  pub name: String,
  /// Source version, carried into the merge report.
  #[serde(default)]
  pub version: String,
  /// The compose fragment.
  pub compose: String,
}

#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeComposeResponse {
  /// The merged document.
  pub compose: String,
  pub report: MergeReport,
}

#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LintComposeRequest {
  pub compose: String,
  #[serde(default)]
  pub options: LintOptions,
}

pub type LintComposeResponse = LintReport;
