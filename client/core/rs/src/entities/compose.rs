use serde::{Deserialize, Serialize};
use strum::Display;
use typeshare::typeshare;

/// Options applied by the linter. The allowlists name
/// pre-namespacing compose service keys.
#[typeshare]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LintOptions {
  /// Escalate missing resource limits from warning to error.
  #[serde(default)]
  pub strict: bool,
  /// Services allowed to set `privileged: true`.
  #[serde(default)]
  pub allow_privileged: Vec<String>,
  /// Services allowed to set `network_mode: host`.
  #[serde(default)]
  pub allow_host_network: Vec<String>,
}

#[typeshare]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LintReport {
  pub valid: bool,
  #[serde(default)]
  pub errors: Vec<LintMessage>,
  #[serde(default)]
  pub warnings: Vec<LintMessage>,
}

impl LintReport {
  pub fn first_error(&self) -> Option<&LintMessage> {
    self.errors.first()
  }
}

#[typeshare]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LintMessage {
  /// Stable rule identifier, eg `no-build` or
  /// `image-not-pinned`.
  pub rule: String,
  pub message: String,
  /// Dotted path into the document, eg
  /// `services.web.build`.
  pub path: String,
}

/// Diagnostics emitted alongside a merged document.
#[typeshare]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MergeReport {
  /// namespaced name -> origin, per renamed key.
  pub mappings: Vec<MergeMapping>,
  /// Host port bindings found in the merged document.
  /// Not rewritten; callers detect conflicts here.
  #[serde(default)]
  pub host_ports: Vec<HostPortBinding>,
  /// Bind mount host paths found in the merged document.
  #[serde(default)]
  pub bind_mounts: Vec<BindMount>,
}

#[typeshare]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MergeMapping {
  pub namespaced_name: String,
  pub kind: ComposeKeyKind,
  pub original_name: String,
  pub source_container: String,
  pub source_version: String,
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
pub enum ComposeKeyKind {
  #[default]
  Service,
  Network,
  Volume,
  Secret,
  Config,
}

#[typeshare]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostPortBinding {
  /// Namespaced service name.
  pub service: String,
  /// The ports entry as written, eg `8080:80`.
  pub published: String,
}

#[typeshare]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BindMount {
  /// Namespaced service name.
  pub service: String,
  pub host_path: String,
}
