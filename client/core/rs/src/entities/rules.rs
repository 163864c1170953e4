use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::Display;
use typeshare::typeshare;

/// A declarative cross-field constraint over the user's
/// value tree.
#[typeshare]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DependencyRule {
  #[serde(rename = "type")]
  pub rule_type: RuleType,
  /// The field this rule is declared on, for display.
  pub field: String,
  /// Template expression. The rule only applies when it
  /// evaluates true against the value tree.
  pub condition: String,
  /// Dot-path into the value tree the rule constrains.
  pub target: String,
  /// Accepted for round-tripping; evaluation does not
  /// consult it.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub target_value: Option<Value>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub message: Option<String>,
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
pub enum RuleType {
  #[default]
  Requires,
  Conflicts,
  /// Value-propagation semantics applied by the UI and the
  /// importer. Never produces validation errors.
  Cascades,
  /// Any rule type this server version does not know.
  #[serde(other)]
  Unknown,
}

/// One failed rule, suitable for direct display against
/// the named field.
#[typeshare]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleViolation {
  pub field: String,
  pub rule: String,
  pub message: String,
}
