use serde::{Deserialize, Serialize, de::Visitor};
use strum::{Display, EnumString};
use typeshare::typeshare;

use super::{I64, error::ErrorKind};

/// One execution of the pipeline producing an installer
/// artifact. Identified by an opaque UUID.
#[typeshare]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Build {
  pub id: String,
  pub user_id: I64,
  pub service_id: I64,
  /// Name of the service at time of build, used for
  /// namespacing.
  pub service_name: String,
  #[serde(default)]
  pub status: BuildStatus,
  /// Monotone progress in [0, 100].
  #[serde(default)]
  pub progress: u8,
  /// The merged compose document, set after the
  /// compose_merge stage.
  #[serde(default)]
  pub compose: String,
  /// Retrieval URL for the installer, set on completion.
  #[serde(default)]
  pub download_url: String,
  /// Stable kind of the first stage error.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub error_kind: Option<ErrorKind>,
  /// First stage error message.
  #[serde(default)]
  pub error: String,
  pub created_at: I64,
  pub updated_at: I64,
  #[serde(default)]
  pub completed_at: I64,
}

impl Build {
  pub fn is_terminal(&self) -> bool {
    matches!(
      self.status,
      BuildStatus::Completed | BuildStatus::Failed
    )
  }
}

/// `manifest.json` inside the installer archive: the assets
/// left in blob storage, retrievable by signed URL.
#[typeshare]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssetManifest {
  pub version: String,
  pub assets: Vec<ManifestEntry>,
}

#[typeshare]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ManifestEntry {
  /// Logical path the installer places the asset at.
  pub path: String,
  pub size: I64,
  /// SHA-256 of the asset bytes, hex encoded.
  pub checksum: String,
  pub url: String,
}

/// Serialized as `queued`, `building:<stage>`, `completed`
/// or `failed`.
#[typeshare(serialized_as = "string")]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BuildStatus {
  #[default]
  Queued,
  Building(BuildStage),
  Completed,
  Failed,
}

#[typeshare]
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Serialize,
  Deserialize,
  Display,
  EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BuildStage {
  Validation,
  Configuration,
  TemplateRender,
  AssetResolution,
  ComposeMerge,
  Linting,
  Packaging,
}

impl BuildStage {
  /// Progress checkpoint persisted when the stage begins.
  pub fn progress(&self) -> u8 {
    match self {
      BuildStage::Validation => 5,
      BuildStage::Configuration => 20,
      BuildStage::TemplateRender => 35,
      BuildStage::AssetResolution => 50,
      BuildStage::ComposeMerge => 65,
      BuildStage::Linting => 80,
      BuildStage::Packaging => 90,
    }
  }
}

impl std::fmt::Display for BuildStatus {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      BuildStatus::Queued => f.write_str("queued"),
      BuildStatus::Building(stage) => {
        write!(f, "building:{stage}")
      }
      BuildStatus::Completed => f.write_str("completed"),
      BuildStatus::Failed => f.write_str("failed"),
    }
  }
}

impl std::str::FromStr for BuildStatus {
  type Err = anyhow::Error;
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "queued" => Ok(BuildStatus::Queued),
      "completed" => Ok(BuildStatus::Completed),
      "failed" => Ok(BuildStatus::Failed),
      _ => {
        let stage = s.strip_prefix("building:").ok_or_else(|| {
          anyhow::anyhow!("invalid build status '{s}'")
        })?;
        Ok(BuildStatus::Building(stage.parse().map_err(|_| {
          anyhow::anyhow!("invalid build stage '{stage}'")
        })?))
      }
    }
  }
}

impl Serialize for BuildStatus {
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: serde::Serializer,
  {
    serializer.serialize_str(&self.to_string())
  }
}

impl<'de> Deserialize<'de> for BuildStatus {
  fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
  where
    D: serde::Deserializer<'de>,
  {
    struct StatusVisitor;
    impl Visitor<'_> for StatusVisitor {
      type Value = BuildStatus;
      fn expecting(
        &self,
        formatter: &mut std::fmt::Formatter,
      ) -> std::fmt::Result {
        formatter.write_str(
          "'queued', 'building:<stage>', 'completed' or 'failed'",
        )
      }
      fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
      where
        E: serde::de::Error,
      {
        v.parse()
          .map_err(|e| serde::de::Error::custom(format!("{e:#}")))
      }
    }
    deserializer.deserialize_str(StatusVisitor)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn status_round_trips_as_string() {
    let status = BuildStatus::Building(BuildStage::ComposeMerge);
    let json = serde_json::to_string(&status).unwrap();
    assert_eq!(json, "\"building:compose_merge\"");
    let back: BuildStatus = serde_json::from_str(&json).unwrap();
    assert_eq!(back, status);

    let queued: BuildStatus =
      serde_json::from_str("\"queued\"").unwrap();
    assert_eq!(queued, BuildStatus::Queued);
    assert!(serde_json::from_str::<BuildStatus>("\"bogus\"").is_err());
  }

  #[test]
  fn stage_progress_is_monotone() {
    let stages = [
      BuildStage::Validation,
      BuildStage::Configuration,
      BuildStage::TemplateRender,
      BuildStage::AssetResolution,
      BuildStage::ComposeMerge,
      BuildStage::Linting,
      BuildStage::Packaging,
    ];
    for pair in stages.windows(2) {
      assert!(pair[0].progress() < pair[1].progress());
    }
  }
}
