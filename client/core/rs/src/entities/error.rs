use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use typeshare::typeshare;

/// Stable identifiers used in responses, build records and
/// logs. Messages produced by the server are prefixed with
/// the kind, `<Kind>: <message>`.
#[typeshare]
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  Display,
  EnumString,
)]
pub enum ErrorKind {
  InvalidRequest,
  NotFound,
  Conflict,
  Forbidden,
  TemplateParseError,
  TemplateExecError,
  PostRenderStructureError,
  DependencyValidationFailed,
  NamespaceCollision,
  LintFailed,
  PathCollision,
  StorageUnavailable,
  SetupAlreadyCompleted,
  InvalidSetupToken,
  Cancelled,
  Internal,
}

impl ErrorKind {
  /// Wrap a message with the stable kind prefix.
  pub fn context(self, msg: impl std::fmt::Display) -> String {
    format!("{self}: {msg}")
  }
}
