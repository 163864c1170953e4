//! # Burndler Compose
//!
//! Merges container compose fragments into one namespaced document
//! ([merge]) and validates documents against the air-gapped installer
//! policy ([lint]).

use burndler_client::entities::compose::ComposeKeyKind;

mod lint;
mod merge;

pub use lint::lint;
pub use merge::{MergeInput, Merged, merge, namespace_for};

#[derive(Debug, thiserror::Error)]
pub enum MergeError {
  #[error("no fragments to merge")]
  Empty,

  #[error("fragment from '{container}' is not valid yaml | {message}")]
  InvalidFragment { container: String, message: String },

  #[error("fragment from '{container}' must be a yaml mapping")]
  NotAMapping { container: String },

  #[error(
    "namespace collision on {kind} '{name}' between '{first}' and '{second}'"
  )]
  NamespaceCollision {
    kind: ComposeKeyKind,
    name: String,
    first: String,
    second: String,
  },

  #[error("failed to serialize merged document | {message}")]
  Serialize { message: String },
}
