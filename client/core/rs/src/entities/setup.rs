use serde::{Deserialize, Serialize};
use strum::Display;
use typeshare::typeshare;

/// One-time bootstrap stages. Advances strictly forward:
/// uninitialized -> token_valid -> admin_created -> completed.
#[typeshare]
#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Serialize,
  Deserialize,
  Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SetupStage {
  #[default]
  Uninitialized,
  TokenValid,
  AdminCreated,
  Completed,
}

/// Minimum length for an operator-minted setup token.
pub const SETUP_TOKEN_MIN_LENGTH: usize = 32;
