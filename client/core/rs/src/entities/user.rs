use serde::{Deserialize, Serialize};
use typeshare::typeshare;

use super::I64;

#[typeshare]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct User {
  pub id: I64,
  pub username: String,
  /// bcrypt hash, never serialized in responses.
  #[serde(default, skip_serializing)]
  pub password_hash: String,
  #[serde(default)]
  pub admin: bool,
  pub created_at: I64,
}
