use serde::{Deserialize, Serialize};
use serde_json::Value;
use typeshare::typeshare;

use crate::entities::{I64, setup::SetupStage};

#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetSetupStatusResponse {
  pub stage: SetupStage,
  /// Whether an admin account already exists.
  pub admin_created: bool,
}

#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitSetupRequest {
  /// The operator minted setup token, at least 32 chars.
  pub token: String,
}

#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSetupAdminRequest {
  pub username: String,
  pub password: String,
}

#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSetupAdminResponse {
  pub user_id: I64,
  pub stage: SetupStage,
}

#[typeshare]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompleteSetupRequest {
  /// Site level settings stored verbatim.
  #[serde(default)]
  pub settings: Value,
}

#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteSetupResponse {
  pub stage: SetupStage,
}
