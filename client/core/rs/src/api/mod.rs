use serde::{Deserialize, Serialize};
use typeshare::typeshare;

/// Types for the `/builds` endpoints.
pub mod build;
/// Types for the `/compose` preview endpoints.
pub mod compose;
/// Types for the `/containers` endpoints.
pub mod container;
/// Types for the `/services` endpoints.
pub mod service;
/// Types for the `/setup` endpoints.
pub mod setup;

#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetVersionResponse {
  pub title: String,
  pub version: String,
}
