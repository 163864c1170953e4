use serde::{Deserialize, Serialize};
use typeshare::typeshare;

use crate::entities::build::Build;

#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBuildResponse {
  pub build_id: String,
}

pub type GetBuildResponse = Build;
