use axum::{
  Router,
  routing::{get, post},
};
use burndler_client::api::setup::{
  CompleteSetupRequest, CompleteSetupResponse,
  CreateSetupAdminRequest, CreateSetupAdminResponse,
  GetSetupStatusResponse, InitSetupRequest,
};
use serror::Json;

use crate::{
  helpers::respond,
  state::{db_client, setup_manager},
};

pub fn router() -> Router {
  Router::new()
    .route("/status", get(status))
    .route("/init", post(init))
    .route("/admin", post(admin))
    .route("/complete", post(complete))
    .route("/settings", get(settings))
}

async fn status() -> axum::Json<GetSetupStatusResponse> {
  axum::Json(GetSetupStatusResponse {
    stage: setup_manager().stage(),
    admin_created: db_client().has_admin(),
  })
}

/// Site-level settings stored during setup completion.
async fn settings() -> axum::Json<serde_json::Value> {
  axum::Json(db_client().settings())
}

async fn init(
  Json(request): Json<InitSetupRequest>,
) -> serror::Result<axum::Json<GetSetupStatusResponse>> {
  let stage = respond(setup_manager().init(&request.token))?;
  Ok(axum::Json(GetSetupStatusResponse {
    stage,
    admin_created: db_client().has_admin(),
  }))
}

async fn admin(
  Json(request): Json<CreateSetupAdminRequest>,
) -> serror::Result<axum::Json<CreateSetupAdminResponse>> {
  let user = respond(setup_manager().create_admin(
    db_client(),
    &request.username,
    &request.password,
  ))?;
  Ok(axum::Json(CreateSetupAdminResponse {
    user_id: user.id,
    stage: setup_manager().stage(),
  }))
}

async fn complete(
  Json(request): Json<CompleteSetupRequest>,
) -> serror::Result<axum::Json<CompleteSetupResponse>> {
  let stage = respond(
    setup_manager().complete(db_client(), request.settings),
  )?;
  Ok(axum::Json(CompleteSetupResponse { stage }))
}
