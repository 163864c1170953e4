use axum::{Router, extract::Path, routing::get};
use burndler_client::api::build::{
  CreateBuildResponse, GetBuildResponse,
};

use crate::{
  build::spawn_build, helpers::respond, state::db_client,
};

pub fn router() -> Router {
  Router::new().route("/{id}", get(get_build))
}

/// `POST /services/{id}/build`: create the record, launch the
/// pipeline on its own task, return the id immediately.
pub async fn create_build(
  Path(service_id): Path<i64>,
) -> serror::Result<axum::Json<CreateBuildResponse>> {
  let db = db_client();
  let service = respond(db.get_service(service_id))?;
  let build = db.create_build(service.user_id, &service);
  info!(
    "build {} | queued for service '{}'",
    build.id, service.name
  );
  spawn_build(build.id.clone());
  Ok(axum::Json(CreateBuildResponse { build_id: build.id }))
}

async fn get_build(
  Path(build_id): Path<String>,
) -> serror::Result<axum::Json<GetBuildResponse>> {
  respond(db_client().get_build(&build_id)).map(axum::Json)
}
