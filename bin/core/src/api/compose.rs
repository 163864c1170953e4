//! Stateless merge / lint previews over caller-supplied
//! fragments.

use axum::{Router, routing::post};
use burndler_client::{
  api::compose::{
    LintComposeRequest, LintComposeResponse, MergeComposeRequest,
    MergeComposeResponse,
  },
  entities::error::ErrorKind,
};
use compose::{MergeInput, namespace_for};
use serror::Json;

use crate::helpers::{CoreError, CoreResult, err, respond};

pub fn router() -> Router {
  Router::new()
    .route("/merge", post(merge))
    .route("/lint", post(lint))
}

async fn merge(
  Json(request): Json<MergeComposeRequest>,
) -> serror::Result<axum::Json<MergeComposeResponse>> {
  respond(merge_inner(request)).map(axum::Json)
}

fn merge_inner(
  request: MergeComposeRequest,
) -> CoreResult<MergeComposeResponse> {
  if request.modules.is_empty() {
    return Err(err(
      ErrorKind::InvalidRequest,
      "modules list cannot be empty",
    ));
  }
  let inputs: Vec<MergeInput> = request
    .modules
    .iter()
    .map(|module| MergeInput {
      container: module.name.clone(),
      version: module.version.clone(),
      namespace: namespace_for(
        &request.service_name,
        request.service_id,
        &module.name,
      ),
      compose: module.compose.clone(),
    })
    .collect();
  let merged = compose::merge(&inputs).map_err(|e| {
    let kind = match &e {
      compose::MergeError::NamespaceCollision { .. } => {
        ErrorKind::NamespaceCollision
      }
      _ => ErrorKind::InvalidRequest,
    };
    CoreError {
      kind,
      error: e.into(),
    }
  })?;
  Ok(MergeComposeResponse {
    compose: merged.compose,
    report: merged.report,
  })
}

async fn lint(
  Json(request): Json<LintComposeRequest>,
) -> serror::Result<axum::Json<LintComposeResponse>> {
  if request.compose.trim().is_empty() {
    return respond(Err(err(
      ErrorKind::InvalidRequest,
      "compose document cannot be empty",
    )))
    .map(axum::Json);
  }
  Ok(axum::Json(compose::lint(
    &request.compose,
    &request.options,
  )))
}
