//! Developer-facing writes on the container library. Publishing
//! a version gates on the linter: a fragment that fails the
//! air-gapped policy never becomes immutable.

use axum::{
  Router,
  extract::Path,
  routing::{delete, post},
};
use burndler_client::{
  api::container::{
    CreateConfigurationRequest, CreateContainerRequest,
    CreateContainerVersionRequest, UpdateVersionComposeRequest,
  },
  entities::{
    container::{
      Container, ContainerConfiguration, ContainerVersion,
    },
    error::ErrorKind,
  },
};
use serror::Json;

use crate::{
  config::core_config,
  helpers::{CoreResult, err, respond},
  state::db_client,
};

pub fn router() -> Router {
  Router::new()
    .route("/", post(create_container))
    .route("/{id}", delete(delete_container))
    .route("/{id}/versions", post(create_version))
    .route("/{id}/configurations", post(create_configuration))
    .route(
      "/configurations/{cid}",
      delete(delete_configuration),
    )
    .route("/versions/{vid}/compose", post(update_version_compose))
    .route("/versions/{vid}/publish", post(publish_version))
}

async fn create_container(
  Json(request): Json<CreateContainerRequest>,
) -> serror::Result<axum::Json<Container>> {
  respond(
    db_client()
      .create_container(&request.name, &request.description),
  )
  .map(axum::Json)
}

async fn delete_container(
  Path(container_id): Path<i64>,
) -> serror::Result<axum::Json<serde_json::Value>> {
  respond(db_client().delete_container(container_id))?;
  Ok(axum::Json(serde_json::json!({ "deleted": container_id })))
}

async fn create_version(
  Path(container_id): Path<i64>,
  Json(request): Json<CreateContainerVersionRequest>,
) -> serror::Result<axum::Json<ContainerVersion>> {
  respond(db_client().create_container_version(
    ContainerVersion {
      container_id,
      version: request.version,
      compose_content: request.compose_content,
      default_variables: request.default_variables,
      resource_paths: request.resource_paths,
      dependencies: request.dependencies,
      configuration_id: request.configuration_id,
      ..Default::default()
    },
  ))
  .map(axum::Json)
}

async fn update_version_compose(
  Path(version_id): Path<i64>,
  Json(request): Json<UpdateVersionComposeRequest>,
) -> serror::Result<axum::Json<ContainerVersion>> {
  respond(db_client().update_version_compose(
    version_id,
    request.compose_content,
  ))
  .map(axum::Json)
}

/// Lint, then freeze.
async fn publish_version(
  Path(version_id): Path<i64>,
) -> serror::Result<axum::Json<ContainerVersion>> {
  respond(publish_inner(version_id)).map(axum::Json)
}

fn publish_inner(
  version_id: i64,
) -> CoreResult<ContainerVersion> {
  let db = db_client();
  let version = db.get_container_version(version_id)?;
  if !version.published {
    let report = compose::lint(
      &version.compose_content,
      &core_config().lint,
    );
    if !report.valid {
      let first = report
        .first_error()
        .map(|e| format!("{} at {}", e.rule, e.path))
        .unwrap_or_default();
      return Err(err(
        ErrorKind::LintFailed,
        format!(
          "fragment fails the lint policy ({} error(s), first: {first})",
          report.errors.len()
        ),
      ));
    }
  }
  db.publish_version(version_id)
}

async fn create_configuration(
  Path(container_id): Path<i64>,
  Json(request): Json<CreateConfigurationRequest>,
) -> serror::Result<axum::Json<ContainerConfiguration>> {
  respond(db_client().create_configuration(
    ContainerConfiguration {
      container_id,
      name: request.name,
      description: request.description,
      minimum_version: request.minimum_version,
      ui_schema: request.ui_schema,
      dependency_rules: request.dependency_rules,
      files: request.files,
      assets: request.assets,
      ..Default::default()
    },
  ))
  .map(axum::Json)
}

async fn delete_configuration(
  Path(configuration_id): Path<i64>,
) -> serror::Result<axum::Json<serde_json::Value>> {
  respond(db_client().delete_configuration(configuration_id))?;
  Ok(axum::Json(
    serde_json::json!({ "deleted": configuration_id }),
  ))
}
