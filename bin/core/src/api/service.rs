use axum::{
  Router,
  extract::Path,
  routing::{get, post},
};
use burndler_client::{
  api::service::{
    AddServiceContainerRequest, ConfigExport,
    CreateServiceRequest, ImportConfigurationResponse,
    ValidateConfigurationRequest, ValidateConfigurationResponse,
    WriteConfigurationRequest,
  },
  entities::{
    error::ErrorKind,
    rules::DependencyRule,
    service::{Service, ServiceConfiguration, ServiceContainer},
  },
};
use serror::Json;

use crate::{
  api::build::create_build,
  helpers::{CoreError, CoreResult, err, respond},
  state::db_client,
  transfer,
};

pub fn router() -> Router {
  Router::new()
    .route("/", post(create_service))
    .route("/{id}/containers", post(add_service_container))
    .route(
      "/{id}/containers/{cid}/validate",
      post(validate_configuration),
    )
    .route(
      "/{id}/containers/{cid}/configuration",
      get(read_configuration).put(write_configuration),
    )
    .route("/{id}/configuration/export", get(export_configuration))
    .route(
      "/{id}/configuration/import",
      post(import_configuration),
    )
    .route("/{id}/build", post(create_build))
}

// Services are owned by the authenticated user; with auth
// handled outside the core, ownership is carried but not
// enforced here.
const DEFAULT_USER_ID: i64 = 1;

async fn create_service(
  Json(request): Json<CreateServiceRequest>,
) -> serror::Result<axum::Json<Service>> {
  respond(db_client().create_service(
    DEFAULT_USER_ID,
    &request.name,
    request.variables,
  ))
  .map(axum::Json)
}

async fn add_service_container(
  Path(service_id): Path<i64>,
  Json(request): Json<AddServiceContainerRequest>,
) -> serror::Result<axum::Json<ServiceContainer>> {
  respond(db_client().add_service_container(ServiceContainer {
    service_id,
    container_id: request.container_id,
    version_id: request.version_id,
    order: request.order,
    enabled: request.enabled,
    overrides: request.overrides,
    ..Default::default()
  }))
  .map(axum::Json)
}

/// The rules applicable to a `(service, container)` pair: the
/// ones on the configuration attached to the referenced
/// version. No configuration means no rules.
fn applicable_rules(
  service_id: i64,
  container_id: i64,
) -> CoreResult<Vec<DependencyRule>> {
  let db = db_client();
  db.get_service(service_id)?;
  db.get_container(container_id)?;
  let reference = db
    .list_service_containers(service_id)
    .into_iter()
    .find(|sc| sc.container_id == container_id)
    .ok_or_else(|| {
      err(
        ErrorKind::NotFound,
        format!(
          "service {service_id} does not reference container {container_id}"
        ),
      )
    })?;
  let version = db.get_container_version(reference.version_id)?;
  Ok(match version.configuration_id {
    Some(configuration_id) => {
      db.get_configuration(configuration_id)?.dependency_rules
    }
    None => Vec::new(),
  })
}

async fn validate_configuration(
  Path((service_id, container_id)): Path<(i64, i64)>,
  Json(request): Json<ValidateConfigurationRequest>,
) -> serror::Result<axum::Json<ValidateConfigurationResponse>> {
  respond(
    validate_inner(service_id, container_id, request),
  )
  .map(axum::Json)
}

fn validate_inner(
  service_id: i64,
  container_id: i64,
  request: ValidateConfigurationRequest,
) -> CoreResult<ValidateConfigurationResponse> {
  let dependency_rules =
    applicable_rules(service_id, container_id)?;
  let errors = rules::evaluate(&dependency_rules, &request.values)
    .map_err(|e| CoreError {
      kind: e
        .downcast_ref::<template::Error>()
        .map(template::Error::kind)
        .unwrap_or(ErrorKind::InvalidRequest),
      error: e,
    })?;
  Ok(ValidateConfigurationResponse {
    valid: errors.is_empty(),
    errors,
  })
}

async fn read_configuration(
  Path((service_id, container_id)): Path<(i64, i64)>,
) -> serror::Result<axum::Json<ServiceConfiguration>> {
  let result = db_client()
    .get_service_configuration(service_id, container_id)
    .ok_or_else(|| {
      err(
        ErrorKind::NotFound,
        format!(
          "no configuration values for service {service_id} / container {container_id}"
        ),
      )
    });
  respond(result).map(axum::Json)
}

async fn write_configuration(
  Path((service_id, container_id)): Path<(i64, i64)>,
  Json(request): Json<WriteConfigurationRequest>,
) -> serror::Result<axum::Json<ServiceConfiguration>> {
  respond(db_client().upsert_service_configuration(
    service_id,
    container_id,
    request.values,
  ))
  .map(axum::Json)
}

async fn export_configuration(
  Path(service_id): Path<i64>,
) -> serror::Result<axum::Json<ConfigExport>> {
  respond(transfer::export_service(db_client(), service_id))
    .map(axum::Json)
}

async fn import_configuration(
  Path(service_id): Path<i64>,
  Json(document): Json<ConfigExport>,
) -> serror::Result<axum::Json<ImportConfigurationResponse>> {
  respond(transfer::import_service(
    db_client(),
    service_id,
    document,
  ))
  .map(axum::Json)
}
