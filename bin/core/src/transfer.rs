//! Configuration export / import: a service's per-container
//! value maps as a versioned document.

use std::collections::BTreeMap;

use burndler_client::api::service::{
  CONFIG_EXPORT_VERSION, ConfigExport,
  ImportConfigurationResponse,
};
use burndler_client::entities::error::ErrorKind;

use crate::{
  db::DbClient,
  helpers::{CoreResult, err},
};

pub fn export_service(
  db: &DbClient,
  service_id: i64,
) -> CoreResult<ConfigExport> {
  let service = db.get_service(service_id)?;
  let mut containers = BTreeMap::new();
  for configuration in db.list_service_configurations(service_id) {
    // configurations for deleted containers are skipped
    let Ok(container) =
      db.get_container(configuration.container_id)
    else {
      continue;
    };
    containers.insert(container.name, configuration.values);
  }
  Ok(ConfigExport {
    version: String::from(CONFIG_EXPORT_VERSION),
    service_id: service.id,
    service_name: service.name,
    containers,
  })
}

/// Insert-or-replace per known container; unknown container
/// names are reported in `skipped`. Idempotent per entry.
pub fn import_service(
  db: &DbClient,
  service_id: i64,
  document: ConfigExport,
) -> CoreResult<ImportConfigurationResponse> {
  if document.version != CONFIG_EXPORT_VERSION {
    return Err(err(
      ErrorKind::InvalidRequest,
      format!(
        "unsupported export version '{}', expected '{CONFIG_EXPORT_VERSION}'",
        document.version
      ),
    ));
  }
  db.get_service(service_id)?;

  let mut response = ImportConfigurationResponse::default();
  for (name, values) in document.containers {
    match db.get_container_by_name(&name) {
      Some(container) => {
        db.upsert_service_configuration(
          service_id,
          container.id,
          values,
        )?;
        response.imported.push(name);
      }
      None => response.skipped.push(name),
    }
  }
  Ok(response)
}
