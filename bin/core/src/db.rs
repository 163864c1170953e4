//! In-process implementation of the persistence contract the
//! orchestrator consumes: transactional-enough reads and writes over
//! the core entities with unique-index enforcement on
//! `(container, name)`, `(container, version)` and
//! `(service, container)`, plus the conflict rules around published
//! versions and referenced configurations.

use std::sync::{
  Mutex,
  atomic::{AtomicI64, Ordering},
};

use burndler_client::entities::{
  burndler_timestamp,
  build::Build,
  container::{
    Container, ContainerConfiguration, ContainerVersion,
  },
  error::ErrorKind,
  service::{Service, ServiceConfiguration, ServiceContainer},
  user::User,
};
use dashmap::DashMap;
use serde_json::Value;

use crate::helpers::{CoreResult, err};

#[derive(Default)]
pub struct DbClient {
  id_seq: AtomicI64,
  pub containers: DashMap<i64, Container>,
  pub container_versions: DashMap<i64, ContainerVersion>,
  pub container_configurations:
    DashMap<i64, ContainerConfiguration>,
  pub services: DashMap<i64, Service>,
  pub service_containers: DashMap<i64, ServiceContainer>,
  pub service_configurations: DashMap<i64, ServiceConfiguration>,
  pub builds: DashMap<String, Build>,
  pub users: DashMap<i64, User>,
  settings: Mutex<Value>,
}

impl DbClient {
  pub fn new() -> DbClient {
    DbClient::default()
  }

  fn next_id(&self) -> i64 {
    self.id_seq.fetch_add(1, Ordering::Relaxed) + 1
  }

  // ==== CONTAINERS ====

  pub fn create_container(
    &self,
    name: &str,
    description: &str,
  ) -> CoreResult<Container> {
    if name.trim().is_empty() {
      return Err(err(
        ErrorKind::InvalidRequest,
        "container name cannot be empty",
      ));
    }
    let duplicate = self.containers.iter().any(|c| {
      c.name == name && c.deleted_at.is_none()
    });
    if duplicate {
      return Err(err(
        ErrorKind::Conflict,
        format!("container '{name}' already exists"),
      ));
    }
    let now = burndler_timestamp();
    let container = Container {
      id: self.next_id(),
      name: name.to_string(),
      description: description.to_string(),
      created_at: now,
      updated_at: now,
      deleted_at: None,
    };
    self.containers.insert(container.id, container.clone());
    Ok(container)
  }

  pub fn get_container(&self, id: i64) -> CoreResult<Container> {
    self
      .containers
      .get(&id)
      .filter(|c| c.deleted_at.is_none())
      .map(|c| c.clone())
      .ok_or_else(|| {
        err(ErrorKind::NotFound, format!("no container with id {id}"))
      })
  }

  pub fn get_container_by_name(
    &self,
    name: &str,
  ) -> Option<Container> {
    self
      .containers
      .iter()
      .find(|c| c.name == name && c.deleted_at.is_none())
      .map(|c| c.clone())
  }

  /// Soft delete. Conflicts while any version is published.
  pub fn delete_container(&self, id: i64) -> CoreResult<()> {
    let container = self.get_container(id)?;
    let published = self
      .container_versions
      .iter()
      .any(|v| v.container_id == id && v.published);
    if published {
      return Err(err(
        ErrorKind::Conflict,
        format!(
          "container '{}' has published versions and cannot be deleted",
          container.name
        ),
      ));
    }
    if let Some(mut container) = self.containers.get_mut(&id) {
      container.deleted_at = Some(burndler_timestamp());
    }
    Ok(())
  }

  // ==== CONTAINER VERSIONS ====

  pub fn create_container_version(
    &self,
    mut version: ContainerVersion,
  ) -> CoreResult<ContainerVersion> {
    self.get_container(version.container_id)?;
    let duplicate = self.container_versions.iter().any(|v| {
      v.container_id == version.container_id
        && v.version == version.version
    });
    if duplicate {
      return Err(err(
        ErrorKind::Conflict,
        format!(
          "version {} already exists for container {}",
          version.version, version.container_id
        ),
      ));
    }
    if let Some(configuration_id) = version.configuration_id {
      let configuration =
        self.get_configuration(configuration_id)?;
      if configuration.container_id != version.container_id {
        return Err(err(
          ErrorKind::InvalidRequest,
          "configuration belongs to another container",
        ));
      }
      if !configuration.applies_to(version.version) {
        return Err(err(
          ErrorKind::InvalidRequest,
          format!(
            "configuration '{}' requires at least {}",
            configuration.name, configuration.minimum_version
          ),
        ));
      }
    }
    version.id = self.next_id();
    version.published = false;
    version.published_at = 0;
    version.created_at = burndler_timestamp();
    self
      .container_versions
      .insert(version.id, version.clone());
    Ok(version)
  }

  pub fn get_container_version(
    &self,
    id: i64,
  ) -> CoreResult<ContainerVersion> {
    self
      .container_versions
      .get(&id)
      .map(|v| v.clone())
      .ok_or_else(|| {
        err(
          ErrorKind::NotFound,
          format!("no container version with id {id}"),
        )
      })
  }

  /// Freeze the record. Publishing requires the fragment to
  /// have passed the linter, which is the caller's duty.
  pub fn publish_version(
    &self,
    id: i64,
  ) -> CoreResult<ContainerVersion> {
    let mut version =
      self.container_versions.get_mut(&id).ok_or_else(|| {
        err(
          ErrorKind::NotFound,
          format!("no container version with id {id}"),
        )
      })?;
    if !version.published {
      version.published = true;
      version.published_at = burndler_timestamp();
    }
    Ok(version.clone())
  }

  /// A published version is immutable in all fields except
  /// publication metadata.
  pub fn update_version_compose(
    &self,
    id: i64,
    compose_content: String,
  ) -> CoreResult<ContainerVersion> {
    let mut version =
      self.container_versions.get_mut(&id).ok_or_else(|| {
        err(
          ErrorKind::NotFound,
          format!("no container version with id {id}"),
        )
      })?;
    if version.published {
      return Err(err(
        ErrorKind::Conflict,
        format!("version {} is published", version.version),
      ));
    }
    version.compose_content = compose_content;
    Ok(version.clone())
  }

  // ==== CONTAINER CONFIGURATIONS ====

  pub fn create_configuration(
    &self,
    mut configuration: ContainerConfiguration,
  ) -> CoreResult<ContainerConfiguration> {
    self.get_container(configuration.container_id)?;
    let duplicate =
      self.container_configurations.iter().any(|c| {
        c.container_id == configuration.container_id
          && c.name == configuration.name
      });
    if duplicate {
      return Err(err(
        ErrorKind::Conflict,
        format!(
          "configuration '{}' already exists for container {}",
          configuration.name, configuration.container_id
        ),
      ));
    }
    let now = burndler_timestamp();
    configuration.id = self.next_id();
    configuration.created_at = now;
    configuration.updated_at = now;
    self
      .container_configurations
      .insert(configuration.id, configuration.clone());
    Ok(configuration)
  }

  pub fn get_configuration(
    &self,
    id: i64,
  ) -> CoreResult<ContainerConfiguration> {
    self
      .container_configurations
      .get(&id)
      .map(|c| c.clone())
      .ok_or_else(|| {
        err(
          ErrorKind::NotFound,
          format!("no container configuration with id {id}"),
        )
      })
  }

  /// Conflicts while any version references the configuration.
  pub fn delete_configuration(&self, id: i64) -> CoreResult<()> {
    let referenced = self
      .container_versions
      .iter()
      .any(|v| v.configuration_id == Some(id));
    if referenced {
      return Err(err(
        ErrorKind::Conflict,
        "configuration is referenced by container versions",
      ));
    }
    self.container_configurations.remove(&id).ok_or_else(|| {
      err(
        ErrorKind::NotFound,
        format!("no container configuration with id {id}"),
      )
    })?;
    Ok(())
  }

  // ==== SERVICES ====

  pub fn create_service(
    &self,
    user_id: i64,
    name: &str,
    variables: Value,
  ) -> CoreResult<Service> {
    if name.trim().is_empty() {
      return Err(err(
        ErrorKind::InvalidRequest,
        "service name cannot be empty",
      ));
    }
    let duplicate = self
      .services
      .iter()
      .any(|s| s.user_id == user_id && s.name == name);
    if duplicate {
      return Err(err(
        ErrorKind::Conflict,
        format!("service '{name}' already exists"),
      ));
    }
    let now = burndler_timestamp();
    let service = Service {
      id: self.next_id(),
      user_id,
      name: name.to_string(),
      variables,
      created_at: now,
      updated_at: now,
    };
    self.services.insert(service.id, service.clone());
    Ok(service)
  }

  pub fn get_service(&self, id: i64) -> CoreResult<Service> {
    self.services.get(&id).map(|s| s.clone()).ok_or_else(|| {
      err(ErrorKind::NotFound, format!("no service with id {id}"))
    })
  }

  pub fn add_service_container(
    &self,
    mut service_container: ServiceContainer,
  ) -> CoreResult<ServiceContainer> {
    self.get_service(service_container.service_id)?;
    self.get_container(service_container.container_id)?;
    let version = self
      .get_container_version(service_container.version_id)?;
    if version.container_id != service_container.container_id {
      return Err(err(
        ErrorKind::InvalidRequest,
        "version belongs to another container",
      ));
    }
    let duplicate = self.service_containers.iter().any(|sc| {
      sc.service_id == service_container.service_id
        && sc.container_id == service_container.container_id
        && sc.version_id == service_container.version_id
    });
    if duplicate {
      return Err(err(
        ErrorKind::Conflict,
        "service already references this container version",
      ));
    }
    service_container.id = self.next_id();
    self
      .service_containers
      .insert(service_container.id, service_container.clone());
    Ok(service_container)
  }

  /// All references of a service in merge order:
  /// `(order, container_id)` ascending.
  pub fn list_service_containers(
    &self,
    service_id: i64,
  ) -> Vec<ServiceContainer> {
    let mut list: Vec<ServiceContainer> = self
      .service_containers
      .iter()
      .filter(|sc| sc.service_id == service_id)
      .map(|sc| sc.clone())
      .collect();
    list.sort_by_key(|sc| (sc.order, sc.container_id));
    list
  }

  // ==== SERVICE CONFIGURATIONS ====

  pub fn get_service_configuration(
    &self,
    service_id: i64,
    container_id: i64,
  ) -> Option<ServiceConfiguration> {
    self
      .service_configurations
      .iter()
      .find(|sc| {
        sc.service_id == service_id
          && sc.container_id == container_id
      })
      .map(|sc| sc.clone())
  }

  /// Last-writer-wins upsert keyed on
  /// `(service_id, container_id)`.
  pub fn upsert_service_configuration(
    &self,
    service_id: i64,
    container_id: i64,
    values: Value,
  ) -> CoreResult<ServiceConfiguration> {
    self.get_service(service_id)?;
    self.get_container(container_id)?;
    let now = burndler_timestamp();
    let existing_id = self
      .service_configurations
      .iter()
      .find(|sc| {
        sc.service_id == service_id
          && sc.container_id == container_id
      })
      .map(|sc| sc.id);
    let configuration = match existing_id {
      Some(id) => {
        let mut entry = self
          .service_configurations
          .get_mut(&id)
          .expect("service configuration disappeared mid-upsert");
        entry.values = values;
        entry.updated_at = now;
        entry.clone()
      }
      None => {
        let configuration = ServiceConfiguration {
          id: self.next_id(),
          service_id,
          container_id,
          values,
          created_at: now,
          updated_at: now,
        };
        self
          .service_configurations
          .insert(configuration.id, configuration.clone());
        configuration
      }
    };
    Ok(configuration)
  }

  pub fn list_service_configurations(
    &self,
    service_id: i64,
  ) -> Vec<ServiceConfiguration> {
    let mut list: Vec<ServiceConfiguration> = self
      .service_configurations
      .iter()
      .filter(|sc| sc.service_id == service_id)
      .map(|sc| sc.clone())
      .collect();
    list.sort_by_key(|sc| sc.container_id);
    list
  }

  // ==== BUILDS ====

  pub fn create_build(
    &self,
    user_id: i64,
    service: &Service,
  ) -> Build {
    let now = burndler_timestamp();
    let build = Build {
      id: uuid::Uuid::new_v4().to_string(),
      user_id,
      service_id: service.id,
      service_name: service.name.clone(),
      created_at: now,
      updated_at: now,
      ..Default::default()
    };
    self.builds.insert(build.id.clone(), build.clone());
    build
  }

  pub fn get_build(&self, id: &str) -> CoreResult<Build> {
    self.builds.get(id).map(|b| b.clone()).ok_or_else(|| {
      err(ErrorKind::NotFound, format!("no build with id {id}"))
    })
  }

  /// Builds are immutable once terminal; updates after
  /// completion or failure are dropped.
  pub fn update_build(
    &self,
    id: &str,
    mutate: impl FnOnce(&mut Build),
  ) -> CoreResult<Build> {
    let mut build = self.builds.get_mut(id).ok_or_else(|| {
      err(ErrorKind::NotFound, format!("no build with id {id}"))
    })?;
    if build.is_terminal() {
      return Ok(build.clone());
    }
    mutate(&mut build);
    build.updated_at = burndler_timestamp();
    Ok(build.clone())
  }

  // ==== USERS ====

  pub fn create_user(
    &self,
    username: &str,
    password_hash: String,
    admin: bool,
  ) -> CoreResult<User> {
    if username.trim().is_empty() {
      return Err(err(
        ErrorKind::InvalidRequest,
        "username cannot be empty",
      ));
    }
    let duplicate =
      self.users.iter().any(|u| u.username == username);
    if duplicate {
      return Err(err(
        ErrorKind::Conflict,
        format!("user '{username}' already exists"),
      ));
    }
    let user = User {
      id: self.next_id(),
      username: username.to_string(),
      password_hash,
      admin,
      created_at: burndler_timestamp(),
    };
    self.users.insert(user.id, user.clone());
    Ok(user)
  }

  pub fn has_admin(&self) -> bool {
    self.users.iter().any(|u| u.admin)
  }

  // ==== SITE SETTINGS ====

  pub fn store_settings(&self, settings: Value) {
    *self.settings.lock().unwrap() = settings;
  }

  pub fn settings(&self) -> Value {
    self.settings.lock().unwrap().clone()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn container_names_are_unique() {
    let db = DbClient::new();
    db.create_container("nginx", "").unwrap();
    let err = db.create_container("nginx", "").unwrap_err();
    assert_eq!(err.kind, ErrorKind::Conflict);
  }

  #[test]
  fn deleting_a_container_with_published_versions_conflicts() {
    let db = DbClient::new();
    let container = db.create_container("nginx", "").unwrap();
    let version = db
      .create_container_version(ContainerVersion {
        container_id: container.id,
        version: "v1.0.0".parse().unwrap(),
        compose_content: String::from("services: {}"),
        ..Default::default()
      })
      .unwrap();
    db.publish_version(version.id).unwrap();

    let err = db.delete_container(container.id).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Conflict);
  }

  #[test]
  fn soft_delete_hides_the_container() {
    let db = DbClient::new();
    let container = db.create_container("redis", "").unwrap();
    db.delete_container(container.id).unwrap();
    assert!(db.get_container(container.id).is_err());
    assert!(db.get_container_by_name("redis").is_none());
    // the name is free again
    db.create_container("redis", "").unwrap();
  }

  #[test]
  fn published_versions_are_frozen() {
    let db = DbClient::new();
    let container = db.create_container("nginx", "").unwrap();
    let version = db
      .create_container_version(ContainerVersion {
        container_id: container.id,
        version: "v1.0.0".parse().unwrap(),
        ..Default::default()
      })
      .unwrap();
    db.publish_version(version.id).unwrap();
    let err = db
      .update_version_compose(version.id, String::from("services:"))
      .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Conflict);
  }

  #[test]
  fn version_strings_are_unique_per_container() {
    let db = DbClient::new();
    let container = db.create_container("nginx", "").unwrap();
    let version = ContainerVersion {
      container_id: container.id,
      version: "v1.0.0".parse().unwrap(),
      ..Default::default()
    };
    db.create_container_version(version.clone()).unwrap();
    let err =
      db.create_container_version(version).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Conflict);
  }

  #[test]
  fn deleting_a_referenced_configuration_conflicts() {
    let db = DbClient::new();
    let container = db.create_container("nginx", "").unwrap();
    let configuration = db
      .create_configuration(ContainerConfiguration {
        container_id: container.id,
        name: String::from("default"),
        minimum_version: "v1.0.0".parse().unwrap(),
        ..Default::default()
      })
      .unwrap();
    db.create_container_version(ContainerVersion {
      container_id: container.id,
      version: "v1.0.0".parse().unwrap(),
      configuration_id: Some(configuration.id),
      ..Default::default()
    })
    .unwrap();

    let err =
      db.delete_configuration(configuration.id).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Conflict);
  }

  #[test]
  fn configuration_minimum_version_gates_attachment() {
    let db = DbClient::new();
    let container = db.create_container("nginx", "").unwrap();
    let configuration = db
      .create_configuration(ContainerConfiguration {
        container_id: container.id,
        name: String::from("default"),
        minimum_version: "v2.0.0".parse().unwrap(),
        ..Default::default()
      })
      .unwrap();
    let err = db
      .create_container_version(ContainerVersion {
        container_id: container.id,
        version: "v1.0.0".parse().unwrap(),
        configuration_id: Some(configuration.id),
        ..Default::default()
      })
      .unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidRequest);
  }

  #[test]
  fn service_configuration_upsert_is_last_writer_wins() {
    let db = DbClient::new();
    let container = db.create_container("nginx", "").unwrap();
    let service = db
      .create_service(1, "acme", serde_json::json!({}))
      .unwrap();
    let first = db
      .upsert_service_configuration(
        service.id,
        container.id,
        serde_json::json!({ "a": 1 }),
      )
      .unwrap();
    let second = db
      .upsert_service_configuration(
        service.id,
        container.id,
        serde_json::json!({ "a": 2 }),
      )
      .unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(
      db.get_service_configuration(service.id, container.id)
        .unwrap()
        .values,
      serde_json::json!({ "a": 2 })
    );
  }

  #[test]
  fn terminal_builds_are_immutable() {
    use burndler_client::entities::build::BuildStatus;
    let db = DbClient::new();
    let service = db
      .create_service(1, "acme", serde_json::json!({}))
      .unwrap();
    let build = db.create_build(1, &service);
    db.update_build(&build.id, |b| {
      b.status = BuildStatus::Failed;
      b.error = String::from("boom");
    })
    .unwrap();
    let after = db
      .update_build(&build.id, |b| {
        b.status = BuildStatus::Completed;
      })
      .unwrap();
    assert_eq!(after.status, BuildStatus::Failed);
  }

  #[test]
  fn service_containers_sort_by_order_then_container_id() {
    let db = DbClient::new();
    let service = db
      .create_service(1, "acme", serde_json::json!({}))
      .unwrap();
    let mut ids = Vec::new();
    for name in ["c1", "c2", "c3"] {
      let container = db.create_container(name, "").unwrap();
      let version = db
        .create_container_version(ContainerVersion {
          container_id: container.id,
          version: "v1.0.0".parse().unwrap(),
          ..Default::default()
        })
        .unwrap();
      ids.push((container.id, version.id));
    }
    for (i, (container_id, version_id)) in
      ids.iter().enumerate()
    {
      db.add_service_container(ServiceContainer {
        service_id: service.id,
        container_id: *container_id,
        version_id: *version_id,
        // same order for the last two, tie broken by id
        order: if i == 0 { 1 } else { 0 },
        enabled: true,
        ..Default::default()
      })
      .unwrap();
    }
    let ordered: Vec<i64> = db
      .list_service_containers(service.id)
      .into_iter()
      .map(|sc| sc.container_id)
      .collect();
    assert_eq!(ordered, vec![ids[1].0, ids[2].0, ids[0].0]);
  }
}
