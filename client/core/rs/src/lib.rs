//! # Burndler client
//!
//! Typed client for the Burndler Core API. The entities module holds
//! the shared data model, the api module the request / response
//! shapes, and [BurndlerClient] a thin reqwest wrapper over the HTTP
//! surface.

use std::time::Duration;

use anyhow::{Context, anyhow};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::{
  api::{
    GetVersionResponse,
    build::{CreateBuildResponse, GetBuildResponse},
    compose::{
      LintComposeRequest, LintComposeResponse, MergeComposeRequest,
      MergeComposeResponse,
    },
    container::{
      CreateConfigurationRequest, CreateContainerRequest,
      CreateContainerVersionRequest,
    },
    service::{
      AddServiceContainerRequest, ConfigExport,
      CreateServiceRequest, ImportConfigurationResponse,
      ValidateConfigurationRequest, ValidateConfigurationResponse,
      WriteConfigurationRequest,
    },
    setup::{
      CompleteSetupRequest, CompleteSetupResponse,
      CreateSetupAdminRequest, CreateSetupAdminResponse,
      GetSetupStatusResponse, InitSetupRequest,
    },
  },
  entities::{
    I64, __Serror,
    build::Build,
    container::{
      Container, ContainerConfiguration, ContainerVersion,
    },
    service::{Service, ServiceConfiguration, ServiceContainer},
  },
};

pub mod api;
pub mod entities;

#[derive(Clone)]
pub struct BurndlerClient {
  address: String,
  client: reqwest::Client,
}

impl BurndlerClient {
  pub fn new(address: impl Into<String>) -> BurndlerClient {
    let mut address: String = address.into();
    while address.ends_with('/') {
      address.pop();
    }
    BurndlerClient {
      address,
      client: Default::default(),
    }
  }

  pub async fn get_version(
    &self,
  ) -> anyhow::Result<GetVersionResponse> {
    self.get("/").await
  }

  // ==== SETUP ====

  pub async fn get_setup_status(
    &self,
  ) -> anyhow::Result<GetSetupStatusResponse> {
    self.get("/setup/status").await
  }

  pub async fn init_setup(
    &self,
    request: InitSetupRequest,
  ) -> anyhow::Result<GetSetupStatusResponse> {
    self.post("/setup/init", &request).await
  }

  pub async fn create_setup_admin(
    &self,
    request: CreateSetupAdminRequest,
  ) -> anyhow::Result<CreateSetupAdminResponse> {
    self.post("/setup/admin", &request).await
  }

  pub async fn complete_setup(
    &self,
    request: CompleteSetupRequest,
  ) -> anyhow::Result<CompleteSetupResponse> {
    self.post("/setup/complete", &request).await
  }

  // ==== COMPOSE ====

  pub async fn merge_compose(
    &self,
    request: MergeComposeRequest,
  ) -> anyhow::Result<MergeComposeResponse> {
    self.post("/compose/merge", &request).await
  }

  pub async fn lint_compose(
    &self,
    request: LintComposeRequest,
  ) -> anyhow::Result<LintComposeResponse> {
    self.post("/compose/lint", &request).await
  }

  // ==== CONTAINERS ====

  pub async fn create_container(
    &self,
    request: CreateContainerRequest,
  ) -> anyhow::Result<Container> {
    self.post("/containers", &request).await
  }

  pub async fn create_container_version(
    &self,
    container_id: I64,
    request: CreateContainerVersionRequest,
  ) -> anyhow::Result<ContainerVersion> {
    self
      .post(&format!("/containers/{container_id}/versions"), &request)
      .await
  }

  pub async fn publish_version(
    &self,
    version_id: I64,
  ) -> anyhow::Result<ContainerVersion> {
    self
      .post(
        &format!("/containers/versions/{version_id}/publish"),
        &Value::Null,
      )
      .await
  }

  pub async fn create_configuration(
    &self,
    container_id: I64,
    request: CreateConfigurationRequest,
  ) -> anyhow::Result<ContainerConfiguration> {
    self
      .post(
        &format!("/containers/{container_id}/configurations"),
        &request,
      )
      .await
  }

  // ==== SERVICES ====

  pub async fn create_service(
    &self,
    request: CreateServiceRequest,
  ) -> anyhow::Result<Service> {
    self.post("/services", &request).await
  }

  pub async fn add_service_container(
    &self,
    service_id: I64,
    request: AddServiceContainerRequest,
  ) -> anyhow::Result<ServiceContainer> {
    self
      .post(&format!("/services/{service_id}/containers"), &request)
      .await
  }

  pub async fn validate_configuration(
    &self,
    service_id: I64,
    container_id: I64,
    request: ValidateConfigurationRequest,
  ) -> anyhow::Result<ValidateConfigurationResponse> {
    self
      .post(
        &format!(
          "/services/{service_id}/containers/{container_id}/validate"
        ),
        &request,
      )
      .await
  }

  pub async fn read_configuration(
    &self,
    service_id: I64,
    container_id: I64,
  ) -> anyhow::Result<ServiceConfiguration> {
    self
      .get(&format!(
        "/services/{service_id}/containers/{container_id}/configuration"
      ))
      .await
  }

  pub async fn write_configuration(
    &self,
    service_id: I64,
    container_id: I64,
    request: WriteConfigurationRequest,
  ) -> anyhow::Result<ServiceConfiguration> {
    self
      .put(
        &format!(
          "/services/{service_id}/containers/{container_id}/configuration"
        ),
        &request,
      )
      .await
  }

  pub async fn export_configuration(
    &self,
    service_id: I64,
  ) -> anyhow::Result<ConfigExport> {
    self
      .get(&format!("/services/{service_id}/configuration/export"))
      .await
  }

  pub async fn import_configuration(
    &self,
    service_id: I64,
    document: ConfigExport,
  ) -> anyhow::Result<ImportConfigurationResponse> {
    self
      .post(
        &format!("/services/{service_id}/configuration/import"),
        &document,
      )
      .await
  }

  // ==== BUILDS ====

  pub async fn create_build(
    &self,
    service_id: I64,
  ) -> anyhow::Result<CreateBuildResponse> {
    self
      .post(&format!("/services/{service_id}/build"), &Value::Null)
      .await
  }

  pub async fn get_build(
    &self,
    build_id: &str,
  ) -> anyhow::Result<GetBuildResponse> {
    self.get(&format!("/builds/{build_id}")).await
  }

  /// Poll a build until it reaches a terminal status.
  pub async fn wait_for_build(
    &self,
    build_id: &str,
    poll_interval: Duration,
  ) -> anyhow::Result<Build> {
    loop {
      let build = self.get_build(build_id).await?;
      if build.is_terminal() {
        return Ok(build);
      }
      tokio::time::sleep(poll_interval).await;
    }
  }

  // ==== INNER ====

  async fn get<R: DeserializeOwned>(
    &self,
    endpoint: &str,
  ) -> anyhow::Result<R> {
    let response = self
      .client
      .get(format!("{}{endpoint}", self.address))
      .send()
      .await
      .with_context(|| {
        format!("failed to reach Burndler Core at {}", self.address)
      })?;
    handle_response(response, endpoint).await
  }

  async fn post<B: Serialize, R: DeserializeOwned>(
    &self,
    endpoint: &str,
    body: &B,
  ) -> anyhow::Result<R> {
    let response = self
      .client
      .post(format!("{}{endpoint}", self.address))
      .json(body)
      .send()
      .await
      .with_context(|| {
        format!("failed to reach Burndler Core at {}", self.address)
      })?;
    handle_response(response, endpoint).await
  }

  async fn put<B: Serialize, R: DeserializeOwned>(
    &self,
    endpoint: &str,
    body: &B,
  ) -> anyhow::Result<R> {
    let response = self
      .client
      .put(format!("{}{endpoint}", self.address))
      .json(body)
      .send()
      .await
      .with_context(|| {
        format!("failed to reach Burndler Core at {}", self.address)
      })?;
    handle_response(response, endpoint).await
  }
}

async fn handle_response<R: DeserializeOwned>(
  response: reqwest::Response,
  endpoint: &str,
) -> anyhow::Result<R> {
  let status = response.status();
  if status.is_success() {
    response.json().await.with_context(|| {
      format!("failed to parse {endpoint} response body")
    })
  } else {
    let text = response.text().await.unwrap_or_default();
    match serde_json::from_str::<__Serror>(&text) {
      Ok(serror) => Err(anyhow!(
        "{status} on {endpoint} | {}",
        serror.error
      )),
      Err(_) => Err(anyhow!("{status} on {endpoint} | {text}")),
    }
  }
}
