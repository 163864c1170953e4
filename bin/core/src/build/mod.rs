//! The build orchestrator: drives a service through
//! validation, configuration, template rendering, asset
//! resolution, compose merge, lint and packaging, persisting
//! status and progress after each stage.
//!
//! Each build runs on its own task against a snapshot of its
//! service, so no stage of one build observes partial state of
//! another. Cancellation is advisory: stages check the flag at
//! item boundaries and fail with `Cancelled` on observing it.

use std::{
  collections::HashMap,
  sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
  },
  time::Duration,
};

use burndler_client::entities::{
  Version, burndler_timestamp,
  build::{BuildStage, BuildStatus},
  compose::LintOptions,
  container::{Container, ContainerConfiguration, ContainerVersion},
  error::ErrorKind,
  service::{Service, ServiceContainer},
};
use compose::{MergeInput, Merged, namespace_for};
use serde_json::Value;
use storage::Storage;

use crate::{
  config::core_config,
  db::DbClient,
  helpers::{CoreError, CoreResult, err},
  state::{db_client, storage},
  variables,
};

mod assets;
mod package;
mod render;

pub use render::ArchiveFile;

/// Launch the build on its own task and return immediately.
pub fn spawn_build(build_id: String) {
  let cancel = Arc::new(AtomicBool::new(false));
  let timeout =
    Duration::from_secs(core_config().build.timeout_secs);
  {
    let cancel = cancel.clone();
    let build_id = build_id.clone();
    tokio::spawn(async move {
      tokio::time::sleep(timeout).await;
      if !cancel.swap(true, Ordering::SeqCst) {
        warn!(
          "build {build_id} | wall clock timeout after {timeout:?}"
        );
      }
    });
  }
  tokio::spawn(run_build(build_id, cancel));
}

async fn run_build(build_id: String, cancel: Arc<AtomicBool>) {
  let config = core_config();
  let runner = BuildRunner {
    db: db_client(),
    storage: storage(),
    lint: config.lint.clone(),
    fan_out: config.build.fan_out.max(1),
    signed_url_ttl: config.storage.signed_url_ttl_secs,
    cancel,
  };
  runner.run(&build_id).await;
}

/// One enabled container reference with everything its
/// stages need.
pub struct BuildUnit {
  pub service_container: ServiceContainer,
  pub container: Container,
  pub version: ContainerVersion,
  pub configuration: Option<ContainerConfiguration>,
  pub namespace: String,
  /// Resolved variable tree, set by the configuration stage.
  pub vars: Value,
}

struct BuildContext {
  service: Service,
  units: Vec<BuildUnit>,
}

pub struct BuildRunner<'a> {
  pub db: &'a DbClient,
  pub storage: &'a Storage,
  pub lint: LintOptions,
  pub fan_out: usize,
  pub signed_url_ttl: u64,
  pub cancel: Arc<AtomicBool>,
}

impl BuildRunner<'_> {
  pub async fn run(&self, build_id: &str) {
    match self.execute(build_id).await {
      Ok(download_url) => {
        info!("build {build_id} | completed | {download_url}");
        let _ = self.db.update_build(build_id, |build| {
          build.status = BuildStatus::Completed;
          build.progress = 100;
          build.download_url = download_url.clone();
          build.completed_at = burndler_timestamp();
        });
      }
      Err(e) => {
        warn!("build {build_id} | failed | {e}");
        let _ = self.db.update_build(build_id, |build| {
          build.status = BuildStatus::Failed;
          build.error_kind = Some(e.kind);
          build.error = format!("{:#}", e.error);
          build.completed_at = burndler_timestamp();
        });
      }
    }
  }

  pub async fn execute(
    &self,
    build_id: &str,
  ) -> CoreResult<String> {
    self.enter_stage(build_id, BuildStage::Validation)?;
    let mut context = self.load_context(build_id)?;

    self.enter_stage(build_id, BuildStage::Configuration)?;
    self.resolve_and_validate(&mut context)?;

    self.enter_stage(build_id, BuildStage::TemplateRender)?;
    let rendered = render::render_files(self, &context.units).await?;

    self.enter_stage(build_id, BuildStage::AssetResolution)?;
    let (embedded, manifest) =
      assets::resolve_assets(self, &context.units).await?;

    self.enter_stage(build_id, BuildStage::ComposeMerge)?;
    let merged = self.merge_fragments(&context)?;
    self.db.update_build(build_id, |build| {
      build.compose = merged.compose.clone();
    })?;

    self.enter_stage(build_id, BuildStage::Linting)?;
    let report = compose::lint(&merged.compose, &self.lint);
    if !report.valid {
      let first = report
        .first_error()
        .map(|e| format!("{} at {}: {}", e.rule, e.path, e.message))
        .unwrap_or_default();
      return Err(err(
        ErrorKind::LintFailed,
        format!(
          "{} lint error(s) | first: {first}",
          report.errors.len()
        ),
      ));
    }

    self.enter_stage(build_id, BuildStage::Packaging)?;
    let entries =
      collect_entries(&context, rendered, embedded, &merged, &report, &manifest)?;
    package::package(self, build_id, entries).await
  }

  fn enter_stage(
    &self,
    build_id: &str,
    stage: BuildStage,
  ) -> CoreResult<()> {
    self.check_cancelled()?;
    debug!("build {build_id} | entering {stage}");
    self.db.update_build(build_id, |build| {
      build.status = BuildStatus::Building(stage);
      build.progress = stage.progress();
    })?;
    Ok(())
  }

  pub(crate) fn check_cancelled(&self) -> CoreResult<()> {
    if self.cancel.load(Ordering::SeqCst) {
      Err(err(ErrorKind::Cancelled, "cancelled"))
    } else {
      Ok(())
    }
  }

  /// Snapshot the service and verify every reference: the
  /// service exists, the referenced versions exist, and all
  /// enabled containers have a compatible configuration.
  fn load_context(&self, build_id: &str) -> CoreResult<BuildContext> {
    let build = self.db.get_build(build_id)?;
    let service = self.db.get_service(build.service_id)?;
    let mut units = Vec::new();
    for service_container in
      self.db.list_service_containers(service.id)
    {
      if !service_container.enabled {
        continue;
      }
      let container =
        self.db.get_container(service_container.container_id)?;
      let version = self
        .db
        .get_container_version(service_container.version_id)?;
      let configuration = match version.configuration_id {
        Some(configuration_id) => {
          let configuration =
            self.db.get_configuration(configuration_id)?;
          if !configuration.applies_to(version.version) {
            return Err(err(
              ErrorKind::InvalidRequest,
              format!(
                "configuration '{}' requires at least {} but '{}' is at {}",
                configuration.name,
                configuration.minimum_version,
                container.name,
                version.version
              ),
            ));
          }
          Some(configuration)
        }
        None => None,
      };
      let namespace =
        namespace_for(&service.name, service.id, &container.name);
      units.push(BuildUnit {
        service_container,
        container,
        version,
        configuration,
        namespace,
        vars: Value::Null,
      });
    }
    if units.is_empty() {
      return Err(err(
        ErrorKind::InvalidRequest,
        "service has no enabled containers",
      ));
    }
    check_peer_dependencies(&units)?;
    Ok(BuildContext { service, units })
  }

  /// C3 + C2 for every unit.
  fn resolve_and_validate(
    &self,
    context: &mut BuildContext,
  ) -> CoreResult<()> {
    for unit in &mut context.units {
      let user_values = self
        .db
        .get_service_configuration(
          context.service.id,
          unit.container.id,
        )
        .map(|configuration| configuration.values);
      unit.vars = variables::resolve(
        &context.service,
        &unit.service_container,
        &unit.version.default_variables,
        user_values.as_ref(),
      );
      let Some(configuration) = &unit.configuration else {
        continue;
      };
      let violations = rules::evaluate(
        &configuration.dependency_rules,
        &unit.vars,
      )
      .map_err(|e| CoreError {
        kind: e
          .downcast_ref::<template::Error>()
          .map(template::Error::kind)
          .unwrap_or(ErrorKind::InvalidRequest),
        error: e,
      })?;
      if !violations.is_empty() {
        let details = violations
          .iter()
          .map(|v| v.message.as_str())
          .collect::<Vec<_>>()
          .join("; ");
        return Err(err(
          ErrorKind::DependencyValidationFailed,
          format!(
            "container '{}' has {} rule violation(s): {details}",
            unit.container.name,
            violations.len()
          ),
        ));
      }
    }
    Ok(())
  }

  fn merge_fragments(
    &self,
    context: &BuildContext,
  ) -> CoreResult<Merged> {
    let inputs: Vec<MergeInput> = context
      .units
      .iter()
      .map(|unit| MergeInput {
        container: unit.container.name.clone(),
        version: unit.version.version.to_string(),
        namespace: unit.namespace.clone(),
        compose: unit.version.compose_content.clone(),
      })
      .collect();
    compose::merge(&inputs).map_err(|e| {
      let kind = match &e {
        compose::MergeError::NamespaceCollision { .. } => {
          ErrorKind::NamespaceCollision
        }
        compose::MergeError::Empty => ErrorKind::InvalidRequest,
        _ => ErrorKind::InvalidRequest,
      };
      CoreError {
        kind,
        error: e.into(),
      }
    })
  }
}

/// Peer dependencies: every declared peer must be an enabled
/// container of the service at a satisfying version.
fn check_peer_dependencies(units: &[BuildUnit]) -> CoreResult<()> {
  let present: HashMap<&str, Version> = units
    .iter()
    .map(|unit| {
      (unit.container.name.as_str(), unit.version.version)
    })
    .collect();
  for unit in units {
    for (peer, constraint) in &unit.version.dependencies {
      let Some(peer_version) = present.get(peer.as_str()) else {
        return Err(err(
          ErrorKind::DependencyValidationFailed,
          format!(
            "container '{}' requires peer '{peer}' which is not part of the service",
            unit.container.name
          ),
        ));
      };
      if !constraint_satisfied(constraint, *peer_version)? {
        return Err(err(
          ErrorKind::DependencyValidationFailed,
          format!(
            "container '{}' requires peer '{peer}' {constraint}, found {peer_version}",
            unit.container.name
          ),
        ));
      }
    }
  }
  Ok(())
}

/// `vX.Y.Z` pins an exact version, `>=vX.Y.Z` a minimum.
fn constraint_satisfied(
  constraint: &str,
  version: Version,
) -> CoreResult<bool> {
  let constraint = constraint.trim();
  let (minimum, required) = match constraint.strip_prefix(">=") {
    Some(rest) => (true, rest.trim()),
    None => (false, constraint),
  };
  let required: Version = required.parse().map_err(|_| {
    err(
      ErrorKind::InvalidRequest,
      format!("invalid version constraint '{constraint}'"),
    )
  })?;
  Ok(if minimum {
    version >= required
  } else {
    version == required
  })
}

#[cfg(test)]
mod tests {
  use std::collections::HashMap;

  use async_compression::tokio::bufread::GzipDecoder;
  use burndler_client::entities::{
    container::{
      ContainerAsset, ContainerConfiguration, ContainerFile,
      ContainerVersion, FileKind, StorageMode, TemplateFormat,
    },
    rules::{DependencyRule, RuleType},
    service::ServiceContainer,
  };
  use serde_json::json;
  use storage::LocalStorage;
  use tokio::io::{AsyncReadExt, BufReader};

  use super::*;

  const PINNED: &str = "registry.example.com/acme/web@sha256:1111111111111111111111111111111111111111111111111111111111111111";

  fn test_storage(root: &std::path::Path) -> Storage {
    Storage::Local(LocalStorage::new(
      root.to_path_buf(),
      String::from("http://localhost:9720/storage"),
      String::from("test-signing-secret"),
    ))
  }

  fn runner<'a>(
    db: &'a DbClient,
    storage: &'a Storage,
  ) -> BuildRunner<'a> {
    BuildRunner {
      db,
      storage,
      lint: LintOptions::default(),
      fan_out: 4,
      signed_url_ttl: 3600,
      cancel: Arc::new(AtomicBool::new(false)),
    }
  }

  /// One container `web` whose fragment declares service
  /// `app`, with a yaml template, a static file, a directory
  /// marker, an embedded asset, a referenced asset, and a
  /// cache-gated file + asset pair that the user values
  /// exclude.
  async fn seed(
    db: &DbClient,
    storage: &Storage,
  ) -> (i64, String) {
    storage
      .upload(
        "containers/web/templates/app.yaml",
        bytes::Bytes::from_static(
          b"port: {{ .Database.Port | default 5432 }}\nname: {{ .SERVICE_NAME }}\n",
        ),
      )
      .await
      .unwrap();
    storage
      .upload(
        "containers/web/static/readme.txt",
        bytes::Bytes::from_static(b"read me\n"),
      )
      .await
      .unwrap();
    storage
      .upload(
        "containers/web/assets/model.bin",
        bytes::Bytes::from_static(b"binary-model"),
      )
      .await
      .unwrap();

    let container = db.create_container("web", "").unwrap();
    let configuration = db
      .create_configuration(ContainerConfiguration {
        container_id: container.id,
        name: String::from("default"),
        minimum_version: "v1.0.0".parse().unwrap(),
        dependency_rules: vec![DependencyRule {
          rule_type: RuleType::Requires,
          field: String::from("SSL.Enabled"),
          condition: String::from("eq .SSL.Enabled true"),
          target: String::from("SSL.Certificate"),
          target_value: None,
          message: Some(String::from("SSL requires certificate")),
        }],
        files: vec![
          ContainerFile {
            path: String::from("conf/app.yaml"),
            kind: FileKind::Template,
            format: TemplateFormat::Yaml,
            storage_key: String::from(
              "containers/web/templates/app.yaml",
            ),
            ..Default::default()
          },
          ContainerFile {
            path: String::from("static/readme.txt"),
            kind: FileKind::Static,
            storage_key: String::from(
              "containers/web/static/readme.txt",
            ),
            ..Default::default()
          },
          ContainerFile {
            path: String::from("data"),
            kind: FileKind::Directory,
            ..Default::default()
          },
          // gated off by the user values below; its key is
          // never fetched
          ContainerFile {
            path: String::from("conf/cache.yaml"),
            kind: FileKind::Template,
            format: TemplateFormat::Yaml,
            include_condition: String::from(
              "eq .Cache.Enabled true",
            ),
            storage_key: String::from(
              "containers/web/templates/missing.yaml",
            ),
            ..Default::default()
          },
        ],
        assets: vec![
          ContainerAsset {
            filename: String::from("model.bin"),
            path: String::from("blobs/model.bin"),
            size: 12,
            checksum: String::from("aa"),
            storage_mode: StorageMode::Embedded,
            storage_key: String::from(
              "containers/web/assets/model.bin",
            ),
            ..Default::default()
          },
          ContainerAsset {
            filename: String::from("big.iso"),
            path: String::from("blobs/big.iso"),
            size: 4096,
            checksum: String::from("bb"),
            storage_mode: StorageMode::Referenced,
            storage_key: String::from(
              "containers/web/assets/big.iso",
            ),
            ..Default::default()
          },
          ContainerAsset {
            filename: String::from("cache.bin"),
            path: String::from("blobs/cache.bin"),
            size: 1,
            checksum: String::from("cc"),
            include_condition: String::from(
              "eq .Cache.Enabled true",
            ),
            storage_mode: StorageMode::Embedded,
            storage_key: String::from(
              "containers/web/assets/cache.bin",
            ),
            ..Default::default()
          },
        ],
        ..Default::default()
      })
      .unwrap();
    let version = db
      .create_container_version(ContainerVersion {
        container_id: container.id,
        version: "v1.0.0".parse().unwrap(),
        compose_content: format!(
          "services:\n  app:\n    image: {PINNED}\n    mem_limit: 512m\n"
        ),
        default_variables: json!({ "Database": {} }),
        configuration_id: Some(configuration.id),
        ..Default::default()
      })
      .unwrap();
    db.publish_version(version.id).unwrap();

    let service =
      db.create_service(1, "acme", json!({})).unwrap();
    db.add_service_container(ServiceContainer {
      service_id: service.id,
      container_id: container.id,
      version_id: version.id,
      order: 0,
      enabled: true,
      ..Default::default()
    })
    .unwrap();
    db.upsert_service_configuration(
      service.id,
      container.id,
      json!({
        "Database": { "Port": 9000 },
        "Cache": { "Enabled": false },
      }),
    )
    .unwrap();
    (service.id, container.name)
  }

  async fn unpack(
    storage: &Storage,
    build_id: &str,
  ) -> HashMap<String, Vec<u8>> {
    let compressed = storage
      .download(&format!("builds/{build_id}/installer.tar.gz"))
      .await
      .unwrap();
    let mut decoder =
      GzipDecoder::new(BufReader::new(&compressed[..]));
    let mut tar_bytes = Vec::new();
    decoder.read_to_end(&mut tar_bytes).await.unwrap();
    let mut archive = tar::Archive::new(&tar_bytes[..]);
    let mut entries = HashMap::new();
    for entry in archive.entries().unwrap() {
      let mut entry = entry.unwrap();
      let path =
        entry.path().unwrap().to_string_lossy().to_string();
      let mut contents = Vec::new();
      std::io::Read::read_to_end(&mut entry, &mut contents)
        .unwrap();
      entries.insert(path, contents);
    }
    entries
  }

  #[tokio::test]
  async fn happy_path_build_produces_installer() {
    let dir = tempfile::tempdir().unwrap();
    let storage = test_storage(dir.path());
    let db = DbClient::new();
    let (service_id, _) = seed(&db, &storage).await;
    let service = db.get_service(service_id).unwrap();

    let build = db.create_build(1, &service);
    runner(&db, &storage).run(&build.id).await;

    let build = db.get_build(&build.id).unwrap();
    assert_eq!(
      build.status,
      BuildStatus::Completed,
      "build failed: {}",
      build.error
    );
    assert_eq!(build.progress, 100);
    assert!(!build.download_url.is_empty());
    assert!(build.completed_at > 0);

    let namespace = namespace_for(&service.name, service.id, "web");
    let entries = unpack(&storage, &build.id).await;

    // the merged document is at the well-known path and the
    // linter re-accepts it
    let compose_text = String::from_utf8(
      entries.get("compose.yaml").unwrap().clone(),
    )
    .unwrap();
    assert!(compose_text.contains(&format!("{namespace}_app")));
    assert!(
      compose::lint(&compose_text, &LintOptions::default()).valid
    );

    // rendered template at its namespaced path, with the
    // user-provided port winning over the default
    let rendered = String::from_utf8(
      entries
        .get(&format!("files/{namespace}/conf/app.yaml"))
        .unwrap()
        .clone(),
    )
    .unwrap();
    assert!(rendered.contains("port: 9000"));
    assert!(rendered.contains("name: acme"));

    // static file streamed verbatim, directory marker emitted
    assert_eq!(
      entries
        .get(&format!("files/{namespace}/static/readme.txt"))
        .unwrap(),
      b"read me\n"
    );
    assert!(
      entries.contains_key(&format!("files/{namespace}/data/"))
    );

    // embedded asset present, excluded pair absent
    assert_eq!(
      entries
        .get(&format!("assets/{namespace}/blobs/model.bin"))
        .unwrap(),
      b"binary-model"
    );
    assert!(
      !entries
        .contains_key(&format!("files/{namespace}/conf/cache.yaml"))
    );
    assert!(
      !entries
        .contains_key(&format!("assets/{namespace}/blobs/cache.bin"))
    );

    // referenced asset in the manifest with a signed url,
    // and not in the archive
    let manifest: burndler_client::entities::build::AssetManifest =
      serde_json::from_slice(entries.get("manifest.json").unwrap())
        .unwrap();
    assert_eq!(manifest.assets.len(), 1);
    assert_eq!(
      manifest.assets[0].path,
      format!("assets/{namespace}/blobs/big.iso")
    );
    assert!(manifest.assets[0].url.contains("sig="));
    assert!(
      !entries
        .contains_key(&format!("assets/{namespace}/blobs/big.iso"))
    );

    assert!(entries.contains_key("INSTALL.md"));
    assert!(entries.contains_key("scripts/install.sh"));
    assert!(entries.contains_key("lint.json"));
  }

  #[tokio::test]
  async fn builds_are_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    let storage = test_storage(dir.path());
    let db = DbClient::new();
    let (service_id, _) = seed(&db, &storage).await;
    let service = db.get_service(service_id).unwrap();

    let first = db.create_build(1, &service);
    runner(&db, &storage).run(&first.id).await;
    let second = db.create_build(1, &service);
    runner(&db, &storage).run(&second.id).await;

    let first = db.get_build(&first.id).unwrap();
    let second = db.get_build(&second.id).unwrap();
    assert_eq!(first.status, BuildStatus::Completed);
    assert_eq!(second.status, BuildStatus::Completed);
    // byte-identical merged compose
    assert_eq!(first.compose, second.compose);
    // identical archive entry paths
    let first_entries = unpack(&storage, &first.id).await;
    let second_entries = unpack(&storage, &second.id).await;
    let mut first_paths: Vec<_> =
      first_entries.keys().collect();
    let mut second_paths: Vec<_> =
      second_entries.keys().collect();
    first_paths.sort();
    second_paths.sort();
    assert_eq!(first_paths, second_paths);
  }

  #[tokio::test]
  async fn rule_violations_fail_the_configuration_stage() {
    let dir = tempfile::tempdir().unwrap();
    let storage = test_storage(dir.path());
    let db = DbClient::new();
    let (service_id, container_name) =
      seed(&db, &storage).await;
    let service = db.get_service(service_id).unwrap();
    let container =
      db.get_container_by_name(&container_name).unwrap();
    // enable ssl without a certificate
    db.upsert_service_configuration(
      service.id,
      container.id,
      json!({ "SSL": { "Enabled": true } }),
    )
    .unwrap();

    let build = db.create_build(1, &service);
    runner(&db, &storage).run(&build.id).await;

    let build = db.get_build(&build.id).unwrap();
    assert_eq!(build.status, BuildStatus::Failed);
    assert_eq!(
      build.error_kind,
      Some(ErrorKind::DependencyValidationFailed)
    );
    assert!(build.error.contains("SSL requires certificate"));
  }

  #[tokio::test]
  async fn lint_failures_fail_the_linting_stage() {
    let dir = tempfile::tempdir().unwrap();
    let storage = test_storage(dir.path());
    let db = DbClient::new();

    let container = db.create_container("web", "").unwrap();
    let version = db
      .create_container_version(ContainerVersion {
        container_id: container.id,
        version: "v1.0.0".parse().unwrap(),
        compose_content: String::from(
          "services:\n  app:\n    image: nginx:latest\n",
        ),
        ..Default::default()
      })
      .unwrap();
    let service =
      db.create_service(1, "acme", json!({})).unwrap();
    db.add_service_container(ServiceContainer {
      service_id: service.id,
      container_id: container.id,
      version_id: version.id,
      enabled: true,
      ..Default::default()
    })
    .unwrap();

    let build = db.create_build(1, &service);
    runner(&db, &storage).run(&build.id).await;

    let build = db.get_build(&build.id).unwrap();
    assert_eq!(build.status, BuildStatus::Failed);
    assert_eq!(build.error_kind, Some(ErrorKind::LintFailed));
    assert!(build.error.contains("image-not-pinned"));
  }

  #[tokio::test]
  async fn cancellation_fails_the_build() {
    let dir = tempfile::tempdir().unwrap();
    let storage = test_storage(dir.path());
    let db = DbClient::new();
    let (service_id, _) = seed(&db, &storage).await;
    let service = db.get_service(service_id).unwrap();

    let build = db.create_build(1, &service);
    let runner = runner(&db, &storage);
    runner.cancel.store(true, Ordering::SeqCst);
    runner.run(&build.id).await;

    let build = db.get_build(&build.id).unwrap();
    assert_eq!(build.status, BuildStatus::Failed);
    assert_eq!(build.error_kind, Some(ErrorKind::Cancelled));
  }

  #[tokio::test]
  async fn empty_services_fail_validation() {
    let dir = tempfile::tempdir().unwrap();
    let storage = test_storage(dir.path());
    let db = DbClient::new();
    let service =
      db.create_service(1, "empty", json!({})).unwrap();

    let build = db.create_build(1, &service);
    runner(&db, &storage).run(&build.id).await;

    let build = db.get_build(&build.id).unwrap();
    assert_eq!(build.status, BuildStatus::Failed);
    assert_eq!(
      build.error_kind,
      Some(ErrorKind::InvalidRequest)
    );
  }
}

/// Assemble every archive entry and enforce the unique-path
/// invariant across rendered files, embedded assets and the
/// well-known entries.
fn collect_entries(
  context: &BuildContext,
  rendered: Vec<ArchiveFile>,
  embedded: Vec<ArchiveFile>,
  merged: &Merged,
  report: &burndler_client::entities::compose::LintReport,
  manifest: &burndler_client::entities::build::AssetManifest,
) -> CoreResult<Vec<ArchiveFile>> {
  let mut entries = vec![
    ArchiveFile::regular("compose.yaml", merged.compose.clone()),
    ArchiveFile::regular(
      "lint.json",
      serde_json::to_string_pretty(report)
        .map_err(|e| err(ErrorKind::Internal, e))?,
    ),
    ArchiveFile::regular(
      "manifest.json",
      serde_json::to_string_pretty(manifest)
        .map_err(|e| err(ErrorKind::Internal, e))?,
    ),
    ArchiveFile::regular(
      "INSTALL.md",
      package::install_md(&context.service, &context.units),
    ),
    ArchiveFile::regular(
      "scripts/install.sh",
      package::install_sh(),
    ),
  ];
  entries.extend(rendered);
  entries.extend(embedded);
  entries.sort_by(|a, b| a.path.cmp(&b.path));
  for pair in entries.windows(2) {
    if pair[0].path == pair[1].path {
      return Err(err(
        ErrorKind::PathCollision,
        format!(
          "duplicate installer path '{}'",
          pair[0].path
        ),
      ));
    }
  }
  Ok(entries)
}
