//! Fragment merging with deterministic namespacing.
//!
//! Every top-level service, network, volume, secret and config key is
//! renamed to `<namespace>_<original>` and all intra-fragment
//! references are rewritten identically. Fragments are merged in the
//! order given; callers order them by `(order, container_id)` so two
//! builds of the same service produce byte-identical output.

use std::collections::HashMap;

use burndler_client::entities::{
  compose::{
    BindMount, ComposeKeyKind, HostPortBinding, MergeMapping,
    MergeReport,
  },
  to_service_slug,
};
use serde_yaml_ng::{Mapping, Value};

use crate::MergeError;

/// One compose fragment with its namespace and provenance.
#[derive(Debug, Clone)]
pub struct MergeInput {
  /// Container name, used in collision diagnostics.
  pub container: String,
  /// Source version, carried into the merge report.
  pub version: String,
  /// Full namespace, see [namespace_for].
  pub namespace: String,
  /// The raw fragment.
  pub compose: String,
}

#[derive(Debug, Clone)]
pub struct Merged {
  pub compose: String,
  pub report: MergeReport,
}

/// `<service_slug>_<service_id>/<container_name>`
pub fn namespace_for(
  service_name: &str,
  service_id: i64,
  container: &str,
) -> String {
  format!(
    "{}_{service_id}/{container}",
    to_service_slug(service_name)
  )
}

const SECTIONS: [(&str, ComposeKeyKind); 5] = [
  ("services", ComposeKeyKind::Service),
  ("networks", ComposeKeyKind::Network),
  ("volumes", ComposeKeyKind::Volume),
  ("secrets", ComposeKeyKind::Secret),
  ("configs", ComposeKeyKind::Config),
];

#[derive(Default)]
struct Renames {
  services: HashMap<String, String>,
  networks: HashMap<String, String>,
  volumes: HashMap<String, String>,
  secrets: HashMap<String, String>,
  configs: HashMap<String, String>,
}

impl Renames {
  fn for_kind(
    &self,
    kind: ComposeKeyKind,
  ) -> &HashMap<String, String> {
    match kind {
      ComposeKeyKind::Service => &self.services,
      ComposeKeyKind::Network => &self.networks,
      ComposeKeyKind::Volume => &self.volumes,
      ComposeKeyKind::Secret => &self.secrets,
      ComposeKeyKind::Config => &self.configs,
    }
  }
}

pub fn merge(inputs: &[MergeInput]) -> Result<Merged, MergeError> {
  if inputs.is_empty() {
    return Err(MergeError::Empty);
  }

  let mut version: Option<Value> = None;
  let mut sections: [Mapping; 5] = Default::default();
  // namespaced name -> source container, per section,
  // for collision diagnostics
  let mut sources: [HashMap<String, String>; 5] =
    Default::default();
  let mut report = MergeReport::default();

  for input in inputs {
    let doc = serde_yaml_ng::from_str::<Value>(&input.compose)
      .map_err(|e| MergeError::InvalidFragment {
        container: input.container.clone(),
        message: e.to_string(),
      })?;
    let Value::Mapping(doc) = doc else {
      return Err(MergeError::NotAMapping {
        container: input.container.clone(),
      });
    };

    if version.is_none()
      && let Some(v) = doc.get("version")
    {
      version = Some(v.clone());
    }

    let renames = collect_renames(&doc, &input.namespace);

    for (section_index, (key, kind)) in SECTIONS.iter().enumerate()
    {
      let Some(Value::Mapping(section)) = doc.get(*key) else {
        continue;
      };
      for (name, body) in section {
        let Some(name) = name.as_str() else {
          continue;
        };
        let namespaced = renames
          .for_kind(*kind)
          .get(name)
          .cloned()
          .unwrap_or_else(|| format!("{}_{name}", input.namespace));

        if let Some(first) =
          sources[section_index].get(&namespaced)
        {
          return Err(MergeError::NamespaceCollision {
            kind: *kind,
            name: namespaced,
            first: first.clone(),
            second: input.container.clone(),
          });
        }

        let mut body = body.clone();
        if *kind == ComposeKeyKind::Service {
          rewrite_service(
            &mut body,
            &renames,
            &namespaced,
            &mut report,
          );
        }

        sections[section_index]
          .insert(Value::from(namespaced.clone()), body);
        sources[section_index]
          .insert(namespaced.clone(), input.container.clone());
        report.mappings.push(MergeMapping {
          namespaced_name: namespaced,
          kind: *kind,
          original_name: name.to_string(),
          source_container: input.container.clone(),
          source_version: input.version.clone(),
        });
      }
    }
  }

  let mut merged = Mapping::new();
  if let Some(version) = version {
    merged.insert(Value::from("version"), version);
  }
  for ((key, _), section) in SECTIONS.iter().zip(sections) {
    if !section.is_empty() {
      merged.insert(Value::from(*key), Value::Mapping(section));
    }
  }

  let compose = serde_yaml_ng::to_string(&Value::Mapping(merged))
    .map_err(|e| MergeError::Serialize {
      message: e.to_string(),
    })?;

  Ok(Merged { compose, report })
}

fn collect_renames(doc: &Mapping, namespace: &str) -> Renames {
  let mut renames = Renames::default();
  for (key, kind) in SECTIONS {
    let Some(Value::Mapping(section)) = doc.get(key) else {
      continue;
    };
    let map = match kind {
      ComposeKeyKind::Service => &mut renames.services,
      ComposeKeyKind::Network => &mut renames.networks,
      ComposeKeyKind::Volume => &mut renames.volumes,
      ComposeKeyKind::Secret => &mut renames.secrets,
      ComposeKeyKind::Config => &mut renames.configs,
    };
    for (name, _) in section {
      if let Some(name) = name.as_str() {
        map.insert(
          name.to_string(),
          format!("{namespace}_{name}"),
        );
      }
    }
  }
  renames
}

fn rewrite_service(
  body: &mut Value,
  renames: &Renames,
  namespaced_service: &str,
  report: &mut MergeReport,
) {
  let Value::Mapping(service) = body else {
    return;
  };

  if let Some(depends_on) = service.get_mut("depends_on") {
    rewrite_refs(depends_on, &renames.services);
  }
  if let Some(networks) = service.get_mut("networks") {
    rewrite_refs(networks, &renames.networks);
  }
  if let Some(secrets) = service.get_mut("secrets") {
    rewrite_mount_refs(secrets, &renames.secrets);
  }
  if let Some(configs) = service.get_mut("configs") {
    rewrite_mount_refs(configs, &renames.configs);
  }
  if let Some(Value::Sequence(volumes)) =
    service.get_mut("volumes")
  {
    for entry in volumes {
      rewrite_volume(
        entry,
        &renames.volumes,
        namespaced_service,
        report,
      );
    }
  }
  if let Some(Value::Sequence(ports)) = service.get("ports") {
    for entry in ports {
      let published = match entry {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Mapping(long) => long
          .get("published")
          .map(|p| yaml_scalar_to_string(p)),
        _ => None,
      };
      if let Some(published) = published {
        report.host_ports.push(HostPortBinding {
          service: namespaced_service.to_string(),
          published,
        });
      }
    }
  }
}

/// `depends_on` / service `networks`: either a sequence of
/// names or a map keyed by name.
fn rewrite_refs(value: &mut Value, renames: &HashMap<String, String>) {
  match value {
    Value::Sequence(items) => {
      for item in items {
        if let Value::String(name) = item
          && let Some(renamed) = renames.get(name.as_str())
        {
          *name = renamed.clone();
        }
      }
    }
    Value::Mapping(map) => {
      let entries = std::mem::take(map);
      for (key, body) in entries {
        let key = match key.as_str() {
          Some(name) => match renames.get(name) {
            Some(renamed) => Value::from(renamed.clone()),
            None => Value::from(name.to_string()),
          },
          None => key,
        };
        map.insert(key, body);
      }
    }
    _ => {}
  }
}

/// Service `secrets` / `configs`: sequence of names or of
/// long-syntax maps with a `source` field.
fn rewrite_mount_refs(
  value: &mut Value,
  renames: &HashMap<String, String>,
) {
  let Value::Sequence(items) = value else {
    return;
  };
  for item in items {
    match item {
      Value::String(name) => {
        if let Some(renamed) = renames.get(name.as_str()) {
          *name = renamed.clone();
        }
      }
      Value::Mapping(long) => {
        if let Some(Value::String(source)) =
          long.get_mut("source")
          && let Some(renamed) = renames.get(source.as_str())
        {
          *source = renamed.clone();
        }
      }
      _ => {}
    }
  }
}

fn rewrite_volume(
  entry: &mut Value,
  renames: &HashMap<String, String>,
  namespaced_service: &str,
  report: &mut MergeReport,
) {
  match entry {
    // short syntax: `source:target[:mode]`, or a bare
    // container path for anonymous volumes
    Value::String(spec) => {
      let Some((source, rest)) = spec.split_once(':') else {
        return;
      };
      if source.starts_with('/') || source.starts_with('.') {
        report.bind_mounts.push(BindMount {
          service: namespaced_service.to_string(),
          host_path: source.to_string(),
        });
      } else if let Some(renamed) = renames.get(source) {
        let rewritten = format!("{renamed}:{rest}");
        *spec = rewritten;
      }
    }
    // long syntax
    Value::Mapping(long) => {
      let kind = long
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or("volume")
        .to_string();
      let Some(Value::String(source)) = long.get_mut("source")
      else {
        return;
      };
      match kind.as_str() {
        "bind" => report.bind_mounts.push(BindMount {
          service: namespaced_service.to_string(),
          host_path: source.clone(),
        }),
        "volume" => {
          if let Some(renamed) = renames.get(source.as_str()) {
            *source = renamed.clone();
          }
        }
        _ => {}
      }
    }
    _ => {}
  }
}

fn yaml_scalar_to_string(value: &Value) -> String {
  match value {
    Value::String(s) => s.clone(),
    Value::Number(n) => n.to_string(),
    Value::Bool(b) => b.to_string(),
    _ => String::new(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn input(
    container: &str,
    namespace: &str,
    compose: &str,
  ) -> MergeInput {
    MergeInput {
      container: container.to_string(),
      version: String::from("v1.0.0"),
      namespace: namespace.to_string(),
      compose: compose.to_string(),
    }
  }

  #[test]
  fn namespace_format() {
    assert_eq!(
      namespace_for("Acme", 7, "s1"),
      "acme_7/s1"
    );
  }

  #[test]
  fn merges_two_fragments_defining_the_same_service_name() {
    let fragment = "services:\n  web:\n    image: registry.example.com/acme/web@sha256:0000000000000000000000000000000000000000000000000000000000000000\n";
    let merged = merge(&[
      input("s1", "acme_7/s1", fragment),
      input("s2", "acme_7/s2", fragment),
    ])
    .unwrap();

    let doc: Value =
      serde_yaml_ng::from_str(&merged.compose).unwrap();
    let services = doc.get("services").unwrap();
    assert!(services.get("acme_7/s1_web").is_some());
    assert!(services.get("acme_7/s2_web").is_some());
    assert!(services.get("web").is_none());
    assert_eq!(merged.report.mappings.len(), 2);
    assert_eq!(merged.report.mappings[0].original_name, "web");
    assert_eq!(
      merged.report.mappings[0].namespaced_name,
      "acme_7/s1_web"
    );
  }

  #[test]
  fn empty_input_is_rejected() {
    assert!(matches!(merge(&[]), Err(MergeError::Empty)));
  }

  #[test]
  fn identical_namespaces_collide() {
    let fragment = "services:\n  web:\n    image: r/x@sha256:0000000000000000000000000000000000000000000000000000000000000000\n";
    let err = merge(&[
      input("s1", "acme_7/s1", fragment),
      input("s1-dup", "acme_7/s1", fragment),
    ])
    .unwrap_err();
    match err {
      MergeError::NamespaceCollision {
        name,
        first,
        second,
        ..
      } => {
        assert_eq!(name, "acme_7/s1_web");
        assert_eq!(first, "s1");
        assert_eq!(second, "s1-dup");
      }
      other => panic!("expected collision, got {other:?}"),
    }
  }

  #[test]
  fn rewrites_intra_fragment_references() {
    let fragment = r#"
services:
  web:
    image: r/web@sha256:0000000000000000000000000000000000000000000000000000000000000000
    depends_on:
      - db
    networks:
      - backend
    volumes:
      - data:/var/lib/data
      - /etc/config:/etc/config:ro
  db:
    image: r/db@sha256:0000000000000000000000000000000000000000000000000000000000000000
networks:
  backend: {}
volumes:
  data: {}
"#;
    let merged =
      merge(&[input("app", "acme_1/app", fragment)]).unwrap();
    let doc: Value =
      serde_yaml_ng::from_str(&merged.compose).unwrap();

    let web = doc
      .get("services")
      .and_then(|s| s.get("acme_1/app_web"))
      .unwrap();
    assert_eq!(
      web.get("depends_on").unwrap()[0].as_str().unwrap(),
      "acme_1/app_db"
    );
    assert_eq!(
      web.get("networks").unwrap()[0].as_str().unwrap(),
      "acme_1/app_backend"
    );
    assert_eq!(
      web.get("volumes").unwrap()[0].as_str().unwrap(),
      "acme_1/app_data:/var/lib/data"
    );
    // bind mounts are not rewritten, only reported
    assert_eq!(
      web.get("volumes").unwrap()[1].as_str().unwrap(),
      "/etc/config:/etc/config:ro"
    );
    assert_eq!(merged.report.bind_mounts.len(), 1);
    assert_eq!(
      merged.report.bind_mounts[0].host_path,
      "/etc/config"
    );
    assert!(
      doc
        .get("networks")
        .unwrap()
        .get("acme_1/app_backend")
        .is_some()
    );
    assert!(
      doc.get("volumes").unwrap().get("acme_1/app_data").is_some()
    );
  }

  #[test]
  fn reports_host_ports() {
    let fragment = r#"
services:
  web:
    image: r/web@sha256:0000000000000000000000000000000000000000000000000000000000000000
    ports:
      - "8080:80"
      - target: 443
        published: 8443
"#;
    let merged =
      merge(&[input("app", "acme_1/app", fragment)]).unwrap();
    let published: Vec<_> = merged
      .report
      .host_ports
      .iter()
      .map(|p| p.published.as_str())
      .collect();
    assert_eq!(published, vec!["8080:80", "8443"]);
  }

  #[test]
  fn merge_is_deterministic() {
    let a = "services:\n  web:\n    image: r/a@sha256:0000000000000000000000000000000000000000000000000000000000000000\n";
    let b = "services:\n  api:\n    image: r/b@sha256:0000000000000000000000000000000000000000000000000000000000000000\n";
    let inputs = [
      input("one", "svc_1/one", a),
      input("two", "svc_1/two", b),
    ];
    let first = merge(&inputs).unwrap();
    let second = merge(&inputs).unwrap();
    assert_eq!(first.compose, second.compose);
  }

  #[test]
  fn invalid_fragment_yaml_is_rejected() {
    let err = merge(&[input("bad", "svc_1/bad", "services: [")])
      .unwrap_err();
    assert!(matches!(err, MergeError::InvalidFragment { .. }));
  }
}
