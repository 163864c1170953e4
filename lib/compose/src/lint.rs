//! The air-gapped installer lint policy.
//!
//! A single error-class violation fails the build. Documents that do
//! not parse lint invalid with an `invalid-yaml` error rather than
//! surfacing as an internal failure, so operational tooling exits
//! with a validation code on malformed input.

use std::sync::OnceLock;

use burndler_client::entities::compose::{
  LintMessage, LintOptions, LintReport,
};
use regex::Regex;
use serde_yaml_ng::{Mapping, Value};

const ALLOWED_TOP_LEVEL_KEYS: [&str; 6] = [
  "services", "networks", "volumes", "secrets", "configs", "version",
];

/// `registry/repo@sha256:<64 hex>`. Tag-only references fail.
fn pinned_image_regex() -> &'static Regex {
  static PINNED_IMAGE: OnceLock<Regex> = OnceLock::new();
  PINNED_IMAGE.get_or_init(|| {
    Regex::new(r"^[^@\s]+/[^@\s]+@sha256:[a-f0-9]{64}$")
      .expect("invalid pinned image regex")
  })
}

pub fn lint(document: &str, options: &LintOptions) -> LintReport {
  let mut report = LintReport {
    valid: true,
    errors: Vec::new(),
    warnings: Vec::new(),
  };

  let doc = match serde_yaml_ng::from_str::<Value>(document) {
    Ok(Value::Mapping(doc)) => doc,
    Ok(_) => {
      error(
        &mut report,
        "invalid-yaml",
        "document is not a yaml mapping",
        "",
      );
      return report;
    }
    Err(e) => {
      error(
        &mut report,
        "invalid-yaml",
        format!("document does not parse as yaml | {e}"),
        "",
      );
      return report;
    }
  };

  for (key, _) in &doc {
    let Some(key) = key.as_str() else {
      continue;
    };
    if !ALLOWED_TOP_LEVEL_KEYS.contains(&key) {
      error(
        &mut report,
        "top-level-key",
        format!("top-level key '{key}' is not allowed"),
        key,
      );
    }
  }

  let Some(Value::Mapping(services)) = doc.get("services") else {
    error(
      &mut report,
      "no-services",
      "document declares no services",
      "services",
    );
    return report;
  };

  for (name, service) in services {
    let Some(name) = name.as_str() else {
      continue;
    };
    let path = format!("services.{name}");
    let Value::Mapping(service) = service else {
      error(
        &mut report,
        "invalid-service",
        format!("service '{name}' must be a mapping"),
        &path,
      );
      continue;
    };
    lint_service(
      &mut report, &doc, services, name, service, &path, options,
    );
  }

  report
}

#[allow(clippy::too_many_arguments)]
fn lint_service(
  report: &mut LintReport,
  doc: &Mapping,
  services: &Mapping,
  name: &str,
  service: &Mapping,
  path: &str,
  options: &LintOptions,
) {
  // 1. no build stanzas, images must be pre-built
  if service.contains_key("build") {
    error(
      report,
      "no-build",
      format!(
        "service '{name}' declares a build stanza, all images must be pre-built"
      ),
      format!("{path}.build"),
    );
  }

  // 2. fully qualified, digest pinned image references
  match service.get("image").and_then(Value::as_str) {
    None => error(
      report,
      "image-not-pinned",
      format!("service '{name}' declares no image"),
      format!("{path}.image"),
    ),
    Some(image) => {
      if !pinned_image_regex().is_match(image) {
        error(
          report,
          "image-not-pinned",
          format!(
            "image '{image}' is not a digest-pinned reference (registry/repo@sha256:...)"
          ),
          format!("{path}.image"),
        );
      }
    }
  }

  // 4. host networking / privileged gates
  if service.get("network_mode").and_then(Value::as_str)
    == Some("host")
    && !options.allow_host_network.iter().any(|s| s == name)
  {
    error(
      report,
      "host-network",
      format!(
        "service '{name}' uses host networking without an allowlist entry"
      ),
      format!("{path}.network_mode"),
    );
  }
  if service.get("privileged").and_then(Value::as_bool)
    == Some(true)
    && !options.allow_privileged.iter().any(|s| s == name)
  {
    error(
      report,
      "privileged",
      format!(
        "service '{name}' runs privileged without an allowlist entry"
      ),
      format!("{path}.privileged"),
    );
  }

  // 5. absolute bind mounts, 6. named volumes resolve
  if let Some(Value::Sequence(volumes)) = service.get("volumes") {
    for volume in volumes {
      lint_volume(report, doc, name, volume, path);
    }
  }

  // 6. cross-service references resolve in-document
  if let Some(depends_on) = service.get("depends_on") {
    let deps: Vec<&str> = match depends_on {
      Value::Sequence(items) => {
        items.iter().filter_map(Value::as_str).collect()
      }
      Value::Mapping(map) => {
        map.iter().filter_map(|(k, _)| k.as_str()).collect()
      }
      _ => Vec::new(),
    };
    for dep in deps {
      if !services.contains_key(dep) {
        error(
          report,
          "unresolved-reference",
          format!(
            "service '{name}' depends on undeclared service '{dep}'"
          ),
          format!("{path}.depends_on"),
        );
      }
    }
  }
  for key in ["networks", "secrets", "configs"] {
    lint_named_refs(report, doc, name, service, path, key);
  }

  // 7. resource limits
  let has_memory_limit = service
    .get("deploy")
    .and_then(|d| d.get("resources"))
    .and_then(|r| r.get("limits"))
    .and_then(|l| l.get("memory"))
    .is_some()
    || service.contains_key("mem_limit");
  if !has_memory_limit {
    let message = format!(
      "service '{name}' declares no memory limit"
    );
    let path = format!("{path}.deploy.resources.limits.memory");
    if options.strict {
      error(report, "resource-limits", message, path);
    } else {
      report.warnings.push(LintMessage {
        rule: String::from("resource-limits"),
        message,
        path,
      });
    }
  }
}

/// Service-level references into a same-named top-level
/// section (`networks`, `secrets`, `configs`).
fn lint_named_refs(
  report: &mut LintReport,
  doc: &Mapping,
  service_name: &str,
  service: &Mapping,
  path: &str,
  key: &str,
) {
  let Some(refs) = service.get(key) else {
    return;
  };
  let names: Vec<String> = match refs {
    Value::Sequence(items) => items
      .iter()
      .filter_map(|item| match item {
        Value::String(name) => Some(name.clone()),
        Value::Mapping(long) => long
          .get("source")
          .and_then(Value::as_str)
          .map(str::to_string),
        _ => None,
      })
      .collect(),
    Value::Mapping(map) => {
      map.iter().filter_map(|(k, _)| k.as_str().map(str::to_string)).collect()
    }
    _ => Vec::new(),
  };
  for name in names {
    let declared =
      matches!(doc.get(key), Some(Value::Mapping(decls)) if decls.contains_key(name.as_str()));
    if !declared {
      error(
        report,
        "unresolved-reference",
        format!(
          "service '{service_name}' references undeclared {key} '{name}'"
        ),
        format!("{path}.{key}"),
      );
    }
  }
}

fn lint_volume(
  report: &mut LintReport,
  doc: &Mapping,
  service_name: &str,
  volume: &Value,
  path: &str,
) {
  let (source, is_bind) = match volume {
    Value::String(spec) => match spec.split_once(':') {
      // bare container path, anonymous volume
      None => return,
      Some((source, _)) => {
        let is_bind = source.contains('/')
          || source.starts_with('.')
          || source.starts_with('~');
        (source.to_string(), is_bind)
      }
    },
    Value::Mapping(long) => {
      let Some(source) =
        long.get("source").and_then(Value::as_str)
      else {
        return;
      };
      let kind = long
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or("volume");
      (source.to_string(), kind == "bind")
    }
    _ => return,
  };

  if is_bind {
    if !source.starts_with('/') {
      error(
        report,
        "relative-bind-mount",
        format!(
          "service '{service_name}' bind-mounts relative host path '{source}'"
        ),
        format!("{path}.volumes"),
      );
    }
  } else {
    let declared =
      matches!(doc.get("volumes"), Some(Value::Mapping(decls)) if decls.contains_key(source.as_str()));
    if !declared {
      error(
        report,
        "unresolved-reference",
        format!(
          "service '{service_name}' mounts undeclared volume '{source}'"
        ),
        format!("{path}.volumes"),
      );
    }
  }
}

fn error(
  report: &mut LintReport,
  rule: &str,
  message: impl Into<String>,
  path: impl Into<String>,
) {
  report.valid = false;
  report.errors.push(LintMessage {
    rule: rule.to_string(),
    message: message.into(),
    path: path.into(),
  });
}

#[cfg(test)]
mod tests {
  use super::*;

  const PINNED: &str = "registry.example.com/acme/web@sha256:1111111111111111111111111111111111111111111111111111111111111111";

  fn clean_doc() -> String {
    format!(
      "services:\n  web:\n    image: {PINNED}\n    deploy:\n      resources:\n        limits:\n          memory: 512M\n"
    )
  }

  #[test]
  fn accepts_a_clean_document() {
    let report = lint(&clean_doc(), &LintOptions::default());
    assert!(report.valid, "{:?}", report.errors);
    assert!(report.errors.is_empty());
    assert!(report.warnings.is_empty());
  }

  #[test]
  fn rejects_build_stanzas() {
    let doc = format!(
      "services:\n  web:\n    image: {PINNED}\n    build: .\n"
    );
    let report = lint(&doc, &LintOptions::default());
    assert!(!report.valid);
    let build_error = report
      .errors
      .iter()
      .find(|e| e.rule == "no-build")
      .unwrap();
    assert_eq!(build_error.path, "services.web.build");
  }

  #[test]
  fn rejects_tag_only_images() {
    for image in
      ["nginx", "nginx:1.27", "registry.example.com/acme/web:v1"]
    {
      let doc = format!("services:\n  web:\n    image: {image}\n");
      let report = lint(&doc, &LintOptions::default());
      assert!(
        report
          .errors
          .iter()
          .any(|e| e.rule == "image-not-pinned"),
        "image {image} should fail"
      );
    }
  }

  #[test]
  fn rejects_unknown_top_level_keys() {
    let doc = format!("{}x-custom: 1\n", clean_doc());
    let report = lint(&doc, &LintOptions::default());
    assert!(
      report
        .errors
        .iter()
        .any(|e| e.rule == "top-level-key" && e.path == "x-custom")
    );
  }

  #[test]
  fn host_network_requires_allowlist() {
    let doc = format!(
      "services:\n  web:\n    image: {PINNED}\n    network_mode: host\n    mem_limit: 512m\n"
    );
    let report = lint(&doc, &LintOptions::default());
    assert!(
      report.errors.iter().any(|e| e.rule == "host-network")
    );

    let allowed = LintOptions {
      allow_host_network: vec![String::from("web")],
      ..Default::default()
    };
    let report = lint(&doc, &allowed);
    assert!(report.valid, "{:?}", report.errors);
  }

  #[test]
  fn privileged_requires_allowlist() {
    let doc = format!(
      "services:\n  web:\n    image: {PINNED}\n    privileged: true\n    mem_limit: 512m\n"
    );
    assert!(
      lint(&doc, &LintOptions::default())
        .errors
        .iter()
        .any(|e| e.rule == "privileged")
    );
    let allowed = LintOptions {
      allow_privileged: vec![String::from("web")],
      ..Default::default()
    };
    assert!(lint(&doc, &allowed).valid);
  }

  #[test]
  fn rejects_relative_bind_mounts() {
    let doc = format!(
      "services:\n  web:\n    image: {PINNED}\n    mem_limit: 512m\n    volumes:\n      - ./config:/etc/config\n"
    );
    let report = lint(&doc, &LintOptions::default());
    assert!(
      report
        .errors
        .iter()
        .any(|e| e.rule == "relative-bind-mount")
    );

    let absolute = format!(
      "services:\n  web:\n    image: {PINNED}\n    mem_limit: 512m\n    volumes:\n      - /etc/config:/etc/config\n"
    );
    assert!(lint(&absolute, &LintOptions::default()).valid);
  }

  #[test]
  fn unresolved_references_fail() {
    let doc = format!(
      "services:\n  web:\n    image: {PINNED}\n    mem_limit: 512m\n    depends_on:\n      - db\n    volumes:\n      - data:/data\n"
    );
    let report = lint(&doc, &LintOptions::default());
    let rules: Vec<_> =
      report.errors.iter().map(|e| e.rule.as_str()).collect();
    assert_eq!(
      rules,
      vec!["unresolved-reference", "unresolved-reference"]
    );
  }

  #[test]
  fn missing_memory_limit_warns_unless_strict() {
    let doc = format!("services:\n  web:\n    image: {PINNED}\n");
    let report = lint(&doc, &LintOptions::default());
    assert!(report.valid);
    assert_eq!(report.warnings.len(), 1);
    assert_eq!(report.warnings[0].rule, "resource-limits");

    let strict = LintOptions {
      strict: true,
      ..Default::default()
    };
    let report = lint(&doc, &strict);
    assert!(!report.valid);
    assert!(
      report.errors.iter().any(|e| e.rule == "resource-limits")
    );
  }

  #[test]
  fn lint_is_monotone_under_compliant_additions() {
    // adding a compliant service keeps a clean document clean
    let extended = format!(
      "{}  api:\n    image: {PINNED}\n    mem_limit: 256m\n",
      clean_doc()
    );
    assert!(lint(&extended, &LintOptions::default()).valid);

    // adding a service with a build stanza makes it fail
    let broken = format!(
      "{}  api:\n    image: {PINNED}\n    build: .\n",
      clean_doc()
    );
    assert!(!lint(&broken, &LintOptions::default()).valid);
  }

  #[test]
  fn unparseable_documents_lint_invalid() {
    let report = lint("services: [", &LintOptions::default());
    assert!(!report.valid);
    assert_eq!(report.errors[0].rule, "invalid-yaml");
  }
}
